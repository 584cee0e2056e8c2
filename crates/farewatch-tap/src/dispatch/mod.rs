//! Gesture dispatch and tap indicator seams.
//!
//! Defines the `GestureDispatcher` async trait that performs a tap on the
//! device, and the `IndicatorDisplay` trait that briefly marks where a tap
//! lands. Implementations live in the submodules.

pub mod adb;
pub mod log;
pub mod mock;

use async_trait::async_trait;

use farewatch_core::types::Point;

use crate::error::TapError;

pub use adb::AdbDispatcher;
pub use log::{LogDispatcher, LogIndicator};
pub use mock::{RecordedTap, RecordingDispatcher, RecordingIndicator};

/// Performs a single tap gesture.
#[async_trait]
pub trait GestureDispatcher: Send + Sync {
    /// Press at `point` for `duration_ms` and release.
    async fn dispatch_tap(&self, point: Point, duration_ms: u64) -> Result<(), TapError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Shows a transient marker over a tap location.
///
/// Failures are reported but never abort a sequence.
pub trait IndicatorDisplay: Send + Sync {
    fn show(&self, point: Point, size_px: u32) -> Result<(), TapError>;
}
