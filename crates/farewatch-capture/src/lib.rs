//! Farewatch capture crate - screen text snapshots of the watched app.
//!
//! Provides the SnapshotSource trait, a MockSnapshotSource for testing, a
//! UiDumpSource that reads the device screen through adb, and a
//! ChangeDetector that suppresses unchanged snapshots.

pub mod change;
pub mod error;
pub mod uiautomator;

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

pub use change::ChangeDetector;
pub use error::CaptureError;
pub use uiautomator::{unescape_xml, UiDumpParser, UiDumpSource};

/// Ordered text fragments scraped from one screen of the target app.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub package: String,
    pub fragments: Vec<String>,
    pub captured_at: DateTime<Utc>,
}

/// Source of screen snapshots.
pub trait SnapshotSource: Send + Sync {
    /// Read the current screen.
    ///
    /// Returns `Ok(None)` when the target app is not in the foreground.
    fn snapshot(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<Snapshot>, CaptureError>> + Send;
}

/// Mock snapshot source for testing.
///
/// Replays queued screens in order; once the queue is empty every call
/// reports the target app as not in the foreground.
#[derive(Debug, Default)]
pub struct MockSnapshotSource {
    screens: Mutex<VecDeque<Option<Vec<String>>>>,
}

impl MockSnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that yields one screen with `fragments`.
    pub fn with_fragments<S: AsRef<str>>(fragments: &[S]) -> Self {
        let source = Self::new();
        source.push_screen(fragments);
        source
    }

    /// Queue a screen of the target app.
    pub fn push_screen<S: AsRef<str>>(&self, fragments: &[S]) {
        let fragments = fragments.iter().map(|s| s.as_ref().to_string()).collect();
        self.queue().push_back(Some(fragments));
    }

    /// Queue a poll where the target app is in the background.
    pub fn push_background(&self) {
        self.queue().push_back(None);
    }

    pub fn remaining(&self) -> usize {
        self.queue().len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Option<Vec<String>>>> {
        self.screens.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SnapshotSource for MockSnapshotSource {
    async fn snapshot(&self) -> Result<Option<Snapshot>, CaptureError> {
        let next = self.queue().pop_front().flatten();
        Ok(next.map(|fragments| Snapshot {
            package: "mock".to_string(),
            fragments,
            captured_at: Utc::now(),
        }))
    }
}
