//! Tap sequencing for Farewatch.
//!
//! Turns the calibrated accept targets into a [`TapPlan`] and executes it
//! through a [`GestureDispatcher`] with randomized delays. Only one sequence
//! runs at a time; overlapping requests are dropped.

pub mod delay;
pub mod dispatch;
pub mod error;
pub mod plan;
pub mod sequencer;

pub use delay::{DelaySource, RandomDelays, ScriptedDelays, SeededDelays};
pub use dispatch::{
    AdbDispatcher, GestureDispatcher, IndicatorDisplay, LogDispatcher, LogIndicator,
    RecordedTap, RecordingDispatcher, RecordingIndicator,
};
pub use error::TapError;
pub use plan::{TapPlan, TapStep};
pub use sequencer::{RunOutcome, SequenceHandle, SequenceReport, SequenceStatus, TapSequencer};
