//! Farewatch engine - wires parsing, novelty, policy, and taps together.
//!
//! The [`EngineCoordinator`] processes one snapshot at a time and owns the
//! session lifecycle. The [`Monitor`] drives it from a [`SnapshotSource`]
//! on a fixed poll interval.
//!
//! [`SnapshotSource`]: farewatch_capture::SnapshotSource

pub mod coordinator;
pub mod monitor;
pub mod outcome;

pub use coordinator::{EngineCoordinator, EVENT_CAPACITY};
pub use monitor::{Monitor, MonitorSummary};
pub use outcome::{CycleOutcome, TapOutcome};
