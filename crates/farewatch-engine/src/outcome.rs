//! What happened to a snapshot.

use uuid::Uuid;

use farewatch_core::types::{Decision, Offer};

/// Result of processing one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No session is running; the snapshot was ignored.
    Inactive,
    /// The snapshot held no offer.
    NoOffer,
    /// Same offer as the last one, inside the debounce window.
    Duplicate,
    /// A novel offer was evaluated.
    Decided {
        offer: Offer,
        decision: Decision,
        taps: TapOutcome,
    },
}

impl CycleOutcome {
    pub fn is_decided(&self) -> bool {
        matches!(self, CycleOutcome::Decided { .. })
    }
}

/// What the engine did about tapping for a decided offer.
#[derive(Debug, Clone, PartialEq)]
pub enum TapOutcome {
    /// An accept sequence was started.
    Started { sequence_id: Uuid },
    /// A sequence was already running; this one was dropped.
    Busy,
    /// The offer was accepted but automatic accepting is turned off.
    AutoAcceptDisabled,
    /// The listed targets (1-based) are not calibrated.
    Uncalibrated(Vec<usize>),
    /// The offer was rejected. Rejected offers are left to expire.
    NotAccepted,
    /// The sequencer refused the plan for another reason.
    Failed(String),
}
