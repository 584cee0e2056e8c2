use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Offer, Point};

/// Events emitted by the engine for status displays and logs.
///
/// Consumers subscribe through a broadcast channel; a slow or absent
/// subscriber never blocks the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum EngineEvent {
    /// A monitoring session started and the engine state was reset.
    SessionStarted {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The monitoring session stopped.
    SessionStopped {
        session_id: Uuid,
        offers_seen: u64,
        timestamp: DateTime<Utc>,
    },

    /// A novel offer was parsed and evaluated.
    OfferDecided {
        offer: Offer,
        accepted: bool,
        summary: String,
        timestamp: DateTime<Utc>,
    },

    /// A tap sequence started.
    SequenceStarted {
        sequence_id: Uuid,
        steps: usize,
        initial_delay_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// One tap of a sequence was dispatched.
    TapDispatched {
        sequence_id: Uuid,
        step: usize,
        point: Point,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tap sequence ended; `completed` is false when it was aborted or cancelled.
    SequenceFinished {
        sequence_id: Uuid,
        completed: bool,
        timestamp: DateTime<Utc>,
    },

    /// An accepted offer could not be tapped because targets are not calibrated.
    CalibrationRequired {
        missing_targets: Vec<usize>,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::SessionStarted { .. } => "session_started",
            EngineEvent::SessionStopped { .. } => "session_stopped",
            EngineEvent::OfferDecided { .. } => "offer_decided",
            EngineEvent::SequenceStarted { .. } => "sequence_started",
            EngineEvent::TapDispatched { .. } => "tap_dispatched",
            EngineEvent::SequenceFinished { .. } => "sequence_finished",
            EngineEvent::CalibrationRequired { .. } => "calibration_required",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = EngineEvent::CalibrationRequired {
            missing_targets: vec![2, 3],
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "calibration_required");
        assert_eq!(json["missing_targets"], serde_json::json!([2, 3]));
        assert_eq!(event.name(), "calibration_required");
    }

    #[test]
    fn test_event_roundtrip() {
        let event = EngineEvent::TapDispatched {
            sequence_id: Uuid::new_v4(),
            step: 1,
            point: Point::new(540.0, 1800.0),
            duration_ms: 150,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        match back {
            EngineEvent::TapDispatched { step, point, .. } => {
                assert_eq!(step, 1);
                assert_eq!(point, Point::new(540.0, 1800.0));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
