//! Error types for the tap sequencer.

use farewatch_core::error::FarewatchError;

/// Errors from planning or running a tap sequence.
#[derive(Debug, thiserror::Error)]
pub enum TapError {
    #[error("Tap targets not calibrated: {0:?}")]
    Uncalibrated(Vec<usize>),
    #[error("Tap plan has no steps")]
    EmptyPlan,
    #[error("Gesture dispatch failed: {0}")]
    DispatchFailed(String),
    #[error("Indicator display failed: {0}")]
    Indicator(String),
    #[error("No async runtime available to run the sequence")]
    NoRuntime,
    #[error("Sequence task failed: {0}")]
    TaskFailed(String),
}

impl From<TapError> for FarewatchError {
    fn from(err: TapError) -> Self {
        match err {
            TapError::Uncalibrated(_) | TapError::EmptyPlan => {
                FarewatchError::Calibration(err.to_string())
            }
            other => FarewatchError::Dispatch(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_error_display() {
        assert_eq!(
            TapError::Uncalibrated(vec![1, 3]).to_string(),
            "Tap targets not calibrated: [1, 3]"
        );
        assert_eq!(TapError::EmptyPlan.to_string(), "Tap plan has no steps");
        assert_eq!(
            TapError::DispatchFailed("device offline".to_string()).to_string(),
            "Gesture dispatch failed: device offline"
        );
    }

    #[test]
    fn test_tap_error_into_farewatch_error() {
        let err: FarewatchError = TapError::Uncalibrated(vec![2]).into();
        assert!(matches!(err, FarewatchError::Calibration(_)));

        let err: FarewatchError = TapError::DispatchFailed("x".to_string()).into();
        assert!(matches!(err, FarewatchError::Dispatch(_)));
        assert!(err.to_string().contains("Gesture dispatch failed: x"));
    }
}
