//! Error types for snapshot capture.

use farewatch_core::error::FarewatchError;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Capture command failed: {0}")]
    CommandFailed(String),
    #[error("Capture timed out after {0} ms")]
    Timeout(u64),
    #[error("Malformed UI dump: {0}")]
    Malformed(String),
}

impl From<CaptureError> for FarewatchError {
    fn from(err: CaptureError) -> Self {
        FarewatchError::Capture(err.to_string())
    }
}
