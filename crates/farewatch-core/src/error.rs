use thiserror::Error;

/// Top-level error type for the Farewatch system.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for FarewatchError` so that `?` works across
/// crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FarewatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    #[error("Calibration incomplete: {0}")]
    Calibration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for FarewatchError {
    fn from(err: toml::de::Error) -> Self {
        FarewatchError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for FarewatchError {
    fn from(err: toml::ser::Error) -> Self {
        FarewatchError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for FarewatchError {
    fn from(err: serde_json::Error) -> Self {
        FarewatchError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Farewatch operations.
pub type Result<T> = std::result::Result<T, FarewatchError>;
