//! Error types shared by every crate in the workspace

use thiserror::Error;

/// Errors surfaced by translation, detection and model management
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected before any engine is touched (empty text, unknown code, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Inference failed inside the engine; never retried
    #[error("Engine failure: {0}")]
    EngineFatal(String),

    /// Pool bookkeeping is broken, e.g. a lock was never released
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Model is not loaded")]
    ModelUnloaded,

    #[error("Language detection failed: {0}")]
    Detection(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the caller caused this error
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
