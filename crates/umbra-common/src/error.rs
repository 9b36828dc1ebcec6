//! Error types shared across Umbra crates.

use thiserror::Error;

/// Top-level error type for Umbra operations.
#[derive(Debug, Error)]
pub enum UmbraError {
    /// A tuning value failed validation at load time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization errors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Umbra operations.
pub type UmbraResult<T> = Result<T, UmbraError>;
