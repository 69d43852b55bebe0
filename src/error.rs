//! Error types for Floodgate operations.

use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// A policy failed validation at construction time
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    /// An admission call was made with unusable arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The atomic store could not execute the transaction (closed, unreachable or timed out)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Persisted limiter state could not be decoded or encoded
    #[error("Corrupt limiter state: {0}")]
    CorruptState(String),

    /// No limiter is registered under the requested policy id
    #[error("Unknown policy: {0}")]
    UnknownPolicy(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FloodgateError {
    /// Whether this error came from the store rather than from the caller or the policy.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, FloodgateError::StoreUnavailable(_))
    }
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
