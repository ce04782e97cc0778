//! Error types shared across the occurrence pipeline.

use thiserror::Error;

/// Unified error type for configuration and record-level operations.
#[derive(Debug, Error)]
pub enum OccurrenceError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),
}
