//! Pipeline error types.

use thiserror::Error;

/// Errors raised by the indexing pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Index adapter error
    #[error("Index error: {0}")]
    Index(#[from] occurrence_index::IndexError),

    /// Row store error
    #[error("Store error: {0}")]
    Store(#[from] occurrence_store::StoreError),

    /// CSV emission error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Worker pool error
    #[error("Worker error: {0}")]
    Worker(String),
}
