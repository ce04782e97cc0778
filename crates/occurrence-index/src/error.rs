//! Index adapter error types.

use thiserror::Error;

/// Errors that can occur in the index adapter.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Tantivy index error (embedded mode)
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// Query parse error (embedded mode)
    #[error("Query parse error: {0}")]
    QueryParse(#[from] tantivy::query::QueryParserError),

    /// HTTP transport error (remote/cluster mode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Wire protocol payload error
    #[error("Wire format error: {0}")]
    Wire(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend configuration error
    #[error("Backend configuration error: {0}")]
    Config(String),

    /// Backend rejected or failed an operation
    #[error("Backend error: {0}")]
    Backend(String),

    /// Document pool exhausted or poisoned
    #[error("Document pool error: {0}")]
    Pool(String),

    /// A streaming callback asked the stream to abort
    #[error("Stream callback error: {0}")]
    Callback(String),
}
