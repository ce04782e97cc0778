//! Vocabulary error types.

use thiserror::Error;

/// Errors raised while loading vocabulary sources.
#[derive(Debug, Error)]
pub enum VocabError {
    /// IO error reading a local source file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed descriptor or mapping file
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] serde_json::Error),

    /// HTTP fetch of a remote descriptor failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Source not configured or not found
    #[error("Source not found: {0}")]
    SourceNotFound(String),
}
