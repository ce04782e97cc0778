//! Row store error types.

use thiserror::Error;

/// Errors raised by a row store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    Rocks(#[from] rocksdb::Error),

    /// Record encoding error
    #[error("Record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Column family missing from the database
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// The paging callback asked the store to abort
    #[error("Paging aborted: {0}")]
    Aborted(String),
}
