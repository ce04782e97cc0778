//! The occurrence record as the row store hands it over.
//!
//! A record is a sparse mapping from column name to raw string value.
//! Columns come in two flavours: raw (`foo`) and processed (`foo.p`).
//! Readers privilege processed values where present.

use std::collections::HashMap;

/// Processed-column suffix used by the row store.
pub const PROCESSED_SUFFIX: &str = ".p";

/// Deletion marker column. A non-empty value means the row is tombstoned.
pub const DELETED_COLUMN: &str = "deleted";

/// Audit columns recording the last pipeline modification time.
pub const MODIFIED_COLUMN: &str = "alaModified";

/// One occurrence row: column name -> raw value.
pub type RecordMap = HashMap<String, String>;

/// Read-only view over a [`RecordMap`] with processed-column precedence.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    map: &'a RecordMap,
}

impl<'a> RecordView<'a> {
    pub fn new(map: &'a RecordMap) -> Self {
        Self { map }
    }

    /// Raw column value, empty values treated as absent.
    pub fn raw(&self, column: &str) -> Option<&'a str> {
        self.map
            .get(column)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Processed column value (`column.p`), empty values treated as absent.
    pub fn processed(&self, column: &str) -> Option<&'a str> {
        let key = format!("{column}{PROCESSED_SUFFIX}");
        self.map
            .get(&key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Processed value if present, else the raw value.
    pub fn value(&self, column: &str) -> Option<&'a str> {
        self.processed(column).or_else(|| self.raw(column))
    }

    /// Whether the record carries the deletion tombstone.
    pub fn is_deleted(&self) -> bool {
        self.raw(DELETED_COLUMN).is_some()
    }

    /// The last-modified audit value (processed preferred).
    pub fn modified(&self) -> Option<&'a str> {
        self.value(MODIFIED_COLUMN)
    }

    /// Number of populated columns.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
