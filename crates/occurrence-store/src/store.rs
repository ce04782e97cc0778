//! The consumed row-store interface.

use chrono::NaiveDateTime;

use occurrence_types::RecordMap;

use crate::error::StoreError;

/// Read access to occurrence rows, as the indexing engine consumes it.
///
/// Paging hands `(row_key, map)` pairs to the callback in store order; the
/// callback returns false to stop. `since` filters on the record's
/// modification audit columns (`alaModified` / `alaModified.p`).
pub trait OccurrenceStore: Send + Sync {
    fn get(&self, row_key: &str) -> Result<Option<RecordMap>, StoreError>;

    fn page_by_time_range(
        &self,
        since: Option<NaiveDateTime>,
        f: &mut dyn FnMut(&str, &RecordMap) -> bool,
    ) -> Result<u64, StoreError>;

    /// User ids behind the row's user assertions.
    fn user_ids_for_assertions(&self, row_key: &str) -> Result<Vec<String>, StoreError>;
}
