//! RocksDB-backed occurrence store.
//!
//! Two column families: `occurrences` (row key -> JSON-encoded record map)
//! and `assertion_users` (row key -> JSON array of user ids). Records are
//! sparse string maps, so JSON keeps the encoding readable from tooling.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use tracing::{debug, info};

use occurrence_types::RecordMap;

use crate::error::StoreError;
use crate::store::OccurrenceStore;

const CF_OCCURRENCES: &str = "occurrences";
const CF_ASSERTION_USERS: &str = "assertion_users";

/// Local RocksDB row store.
pub struct RocksOccurrenceStore {
    db: DB,
}

impl RocksOccurrenceStore {
    /// Open the store at `path`, creating it if necessary.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        info!("Opening occurrence store at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_OCCURRENCES, Options::default()),
            ColumnFamilyDescriptor::new(CF_ASSERTION_USERS, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        Ok(Self { db })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::ColumnFamilyNotFound(name.to_string()))
    }

    /// Write a record map (used by loaders and tests).
    pub fn put_record(&self, row_key: &str, map: &RecordMap) -> Result<(), StoreError> {
        let cf = self.cf(CF_OCCURRENCES)?;
        let bytes = serde_json::to_vec(map)?;
        self.db.put_cf(&cf, row_key.as_bytes(), bytes)?;
        Ok(())
    }

    /// Record the user ids behind a row's user assertions.
    pub fn put_assertion_users(
        &self,
        row_key: &str,
        user_ids: &[String],
    ) -> Result<(), StoreError> {
        let cf = self.cf(CF_ASSERTION_USERS)?;
        let bytes = serde_json::to_vec(user_ids)?;
        self.db.put_cf(&cf, row_key.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        for name in [CF_OCCURRENCES, CF_ASSERTION_USERS] {
            if let Some(cf) = self.db.cf_handle(name) {
                self.db.flush_cf(&cf)?;
            }
        }
        Ok(())
    }
}

impl OccurrenceStore for RocksOccurrenceStore {
    fn get(&self, row_key: &str) -> Result<Option<RecordMap>, StoreError> {
        let cf = self.cf(CF_OCCURRENCES)?;
        match self.db.get_cf(&cf, row_key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn page_by_time_range(
        &self,
        since: Option<NaiveDateTime>,
        f: &mut dyn FnMut(&str, &RecordMap) -> bool,
    ) -> Result<u64, StoreError> {
        let cf = self.cf(CF_OCCURRENCES)?;
        let mut visited = 0u64;

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item?;
            let row_key = String::from_utf8_lossy(&key);
            let map: RecordMap = match serde_json::from_slice(&value) {
                Ok(map) => map,
                Err(e) => {
                    debug!(row_key = %row_key, error = %e, "Skipping undecodable row");
                    continue;
                }
            };

            if let Some(since) = since {
                if !modified_at_or_after(&map, since) {
                    continue;
                }
            }

            visited += 1;
            if !f(&row_key, &map) {
                break;
            }
        }
        Ok(visited)
    }

    fn user_ids_for_assertions(&self, row_key: &str) -> Result<Vec<String>, StoreError> {
        let cf = self.cf(CF_ASSERTION_USERS)?;
        match self.db.get_cf(&cf, row_key.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }
}

/// Whether either audit column puts the record at or after the watermark.
/// A record without parseable audit columns is excluded.
pub fn modified_at_or_after(map: &RecordMap, since: NaiveDateTime) -> bool {
    ["alaModified.p", "alaModified"].iter().any(|column| {
        map.get(*column)
            .filter(|v| !v.is_empty())
            .and_then(|v| parse_audit_timestamp(v))
            .map(|ts| ts >= since)
            .unwrap_or(false)
    })
}

/// Audit columns carry `yyyy-MM-dd HH:mm:ss`, ISO `T` date-times or bare
/// dates.
pub fn parse_audit_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches('Z');
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
