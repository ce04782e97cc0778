//! Bulk and incremental indexing drivers.
//!
//! A driver enumerates source-store rows (directly, or via a facet over
//! the index for reprocessing) and hands each `(row_key, map)` pair to the
//! engine. Progress is logged in batches; per-record failures are already
//! absorbed by the engine.

use chrono::NaiveDateTime;
use std::time::Instant;
use tracing::{info, warn};

use occurrence_index::paging::page_over_facet;
use occurrence_store::OccurrenceStore;

use crate::engine::{IndexOptions, Indexer};
use crate::error::PipelineError;

/// Rows between progress logs.
const PROGRESS_INTERVAL: u64 = 10_000;

/// Outcome of a driver run.
#[derive(Debug, Default, Clone)]
pub struct ProcessStats {
    /// Records indexed.
    pub indexed: u64,
    /// Records visited but ineligible or failed.
    pub skipped: u64,
    /// Wall time for the run.
    pub elapsed_ms: u64,
}

impl ProcessStats {
    pub fn total(&self) -> u64 {
        self.indexed + self.skipped
    }
}

/// Index every row in the store.
pub fn bulk_index(
    store: &dyn OccurrenceStore,
    indexer: &mut Indexer,
    opts: &IndexOptions,
) -> Result<ProcessStats, PipelineError> {
    run(store, indexer, opts, None)
}

/// Index rows modified at-or-after the watermark.
pub fn reindex_since(
    store: &dyn OccurrenceStore,
    indexer: &mut Indexer,
    opts: &IndexOptions,
    since: NaiveDateTime,
) -> Result<ProcessStats, PipelineError> {
    let opts = IndexOptions {
        start_date: Some(since),
        ..opts.clone()
    };
    run(store, indexer, &opts, Some(since))
}

fn run(
    store: &dyn OccurrenceStore,
    indexer: &mut Indexer,
    opts: &IndexOptions,
    since: Option<NaiveDateTime>,
) -> Result<ProcessStats, PipelineError> {
    let started = Instant::now();
    let mut stats = ProcessStats::default();

    info!(?since, "Starting index run");
    store.page_by_time_range(since, &mut |row_key, map| {
        if indexer.index_from_map(row_key, map, opts) > 0 {
            stats.indexed += 1;
        } else {
            stats.skipped += 1;
        }
        if stats.total() % PROGRESS_INTERVAL == 0 {
            info!(
                indexed = stats.indexed,
                skipped = stats.skipped,
                "Index run progress"
            );
        }
        true
    })?;

    indexer.flush_csv()?;
    stats.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        indexed = stats.indexed,
        skipped = stats.skipped,
        elapsed_ms = stats.elapsed_ms,
        "Index run complete"
    );
    Ok(stats)
}

/// Reprocess the records matching an index query: facet over `row_key`,
/// fetch each row from the store, and re-run it through the engine.
pub fn reindex_by_query(
    store: &dyn OccurrenceStore,
    indexer: &mut Indexer,
    opts: &IndexOptions,
    query: &str,
) -> Result<ProcessStats, PipelineError> {
    let started = Instant::now();
    let mut stats = ProcessStats::default();
    let backend = indexer.context().service.backend().clone();

    page_over_facet(backend.as_ref(), "row_key", query, &[], |row_key, _count| {
        match store.get(row_key) {
            Ok(Some(map)) => {
                if indexer.index_from_map(row_key, &map, opts) > 0 {
                    stats.indexed += 1;
                } else {
                    stats.skipped += 1;
                }
            }
            Ok(None) => {
                warn!(row_key, "Row in the index but missing from the store");
                stats.skipped += 1;
            }
            Err(e) => {
                warn!(row_key, error = %e, "Store read failed");
                stats.skipped += 1;
            }
        }
    })?;

    indexer.flush_csv()?;
    stats.elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        query,
        indexed = stats.indexed,
        skipped = stats.skipped,
        "Reindex by query complete"
    );
    Ok(stats)
}
