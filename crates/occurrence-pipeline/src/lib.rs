//! The occurrence indexing engine.
//!
//! Transforms a raw per-record key/value map plus auxiliary lookups into a
//! search document and drives it through the batching index service:
//!
//! - [`IndexingContext`]: everything the engine consults, built once at
//!   startup and passed down (no process-wide singletons)
//! - [`Indexer::index_from_map`]: the per-record transformation
//! - [`DocWorkerPool`]: bounded-queue workers for bulk loads
//! - [`CsvEmitter`]: optional tab-separated emission alongside the index
//! - [`driver`]: bulk and incremental enumeration of the row store

pub mod context;
pub mod csv_out;
pub mod driver;
pub mod engine;
pub mod error;
pub mod header;
pub mod workers;

pub use context::IndexingContext;
pub use csv_out::CsvEmitter;
pub use driver::{bulk_index, reindex_by_query, reindex_since, ProcessStats};
pub use engine::{IndexOptions, Indexer};
pub use error::PipelineError;
pub use header::{canonical_values, occurrence_header, HeaderField};
pub use workers::DocWorkerPool;
