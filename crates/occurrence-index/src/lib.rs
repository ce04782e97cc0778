//! Search-index adapter for the occurrence pipeline.
//!
//! One uniform facade over three deployment modes (embedded, remote
//! endpoint, cluster), plus the pieces every mode shares:
//!
//! - [`IndexSchema`]: field kinds, multi-valuedness, copy-field rules and
//!   dynamic `_s`/`_i`/`_d`/`_dt` suffixes
//! - [`RecycleDoc`] / [`DocPool`]: reusable documents behind a bounded
//!   blocking free-list (the pipeline's backpressure surface)
//! - [`DocBuilder`]: per-worker accumulator with copy-field expansion
//! - [`IndexBackend`]: the mode-agnostic backend trait
//! - [`IndexService`]: the batching and commit protocol
//! - [`paging`]: facet paging, result paging and callback streaming

pub mod backend;
pub mod builder;
pub mod document;
pub mod embedded;
pub mod error;
pub mod paging;
pub mod remote;
pub mod schema;
pub mod service;

pub use backend::{BackendMode, HitValue, IndexBackend, PageRequest, SearchHit, SortDirection};
pub use builder::DocBuilder;
pub use document::{DocPool, RecycleDoc, SearchDocument};
pub use embedded::EmbeddedIndex;
pub use error::IndexError;
pub use remote::{ClusterIndex, RemoteIndex};
pub use schema::{occurrence_schema, FieldKind, IndexSchema, MULTI_VALUED_FIELDS};
pub use service::IndexService;
