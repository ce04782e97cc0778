//! Shared domain types for the occurrence indexing pipeline.
//!
//! This crate holds the vocabulary every other crate speaks:
//!
//! - [`RecordMap`] / [`RecordView`]: the wide-column occurrence record as the
//!   row store hands it over, with processed-column (`.p`) precedence
//! - [`FieldValue`]: a typed value destined for the search index
//! - [`NameIndex`]: the consumed name-matching lookup and its result types
//! - [`Settings`]: layered configuration (defaults -> file -> env vars)
//! - [`OccurrenceError`]: shared error type for configuration and input

pub mod config;
pub mod error;
pub mod field;
pub mod record;
pub mod taxon;

pub use config::Settings;
pub use error::OccurrenceError;
pub use field::FieldValue;
pub use record::{RecordMap, RecordView};
pub use taxon::{EmptyNameIndex, NameIndex, NameIndexError, NameMatch, TaxonInterval};
