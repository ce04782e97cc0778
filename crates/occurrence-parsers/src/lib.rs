//! Value parsers on the per-record indexing path.
//!
//! Everything here is total: malformed input yields `None` (or an early
//! scan stop), never an error or a panic. Per-record parse failures are a
//! log-and-skip concern for the indexing engine, not for the parsers.

pub mod date;
pub mod event_date;
pub mod grid;
pub mod json_scan;

pub use date::{parse_date, parse_date_bounded};
pub use event_date::EventDate;
pub use grid::{grid_ref_as_resolutions, parse_bbox};
pub use json_scan::{scan_assertion_array, scan_object, AssertionEntry};
