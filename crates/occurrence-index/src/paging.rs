//! Streaming and paging helpers over any index backend.
//!
//! Guarantees: result paging visits each matching document at most once
//! under a stable sort; facet paging terminates because the backend
//! respects the page size; streaming reports the total count before the
//! first row. A streaming callback error is fatal to the stream.

use std::io::Write;

use tracing::{debug, info};

use crate::backend::{IndexBackend, PageRequest, SearchHit, SortDirection};
use crate::error::IndexError;

/// Facet buckets fetched per request.
pub const FACET_PAGE_SIZE: usize = 1000;

/// Documents fetched per request when paging results.
pub const INDEX_READ_PAGE_SIZE: usize = 5000;

/// Rows between streaming progress logs.
const STREAM_LOG_INTERVAL: u64 = 10_000;

/// Page every facet bucket of `field` to the callback, advancing the
/// offset by [`FACET_PAGE_SIZE`] until an empty page comes back.
pub fn page_over_facet(
    backend: &dyn IndexBackend,
    field: &str,
    query: &str,
    filters: &[String],
    mut f: impl FnMut(&str, u64),
) -> Result<u64, IndexError> {
    let mut offset = 0;
    let mut buckets = 0u64;
    loop {
        let page = backend.facets(field, query, filters, offset, FACET_PAGE_SIZE)?;
        if page.is_empty() {
            debug!(field, buckets, "Facet paging complete");
            return Ok(buckets);
        }
        for (value, count) in &page {
            f(value, *count);
            buckets += 1;
        }
        offset += FACET_PAGE_SIZE;
    }
}

/// Page matching documents to the callback under a stable sort. The
/// callback returns false to stop early. Returns the rows visited.
#[allow(clippy::too_many_arguments)]
pub fn page_over_index(
    backend: &dyn IndexBackend,
    mut f: impl FnMut(&SearchHit) -> bool,
    fields: &[&str],
    query: &str,
    filters: &[String],
    sort: Option<&str>,
    direction: SortDirection,
    multivalued_fields: &[&str],
) -> Result<u64, IndexError> {
    let mut start = 0usize;
    let mut visited = 0u64;
    loop {
        let request = base_request(fields, query, filters, sort, direction, multivalued_fields)
            .with_window(start, INDEX_READ_PAGE_SIZE);
        let hits = backend.page(&request)?;
        if hits.is_empty() {
            return Ok(visited);
        }
        for hit in &hits {
            visited += 1;
            if !f(hit) {
                return Ok(visited);
            }
        }
        if hits.len() < INDEX_READ_PAGE_SIZE {
            return Ok(visited);
        }
        start += INDEX_READ_PAGE_SIZE;
    }
}

/// Stream the full result set to the callback.
///
/// The total count is resolved (and logged) before the first row so
/// progress is reportable; progress is logged every 10,000 rows. The
/// callback returns `Ok(true)` to continue, `Ok(false)` to stop; an error
/// aborts the stream.
pub fn stream_index(
    backend: &dyn IndexBackend,
    mut f: impl FnMut(&SearchHit) -> Result<bool, IndexError>,
    fields: &[&str],
    query: &str,
    filters: &[String],
    sort: &str,
    multivalued_fields: &[&str],
) -> Result<u64, IndexError> {
    let total = backend.total_count(query, filters)?;
    info!(total, query, "Streaming index");

    let mut start = 0usize;
    let mut rows = 0u64;
    loop {
        let request = base_request(
            fields,
            query,
            filters,
            Some(sort),
            SortDirection::Asc,
            multivalued_fields,
        )
        .with_window(start, INDEX_READ_PAGE_SIZE);
        let hits = backend.page(&request)?;
        if hits.is_empty() {
            break;
        }
        for hit in &hits {
            if !f(hit)? {
                info!(rows, total, "Stream stopped by callback");
                return Ok(rows);
            }
            rows += 1;
            if rows % STREAM_LOG_INTERVAL == 0 {
                info!(rows, total, "Streaming progress");
            }
        }
        if hits.len() < INDEX_READ_PAGE_SIZE {
            break;
        }
        start += INDEX_READ_PAGE_SIZE;
    }
    Ok(rows)
}

/// Write one value of `field` per line for every matching document,
/// paging by 100.
pub fn write_field_to_stream(
    backend: &dyn IndexBackend,
    field: &str,
    query: &str,
    out: &mut dyn Write,
) -> Result<u64, IndexError> {
    let mut start = 0usize;
    let mut written = 0u64;
    loop {
        let request = PageRequest::new(query, &[field])
            .with_sort(field, SortDirection::Asc)
            .with_window(start, 100);
        let hits = backend.page(&request)?;
        if hits.is_empty() {
            return Ok(written);
        }
        for hit in &hits {
            if let Some(value) = hit.get(field) {
                writeln!(out, "{}", value.first())?;
                written += 1;
            }
        }
        if hits.len() < 100 {
            return Ok(written);
        }
        start += 100;
    }
}

fn base_request(
    fields: &[&str],
    query: &str,
    filters: &[String],
    sort: Option<&str>,
    direction: SortDirection,
    multivalued_fields: &[&str],
) -> PageRequest {
    let mut request = PageRequest::new(query, fields)
        .with_filters(&filters.iter().map(String::as_str).collect::<Vec<_>>())
        .with_multivalued(multivalued_fields);
    // a stable default sort keeps paging windows disjoint
    request.sort = Some(sort.unwrap_or("id").to_string());
    request.direction = direction;
    request
}
