//! Schema-aware document builder.
//!
//! Usage, per document:
//!
//! ```text
//! builder.new_doc(row_key)?;
//! for each field and value {
//!     builder.add_field(name, value);
//! }
//! builder.index(commit)?;   // or builder.release()
//! ```
//!
//! After `new_doc`, exactly one of `index` or `release` must follow; a
//! violation is logged and the stray document is recycled, never leaked.
//! The builder is not safe for concurrent use: one builder per producer,
//! all feeding the shared [`IndexService`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{error, warn};

use occurrence_types::FieldValue;

use crate::document::RecycleDoc;
use crate::error::IndexError;
use crate::schema::{CopyRule, FieldKind};
use crate::service::IndexService;

/// Memoized schema lookup for one field name.
struct CachedLookup {
    kind: Option<FieldKind>,
    /// Copy rules with the destination's kind resolved alongside.
    copy_rules: Vec<(CopyRule, Option<FieldKind>)>,
}

/// Reusable per-document accumulator with copy-field expansion.
pub struct DocBuilder {
    service: Arc<IndexService>,
    current: Option<RecycleDoc>,
    current_id: String,
    lookups: HashMap<String, CachedLookup>,
}

impl DocBuilder {
    pub(crate) fn new(service: Arc<IndexService>) -> Self {
        Self {
            service,
            current: None,
            current_id: String::new(),
            lookups: HashMap::new(),
        }
    }

    /// The id of the document under construction (diagnostics).
    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    /// Start a new document, blocking until a pooled document is free.
    ///
    /// A previous document that was neither indexed nor released is logged
    /// and recycled.
    pub fn new_doc(&mut self, id: &str) -> Result<(), IndexError> {
        if let Some(stray) = self.current.take() {
            warn!(
                id = %self.current_id,
                "Document was not indexed or released before new_doc, discarding"
            );
            self.service.pool().release(stray);
        }
        let mut doc = self.service.pool().acquire()?;
        doc.reset();
        self.current = Some(doc);
        self.current_id = id.to_string();
        Ok(())
    }

    /// Add a raw value to the current document.
    ///
    /// Empty values are a no-op. The schema field and its copy rules are
    /// looked up once per field name and memoized. Unknown fields are
    /// logged but do not fail the document.
    pub fn add_field(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        let Some(doc) = self.current.as_mut() else {
            error!(field, "add_field called without new_doc");
            return;
        };

        let lookup = self.lookups.entry(field.to_string()).or_insert_with(|| {
            let schema = self.service.schema();
            CachedLookup {
                kind: schema.resolve_kind(field),
                copy_rules: schema
                    .copy_rules(field)
                    .iter()
                    .map(|rule| (rule.clone(), schema.resolve_kind(&rule.dest)))
                    .collect(),
            }
        });

        let mut used = false;
        let mut reused = false;

        if let Some(kind) = lookup.kind {
            match convert(kind, value) {
                Some(typed) => {
                    reused = doc.set_field(field, typed.clone());
                    if !reused {
                        doc.add_value(field, typed);
                    }
                    used = true;
                }
                None => {
                    used = true;
                    error!(
                        id = %self.current_id,
                        field,
                        value,
                        "Value does not convert to the field's kind, skipping"
                    );
                }
            }
        }

        for (rule, dest_kind) in &lookup.copy_rules {
            used = true;
            let copied = match rule.max_chars {
                Some(max) => truncate_chars(value, max),
                None => value,
            };
            let Some(kind) = dest_kind else {
                error!(
                    id = %self.current_id,
                    dest = %rule.dest,
                    "Copy-field destination is not in the schema"
                );
                continue;
            };
            match convert(*kind, copied) {
                Some(typed) => {
                    if !doc.set_field(&rule.dest, typed.clone()) {
                        doc.add_value(&rule.dest, typed);
                    }
                }
                None => error!(
                    id = %self.current_id,
                    dest = %rule.dest,
                    value = copied,
                    "Copy value does not convert, skipping destination"
                ),
            }
        }

        if !used && !reused {
            error!(id = %self.current_id, field, "Unknown field");
        }
    }

    /// Add an already-typed value, bypassing conversion but still fanning
    /// out to copy fields for string values.
    pub fn add_value(&mut self, field: &str, value: FieldValue) {
        match &value {
            FieldValue::Str(s) => {
                // reuse the string path so copy rules apply
                let owned = s.clone();
                self.add_field(field, &owned);
            }
            _ => {
                let Some(doc) = self.current.as_mut() else {
                    error!(field, "add_value called without new_doc");
                    return;
                };
                if !doc.set_field(field, value.clone()) {
                    doc.add_value(field, value);
                }
            }
        }
    }

    /// Publish the current document to the batching service.
    ///
    /// `commit = true` requests a flush and hard commit at this point.
    /// Calling without a current document is a logged error, not a panic.
    pub fn index(&mut self, commit: bool) -> Result<(), IndexError> {
        match self.current.take() {
            Some(doc) => self.service.add_doc(doc, commit),
            None => {
                error!(
                    id = %self.current_id,
                    "index() called before new_doc or after release, document not indexed"
                );
                Ok(())
            }
        }
    }

    /// Discard the current document, returning it to the pool.
    pub fn release(&mut self) {
        if let Some(doc) = self.current.take() {
            self.service.pool().release(doc);
        }
    }

    /// Whether a document is currently under construction.
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }
}

fn convert(kind: FieldKind, raw: &str) -> Option<FieldValue> {
    match kind {
        FieldKind::Str | FieldKind::Text => Some(FieldValue::Str(raw.to_string())),
        FieldKind::Int => raw.parse::<i64>().ok().map(FieldValue::Int),
        FieldKind::Double => raw.parse::<f64>().ok().map(FieldValue::Double),
        FieldKind::Bool => match raw {
            "true" | "TRUE" | "True" => Some(FieldValue::Bool(true)),
            "false" | "FALSE" | "False" => Some(FieldValue::Bool(false)),
            _ => None,
        },
        FieldKind::Date => parse_index_date(raw).map(FieldValue::Date),
    }
}

/// Accepts the date shapes the pipeline writes: ISO date-time with or
/// without `Z`, space-separated date-time, or a bare date.
fn parse_index_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim_end_matches('Z');
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn truncate_chars(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}
