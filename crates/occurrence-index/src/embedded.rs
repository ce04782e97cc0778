//! Embedded single-node index backed by tantivy.
//!
//! Declared schema fields become first-class tantivy fields; fields typed
//! only by a dynamic suffix (misc `_s`/`_i`/`_d`/`_dt` properties, sampled
//! layer keys) are carried in one stored catch-all field as JSON and
//! re-expanded when hits are materialized. Re-adding a document id
//! replaces the previous document.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tantivy::collector::{Count, DocSetCollector};
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser};
use tantivy::schema::{Field, Schema as TantivySchema, Value, INDEXED, STORED, STRING, TEXT};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use occurrence_types::FieldValue;

use crate::backend::{HitValue, IndexBackend, PageRequest, SearchHit, SortDirection};
use crate::document::SearchDocument;
use crate::error::IndexError;
use crate::schema::{FieldKind, IndexSchema};

/// Stored catch-all for dynamically typed fields.
const DYNAMICS_FIELD: &str = "__dynamics";

/// Embedded tantivy index.
pub struct EmbeddedIndex {
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    schema: Arc<IndexSchema>,
    fields: HashMap<String, Field>,
    dynamics: Field,
    id_field: Field,
    default_search_fields: Vec<Field>,
}

impl EmbeddedIndex {
    /// Open an existing index or create a new one at `path`.
    pub fn open_or_create(
        path: &Path,
        schema: Arc<IndexSchema>,
        writer_memory_mb: usize,
    ) -> Result<Self, IndexError> {
        let index = if path.join("meta.json").exists() {
            debug!(path = ?path, "Opening existing index");
            Index::open_in_dir(path)?
        } else {
            info!(path = ?path, "Creating new index");
            std::fs::create_dir_all(path)?;
            Index::create_in_dir(path, build_tantivy_schema(&schema))?
        };

        let tantivy_schema = index.schema();
        let mut fields = HashMap::new();
        for def in schema.declared_fields() {
            let field = tantivy_schema.get_field(&def.name).map_err(|_| {
                IndexError::Config(format!("index is missing schema field {}", def.name))
            })?;
            fields.insert(def.name.clone(), field);
        }
        let dynamics = tantivy_schema
            .get_field(DYNAMICS_FIELD)
            .map_err(|_| IndexError::Config("index is missing the dynamics field".to_string()))?;
        let id_field = *fields
            .get("id")
            .ok_or_else(|| IndexError::Config("schema has no id field".to_string()))?;

        let default_search_fields = schema
            .declared_fields()
            .filter(|d| matches!(d.kind, FieldKind::Str | FieldKind::Text))
            .filter_map(|d| fields.get(&d.name).copied())
            .collect();

        let memory_budget = writer_memory_mb.max(10) * 1024 * 1024;
        let writer: IndexWriter = index.writer(memory_budget)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        info!(path = ?path, "Opened embedded index");
        Ok(Self {
            index,
            writer: Mutex::new(writer),
            reader,
            schema,
            fields,
            dynamics,
            id_field,
            default_search_fields,
        })
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, IndexWriter>, IndexError> {
        self.writer
            .lock()
            .map_err(|e| IndexError::Backend(format!("writer lock poisoned: {e}")))
    }

    fn parse_one(&self, query: &str) -> Result<Box<dyn Query>, IndexError> {
        let query = query.trim();
        if query.is_empty() || query == "*:*" || query == "*" {
            return Ok(Box::new(AllQuery));
        }
        let parser = QueryParser::for_index(&self.index, self.default_search_fields.clone());
        Ok(parser.parse_query(query)?)
    }

    fn build_query(
        &self,
        query: &str,
        filters: &[String],
    ) -> Result<Box<dyn Query>, IndexError> {
        if filters.is_empty() {
            return self.parse_one(query);
        }
        let mut clauses: Vec<(Occur, Box<dyn Query>)> =
            vec![(Occur::Must, self.parse_one(query)?)];
        for filter in filters {
            clauses.push((Occur::Must, self.parse_one(filter)?));
        }
        Ok(Box::new(BooleanQuery::new(clauses)))
    }

    fn to_tantivy_doc(&self, doc: &SearchDocument) -> Result<TantivyDocument, IndexError> {
        let mut tdoc = TantivyDocument::new();
        let mut dynamics = serde_json::Map::new();

        for (name, value) in doc.iter() {
            match self.fields.get(name) {
                Some(&field) => match value {
                    FieldValue::Str(s) => tdoc.add_text(field, s),
                    FieldValue::Int(i) => tdoc.add_i64(field, *i),
                    FieldValue::Double(d) => tdoc.add_f64(field, *d),
                    FieldValue::Bool(b) => tdoc.add_bool(field, *b),
                    FieldValue::Date(dt) => tdoc.add_date(
                        field,
                        tantivy::DateTime::from_timestamp_secs(dt.and_utc().timestamp()),
                    ),
                },
                None => append_dynamic(&mut dynamics, name, value),
            }
        }

        if !dynamics.is_empty() {
            tdoc.add_text(
                self.dynamics,
                serde_json::to_string(&serde_json::Value::Object(dynamics))?,
            );
        }
        Ok(tdoc)
    }

    /// Stored string values of one logical field, declared or dynamic.
    fn stored_values(&self, tdoc: &TantivyDocument, name: &str) -> Vec<String> {
        if let Some(&field) = self.fields.get(name) {
            return tdoc
                .get_all(field)
                .filter_map(value_to_string)
                .collect();
        }
        // dynamic field: look inside the stored catch-all
        let Some(json) = tdoc
            .get_first(self.dynamics)
            .and_then(|v| v.as_str())
        else {
            return Vec::new();
        };
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(serde_json::Value::Object(map)) => match map.get(name) {
                Some(serde_json::Value::Array(items)) => {
                    items.iter().filter_map(json_scalar_to_string).collect()
                }
                Some(other) => json_scalar_to_string(other).into_iter().collect(),
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn materialize(
        &self,
        tdoc: &TantivyDocument,
        request: &PageRequest,
        field_names: &[String],
    ) -> SearchHit {
        let mut hit = SearchHit::new();
        for name in field_names {
            let values = self.stored_values(tdoc, name);
            if values.is_empty() {
                continue;
            }
            let value = if request.multivalued_fields.contains(name) {
                HitValue::Many(values)
            } else {
                HitValue::One(values.into_iter().next().unwrap_or_default())
            };
            hit.insert(name.clone(), value);
        }
        hit
    }

    /// Matching documents materialized and sorted; shared by `page` and
    /// `facets`.
    fn collect_sorted(
        &self,
        request: &PageRequest,
    ) -> Result<Vec<(String, TantivyDocument)>, IndexError> {
        let query = self.build_query(&request.query, &request.filters)?;
        let searcher = self.reader.searcher();
        let addresses = searcher.search(&query, &DocSetCollector)?;

        let sort_field = request.sort.as_deref().unwrap_or("id");
        let mut rows: Vec<(String, TantivyDocument)> = Vec::with_capacity(addresses.len());
        for address in addresses {
            let tdoc: TantivyDocument = searcher.doc(address)?;
            let key = self
                .stored_values(&tdoc, sort_field)
                .into_iter()
                .next()
                .unwrap_or_default();
            rows.push((key, tdoc));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        if request.direction == SortDirection::Desc {
            rows.reverse();
        }
        Ok(rows)
    }
}

impl IndexBackend for EmbeddedIndex {
    fn add_docs(&self, docs: &[SearchDocument]) -> Result<(), IndexError> {
        let writer = self.lock_writer()?;
        for doc in docs {
            if let Some(id) = doc.id() {
                writer.delete_term(Term::from_field_text(self.id_field, id));
            }
            let tdoc = self.to_tantivy_doc(doc)?;
            writer.add_document(tdoc)?;
        }
        debug!(count = docs.len(), "Added documents");
        Ok(())
    }

    fn commit(&self, hard: bool) -> Result<(), IndexError> {
        {
            let mut writer = self.lock_writer()?;
            let opstamp = writer.commit()?;
            if hard {
                info!(opstamp, "Hard commit");
            } else {
                debug!(opstamp, "Soft commit");
            }
        }
        self.reader.reload()?;
        Ok(())
    }

    fn delete_by_query(&self, query: &str) -> Result<(), IndexError> {
        if query.trim() == "*:*" {
            let mut writer = self.lock_writer()?;
            writer.delete_all_documents()?;
            writer.commit()?;
            drop(writer);
            self.reader.reload()?;
            info!("Emptied index");
            return Ok(());
        }

        // resolve the matching ids, then delete by id term
        let request = PageRequest::new(query, &["id"]).with_window(0, usize::MAX);
        let rows = self.collect_sorted(&request)?;
        let writer = self.lock_writer()?;
        let mut deleted = 0u64;
        for (_, tdoc) in rows {
            if let Some(id) = tdoc.get_first(self.id_field).and_then(|v| v.as_str()) {
                writer.delete_term(Term::from_field_text(self.id_field, id));
                deleted += 1;
            }
        }
        debug!(query, deleted, "Deleted by query");
        Ok(())
    }

    fn optimize(&self) -> Result<(), IndexError> {
        // segment merging is handled by the writer's merge policy; an
        // explicit optimize just forces a commit point
        self.commit(true)?;
        info!("Optimize requested; merges run under the writer policy");
        Ok(())
    }

    fn reload(&self) -> Result<(), IndexError> {
        self.reader.reload()?;
        debug!("Reloaded reader");
        Ok(())
    }

    fn shutdown(&self) -> Result<(), IndexError> {
        let mut writer = self.lock_writer()?;
        writer.commit()?;
        info!("Embedded index shut down");
        Ok(())
    }

    fn total_count(&self, query: &str, filters: &[String]) -> Result<u64, IndexError> {
        let query = self.build_query(query, filters)?;
        let searcher = self.reader.searcher();
        Ok(searcher.search(&query, &Count)? as u64)
    }

    fn facets(
        &self,
        field: &str,
        query: &str,
        filters: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, IndexError> {
        let request = PageRequest::new(query, &[field])
            .with_filters(&filters.iter().map(String::as_str).collect::<Vec<_>>())
            .with_window(0, usize::MAX);
        let rows = self.collect_sorted(&request)?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for (_, tdoc) in &rows {
            for value in self.stored_values(tdoc, field) {
                *counts.entry(value).or_insert(0) += 1;
            }
        }
        let mut buckets: Vec<(String, u64)> = counts.into_iter().collect();
        buckets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(buckets.into_iter().skip(offset).take(limit).collect())
    }

    fn page(&self, request: &PageRequest) -> Result<Vec<SearchHit>, IndexError> {
        let field_names: Vec<String> = if request.fields.is_empty() {
            self.schema
                .declared_fields()
                .map(|d| d.name.clone())
                .collect()
        } else {
            request.fields.clone()
        };

        let rows = self.collect_sorted(request)?;
        Ok(rows
            .iter()
            .skip(request.start)
            .take(request.rows)
            .map(|(_, tdoc)| self.materialize(tdoc, request, &field_names))
            .collect())
    }
}

fn build_tantivy_schema(schema: &IndexSchema) -> TantivySchema {
    let mut builder = TantivySchema::builder();
    for def in schema.declared_fields() {
        match def.kind {
            FieldKind::Str => {
                builder.add_text_field(&def.name, STRING | STORED);
            }
            FieldKind::Text => {
                builder.add_text_field(&def.name, TEXT | STORED);
            }
            FieldKind::Int => {
                builder.add_i64_field(&def.name, INDEXED | STORED);
            }
            FieldKind::Double => {
                builder.add_f64_field(&def.name, INDEXED | STORED);
            }
            FieldKind::Date => {
                builder.add_date_field(&def.name, INDEXED | STORED);
            }
            FieldKind::Bool => {
                builder.add_bool_field(&def.name, INDEXED | STORED);
            }
        }
    }
    builder.add_text_field(DYNAMICS_FIELD, STORED);
    builder.build()
}

fn append_dynamic(
    dynamics: &mut serde_json::Map<String, serde_json::Value>,
    name: &str,
    value: &FieldValue,
) {
    let json = value.as_json();
    match dynamics.get_mut(name) {
        Some(serde_json::Value::Array(items)) => items.push(json),
        Some(existing) => {
            let first = existing.take();
            *existing = serde_json::Value::Array(vec![first, json]);
        }
        None => {
            dynamics.insert(name.to_string(), json);
        }
    }
}

fn value_to_string<'a, V: Value<'a>>(value: V) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    if let Some(i) = value.as_i64() {
        return Some(i.to_string());
    }
    if let Some(f) = value.as_f64() {
        return Some(f.to_string());
    }
    if let Some(b) = value.as_bool() {
        return Some(b.to_string());
    }
    if let Some(d) = value.as_datetime() {
        let dt = chrono::DateTime::from_timestamp(d.into_timestamp_secs(), 0)?;
        return Some(dt.naive_utc().format("%Y-%m-%dT%H:%M:%SZ").to_string());
    }
    warn!("Unsupported stored value type");
    None
}

fn json_scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
