//! The per-record indexing engine.
//!
//! `index_from_map` decides whether a record is indexed, walks it, invokes
//! the parsers and caches, drives the document builder and honors the
//! batch/commit protocol. It never propagates an error to the caller: a
//! failed record releases the builder, logs and returns 0 elapsed nanos.
//! The one fatal condition is schema drift between the canonical header
//! and its materialized values, which aborts the process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use tracing::{error, warn};

use occurrence_index::{DocBuilder, MULTI_VALUED_FIELDS};
use occurrence_parsers::{
    grid_ref_as_resolutions, parse_bbox, parse_date, scan_assertion_array, scan_object,
};
use occurrence_store::rocks::modified_at_or_after;
use occurrence_types::{FieldValue, RecordMap, RecordView};
use occurrence_vocab::{AssertionCategory, AssertionCodes};

use crate::context::IndexingContext;
use crate::csv_out::CsvEmitter;
use crate::error::PipelineError;
use crate::header::canonical_values;

/// Query-assertion types that make a record unsuitable for modelling.
const UNSUITABLE_ASSERTION_TYPES: &[&str] = &["invalid", "historic", "vagrant", "irruptive"];

/// Per-call options for [`Indexer::index_from_map`].
#[derive(Debug, Clone, Default)]
pub struct IndexOptions {
    /// Buffer into the service batch (true) or flush after every document.
    pub batch: bool,
    /// Reindex watermark: only records modified at-or-after are indexed.
    pub start_date: Option<NaiveDateTime>,
    /// Force a flush and hard commit at this record.
    pub commit: bool,
    /// Misc properties to index, typed by suffix, `_s` appended when no
    /// typed suffix applies.
    pub misc_index_properties: Vec<String>,
    /// User-supplied misc properties, suffix kept verbatim.
    pub user_provided_type_misc_properties: Vec<String>,
    /// Misc properties indexed verbatim under their own names.
    pub additional_fields_to_index: Vec<String>,
    /// Build but release instead of publishing.
    pub test: bool,
    /// Emitted as `batch_id_s` when non-empty.
    pub batch_id: String,
}

impl IndexOptions {
    pub fn batched() -> Self {
        Self {
            batch: true,
            ..Default::default()
        }
    }
}

/// One indexing worker: owns its builder and optional CSV emitters, shares
/// the context with every other worker.
pub struct Indexer {
    ctx: Arc<IndexingContext>,
    builder: DocBuilder,
    csv: Option<CsvEmitter>,
    csv_sensitive: Option<CsvEmitter>,
    csv_row: HashMap<String, Vec<String>>,
}

impl Indexer {
    pub fn new(ctx: Arc<IndexingContext>) -> Self {
        let builder = ctx.service.builder();
        Self {
            ctx,
            builder,
            csv: None,
            csv_sensitive: None,
            csv_row: HashMap::new(),
        }
    }

    pub fn with_csv(mut self, emitter: CsvEmitter) -> Self {
        self.csv = Some(emitter);
        self
    }

    pub fn with_sensitive_csv(mut self, emitter: CsvEmitter) -> Self {
        self.csv_sensitive = Some(emitter);
        self
    }

    pub fn context(&self) -> &Arc<IndexingContext> {
        &self.ctx
    }

    /// Flush any CSV emitters (end of a run).
    pub fn flush_csv(&mut self) -> Result<(), PipelineError> {
        if let Some(csv) = self.csv.as_mut() {
            csv.flush()?;
        }
        if let Some(csv) = self.csv_sensitive.as_mut() {
            csv.flush()?;
        }
        Ok(())
    }

    /// Transform one record into an index document.
    ///
    /// Returns the elapsed nanoseconds, or 0 when the record was
    /// ineligible or failed. Errors never escape.
    pub fn index_from_map(
        &mut self,
        row_key: &str,
        map: &RecordMap,
        opts: &IndexOptions,
    ) -> u64 {
        let started = Instant::now();
        let view = RecordView::new(map);

        if view.is_deleted() || map.len() <= 1 {
            return 0;
        }
        if let Some(watermark) = opts.start_date {
            if !modified_at_or_after(map, watermark) {
                return 0;
            }
        }

        self.csv_row.clear();
        if let Err(e) = self.build_document(row_key, &view, opts) {
            error!(row_key, error = %e, "Failed to build document, releasing");
            self.builder.release();
            return 0;
        }
        self.append_csv(row_key);

        let outcome = if opts.test {
            self.builder.release();
            Ok(())
        } else {
            self.builder.index(opts.commit)
        };
        if let Err(e) = outcome {
            error!(row_key, error = %e, "Failed to publish document");
            return 0;
        }

        if !opts.batch && !opts.test {
            if let Err(e) = self.ctx.service.flush() {
                error!(row_key, error = %e, "Failed to flush unbatched document");
            }
        }
        started.elapsed().as_nanos() as u64
    }

    fn build_document(
        &mut self,
        row_key: &str,
        view: &RecordView<'_>,
        opts: &IndexOptions,
    ) -> Result<(), PipelineError> {
        let header = self.ctx.header;
        let values = canonical_values(view, header);
        if values.len() != header.len() {
            // schema drift between header contract and materialization is
            // unrecoverable: every document after this one would be wrong
            error!(
                expected = header.len(),
                actual = values.len(),
                "Canonical header and value count diverged, aborting process"
            );
            std::process::exit(1);
        }

        self.builder.new_doc(row_key)?;
        self.emit_str("id", row_key);
        self.emit_str("row_key", row_key);
        if let Some(raw_name) = view.raw("scientificName") {
            self.emit_str("raw_taxon_name", raw_name);
        }

        // canonical header values, multi-valued fields pipe-split
        for (field, value) in header.iter().zip(&values) {
            if value.is_empty() {
                continue;
            }
            if MULTI_VALUED_FIELDS.contains(&field.index_name) {
                for part in value.split('|').filter(|p| !p.is_empty()) {
                    self.emit_str(field.index_name, part);
                }
            } else {
                self.emit_str(field.index_name, value);
            }
        }

        self.expand_misc_properties(view, opts);
        self.expand_assertions(view);
        self.expand_species_lists(view);
        if self.ctx.settings.grid_ref_indexing_enabled {
            self.expand_grid_references(view);
        }
        self.expand_user_assertions(row_key, view);
        self.expand_query_assertions(view);
        self.expand_layers(view);
        self.expand_species_groups(view);

        if !opts.batch_id.is_empty() {
            self.emit_str("batch_id_s", &opts.batch_id);
        }
        Ok(())
    }

    /// Misc-property expansion, typed by suffix.
    fn expand_misc_properties(&mut self, view: &RecordView<'_>, opts: &IndexOptions) {
        let Some(json) = view.raw("miscProperties") else {
            return;
        };
        let user = &opts.user_provided_type_misc_properties;
        let misc = &opts.misc_index_properties;
        let additional = &opts.additional_fields_to_index;

        scan_object(json, |key, value| {
            if value.is_empty() {
                return;
            }
            if user.iter().any(|f| f == key) {
                self.emit_misc(key, value, true);
            } else if misc.iter().any(|f| f == key) {
                self.emit_misc(key, value, false);
            } else if additional.iter().any(|f| f == key) {
                self.emit_str(key, value);
            }
        });
    }

    fn emit_misc(&mut self, name: &str, value: &str, keep_verbatim: bool) {
        if name.ends_with("_i") {
            match value.parse::<i64>() {
                Ok(v) => self.emit_value(name, FieldValue::Int(v)),
                Err(_) => warn!(name, value, "Misc int property does not parse, skipping"),
            }
        } else if name.ends_with("_d") {
            match value.parse::<f64>() {
                Ok(v) => self.emit_value(name, FieldValue::Double(v)),
                Err(_) => warn!(name, value, "Misc double property does not parse, skipping"),
            }
        } else if name.ends_with("_dt") {
            match parse_date(value).and_then(|ed| ed.parsed_start_date) {
                Some(dt) => self.emit_value(name, FieldValue::Date(dt)),
                None => warn!(name, value, "Misc date property does not parse, skipping"),
            }
        } else if name.ends_with("_s") || keep_verbatim {
            self.emit_str(name, value);
        } else {
            let suffixed = format!("{name}_s");
            self.emit_str(&suffixed, value);
        }
    }

    /// Assertion expansion: passed/failed/missing from the record, then
    /// the unchecked closure over the full enumeration.
    fn expand_assertions(&mut self, view: &RecordView<'_>) {
        let mut seen: HashSet<i32> = HashSet::new();
        let mut failed_any = false;

        if let Some(json) = view.raw("qualityAssertions") {
            scan_assertion_array(json, |entry| {
                seen.insert(entry.code);
                let (name, category) = match AssertionCodes::get_by_code(entry.code) {
                    Some(code) => (code.name.to_string(), Some(code.category)),
                    None => (entry.name.clone(), None),
                };
                if name.is_empty() {
                    return;
                }
                if entry.qa_status == 1 {
                    self.emit_str("assertions_passed", &name);
                } else {
                    failed_any = true;
                    if category == Some(AssertionCategory::Missing) {
                        self.emit_str("assertions_missing", &name);
                    } else {
                        self.emit_str("assertions", &name);
                    }
                }
            });
        }

        for code in AssertionCodes::unchecked_codes(&seen) {
            self.emit_str("assertions_unchecked", code.name);
        }
        self.emit_value("system_assertions", FieldValue::Bool(failed_any));
    }

    fn expand_species_lists(&mut self, view: &RecordView<'_>) {
        let Some(lsid) = view.processed("taxonConceptID") else {
            return;
        };
        let uids = self.ctx.species_lists.list_uids(lsid);
        for uid in uids.iter() {
            self.emit_str("species_list_uid", uid);
        }

        if let Some(guid) = trailing_numeric_id(lsid) {
            if !self.ctx.checklist.is_empty() {
                let in_checklist = self.ctx.checklist.contains(guid);
                self.emit_value("taxon_in_checklist", FieldValue::Bool(in_checklist));
            }
        }
    }

    fn expand_grid_references(&mut self, view: &RecordView<'_>) {
        if let Some(bbox) = view.processed("bbox") {
            if let Some((min_lat, min_lng, max_lat, max_lng)) = parse_bbox(bbox) {
                self.emit_value("min_latitude", FieldValue::Double(min_lat));
                self.emit_value("min_longitude", FieldValue::Double(min_lng));
                self.emit_value("max_latitude", FieldValue::Double(max_lat));
                self.emit_value("max_longitude", FieldValue::Double(max_lng));
            }
        }
        if let Some(easting) = view.value("easting").and_then(|v| v.parse::<i64>().ok()) {
            self.emit_value("easting", FieldValue::Int(easting));
        }
        if let Some(northing) = view.value("northing").and_then(|v| v.parse::<i64>().ok()) {
            self.emit_value("northing", FieldValue::Int(northing));
        }
        if let Some(grid_ref) = view.value("gridReference") {
            self.emit_str("grid_ref", grid_ref);
            for (field, value) in grid_ref_as_resolutions(grid_ref) {
                self.emit_str(&field, &value);
            }
        }
    }

    fn expand_user_assertions(&mut self, row_key: &str, view: &RecordView<'_>) {
        if view.raw("userQualityAssertion").is_none() {
            return;
        }
        match self.ctx.store.user_ids_for_assertions(row_key) {
            Ok(user_ids) => {
                for user_id in &user_ids {
                    self.emit_str("assertion_user_id", user_id);
                }
            }
            Err(e) => warn!(row_key, error = %e, "User assertion lookup failed"),
        }
    }

    fn expand_query_assertions(&mut self, view: &RecordView<'_>) {
        let Some(json) = view.raw("queryAssertion") else {
            return;
        };
        let mut suitable = true;
        scan_object(json, |uuid, assertion_type| {
            self.emit_str("query_assertion_uuid", uuid);
            self.emit_str("query_assertion_type_s", assertion_type);
            if UNSUITABLE_ASSERTION_TYPES
                .contains(&assertion_type.to_ascii_lowercase().as_str())
            {
                suitable = false;
            }
        });
        self.emit_value("suitable_modelling", FieldValue::Bool(suitable));
    }

    /// Sampled environmental (`el.p`) and contextual (`cl.p`) layers,
    /// emitted verbatim under their layer keys.
    fn expand_layers(&mut self, view: &RecordView<'_>) {
        for column in ["el", "cl"] {
            if let Some(json) = view.processed(column) {
                scan_object(json, |key, value| self.emit_str(key, value));
            }
        }
    }

    fn expand_species_groups(&mut self, view: &RecordView<'_>) {
        let (Some(left), Some(_right)) = (view.processed("left"), view.processed("right"))
        else {
            return;
        };
        let Ok(lft) = left.parse::<i32>() else {
            warn!(left, "Unparseable left value, skipping species groups");
            return;
        };

        let groups: Vec<String> = self
            .ctx
            .species_groups
            .groups_for(lft)
            .iter()
            .map(|s| s.to_string())
            .collect();
        for group in &groups {
            self.emit_str("species_group", group);
        }
        let subgroups: Vec<String> = self
            .ctx
            .species_groups
            .subgroups_for(lft)
            .iter()
            .map(|s| s.to_string())
            .collect();
        for subgroup in &subgroups {
            self.emit_str("species_subgroup", subgroup);
        }
    }

    fn emit_str(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        self.builder.add_field(field, value);
        self.record_csv(field, value.to_string());
    }

    fn emit_value(&mut self, field: &str, value: FieldValue) {
        let wire = value.to_wire_string();
        self.builder.add_value(field, value);
        self.record_csv(field, wire);
    }

    fn record_csv(&mut self, field: &str, value: String) {
        if self.csv.is_some() || self.csv_sensitive.is_some() {
            self.csv_row.entry(field.to_string()).or_default().push(value);
        }
    }

    fn append_csv(&mut self, row_key: &str) {
        if self.csv.is_none() && self.csv_sensitive.is_none() {
            return;
        }
        let row = std::mem::take(&mut self.csv_row);
        if let Some(csv) = self.csv.as_mut() {
            if let Err(e) = csv.append(&row) {
                warn!(row_key, error = %e, "CSV append failed");
            }
        }
        if let Some(csv) = self.csv_sensitive.as_mut() {
            if let Err(e) = csv.append(&row) {
                warn!(row_key, error = %e, "Sensitive CSV append failed");
            }
        }
    }
}

/// Trailing integer of an LSID (`urn:lsid:...:12345` -> 12345).
fn trailing_numeric_id(lsid: &str) -> Option<i64> {
    lsid.rsplit(&[':', '/'][..]).next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use occurrence_index::{
        occurrence_schema, IndexBackend, IndexError, IndexService, PageRequest, SearchDocument,
        SearchHit,
    };
    use occurrence_store::{OccurrenceStore, StoreError};
    use occurrence_types::{Settings, TaxonInterval};
    use occurrence_vocab::{
        ChecklistCache, SpeciesGroup, SpeciesGroups, SpeciesListDao, SpeciesListSource, Subgroup,
        VocabError,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CaptureBackend {
        docs: Mutex<Vec<SearchDocument>>,
        hard_commits: Mutex<usize>,
    }

    impl CaptureBackend {
        fn last_doc(&self) -> SearchDocument {
            self.docs.lock().unwrap().last().cloned().expect("no docs captured")
        }

        fn values(doc: &SearchDocument, field: &str) -> Vec<String> {
            doc.values_of(field)
                .into_iter()
                .map(|v| v.to_wire_string())
                .collect()
        }
    }

    impl IndexBackend for CaptureBackend {
        fn add_docs(&self, docs: &[SearchDocument]) -> Result<(), IndexError> {
            self.docs.lock().unwrap().extend_from_slice(docs);
            Ok(())
        }
        fn commit(&self, hard: bool) -> Result<(), IndexError> {
            if hard {
                *self.hard_commits.lock().unwrap() += 1;
            }
            Ok(())
        }
        fn delete_by_query(&self, _query: &str) -> Result<(), IndexError> {
            Ok(())
        }
        fn optimize(&self) -> Result<(), IndexError> {
            Ok(())
        }
        fn reload(&self) -> Result<(), IndexError> {
            Ok(())
        }
        fn shutdown(&self) -> Result<(), IndexError> {
            Ok(())
        }
        fn total_count(&self, _q: &str, _f: &[String]) -> Result<u64, IndexError> {
            Ok(self.docs.lock().unwrap().len() as u64)
        }
        fn facets(
            &self,
            _field: &str,
            _q: &str,
            _f: &[String],
            _offset: usize,
            _limit: usize,
        ) -> Result<Vec<(String, u64)>, IndexError> {
            Ok(Vec::new())
        }
        fn page(&self, _request: &PageRequest) -> Result<Vec<SearchHit>, IndexError> {
            Ok(Vec::new())
        }
    }

    struct TestStore;

    impl OccurrenceStore for TestStore {
        fn get(&self, _row_key: &str) -> Result<Option<RecordMap>, StoreError> {
            Ok(None)
        }
        fn page_by_time_range(
            &self,
            _since: Option<NaiveDateTime>,
            _f: &mut dyn FnMut(&str, &RecordMap) -> bool,
        ) -> Result<u64, StoreError> {
            Ok(0)
        }
        fn user_ids_for_assertions(&self, row_key: &str) -> Result<Vec<String>, StoreError> {
            if row_key == "row-ua" {
                Ok(vec!["u100".to_string(), "u200".to_string()])
            } else {
                Ok(Vec::new())
            }
        }
    }

    struct FixedLists;

    impl SpeciesListSource for FixedLists {
        fn lists_for_taxon(&self, lsid: &str) -> Result<Vec<String>, VocabError> {
            if lsid == "urn:lsid:taxon:250" {
                Ok(vec!["dr1".to_string(), "dr2".to_string()])
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn test_group(name: &str, left: i32, right: i32) -> SpeciesGroup {
        SpeciesGroup {
            name: name.to_string(),
            rank: "class".to_string(),
            included_taxa: vec![],
            excluded_taxa: vec![],
            included_intervals: vec![TaxonInterval::new(left, right)],
            excluded_intervals: vec![],
            parent: None,
        }
    }

    fn setup(grid: bool) -> (Arc<IndexingContext>, Arc<CaptureBackend>) {
        let backend = Arc::new(CaptureBackend::default());
        let service = IndexService::new(
            backend.clone(),
            Arc::new(occurrence_schema()),
            1, // flush every document so tests can observe them
            1000,
            1,
        );
        let mut settings = Settings::default();
        settings.index.index_url = "./unused".to_string();
        settings.grid_ref_indexing_enabled = grid;

        let groups = SpeciesGroups::from_parts(
            vec![
                test_group("Animals", 1, 1000),
                test_group("Birds", 200, 299),
            ],
            vec![Subgroup {
                label: "Parrots".to_string(),
                intervals: vec![TaxonInterval::new(240, 260)],
            }],
        );
        let ctx = IndexingContext::from_parts(
            settings,
            service,
            Arc::new(TestStore),
            groups,
            SpeciesListDao::new(Box::new(FixedLists)),
            ChecklistCache::empty(),
        );
        (Arc::new(ctx), backend)
    }

    fn base_record() -> RecordMap {
        let mut map = RecordMap::new();
        map.insert("occurrenceID".into(), "occ-1".into());
        map.insert("scientificName".into(), "Macropus rufus".into());
        map.insert("scientificName.p".into(), "Osphranter rufus".into());
        map.insert("stateProvince.p".into(), "New South Wales".into());
        map.insert("decimalLatitude.p".into(), "-33.87".into());
        map.insert("eventDate.p".into(), "2007-03-01".into());
        map
    }

    #[test]
    fn test_deleted_and_tiny_records_are_ineligible() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let mut deleted = base_record();
        deleted.insert("deleted".into(), "2024-01-01".into());
        assert_eq!(
            indexer.index_from_map("r1", &deleted, &IndexOptions::batched()),
            0
        );

        let mut tiny = RecordMap::new();
        tiny.insert("occurrenceID".into(), "x".into());
        assert_eq!(indexer.index_from_map("r2", &tiny, &IndexOptions::batched()), 0);

        assert!(backend.docs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_watermark_gates_reindex() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let watermark = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let opts = IndexOptions {
            batch: true,
            start_date: Some(watermark),
            ..Default::default()
        };

        let mut stale = base_record();
        stale.insert("alaModified.p".into(), "2020-06-01 00:00:00".into());
        assert_eq!(indexer.index_from_map("r1", &stale, &opts), 0);

        let mut fresh = base_record();
        fresh.insert("alaModified.p".into(), "2024-06-01 00:00:00".into());
        assert!(indexer.index_from_map("r2", &fresh, &opts) > 0);

        assert_eq!(backend.docs.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_canonical_fields_and_processed_precedence() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let nanos = indexer.index_from_map("r1", &base_record(), &IndexOptions::batched());
        assert!(nanos > 0);

        let doc = backend.last_doc();
        assert_eq!(doc.id(), Some("r1"));
        assert_eq!(
            CaptureBackend::values(&doc, "taxon_name"),
            vec!["Osphranter rufus"]
        );
        assert_eq!(
            CaptureBackend::values(&doc, "raw_taxon_name"),
            vec!["Macropus rufus"]
        );
        assert_eq!(
            CaptureBackend::values(&doc, "state"),
            vec!["New South Wales"]
        );
        assert_eq!(CaptureBackend::values(&doc, "latitude"), vec!["-33.87"]);
        // date field went in typed
        assert_eq!(
            CaptureBackend::values(&doc, "event_date"),
            vec!["2007-03-01T00:00:00Z"]
        );
    }

    #[test]
    fn test_multi_value_pipe_split() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let mut map = base_record();
        map.insert("collector.p".into(), "Meelis Liivarand|Jane Doe".into());
        map.insert("multimedia.p".into(), "Image||Sound".into());
        indexer.index_from_map("r1", &map, &IndexOptions::batched());

        let doc = backend.last_doc();
        assert_eq!(
            CaptureBackend::values(&doc, "collectors"),
            vec!["Meelis Liivarand", "Jane Doe"]
        );
        // empty parts are dropped
        assert_eq!(
            CaptureBackend::values(&doc, "multimedia"),
            vec!["Image", "Sound"]
        );
    }

    #[test]
    fn test_assertion_closure_and_disjointness() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let mut map = base_record();
        map.insert(
            "qualityAssertions".into(),
            r#"[{"code":101,"name":"MISSING_GEODETIC_DATUM","qaStatus":0},
                {"code":50,"name":"NAME_NOT_RECOGNISED","qaStatus":1}]"#
                .into(),
        );
        indexer.index_from_map("r1", &map, &IndexOptions::batched());

        let doc = backend.last_doc();
        let passed = CaptureBackend::values(&doc, "assertions_passed");
        let failed = CaptureBackend::values(&doc, "assertions");
        let missing = CaptureBackend::values(&doc, "assertions_missing");
        let unchecked = CaptureBackend::values(&doc, "assertions_unchecked");

        assert_eq!(missing, vec!["MISSING_GEODETIC_DATUM"]);
        assert_eq!(passed, vec!["NAME_NOT_RECOGNISED"]);
        assert!(failed.is_empty());
        assert_eq!(
            CaptureBackend::values(&doc, "system_assertions"),
            vec!["true"]
        );

        // closure: passed + failed + missing + unchecked covers everything
        // except the two excluded codes, with no overlaps
        let mut all: Vec<String> = passed
            .iter()
            .chain(failed.iter())
            .chain(missing.iter())
            .chain(unchecked.iter())
            .cloned()
            .collect();
        let total = AssertionCodes::all().len() - 2;
        assert_eq!(all.len(), total);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total, "assertion sets must be disjoint");
        assert!(!all.contains(&"PROCESSING_ERROR".to_string()));
        assert!(!all.contains(&"VERIFIED".to_string()));
    }

    #[test]
    fn test_no_assertions_still_closes() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        indexer.index_from_map("r1", &base_record(), &IndexOptions::batched());
        let doc = backend.last_doc();
        assert_eq!(
            CaptureBackend::values(&doc, "assertions_unchecked").len(),
            AssertionCodes::all().len() - 2
        );
        assert_eq!(
            CaptureBackend::values(&doc, "system_assertions"),
            vec!["false"]
        );
    }

    #[test]
    fn test_misc_property_typing() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let mut map = base_record();
        map.insert(
            "miscProperties".into(),
            r#"{"count_i":"42","bad_i":"x","depth_d":"3.5","seen_dt":"2007-03-01",
                "habitat":"woodland","userField":"kept","plainExtra":"verbatim"}"#
                .into(),
        );
        let opts = IndexOptions {
            batch: true,
            misc_index_properties: vec![
                "count_i".to_string(),
                "bad_i".to_string(),
                "depth_d".to_string(),
                "seen_dt".to_string(),
                "habitat".to_string(),
            ],
            user_provided_type_misc_properties: vec!["userField".to_string()],
            additional_fields_to_index: vec!["plainExtra".to_string()],
            ..Default::default()
        };
        indexer.index_from_map("r1", &map, &opts);

        let doc = backend.last_doc();
        assert_eq!(CaptureBackend::values(&doc, "count_i"), vec!["42"]);
        // unparseable int is skipped
        assert!(CaptureBackend::values(&doc, "bad_i").is_empty());
        assert_eq!(CaptureBackend::values(&doc, "depth_d"), vec!["3.5"]);
        assert_eq!(
            CaptureBackend::values(&doc, "seen_dt"),
            vec!["2007-03-01T00:00:00Z"]
        );
        // untyped misc property gets the string suffix appended
        assert_eq!(CaptureBackend::values(&doc, "habitat_s"), vec!["woodland"]);
        // user-provided names keep their spelling
        assert_eq!(CaptureBackend::values(&doc, "userField"), vec!["kept"]);
        assert_eq!(CaptureBackend::values(&doc, "plainExtra"), vec!["verbatim"]);
    }

    #[test]
    fn test_species_lists_emitted() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let mut map = base_record();
        map.insert("taxonConceptID.p".into(), "urn:lsid:taxon:250".into());
        indexer.index_from_map("r1", &map, &IndexOptions::batched());

        let doc = backend.last_doc();
        assert_eq!(
            CaptureBackend::values(&doc, "species_list_uid"),
            vec!["dr1", "dr2"]
        );
    }

    #[test]
    fn test_species_groups_from_left_right() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let mut map = base_record();
        map.insert("left.p".into(), "250".into());
        map.insert("right.p".into(), "251".into());
        indexer.index_from_map("r1", &map, &IndexOptions::batched());

        let doc = backend.last_doc();
        assert_eq!(
            CaptureBackend::values(&doc, "species_group"),
            vec!["Animals", "Birds"]
        );
        assert_eq!(
            CaptureBackend::values(&doc, "species_subgroup"),
            vec!["Parrots"]
        );

        // left alone is not enough
        let mut map = base_record();
        map.insert("left.p".into(), "250".into());
        indexer.index_from_map("r2", &map, &IndexOptions::batched());
        let doc = backend.last_doc();
        assert!(CaptureBackend::values(&doc, "species_group").is_empty());
    }

    #[test]
    fn test_query_assertions_and_suitability() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let mut map = base_record();
        map.insert(
            "queryAssertion".into(),
            r#"{"uuid-1":"expert distribution","uuid-2":"vagrant"}"#.into(),
        );
        indexer.index_from_map("r1", &map, &IndexOptions::batched());

        let doc = backend.last_doc();
        assert_eq!(
            CaptureBackend::values(&doc, "query_assertion_uuid"),
            vec!["uuid-1", "uuid-2"]
        );
        assert_eq!(
            CaptureBackend::values(&doc, "suitable_modelling"),
            vec!["false"]
        );

        let mut map = base_record();
        map.insert("queryAssertion".into(), r#"{"uuid-3":"confirmed"}"#.into());
        indexer.index_from_map("r2", &map, &IndexOptions::batched());
        assert_eq!(
            CaptureBackend::values(&backend.last_doc(), "suitable_modelling"),
            vec!["true"]
        );
    }

    #[test]
    fn test_user_assertions_resolved_via_store() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let mut map = base_record();
        map.insert("userQualityAssertion".into(), "true".into());
        indexer.index_from_map("row-ua", &map, &IndexOptions::batched());

        let doc = backend.last_doc();
        assert_eq!(
            CaptureBackend::values(&doc, "assertion_user_id"),
            vec!["u100", "u200"]
        );
    }

    #[test]
    fn test_layers_emitted_verbatim() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let mut map = base_record();
        map.insert("el.p".into(), r#"{"el593":"26.4","el848":"1071.0"}"#.into());
        map.insert("cl.p".into(), r#"{"cl22":"Sydney Basin"}"#.into());
        indexer.index_from_map("r1", &map, &IndexOptions::batched());

        let doc = backend.last_doc();
        assert_eq!(CaptureBackend::values(&doc, "el593"), vec!["26.4"]);
        assert_eq!(CaptureBackend::values(&doc, "el848"), vec!["1071"]);
        assert_eq!(
            CaptureBackend::values(&doc, "cl22"),
            vec!["Sydney Basin"]
        );
    }

    #[test]
    fn test_grid_references_feature_flagged() {
        let (ctx, backend) = setup(true);
        let mut indexer = Indexer::new(ctx);

        let mut map = base_record();
        map.insert("bbox.p".into(), "-35.1,149.0,-35.0,149.2".into());
        map.insert("easting.p".into(), "334500".into());
        map.insert("northing.p".into(), "1234100".into());
        map.insert("gridReference".into(), "NM3941".into());
        indexer.index_from_map("r1", &map, &IndexOptions::batched());

        let doc = backend.last_doc();
        assert_eq!(CaptureBackend::values(&doc, "min_latitude"), vec!["-35.1"]);
        assert_eq!(CaptureBackend::values(&doc, "max_longitude"), vec!["149.2"]);
        assert_eq!(CaptureBackend::values(&doc, "easting"), vec!["334500"]);
        assert_eq!(CaptureBackend::values(&doc, "grid_ref"), vec!["NM3941"]);
        assert_eq!(
            CaptureBackend::values(&doc, "grid_ref_10000"),
            vec!["NM34"]
        );

        // flag off: nothing emitted
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);
        let mut map = base_record();
        map.insert("gridReference".into(), "NM3941".into());
        indexer.index_from_map("r1", &map, &IndexOptions::batched());
        assert!(CaptureBackend::values(&backend.last_doc(), "grid_ref").is_empty());
    }

    #[test]
    fn test_batch_id_and_test_mode() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let opts = IndexOptions {
            batch: true,
            batch_id: "batch-42".to_string(),
            ..Default::default()
        };
        indexer.index_from_map("r1", &base_record(), &opts);
        assert_eq!(
            CaptureBackend::values(&backend.last_doc(), "batch_id_s"),
            vec!["batch-42"]
        );

        // test mode builds but never publishes
        let before = backend.docs.lock().unwrap().len();
        let opts = IndexOptions {
            batch: true,
            test: true,
            ..Default::default()
        };
        let nanos = indexer.index_from_map("r2", &base_record(), &opts);
        assert!(nanos > 0);
        assert_eq!(backend.docs.lock().unwrap().len(), before);
    }

    #[test]
    fn test_csv_emission_mirrors_document() {
        use crate::csv_out::{csv_columns, CsvEmitter};

        #[derive(Clone, Default)]
        struct SharedBuf(Arc<Mutex<Vec<u8>>>);
        impl std::io::Write for SharedBuf {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let (ctx, _backend) = setup(false);
        let buf = SharedBuf::default();
        let columns = csv_columns(ctx.header, &[], &[]);
        let emitter =
            CsvEmitter::new(Box::new(buf.clone()), columns, &HashSet::new()).unwrap();
        let mut indexer = Indexer::new(ctx).with_csv(emitter);

        let mut map = base_record();
        map.insert("collector.p".into(), "Jane Doe|Meelis Liivarand".into());
        indexer.index_from_map("r1", &map, &IndexOptions::batched());
        indexer.flush_csv().unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let mut lines = text.lines();
        let header_line = lines.next().unwrap();
        let row_line = lines.next().unwrap();
        let id_pos = header_line.split('\t').position(|c| c == "id").unwrap();
        let coll_pos = header_line
            .split('\t')
            .position(|c| c == "collectors")
            .unwrap();
        let cells: Vec<&str> = row_line.split('\t').collect();
        assert_eq!(cells[id_pos], "r1");
        assert_eq!(cells[coll_pos], "Jane Doe|Meelis Liivarand");
    }

    #[test]
    fn test_commit_flag_hard_commits() {
        let (ctx, backend) = setup(false);
        let mut indexer = Indexer::new(ctx);

        let opts = IndexOptions {
            batch: true,
            commit: true,
            ..Default::default()
        };
        indexer.index_from_map("r1", &base_record(), &opts);
        assert_eq!(*backend.hard_commits.lock().unwrap(), 1);
    }
}
