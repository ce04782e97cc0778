//! Schema for the occurrence search index.
//!
//! The schema knows, per field: its kind, whether it is multi-valued, and
//! the copy-field destinations a value written to it fans out to (each with
//! an optional max-chars truncation). Fields not declared here can still be
//! typed through the dynamic suffixes `_s`, `_i`, `_d` and `_dt`.

use std::collections::HashMap;

/// Kind of an index field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Exact string, not tokenized
    Str,
    /// Tokenized text
    Text,
    Int,
    Double,
    Date,
    Bool,
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub multi_valued: bool,
}

/// One copy-field directive: values written to the source are also indexed
/// under `dest`, truncated to `max_chars` when set.
#[derive(Debug, Clone)]
pub struct CopyRule {
    pub dest: String,
    pub max_chars: Option<usize>,
}

/// Multi-valued business fields that arrive pipe-joined in the raw record
/// and are split on emit.
pub const MULTI_VALUED_FIELDS: &[&str] = &[
    "duplicate_inst",
    "establishment_means",
    "species_group",
    "assertions",
    "data_hub_uid",
    "interactions",
    "outlier_layer",
    "species_habitats",
    "multimedia",
    "all_image_url",
    "collectors",
    "duplicate_record",
    "duplicate_type",
    "taxonomic_issue",
    "species_list_uid",
];

/// The index schema: declared fields plus copy-field rules.
#[derive(Debug, Clone, Default)]
pub struct IndexSchema {
    fields: HashMap<String, FieldDef>,
    copy_rules: HashMap<String, Vec<CopyRule>>,
    order: Vec<String>,
}

impl IndexSchema {
    pub fn builder() -> IndexSchemaBuilder {
        IndexSchemaBuilder {
            schema: IndexSchema::default(),
        }
    }

    /// Declared field definition, if any.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Copy rules with `name` as the source.
    pub fn copy_rules(&self, name: &str) -> &[CopyRule] {
        self.copy_rules.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Kind via declaration or dynamic suffix.
    pub fn resolve_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields
            .get(name)
            .map(|f| f.kind)
            .or_else(|| Self::dynamic_kind(name))
    }

    /// Kind implied by a dynamic suffix or a sampled-layer prefix alone.
    ///
    /// `el###` fields carry sampled environmental layer values (doubles);
    /// `cl###` fields carry contextual layer values (strings).
    pub fn dynamic_kind(name: &str) -> Option<FieldKind> {
        if name.ends_with("_dt") {
            Some(FieldKind::Date)
        } else if name.ends_with("_s") {
            Some(FieldKind::Str)
        } else if name.ends_with("_i") {
            Some(FieldKind::Int)
        } else if name.ends_with("_d") {
            Some(FieldKind::Double)
        } else if is_layer_field(name, "el") {
            Some(FieldKind::Double)
        } else if is_layer_field(name, "cl") {
            Some(FieldKind::Str)
        } else {
            None
        }
    }

    pub fn is_multi_valued(&self, name: &str) -> bool {
        self.fields.get(name).map(|f| f.multi_valued).unwrap_or(false)
    }

    /// Declared fields in declaration order.
    pub fn declared_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.order.iter().filter_map(|n| self.fields.get(n))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn is_layer_field(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

pub struct IndexSchemaBuilder {
    schema: IndexSchema,
}

impl IndexSchemaBuilder {
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.add(name, kind, false);
        self
    }

    pub fn multi_field(mut self, name: &str, kind: FieldKind) -> Self {
        self.add(name, kind, true);
        self
    }

    pub fn copy(mut self, source: &str, dest: &str, max_chars: Option<usize>) -> Self {
        self.schema
            .copy_rules
            .entry(source.to_string())
            .or_default()
            .push(CopyRule {
                dest: dest.to_string(),
                max_chars,
            });
        self
    }

    fn add(&mut self, name: &str, kind: FieldKind, multi_valued: bool) {
        self.schema.order.push(name.to_string());
        self.schema.fields.insert(
            name.to_string(),
            FieldDef {
                name: name.to_string(),
                kind,
                multi_valued,
            },
        );
    }

    pub fn build(self) -> IndexSchema {
        self.schema
    }
}

/// The occurrence index schema.
pub fn occurrence_schema() -> IndexSchema {
    use FieldKind::*;

    let mut builder = IndexSchema::builder()
        // identity
        .field("id", Str)
        .field("row_key", Str)
        .field("occurrence_id", Str)
        // provenance
        .field("data_resource_uid", Str)
        .field("data_provider_uid", Str)
        .field("institution_code", Str)
        .field("collection_code", Str)
        .field("catalogue_number", Str)
        .field("license", Str)
        .field("provenance", Str)
        // taxonomy
        .field("taxon_concept_lsid", Str)
        .field("taxon_name", Text)
        .field("raw_taxon_name", Text)
        .field("common_name", Text)
        .field("common_name_exact", Str)
        .field("rank", Str)
        .field("rank_id", Int)
        .field("kingdom", Str)
        .field("phylum", Str)
        .field("class", Str)
        .field("order", Str)
        .field("family", Str)
        .field("genus", Str)
        .field("species", Str)
        .field("subspecies_name", Str)
        .field("left", Int)
        .field("right", Int)
        // location
        .field("latitude", Double)
        .field("longitude", Double)
        .field("lat_long", Str)
        .field("coordinate_uncertainty", Double)
        .field("country", Str)
        .field("state", Str)
        .field("biome", Str)
        .field("min_latitude", Double)
        .field("min_longitude", Double)
        .field("max_latitude", Double)
        .field("max_longitude", Double)
        .field("easting", Int)
        .field("northing", Int)
        .field("grid_ref", Str)
        .field("grid_ref_100000", Str)
        .field("grid_ref_10000", Str)
        .field("grid_ref_1000", Str)
        .field("grid_ref_100", Str)
        // event
        .field("event_date", Date)
        .field("event_date_end", Date)
        .field("occurrence_year", Int)
        .field("month", Str)
        .field("day", Str)
        .field("modified_date", Date)
        // record content
        .field("basis_of_record", Str)
        .field("type_status", Str)
        .field("occurrence_status", Str)
        .field("sex", Str)
        .field("life_stage", Str)
        .field("individual_count", Int)
        // flags
        .field("system_assertions", Bool)
        .field("suitable_modelling", Bool)
        .field("taxon_in_checklist", Bool)
        // assertion outcomes
        .multi_field("assertions_passed", Str)
        .multi_field("assertions_missing", Str)
        .multi_field("assertions_unchecked", Str)
        .multi_field("assertion_user_id", Str)
        .multi_field("query_assertion_uuid", Str)
        // subgroups resolved at index time
        .multi_field("species_subgroup", Str)
        // tokenized catch-all
        .multi_field("text", Text);

    for name in MULTI_VALUED_FIELDS {
        builder = builder.multi_field(name, Str);
    }

    builder
        .copy("taxon_name", "text", None)
        .copy("raw_taxon_name", "text", None)
        .copy("common_name", "text", Some(100))
        .copy("common_name", "common_name_exact", None)
        .copy("collectors", "text", None)
        .copy("catalogue_number", "text", None)
        .copy("occurrence_id", "text", None)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_lookup() {
        let schema = occurrence_schema();
        assert_eq!(schema.field("latitude").unwrap().kind, FieldKind::Double);
        assert_eq!(schema.field("taxon_name").unwrap().kind, FieldKind::Text);
        assert!(schema.field("unknown_field").is_none());
    }

    #[test]
    fn test_multi_valued_set_is_declared() {
        let schema = occurrence_schema();
        for name in MULTI_VALUED_FIELDS {
            let def = schema.field(name).unwrap_or_else(|| panic!("missing {name}"));
            assert!(def.multi_valued, "{name} should be multi-valued");
        }
        assert!(!schema.is_multi_valued("latitude"));
    }

    #[test]
    fn test_dynamic_suffixes() {
        assert_eq!(IndexSchema::dynamic_kind("batch_id_s"), Some(FieldKind::Str));
        assert_eq!(IndexSchema::dynamic_kind("count_i"), Some(FieldKind::Int));
        assert_eq!(IndexSchema::dynamic_kind("depth_d"), Some(FieldKind::Double));
        assert_eq!(
            IndexSchema::dynamic_kind("sampled_dt"),
            Some(FieldKind::Date)
        );
        assert_eq!(IndexSchema::dynamic_kind("nosuffix"), None);
        // sampled layer prefixes
        assert_eq!(IndexSchema::dynamic_kind("el593"), Some(FieldKind::Double));
        assert_eq!(IndexSchema::dynamic_kind("cl22"), Some(FieldKind::Str));
        assert_eq!(IndexSchema::dynamic_kind("elk"), None);
        assert_eq!(IndexSchema::dynamic_kind("el"), None);

        let schema = occurrence_schema();
        assert_eq!(schema.resolve_kind("anything_i"), Some(FieldKind::Int));
        assert_eq!(schema.resolve_kind("latitude"), Some(FieldKind::Double));
        assert_eq!(schema.resolve_kind("mystery"), None);
    }

    #[test]
    fn test_copy_rules() {
        let schema = occurrence_schema();
        let rules = schema.copy_rules("common_name");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].dest, "text");
        assert_eq!(rules[0].max_chars, Some(100));
        assert_eq!(rules[1].dest, "common_name_exact");
        assert!(schema.copy_rules("latitude").is_empty());
    }
}
