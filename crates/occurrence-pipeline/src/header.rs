//! The canonical header contract.
//!
//! Maps index field names to their source columns in the row store. The
//! engine materializes one value per header entry, processed column first,
//! preserving header order. The header also anchors the CSV emission
//! column order.

use occurrence_types::RecordView;

/// One canonical column: the index field it feeds and the row-store
/// column it reads (processed flavour preferred).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderField {
    pub index_name: &'static str,
    pub column: &'static str,
}

const fn h(index_name: &'static str, column: &'static str) -> HeaderField {
    HeaderField { index_name, column }
}

/// The canonical Darwin Core header, in emission order.
pub fn occurrence_header() -> &'static [HeaderField] {
    &[
        h("occurrence_id", "occurrenceID"),
        h("catalogue_number", "catalogNumber"),
        h("collection_code", "collectionCode"),
        h("institution_code", "institutionCode"),
        h("data_resource_uid", "dataResourceUid"),
        h("data_provider_uid", "dataProviderUid"),
        h("data_hub_uid", "dataHubUid"),
        h("license", "license"),
        h("basis_of_record", "basisOfRecord"),
        h("type_status", "typeStatus"),
        h("occurrence_status", "occurrenceStatus"),
        h("sex", "sex"),
        h("life_stage", "lifeStage"),
        h("individual_count", "individualCount"),
        h("taxon_concept_lsid", "taxonConceptID"),
        h("taxon_name", "scientificName"),
        h("common_name", "vernacularName"),
        h("rank", "taxonRank"),
        h("rank_id", "taxonRankID"),
        h("kingdom", "kingdom"),
        h("phylum", "phylum"),
        h("class", "class"),
        h("order", "order"),
        h("family", "family"),
        h("genus", "genus"),
        h("species", "species"),
        h("subspecies_name", "subspecies"),
        h("left", "left"),
        h("right", "right"),
        h("latitude", "decimalLatitude"),
        h("longitude", "decimalLongitude"),
        h("lat_long", "latLong"),
        h("coordinate_uncertainty", "coordinateUncertaintyInMeters"),
        h("country", "country"),
        h("state", "stateProvince"),
        h("biome", "biome"),
        h("event_date", "eventDate"),
        h("event_date_end", "eventDateEnd"),
        h("occurrence_year", "year"),
        h("month", "month"),
        h("day", "day"),
        h("modified_date", "alaModified"),
        h("collectors", "collector"),
        h("establishment_means", "establishmentMeans"),
        h("duplicate_inst", "duplicateInst"),
        h("duplicate_record", "duplicates"),
        h("duplicate_type", "duplicationType"),
        h("taxonomic_issue", "taxonomicIssues"),
        h("interactions", "interactions"),
        h("outlier_layer", "outlierForLayers"),
        h("species_habitats", "speciesHabitats"),
        h("multimedia", "multimedia"),
        h("all_image_url", "images"),
    ]
}

/// Materialize one value per header entry (empty string when absent),
/// processed column preferred, header order preserved.
pub fn canonical_values(view: &RecordView<'_>, header: &[HeaderField]) -> Vec<String> {
    header
        .iter()
        .map(|field| view.value(field.column).unwrap_or("").to_string())
        .collect()
}
