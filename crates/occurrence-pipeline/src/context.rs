//! The indexing context: everything the engine consults, built once at
//! startup and passed down. Replaces process-wide singletons.

use std::sync::Arc;

use occurrence_index::IndexService;
use occurrence_store::OccurrenceStore;
use occurrence_types::{NameIndex, Settings};
use occurrence_vocab::{
    ChecklistCache, FileSpeciesListSource, SpeciesGroups, SpeciesListDao,
};

use crate::header::{occurrence_header, HeaderField};

/// Shared, read-only context for every indexing worker.
pub struct IndexingContext {
    pub settings: Settings,
    pub service: Arc<IndexService>,
    pub store: Arc<dyn OccurrenceStore>,
    pub species_groups: SpeciesGroups,
    pub species_lists: SpeciesListDao,
    pub checklist: ChecklistCache,
    pub header: &'static [HeaderField],
}

impl IndexingContext {
    /// Resolve vocabularies from the settings and assemble the context.
    pub fn build(
        settings: Settings,
        service: Arc<IndexService>,
        store: Arc<dyn OccurrenceStore>,
        name_index: &dyn NameIndex,
    ) -> Self {
        let species_groups =
            SpeciesGroups::load(name_index, settings.vocab.subgroups_source.as_deref());

        let list_source = match &settings.vocab.species_lists_path {
            Some(path) => match FileSpeciesListSource::load(path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Species list source unavailable");
                    FileSpeciesListSource::empty()
                }
            },
            None => FileSpeciesListSource::empty(),
        };
        let species_lists = SpeciesListDao::new(Box::new(list_source));

        let checklist = ChecklistCache::new(settings.vocab.checklist_path.clone());

        Self {
            settings,
            service,
            store,
            species_groups,
            species_lists,
            checklist,
            header: occurrence_header(),
        }
    }

    /// Assemble from already-built parts (tests and tooling).
    pub fn from_parts(
        settings: Settings,
        service: Arc<IndexService>,
        store: Arc<dyn OccurrenceStore>,
        species_groups: SpeciesGroups,
        species_lists: SpeciesListDao,
        checklist: ChecklistCache,
    ) -> Self {
        Self {
            settings,
            service,
            store,
            species_groups,
            species_lists,
            checklist,
            header: occurrence_header(),
        }
    }
}
