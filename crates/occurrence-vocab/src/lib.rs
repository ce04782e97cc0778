//! Vocabularies and coordinated caches for the indexing engine.
//!
//! - [`AssertionCodes`]: the closed enumeration of record quality checks
//! - [`SpeciesGroups`]: static group hierarchy plus dynamic subgroups,
//!   resolved to nested-set intervals via the name-matching lookup
//! - [`ChecklistCache`]: accepted-GUID set loaded once from a file
//! - [`SpeciesListDao`]: cached taxon-to-list-uid mapping
//!
//! Caches are built lazily under a one-shot initialization guard and live
//! for the process lifetime; resolution failures degrade silently.

pub mod assertions;
pub mod checklist;
pub mod error;
pub mod name_index;
pub mod species_groups;
pub mod species_lists;

pub use assertions::{AssertionCategory, AssertionCode, AssertionCodes};
pub use checklist::ChecklistCache;
pub use error::VocabError;
pub use name_index::TsvNameIndex;
pub use species_groups::{SpeciesGroup, SpeciesGroups, Subgroup, SubgroupDescriptor};
pub use species_lists::{FileSpeciesListSource, SpeciesListDao, SpeciesListSource};
