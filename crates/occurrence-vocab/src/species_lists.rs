//! Cached taxon-to-species-list mapping.
//!
//! Species lists are curated sets of taxa (conservation lists, sensitive
//! lists, …). The engine needs, per taxon concept LSID, the UIDs of the
//! lists that contain it. Lookups go through a cache in front of a
//! pluggable source.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::error::VocabError;

/// Source of truth for taxon -> list-uid mappings.
pub trait SpeciesListSource: Send + Sync {
    fn lists_for_taxon(&self, lsid: &str) -> Result<Vec<String>, VocabError>;
}

/// File-backed source: one JSON object mapping LSID to an array of list
/// UIDs, loaded eagerly.
pub struct FileSpeciesListSource {
    mappings: HashMap<String, Vec<String>>,
}

impl FileSpeciesListSource {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let contents = std::fs::read_to_string(path)?;
        let mappings: HashMap<String, Vec<String>> = serde_json::from_str(&contents)?;
        debug!(taxa = mappings.len(), "Loaded species list mappings");
        Ok(Self { mappings })
    }

    /// An empty source for deployments without list data.
    pub fn empty() -> Self {
        Self {
            mappings: HashMap::new(),
        }
    }
}

impl SpeciesListSource for FileSpeciesListSource {
    fn lists_for_taxon(&self, lsid: &str) -> Result<Vec<String>, VocabError> {
        Ok(self.mappings.get(lsid).cloned().unwrap_or_default())
    }
}

/// Caching DAO over a [`SpeciesListSource`].
///
/// After first lookup a taxon's list UIDs are served from the cache for
/// the process lifetime. Source failures cache an empty entry with a
/// warning so a flaky source cannot stall the hot path.
pub struct SpeciesListDao {
    source: Box<dyn SpeciesListSource>,
    cache: RwLock<HashMap<String, Arc<Vec<String>>>>,
}

impl SpeciesListDao {
    pub fn new(source: Box<dyn SpeciesListSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// List UIDs containing the taxon, cached.
    pub fn list_uids(&self, lsid: &str) -> Arc<Vec<String>> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(lsid) {
                return hit.clone();
            }
        }

        let uids = match self.source.lists_for_taxon(lsid) {
            Ok(uids) => uids,
            Err(e) => {
                warn!(lsid, error = %e, "Species list lookup failed");
                Vec::new()
            }
        };
        let entry = Arc::new(uids);
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(lsid.to_string(), entry.clone());
        entry
    }

    pub fn cached_taxa(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource(AtomicUsize);

    impl SpeciesListSource for CountingSource {
        fn lists_for_taxon(&self, lsid: &str) -> Result<Vec<String>, VocabError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if lsid == "lsid:1" {
                Ok(vec!["dr123".to_string(), "dr456".to_string()])
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[test]
    fn test_cache_hits_source_once() {
        let dao = SpeciesListDao::new(Box::new(CountingSource(AtomicUsize::new(0))));

        let first = dao.list_uids("lsid:1");
        assert_eq!(first.as_slice(), ["dr123", "dr456"]);

        let second = dao.list_uids("lsid:1");
        assert_eq!(second.as_slice(), ["dr123", "dr456"]);
        assert_eq!(dao.cached_taxa(), 1);
    }

    #[test]
    fn test_unknown_taxon_is_empty() {
        let dao = SpeciesListDao::new(Box::new(CountingSource(AtomicUsize::new(0))));
        assert!(dao.list_uids("lsid:none").is_empty());
    }

    #[test]
    fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, r#"{{"lsid:42":["dr1","dr2"]}}"#).unwrap();

        let source = FileSpeciesListSource::load(&path).unwrap();
        assert_eq!(
            source.lists_for_taxon("lsid:42").unwrap(),
            vec!["dr1", "dr2"]
        );
        assert!(source.lists_for_taxon("lsid:x").unwrap().is_empty());
    }
}
