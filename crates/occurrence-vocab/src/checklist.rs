//! Accepted-GUID checklist cache.
//!
//! A set of integer GUIDs loaded once from a single-column text file. The
//! load happens on the first `contains` call; a missing or unreadable file
//! degrades to an empty set with a warning.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::{debug, warn};

/// One-shot loaded set of accepted checklist GUIDs.
pub struct ChecklistCache {
    path: Option<PathBuf>,
    guids: OnceLock<HashSet<i64>>,
}

impl ChecklistCache {
    pub fn new(path: Option<impl Into<PathBuf>>) -> Self {
        Self {
            path: path.map(Into::into),
            guids: OnceLock::new(),
        }
    }

    /// An always-empty cache for deployments without a checklist file.
    pub fn empty() -> Self {
        Self {
            path: None,
            guids: OnceLock::new(),
        }
    }

    /// Whether the GUID is in the checklist. Triggers the one-shot load.
    pub fn contains(&self, guid: i64) -> bool {
        self.load().contains(&guid)
    }

    /// Number of loaded GUIDs. Triggers the one-shot load.
    pub fn len(&self) -> usize {
        self.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    fn load(&self) -> &HashSet<i64> {
        self.guids.get_or_init(|| {
            let Some(path) = &self.path else {
                return HashSet::new();
            };
            match std::fs::read_to_string(path) {
                Ok(contents) => {
                    let set: HashSet<i64> = contents
                        .lines()
                        .filter_map(|line| line.trim().parse().ok())
                        .collect();
                    debug!(count = set.len(), path = ?path, "Loaded checklist");
                    set
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Checklist unavailable, using empty set");
                    HashSet::new()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_and_contains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checklist.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "12345").unwrap();
        writeln!(f, "  67890  ").unwrap();
        writeln!(f, "not-a-guid").unwrap();

        let cache = ChecklistCache::new(Some(&path));
        assert!(cache.contains(12345));
        assert!(cache.contains(67890));
        assert!(!cache.contains(11111));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let cache = ChecklistCache::new(Some("/nonexistent/checklist.txt"));
        assert!(!cache.contains(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unconfigured() {
        let cache = ChecklistCache::empty();
        assert!(!cache.contains(1));
    }
}
