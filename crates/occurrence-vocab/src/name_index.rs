//! File-backed name-matching index for local runs.
//!
//! The production name-matching service is an external collaborator; this
//! adapter satisfies the same interface from a TSV export with columns
//! `name  rank  lsid  left  right  accepted_lsid?`.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use occurrence_types::{NameIndex, NameIndexError, NameMatch};

use crate::error::VocabError;

#[derive(Debug, Clone)]
struct Row {
    rank: String,
    record: NameMatch,
}

/// Name index loaded from a TSV file.
pub struct TsvNameIndex {
    by_name: HashMap<String, Vec<Row>>,
    by_lsid: HashMap<String, NameMatch>,
}

impl TsvNameIndex {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let contents = std::fs::read_to_string(path)?;
        let mut by_name: HashMap<String, Vec<Row>> = HashMap::new();
        let mut by_lsid = HashMap::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 5 {
                continue;
            }
            let accepted = cols.get(5).filter(|s| !s.is_empty()).map(|s| s.to_string());
            let record = NameMatch {
                lsid: cols[2].to_string(),
                is_synonym: accepted.is_some(),
                accepted_lsid: accepted,
                left: cols[3].parse().ok(),
                right: cols[4].parse().ok(),
            };
            by_lsid.insert(record.lsid.clone(), record.clone());
            by_name.entry(cols[0].to_string()).or_default().push(Row {
                rank: cols[1].to_string(),
                record,
            });
        }

        debug!(names = by_name.len(), "Loaded name index");
        Ok(Self { by_name, by_lsid })
    }
}

impl NameIndex for TsvNameIndex {
    fn search_for_record(
        &self,
        name: &str,
        rank: Option<&str>,
    ) -> Result<NameMatch, NameIndexError> {
        let rows = self.by_name.get(name).ok_or(NameIndexError::NotFound)?;

        let candidates: Vec<&Row> = match rank {
            Some(rank) => rows.iter().filter(|r| r.rank == rank).collect(),
            None => rows.iter().collect(),
        };

        match candidates.len() {
            0 => Err(NameIndexError::NotFound),
            1 => Ok(candidates[0].record.clone()),
            _ => Err(NameIndexError::Homonym(
                candidates.iter().map(|r| r.record.clone()).collect(),
            )),
        }
    }

    fn search_for_lsid(&self, lsid: &str) -> Result<NameMatch, NameIndexError> {
        self.by_lsid
            .get(lsid)
            .cloned()
            .ok_or(NameIndexError::NotFound)
    }
}
