//! Name-matching lookup interface and nested-set taxon intervals.
//!
//! The name-matching index itself is an external collaborator; this module
//! defines only the interface the pipeline consumes.

use thiserror::Error;

/// Nested-set encoding of a taxon's subtree.
///
/// A descendant's own `left` value lies within the ancestor's
/// `[left, right]` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxonInterval {
    pub left: i32,
    pub right: i32,
}

impl TaxonInterval {
    pub fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    /// Whether a taxon with the given own-left value falls inside this
    /// subtree.
    pub fn contains(&self, lft: i32) -> bool {
        self.left <= lft && lft <= self.right
    }
}

/// Result of a name-matching lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub lsid: String,
    /// For synonyms, the LSID of the accepted concept.
    pub accepted_lsid: Option<String>,
    pub left: Option<i32>,
    pub right: Option<i32>,
    pub is_synonym: bool,
}

impl NameMatch {
    /// The interval for this match, when both endpoints resolved.
    pub fn interval(&self) -> Option<TaxonInterval> {
        match (self.left, self.right) {
            (Some(l), Some(r)) => Some(TaxonInterval::new(l, r)),
            _ => None,
        }
    }
}

/// Errors surfaced by the name-matching lookup.
#[derive(Debug, Error)]
pub enum NameIndexError {
    /// The name is a homonym; alternatives are carried in match order and
    /// the first is conventionally used.
    #[error("homonym: {} candidate results", .0.len())]
    Homonym(Vec<NameMatch>),

    /// No match for the supplied name/rank.
    #[error("no match for name")]
    NotFound,

    /// Lookup infrastructure failure.
    #[error("name index error: {0}")]
    Other(String),
}

/// Lookup from scientific name (+ optional rank) to taxon intervals.
pub trait NameIndex: Send + Sync {
    fn search_for_record(
        &self,
        name: &str,
        rank: Option<&str>,
    ) -> Result<NameMatch, NameIndexError>;

    /// Direct lookup by LSID, used to follow a synonym's accepted concept.
    fn search_for_lsid(&self, _lsid: &str) -> Result<NameMatch, NameIndexError> {
        Err(NameIndexError::NotFound)
    }
}

/// A name index that resolves nothing. Used when no local name-matching
/// data is configured; species-group resolution degrades silently.
#[derive(Debug, Default)]
pub struct EmptyNameIndex;

impl NameIndex for EmptyNameIndex {
    fn search_for_record(
        &self,
        _name: &str,
        _rank: Option<&str>,
    ) -> Result<NameMatch, NameIndexError> {
        Err(NameIndexError::NotFound)
    }
}
