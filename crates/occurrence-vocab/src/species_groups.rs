//! Species groups and subgroups over nested-set taxon intervals.
//!
//! A group names taxa to include and taxa to exclude; each name resolves
//! through the name-matching lookup to a `[left, right]` interval. A taxon
//! with own left value `l` belongs to the group when `l` falls in some
//! included interval and in no excluded interval. Excluded intervals are
//! evaluated first so they can veto.
//!
//! Groups form a forest by parent name; membership is independent per
//! group. Dynamic subgroups come from a JSON descriptor (file or URL).

use serde::Deserialize;
use tracing::{debug, info, warn};

use occurrence_types::{NameIndex, NameIndexError, NameMatch, TaxonInterval};

use crate::error::VocabError;

/// Static group definition: taxa named, not yet resolved.
struct GroupDefinition {
    name: &'static str,
    rank: &'static str,
    included: &'static [&'static str],
    excluded: &'static [&'static str],
    parent: Option<&'static str>,
}

/// The static group hierarchy, in definition (and therefore query) order.
static STATIC_GROUPS: &[GroupDefinition] = &[
    GroupDefinition { name: "Animals", rank: "kingdom", included: &["Animalia"], excluded: &[], parent: None },
    GroupDefinition { name: "Mammals", rank: "class", included: &["Mammalia"], excluded: &[], parent: Some("Animals") },
    GroupDefinition { name: "Birds", rank: "class", included: &["Aves"], excluded: &[], parent: Some("Animals") },
    GroupDefinition { name: "Reptiles", rank: "class", included: &["Reptilia"], excluded: &[], parent: Some("Animals") },
    GroupDefinition { name: "Amphibians", rank: "class", included: &["Amphibia"], excluded: &[], parent: Some("Animals") },
    GroupDefinition {
        name: "Fishes",
        rank: "class",
        included: &["Agnatha", "Chondrichthyes", "Osteichthyes", "Actinopterygii", "Sarcopterygii"],
        excluded: &[],
        parent: Some("Animals"),
    },
    GroupDefinition { name: "Molluscs", rank: "phylum", included: &["Mollusca"], excluded: &[], parent: Some("Animals") },
    GroupDefinition {
        name: "Arthropods",
        rank: "phylum",
        included: &["Arthropoda"],
        excluded: &["Insecta"],
        parent: Some("Animals"),
    },
    GroupDefinition { name: "Insects", rank: "class", included: &["Insecta"], excluded: &[], parent: Some("Animals") },
    GroupDefinition { name: "Crustaceans", rank: "class", included: &["Crustacea"], excluded: &[], parent: Some("Arthropods") },
    GroupDefinition { name: "Plants", rank: "kingdom", included: &["Plantae"], excluded: &[], parent: None },
    GroupDefinition { name: "Angiosperms", rank: "phylum", included: &["Magnoliophyta"], excluded: &[], parent: Some("Plants") },
    GroupDefinition {
        name: "Gymnosperms",
        rank: "phylum",
        included: &["Pinophyta", "Cycadophyta"],
        excluded: &[],
        parent: Some("Plants"),
    },
    GroupDefinition { name: "FernsAndAllies", rank: "phylum", included: &["Pteridophyta"], excluded: &[], parent: Some("Plants") },
    GroupDefinition { name: "Mosses", rank: "phylum", included: &["Bryophyta"], excluded: &[], parent: Some("Plants") },
    GroupDefinition { name: "Fungi", rank: "kingdom", included: &["Fungi"], excluded: &[], parent: None },
    GroupDefinition { name: "Chromista", rank: "kingdom", included: &["Chromista"], excluded: &[], parent: None },
    GroupDefinition { name: "Protozoa", rank: "kingdom", included: &["Protozoa"], excluded: &[], parent: None },
    GroupDefinition { name: "Bacteria", rank: "kingdom", included: &["Bacteria"], excluded: &[], parent: None },
];

/// A resolved species group.
#[derive(Debug, Clone)]
pub struct SpeciesGroup {
    pub name: String,
    pub rank: String,
    pub included_taxa: Vec<String>,
    pub excluded_taxa: Vec<String>,
    pub included_intervals: Vec<TaxonInterval>,
    pub excluded_intervals: Vec<TaxonInterval>,
    pub parent: Option<String>,
}

impl SpeciesGroup {
    /// Membership test for a taxon's own left value. Exclusions veto.
    pub fn contains(&self, lft: i32) -> bool {
        if self.excluded_intervals.iter().any(|iv| iv.contains(lft)) {
            return false;
        }
        self.included_intervals.iter().any(|iv| iv.contains(lft))
    }
}

/// A resolved dynamic subgroup (labelled by the descriptor's common name).
#[derive(Debug, Clone)]
pub struct Subgroup {
    pub label: String,
    pub intervals: Vec<TaxonInterval>,
}

impl Subgroup {
    pub fn contains(&self, lft: i32) -> bool {
        self.intervals.iter().any(|iv| iv.contains(lft))
    }
}

/// JSON shape of the dynamic subgroup descriptor.
#[derive(Debug, Deserialize)]
pub struct SubgroupDescriptor {
    #[serde(rename = "speciesGroup")]
    pub species_group: String,
    #[serde(rename = "taxonRank", default)]
    pub taxon_rank: Option<String>,
    pub taxa: Vec<SubgroupTaxon>,
}

#[derive(Debug, Deserialize)]
pub struct SubgroupTaxon {
    pub name: String,
    pub common: String,
}

/// Resolved species groups and subgroups for the process lifetime.
pub struct SpeciesGroups {
    groups: Vec<SpeciesGroup>,
    subgroups: Vec<Subgroup>,
}

impl SpeciesGroups {
    /// Resolve the static hierarchy and load dynamic subgroups.
    ///
    /// Taxa that fail to resolve are dropped with a debug log; an
    /// unavailable subgroup source degrades to no subgroups.
    pub fn load(name_index: &dyn NameIndex, subgroup_source: Option<&str>) -> Self {
        let groups: Vec<SpeciesGroup> = STATIC_GROUPS
            .iter()
            .map(|def| resolve_group(name_index, def))
            .collect();

        let subgroups = match subgroup_source {
            Some(source) => match load_descriptors(source) {
                Ok(descriptors) => resolve_subgroups(name_index, &groups, &descriptors),
                Err(e) => {
                    warn!(source, error = %e, "Subgroup descriptor unavailable");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        info!(
            groups = groups.len(),
            subgroups = subgroups.len(),
            "Resolved species groups"
        );
        Self { groups, subgroups }
    }

    /// Build from already-resolved groups (for tests and tooling).
    pub fn from_parts(groups: Vec<SpeciesGroup>, subgroups: Vec<Subgroup>) -> Self {
        Self { groups, subgroups }
    }

    /// Group names containing the taxon, in definition order.
    pub fn groups_for(&self, lft: i32) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| g.contains(lft))
            .map(|g| g.name.as_str())
            .collect()
    }

    /// Subgroup labels containing the taxon, in definition order.
    pub fn subgroups_for(&self, lft: i32) -> Vec<&str> {
        self.subgroups
            .iter()
            .filter(|g| g.contains(lft))
            .map(|g| g.label.as_str())
            .collect()
    }

    pub fn groups(&self) -> &[SpeciesGroup] {
        &self.groups
    }
}

fn resolve_group(name_index: &dyn NameIndex, def: &GroupDefinition) -> SpeciesGroup {
    let resolve_all = |taxa: &[&str]| -> Vec<TaxonInterval> {
        taxa.iter()
            .filter_map(|name| resolve_interval(name_index, name, Some(def.rank)))
            .collect()
    };

    SpeciesGroup {
        name: def.name.to_string(),
        rank: def.rank.to_string(),
        included_taxa: def.included.iter().map(|s| s.to_string()).collect(),
        excluded_taxa: def.excluded.iter().map(|s| s.to_string()).collect(),
        included_intervals: resolve_all(def.included),
        excluded_intervals: resolve_all(def.excluded),
        parent: def.parent.map(String::from),
    }
}

/// Resolve one taxon name to its interval, following a synonym's accepted
/// LSID once and taking the first candidate of a homonym.
fn resolve_interval(
    name_index: &dyn NameIndex,
    name: &str,
    rank: Option<&str>,
) -> Option<TaxonInterval> {
    let matched = match name_index.search_for_record(name, rank) {
        Ok(m) => m,
        Err(NameIndexError::Homonym(mut alternatives)) => {
            if alternatives.is_empty() {
                return None;
            }
            alternatives.remove(0)
        }
        Err(e) => {
            debug!(name, error = %e, "Taxon failed to resolve, dropping");
            return None;
        }
    };

    let resolved = follow_accepted(name_index, matched);
    let interval = resolved.interval();
    if interval.is_none() {
        debug!(name, "Taxon resolved without interval, dropping");
    }
    interval
}

fn follow_accepted(name_index: &dyn NameIndex, matched: NameMatch) -> NameMatch {
    if !matched.is_synonym {
        return matched;
    }
    let Some(accepted) = matched.accepted_lsid.clone() else {
        return matched;
    };
    match name_index.search_for_lsid(&accepted) {
        Ok(accepted_match) => accepted_match,
        Err(_) => matched,
    }
}

fn load_descriptors(source: &str) -> Result<Vec<SubgroupDescriptor>, VocabError> {
    let contents = if source.starts_with("http://") || source.starts_with("https://") {
        reqwest::blocking::get(source)?.text()?
    } else {
        std::fs::read_to_string(source)?
    };
    Ok(serde_json::from_str(&contents)?)
}

fn resolve_subgroups(
    name_index: &dyn NameIndex,
    groups: &[SpeciesGroup],
    descriptors: &[SubgroupDescriptor],
) -> Vec<Subgroup> {
    let mut out = Vec::new();
    for descriptor in descriptors {
        for taxon in &descriptor.taxa {
            let intervals = match &descriptor.taxon_rank {
                Some(rank) => {
                    resolve_interval(name_index, &taxon.name, Some(rank))
                        .into_iter()
                        .collect()
                }
                // rank-less Plants entries inherit the static group's
                // resolved intervals by name
                None if descriptor.species_group == "Plants" => groups
                    .iter()
                    .find(|g| g.name == taxon.name)
                    .map(|g| g.included_intervals.clone())
                    .unwrap_or_default(),
                None => resolve_interval(name_index, &taxon.name, None)
                    .into_iter()
                    .collect(),
            };
            if intervals.is_empty() {
                debug!(name = %taxon.name, "Subgroup taxon did not resolve");
                continue;
            }
            out.push(Subgroup {
                label: taxon.common.clone(),
                intervals,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    /// Name index over a fixed table, homonym- and synonym-aware.
    struct TableNameIndex {
        by_name: HashMap<&'static str, NameMatch>,
        by_lsid: HashMap<&'static str, NameMatch>,
    }

    fn name_match(lsid: &str, left: i32, right: i32) -> NameMatch {
        NameMatch {
            lsid: lsid.to_string(),
            accepted_lsid: None,
            left: Some(left),
            right: Some(right),
            is_synonym: false,
        }
    }

    impl TableNameIndex {
        fn sample() -> Self {
            let mut by_name = HashMap::new();
            by_name.insert("Animalia", name_match("lsid:animalia", 1, 1000));
            by_name.insert("Mammalia", name_match("lsid:mammalia", 100, 199));
            by_name.insert("Aves", name_match("lsid:aves", 200, 299));
            by_name.insert("Arthropoda", name_match("lsid:arthropoda", 400, 699));
            by_name.insert("Insecta", name_match("lsid:insecta", 500, 599));
            by_name.insert("Crustacea", name_match("lsid:crustacea", 600, 650));
            by_name.insert("Plantae", name_match("lsid:plantae", 2000, 2999));
            by_name.insert("Magnoliophyta", name_match("lsid:magnolio", 2100, 2499));
            // Osteichthyes is recorded as a synonym of Actinopterygii
            by_name.insert(
                "Osteichthyes",
                NameMatch {
                    lsid: "lsid:osteichthyes".to_string(),
                    accepted_lsid: Some("lsid:actinopterygii".to_string()),
                    left: None,
                    right: None,
                    is_synonym: true,
                },
            );
            let mut by_lsid = HashMap::new();
            by_lsid.insert(
                "lsid:actinopterygii",
                name_match("lsid:actinopterygii", 300, 350),
            );
            Self { by_name, by_lsid }
        }
    }

    impl NameIndex for TableNameIndex {
        fn search_for_record(
            &self,
            name: &str,
            _rank: Option<&str>,
        ) -> Result<NameMatch, NameIndexError> {
            self.by_name
                .get(name)
                .cloned()
                .ok_or(NameIndexError::NotFound)
        }

        fn search_for_lsid(&self, lsid: &str) -> Result<NameMatch, NameIndexError> {
            self.by_lsid
                .get(lsid)
                .cloned()
                .ok_or(NameIndexError::NotFound)
        }
    }

    #[test]
    fn test_membership_basic() {
        let idx = TableNameIndex::sample();
        let groups = SpeciesGroups::load(&idx, None);

        // a mammal: inside Animalia and Mammalia
        assert_eq!(groups.groups_for(150), vec!["Animals", "Mammals"]);
        // a bird
        assert_eq!(groups.groups_for(250), vec!["Animals", "Birds"]);
    }

    #[test]
    fn test_exclusion_vetoes() {
        let idx = TableNameIndex::sample();
        let groups = SpeciesGroups::load(&idx, None);

        // an insect: in Arthropoda's interval but excluded from Arthropods
        let names = groups.groups_for(550);
        assert!(names.contains(&"Animals"));
        assert!(names.contains(&"Insects"));
        assert!(!names.contains(&"Arthropods"));

        // a crustacean: in Arthropods (no veto) and Crustaceans
        let names = groups.groups_for(620);
        assert!(names.contains(&"Arthropods"));
        assert!(names.contains(&"Crustaceans"));
    }

    #[test]
    fn test_synonym_followed_once() {
        let idx = TableNameIndex::sample();
        let groups = SpeciesGroups::load(&idx, None);

        // 320 lies only in Actinopterygii's interval, reached via the
        // Osteichthyes synonym
        let names = groups.groups_for(320);
        assert!(names.contains(&"Fishes"));
    }

    #[test]
    fn test_unresolvable_taxa_are_dropped() {
        let idx = TableNameIndex::sample();
        let groups = SpeciesGroups::load(&idx, None);

        let fungi = groups
            .groups()
            .iter()
            .find(|g| g.name == "Fungi")
            .unwrap();
        assert!(fungi.included_intervals.is_empty());
        assert!(groups.groups_for(9999).is_empty());
    }

    #[test]
    fn test_homonym_uses_first_candidate() {
        struct HomonymIndex;
        impl NameIndex for HomonymIndex {
            fn search_for_record(
                &self,
                name: &str,
                _rank: Option<&str>,
            ) -> Result<NameMatch, NameIndexError> {
                if name == "Animalia" {
                    Err(NameIndexError::Homonym(vec![
                        name_match("lsid:first", 1, 10),
                        name_match("lsid:second", 90, 95),
                    ]))
                } else {
                    Err(NameIndexError::NotFound)
                }
            }
        }

        let groups = SpeciesGroups::load(&HomonymIndex, None);
        assert_eq!(groups.groups_for(5), vec!["Animals"]);
        assert!(groups.groups_for(92).is_empty());
    }

    #[test]
    fn test_subgroups_from_descriptor() {
        let idx = TableNameIndex::sample();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subgroups.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"[
              {{"speciesGroup":"Animals","taxonRank":"class",
                "taxa":[{{"name":"Mammalia","common":"Mammals"}},
                         {{"name":"Aves","common":"Birds"}}]}},
              {{"speciesGroup":"Plants",
                "taxa":[{{"name":"Angiosperms","common":"Flowering plants"}}]}}
            ]"#
        )
        .unwrap();

        let groups = SpeciesGroups::load(&idx, path.to_str());
        assert_eq!(groups.subgroups_for(150), vec!["Mammals"]);
        // rank-less Plants entry inherits Angiosperms' static intervals
        assert_eq!(groups.subgroups_for(2200), vec!["Flowering plants"]);
        assert!(groups.subgroups_for(999).is_empty());
    }

    #[test]
    fn test_missing_descriptor_degrades() {
        let idx = TableNameIndex::sample();
        let groups = SpeciesGroups::load(&idx, Some("/nonexistent/subgroups.json"));
        assert!(groups.subgroups_for(150).is_empty());
    }
}
