//! The mode-agnostic index backend interface.
//!
//! Three deployment modes implement this trait: embedded single-node,
//! single remote endpoint, and cluster. The indexing engine never branches
//! on mode.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::document::SearchDocument;
use crate::error::IndexError;
use crate::schema::IndexSchema;

/// Default collection name used by the cluster client.
pub const DEFAULT_CLUSTER_COLLECTION: &str = "biocache1";

/// A field value read back from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitValue {
    One(String),
    Many(Vec<String>),
}

impl HitValue {
    pub fn first(&self) -> &str {
        match self {
            HitValue::One(v) => v,
            HitValue::Many(vs) => vs.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn all(&self) -> Vec<&str> {
        match self {
            HitValue::One(v) => vec![v.as_str()],
            HitValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// One materialized hit: field name to value, lists for fields declared
/// multi-valued by the request.
pub type SearchHit = HashMap<String, HitValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// A paged read against the index.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub fields: Vec<String>,
    pub query: String,
    pub filters: Vec<String>,
    pub sort: Option<String>,
    pub direction: SortDirection,
    pub start: usize,
    pub rows: usize,
    /// Fields materialized as lists in the hits.
    pub multivalued_fields: HashSet<String>,
}

impl PageRequest {
    pub fn new(query: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            query: query.into(),
            rows: 10,
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: &[&str]) -> Self {
        self.filters = filters.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort = Some(field.to_string());
        self.direction = direction;
        self
    }

    pub fn with_window(mut self, start: usize, rows: usize) -> Self {
        self.start = start;
        self.rows = rows;
        self
    }

    pub fn with_multivalued(mut self, fields: &[&str]) -> Self {
        self.multivalued_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

/// Uniform facade over the index deployment modes.
///
/// Runtime failures of write operations are the caller's to log and
/// swallow; only construction is allowed to abort the pipeline.
pub trait IndexBackend: Send + Sync {
    /// Add a batch of documents. Re-adding an id replaces the document.
    fn add_docs(&self, docs: &[SearchDocument]) -> Result<(), IndexError>;

    /// Commit. A soft commit (`hard = false`) opens a new searcher; a hard
    /// commit additionally guarantees durability.
    fn commit(&self, hard: bool) -> Result<(), IndexError>;

    fn delete_by_query(&self, query: &str) -> Result<(), IndexError>;

    fn delete_by_field(&self, field: &str, value: &str) -> Result<(), IndexError> {
        self.delete_by_query(&format!("{field}:\"{value}\""))
    }

    /// Remove every document.
    fn empty_index(&self) -> Result<(), IndexError> {
        self.delete_by_query("*:*")
    }

    fn optimize(&self) -> Result<(), IndexError>;

    fn reload(&self) -> Result<(), IndexError>;

    fn shutdown(&self) -> Result<(), IndexError>;

    /// Matching-document count for a query.
    fn total_count(&self, query: &str, filters: &[String]) -> Result<u64, IndexError>;

    /// One facet page: distinct values of `field` with their counts,
    /// ordered by count descending then value, windowed by offset/limit.
    fn facets(
        &self,
        field: &str,
        query: &str,
        filters: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, IndexError>;

    /// One result page under a stable sort.
    fn page(&self, request: &PageRequest) -> Result<Vec<SearchHit>, IndexError>;
}

/// Deployment mode, selected by a URL-shaped configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMode {
    /// Filesystem path (optionally ending in a config file name).
    Embedded(PathBuf),
    /// Single http(s) endpoint.
    Remote(String),
    /// `host:port` list plus collection name.
    Cluster(Vec<String>, String),
}

impl BackendMode {
    /// Classify a configuration value.
    pub fn parse(value: &str) -> Result<Self, IndexError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(IndexError::Config("empty index url".to_string()));
        }
        if value.starts_with("http://") || value.starts_with("https://") {
            return Ok(BackendMode::Remote(value.trim_end_matches('/').to_string()));
        }
        let hosts: Vec<&str> = value.split(',').map(str::trim).collect();
        if hosts.iter().all(|h| is_host_port(h)) {
            return Ok(BackendMode::Cluster(
                hosts.into_iter().map(String::from).collect(),
                DEFAULT_CLUSTER_COLLECTION.to_string(),
            ));
        }
        let mut path = PathBuf::from(value);
        if path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("xml"))
            .unwrap_or(false)
        {
            if let Some(parent) = path.parent() {
                path = parent.to_path_buf();
            }
        }
        Ok(BackendMode::Embedded(path))
    }

    /// Build the backend for this mode.
    pub fn connect(
        &self,
        schema: Arc<IndexSchema>,
        writer_memory_mb: usize,
    ) -> Result<Arc<dyn IndexBackend>, IndexError> {
        match self {
            BackendMode::Embedded(path) => Ok(Arc::new(crate::embedded::EmbeddedIndex::open_or_create(
                path,
                schema,
                writer_memory_mb,
            )?)),
            BackendMode::Remote(url) => Ok(Arc::new(crate::remote::RemoteIndex::new(url)?)),
            BackendMode::Cluster(hosts, collection) => Ok(Arc::new(
                crate::remote::ClusterIndex::new(hosts, collection)?,
            )),
        }
    }
}

fn is_host_port(s: &str) -> bool {
    match s.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !port.is_empty()
                && port.chars().all(|c| c.is_ascii_digit())
                && !host.contains('/')
        }
        None => false,
    }
}
