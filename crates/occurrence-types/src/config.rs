//! Configuration loading for the occurrence pipeline.
//!
//! Layered config: defaults -> config file -> env vars. Config file at
//! ~/.config/occurrence-pipeline/config.toml unless an explicit path is
//! supplied. Unknown keys are ignored.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::error::OccurrenceError;

/// Settings for the index backend and batching protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Backend location. A filesystem path selects the embedded index, an
    /// http(s) URL a single remote endpoint, and a `host:port[,host:port]`
    /// list a cluster.
    #[serde(default)]
    pub index_url: String,

    /// Documents buffered before a flush to the backend.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Flushed documents between hard commits.
    #[serde(default = "default_hard_commit_size")]
    pub hard_commit_size: usize,

    /// Update threads for the bulk loader.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Memory budget per index writer, in MB (embedded mode).
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,
}

fn default_batch_size() -> usize {
    500
}

fn default_hard_commit_size() -> usize {
    5000
}

fn default_worker_threads() -> usize {
    4
}

fn default_writer_memory_mb() -> usize {
    50
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            index_url: String::new(),
            batch_size: default_batch_size(),
            hard_commit_size: default_hard_commit_size(),
            worker_threads: default_worker_threads(),
            writer_memory_mb: default_writer_memory_mb(),
        }
    }
}

/// Settings for vocabulary and cache sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VocabSettings {
    /// Dynamic species-subgroup descriptor: file path or URL.
    #[serde(default)]
    pub subgroups_source: Option<String>,

    /// Single-column text file of accepted checklist GUIDs.
    #[serde(default)]
    pub checklist_path: Option<String>,

    /// JSON file mapping taxon LSIDs to species-list UIDs.
    #[serde(default)]
    pub species_lists_path: Option<String>,

    /// TSV name-matching data (name, rank, lsid, left, right).
    #[serde(default)]
    pub name_index_path: Option<String>,
}

/// Main application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the local occurrence row store.
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Log level when RUST_LOG is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub vocab: VocabSettings,

    /// Misc-property names indexed with a typed suffix appended when none
    /// applies (`extra.misc.fields` in the original deployment).
    #[serde(default)]
    pub extra_misc_fields: String,

    /// Column names omitted from the sensitive CSV emission.
    #[serde(default)]
    pub exclude_sensitive_values: String,

    /// Sampled environmental/contextual layer names, comma separated, in
    /// CSV header order.
    #[serde(default)]
    pub sample_fields: String,

    /// Emit OS grid-reference fields (feature flag).
    #[serde(default)]
    pub grid_ref_indexing_enabled: bool,
}

fn default_store_path() -> String {
    "./occurrence-store".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            log_level: default_log_level(),
            index: IndexSettings::default(),
            vocab: VocabSettings::default(),
            extra_misc_fields: String::new(),
            exclude_sensitive_values: String::new(),
            sample_fields: String::new(),
            grid_ref_indexing_enabled: false,
        }
    }
}

impl Settings {
    /// Load settings from defaults, optional config file, then environment
    /// variables prefixed `OCCURRENCE_` (e.g. OCCURRENCE_INDEX__INDEX_URL).
    pub fn load(config_path: Option<&str>) -> Result<Self, OccurrenceError> {
        let mut builder = Config::builder();

        let path = match config_path {
            Some(p) => Some(PathBuf::from(p)),
            None => default_config_file(),
        };
        if let Some(p) = path {
            if p.exists() {
                debug!(path = ?p, "Loading config file");
                builder = builder.add_source(File::from(p));
            }
        }

        builder = builder.add_source(Environment::with_prefix("OCCURRENCE").separator("__"));

        let settings: Settings = builder
            .build()
            .map_err(|e| OccurrenceError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| OccurrenceError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate required values and internal consistency.
    pub fn validate(&self) -> Result<(), OccurrenceError> {
        if self.index.index_url.is_empty() {
            return Err(OccurrenceError::Config(
                "index.index_url is required".to_string(),
            ));
        }
        if self.index.batch_size == 0 {
            return Err(OccurrenceError::Config(
                "index.batch_size must be > 0".to_string(),
            ));
        }
        if self.index.hard_commit_size < self.index.batch_size {
            return Err(OccurrenceError::Config(
                "index.hard_commit_size must be >= index.batch_size".to_string(),
            ));
        }
        Ok(())
    }

    /// Comma-separated `sample_fields` as a list, empties dropped.
    pub fn sample_field_names(&self) -> Vec<String> {
        split_csv(&self.sample_fields)
    }

    /// Comma-separated `extra_misc_fields` as a list, empties dropped.
    pub fn extra_misc_field_names(&self) -> Vec<String> {
        split_csv(&self.extra_misc_fields)
    }

    /// Comma-separated `exclude_sensitive_values` as a list, empties dropped.
    pub fn sensitive_column_names(&self) -> Vec<String> {
        split_csv(&self.exclude_sensitive_values)
    }
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("au", "occurrence", "occurrence-pipeline")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
