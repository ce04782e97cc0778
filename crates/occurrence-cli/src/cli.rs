//! CLI argument parsing for the occurrence pipeline.

use clap::{Parser, Subcommand};

/// Occurrence indexing pipeline
///
/// Bulk and incremental indexing of occurrence records into the search
/// index.
#[derive(Parser, Debug)]
#[command(name = "occurrence-index")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides the default location)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Pipeline commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index every row in the store
    BulkIndex {
        /// Optimize the index after the run
        #[arg(long)]
        optimise: bool,

        /// Tag emitted documents with this batch id
        #[arg(long, default_value = "")]
        batch_id: String,
    },

    /// Index rows modified at-or-after a watermark
    Reindex {
        /// Watermark, ISO date or date-time (e.g. 2024-01-01T00:00:00)
        #[arg(long)]
        start_date: String,
    },

    /// Optimize the index
    Optimize,

    /// Remove every document from the index
    EmptyIndex,
}
