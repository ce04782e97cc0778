//! Occurrence indexing pipeline CLI.
//!
//! # Usage
//!
//! ```bash
//! occurrence-index bulk-index [--optimise] [--batch-id ID]
//! occurrence-index reindex --start-date 2024-01-01T00:00:00
//! occurrence-index optimize
//! occurrence-index empty-index
//! ```
//!
//! Configuration is loaded in order (later sources override earlier):
//! built-in defaults, config file, environment variables (OCCURRENCE_*).

use anyhow::{Context, Result};
use clap::Parser;

use occurrence_cli::commands::{init_logging, run_command};
use occurrence_cli::Cli;
use occurrence_types::Settings;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings =
        Settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_logging(&settings, cli.log_level.as_deref());

    run_command(settings, cli.command)
}
