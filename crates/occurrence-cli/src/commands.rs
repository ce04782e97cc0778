//! Command implementations: context assembly and the pipeline runs.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use occurrence_index::{occurrence_schema, BackendMode, IndexService};
use occurrence_pipeline::{bulk_index, reindex_since, IndexOptions, Indexer, IndexingContext};
use occurrence_store::RocksOccurrenceStore;
use occurrence_types::{EmptyNameIndex, NameIndex, Settings};
use occurrence_vocab::TsvNameIndex;

use crate::cli::Commands;

/// Install the tracing subscriber: RUST_LOG wins, then the CLI flag, then
/// the configured level.
pub fn init_logging(settings: &Settings, cli_level: Option<&str>) {
    let level = cli_level.unwrap_or(&settings.log_level);
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Run one CLI command to completion.
pub fn run_command(settings: Settings, command: Commands) -> Result<()> {
    let schema = Arc::new(occurrence_schema());
    let mode = BackendMode::parse(&settings.index.index_url)
        .context("index.index_url is not a valid backend location")?;
    let backend = mode
        .connect(schema.clone(), settings.index.writer_memory_mb)
        .context("failed to initialize the index backend")?;
    let service = IndexService::new(
        backend,
        schema,
        settings.index.batch_size,
        settings.index.hard_commit_size,
        settings.index.worker_threads,
    );

    match command {
        Commands::BulkIndex { optimise, batch_id } => {
            let ctx = build_context(settings, service)?;
            let mut indexer = Indexer::new(ctx.clone());
            let opts = IndexOptions {
                batch: true,
                batch_id,
                misc_index_properties: ctx.settings.extra_misc_field_names(),
                ..Default::default()
            };
            let stats = bulk_index(ctx.store.as_ref(), &mut indexer, &opts)?;
            ctx.service.finalise(optimise, true)?;
            info!(
                indexed = stats.indexed,
                skipped = stats.skipped,
                "Bulk index finished"
            );
        }
        Commands::Reindex { start_date } => {
            let since = parse_start_date(&start_date)
                .with_context(|| format!("unparseable start date: {start_date}"))?;
            let ctx = build_context(settings, service)?;
            let mut indexer = Indexer::new(ctx.clone());
            let opts = IndexOptions {
                batch: true,
                misc_index_properties: ctx.settings.extra_misc_field_names(),
                ..Default::default()
            };
            let stats = reindex_since(ctx.store.as_ref(), &mut indexer, &opts, since)?;
            ctx.service.finalise(false, true)?;
            info!(
                indexed = stats.indexed,
                skipped = stats.skipped,
                "Reindex finished"
            );
        }
        Commands::Optimize => {
            service.optimize()?;
            info!("Optimize complete");
        }
        Commands::EmptyIndex => {
            service.empty_index()?;
            service.hard_commit()?;
            info!("Index emptied");
        }
    }
    Ok(())
}

fn build_context(settings: Settings, service: Arc<IndexService>) -> Result<Arc<IndexingContext>> {
    let store = RocksOccurrenceStore::open(Path::new(&settings.store_path))
        .context("failed to open the occurrence store")?;

    let name_index: Box<dyn NameIndex> = match &settings.vocab.name_index_path {
        Some(path) => Box::new(
            TsvNameIndex::load(path).context("failed to load the name index")?,
        ),
        None => Box::new(EmptyNameIndex),
    };

    Ok(Arc::new(IndexingContext::build(
        settings,
        service,
        Arc::new(store),
        name_index.as_ref(),
    )))
}

fn parse_start_date(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
