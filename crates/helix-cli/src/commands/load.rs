//! Dataset loading.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use helix_core::HelixConfig;
use helix_graph::GraphLoader;
use helix_loaders::Domain;

use crate::output::{self, StageProgress};

#[derive(Args)]
pub struct LoadArgs {
    /// Dataset to load (hr, marketing, procurement, procurement-csv)
    pub domain: Domain,

    /// Data directory or dataset file (defaults to <data_dir>/<domain>)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Records per batch, for stages that do not set their own size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Wipe the database before loading
    #[arg(long)]
    pub clear: bool,

    /// Retry failed batches one record at a time
    #[arg(long)]
    pub retry_failed: bool,

    /// Load into an in-memory graph instead of Neo4j
    #[arg(long)]
    pub dry_run: bool,

    /// Print the load summary as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: LoadArgs, mut config: HelixConfig) -> Result<()> {
    if let Some(size) = args.batch_size {
        config.load.batch_size = size;
    }
    if args.retry_failed {
        config.load.retry_failed_batches = true;
    }

    let mut loader = if args.dry_run {
        config.validate(false)?;
        GraphLoader::in_memory(config.load.clone())
    } else {
        super::connect(&config).await?
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current batch");
            on_interrupt.cancel();
        }
    });
    loader = loader.with_cancellation(cancel);
    if !args.json {
        loader = loader.with_observer(Box::new(StageProgress::new()));
    }

    if args.clear {
        loader.clear_database().await.context("Failed to clear the database")?;
    }

    let data = args
        .data
        .clone()
        .unwrap_or_else(|| args.domain.default_data(&config.load.data_dir));
    let domain_loader = args.domain.loader(&data);

    if !args.json {
        println!(
            "{} {} from {} into {}",
            "Loading".bold(),
            args.domain.to_string().cyan(),
            data.display(),
            loader.describe().dimmed()
        );
    }

    let result = domain_loader.load(&mut loader).await;
    loader.print_statistics(domain_loader.name());

    let outcome = result.with_context(|| format!("{} load failed", domain_loader.name()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        output::print_stages(&outcome.stages);
        output::print_outcome(&outcome, config.load.max_reported_errors);
    }

    Ok(())
}
