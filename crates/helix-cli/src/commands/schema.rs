//! Schema setup without loading data.

use anyhow::{Context, Result};
use clap::Args;

use helix_core::HelixConfig;
use helix_loaders::Domain;

use crate::output;

#[derive(Args)]
pub struct SchemaArgs {
    /// Dataset whose schema to apply (hr, marketing, procurement, procurement-csv)
    pub domain: Domain,
}

pub async fn execute(args: SchemaArgs, config: &HelixConfig) -> Result<()> {
    let mut loader = super::connect(config).await?;
    let definition = args
        .domain
        .loader(&args.domain.default_data(&config.load.data_dir))
        .schema();

    let report = loader
        .ensure_schema(&definition)
        .await
        .with_context(|| format!("Failed to apply the {} schema", args.domain))?;

    output::print_schema_report(&args.domain.to_string(), &report);
    Ok(())
}
