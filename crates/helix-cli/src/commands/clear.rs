//! Database wipe.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;

use helix_core::HelixConfig;

#[derive(Args)]
pub struct ClearArgs {
    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

pub async fn execute(args: ClearArgs, config: &HelixConfig) -> Result<()> {
    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete every node and relationship in {} ({})?",
                config.graph.database, config.graph.uri
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Cancelled.".dimmed());
            return Ok(());
        }
    }

    let loader = super::connect(config).await?;
    loader.clear_database().await?;
    println!("{} Database cleared", "✓".green().bold());
    Ok(())
}
