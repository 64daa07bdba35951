//! Liveness check.

use anyhow::Result;
use colored::Colorize;

use helix_core::HelixConfig;

/// Exits with status 1 when Neo4j cannot be reached.
pub async fn execute(config: &HelixConfig) -> Result<()> {
    match super::connect(config).await {
        Ok(loader) if loader.test_connection().await => {
            println!("{} Neo4j is reachable at {}", "✓".green().bold(), loader.describe().cyan());
            Ok(())
        }
        Ok(_) => {
            eprintln!("{} Neo4j at {} did not answer", "✗".red().bold(), config.graph.uri);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
