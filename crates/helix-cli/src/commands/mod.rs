//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use helix_core::HelixConfig;
use helix_graph::GraphLoader;

pub mod clear;
pub mod load;
pub mod ping;
pub mod schema;
pub mod status;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HelixGraph - bulk graph loader for Neo4j
#[derive(Parser)]
#[command(name = "helix")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true, env = "HELIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Neo4j connection URI
    #[arg(long, global = true, env = "NEO4J_URI")]
    pub uri: Option<String>,

    /// Neo4j user
    #[arg(long, global = true, env = "NEO4J_USER")]
    pub user: Option<String>,

    /// Neo4j password
    #[arg(long, global = true, env = "NEO4J_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Neo4j database name
    #[arg(long, global = true, env = "NEO4J_DATABASE")]
    pub database: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that Neo4j answers
    Ping,

    /// Load a dataset
    Load(load::LoadArgs),

    /// Apply a dataset's constraints and indexes without loading data
    Schema(schema::SchemaArgs),

    /// Show node and relationship counts
    Status,

    /// Delete every node and relationship
    Clear(clear::ClearArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.resolve_config()?;

        match self.command {
            Commands::Ping => ping::execute(&config).await,
            Commands::Load(args) => load::execute(args, config).await,
            Commands::Schema(args) => schema::execute(args, &config).await,
            Commands::Status => status::execute(&config).await,
            Commands::Clear(args) => clear::execute(args, &config).await,
        }
    }

    /// File, then environment, then flags.
    fn resolve_config(&self) -> Result<HelixConfig> {
        let mut config = HelixConfig::load(self.config.as_deref()).with_context(|| {
            match &self.config {
                Some(path) => format!("Failed to load configuration from {}", path.display()),
                None => "Failed to load configuration".to_string(),
            }
        })?;

        if let Some(uri) = &self.uri {
            config.graph.uri = uri.clone();
        }
        if let Some(user) = &self.user {
            config.graph.user = user.clone();
        }
        if let Some(password) = &self.password {
            config.graph.password = Some(password.clone());
        }
        if let Some(database) = &self.database {
            config.graph.database = database.clone();
        }
        Ok(config)
    }
}

/// Connect to Neo4j, giving up after [`CONNECT_TIMEOUT`].
pub(crate) async fn connect(config: &HelixConfig) -> Result<GraphLoader> {
    config.validate(true)?;

    let loader = tokio::time::timeout(
        CONNECT_TIMEOUT,
        GraphLoader::connect(&config.graph, config.load.clone()),
    )
    .await
    .map_err(|_| anyhow!("Timed out connecting to {}", config.graph.uri))?
    .with_context(|| format!("Failed to connect to Neo4j at {}", config.graph.uri))?;

    Ok(loader)
}
