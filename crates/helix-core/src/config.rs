//! Loader configuration: TOML file, then environment, then CLI flags.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HelixError, HelixResult};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: None,
            database: "neo4j".to_string(),
            max_connections: 4,
            fetch_size: 200,
        }
    }
}

/// Knobs for the batch engine and record sources.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    pub batch_size: usize,
    pub data_dir: PathBuf,
    /// Re-submit a failed batch one record at a time for precise attribution.
    pub retry_failed_batches: bool,
    /// How many error messages the statistics report lists.
    pub max_reported_errors: usize,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            data_dir: PathBuf::from("data"),
            retry_failed_batches: false,
            max_reported_errors: 5,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HelixConfig {
    #[serde(alias = "neo4j")]
    pub graph: GraphConfig,
    pub load: LoadSettings,
}

impl HelixConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> HelixResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file.
    pub fn from_file(path: &Path) -> HelixResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HelixError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Load from an optional file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> HelixResult<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `NEO4J_*` / `HELIX_*` overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> HelixResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(uri) = lookup("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.graph.password = Some(password);
        }
        if let Some(database) = lookup("NEO4J_DATABASE") {
            self.graph.database = database;
        }
        if let Some(size) = lookup("HELIX_BATCH_SIZE") {
            self.load.batch_size = size
                .parse()
                .map_err(|_| HelixError::config(format!("HELIX_BATCH_SIZE is not a number: {size}")))?;
        }
        if let Some(dir) = lookup("HELIX_DATA_DIR") {
            self.load.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Check settings that would make a run meaningless.
    ///
    /// `needs_password` is false for in-memory runs.
    pub fn validate(&self, needs_password: bool) -> HelixResult<()> {
        if self.load.batch_size == 0 {
            return Err(HelixError::config("batch_size must be at least 1"));
        }
        if needs_password && self.graph.password.as_deref().unwrap_or("").is_empty() {
            return Err(HelixError::config(
                "Neo4j password not provided. Set NEO4J_PASSWORD or pass --password.",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = HelixConfig::default();
        assert_eq!(config.graph.uri, "bolt://localhost:7687");
        assert_eq!(config.load.batch_size, 100);
        assert!(!config.load.retry_failed_batches);
    }

    #[test]
    fn test_partial_toml() {
        let config = HelixConfig::from_toml_str(
            r#"
            [neo4j]
            uri = "bolt://graph:7687"
            password = "secret"

            [load]
            batch_size = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.graph.uri, "bolt://graph:7687");
        assert_eq!(config.graph.user, "neo4j");
        assert_eq!(config.load.batch_size, 500);
        assert_eq!(config.load.max_reported_errors, 5);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NEO4J_PASSWORD", "pw"),
            ("HELIX_BATCH_SIZE", "250"),
            ("HELIX_DATA_DIR", "/srv/data"),
        ]
        .into_iter()
        .collect();
        let mut config = HelixConfig::default();
        config
            .apply_env(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.graph.password.as_deref(), Some("pw"));
        assert_eq!(config.load.batch_size, 250);
        assert_eq!(config.load.data_dir, PathBuf::from("/srv/data"));

        let mut bad = HelixConfig::default();
        let err = bad
            .apply_env(|k| (k == "HELIX_BATCH_SIZE").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, HelixError::Config(_)));
    }

    #[test]
    fn test_validate() {
        let mut config = HelixConfig::default();
        assert!(config.validate(false).is_ok());
        assert!(config.validate(true).is_err());
        config.graph.password = Some("pw".into());
        assert!(config.validate(true).is_ok());
        config.load.batch_size = 0;
        assert!(config.validate(false).is_err());
    }
}
