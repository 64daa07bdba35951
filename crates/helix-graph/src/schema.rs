//! Neo4j schema declarations (uniqueness constraints and indexes).

use tracing::{debug, info, warn};

use helix_core::{HelixResult, LoadStats};

use crate::error::GraphError;
use crate::session::GraphSession;
use crate::template::quote_ident;

/// One constraint or index declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatement {
    UniqueConstraint {
        name: String,
        label: String,
        property: String,
    },
    Index {
        name: String,
        label: String,
        properties: Vec<String>,
    },
}

impl SchemaStatement {
    pub fn unique(name: &str, label: &str, property: &str) -> Self {
        Self::UniqueConstraint {
            name: name.to_string(),
            label: label.to_string(),
            property: property.to_string(),
        }
    }

    pub fn index(name: &str, label: &str, properties: &[&str]) -> Self {
        Self::Index {
            name: name.to_string(),
            label: label.to_string(),
            properties: properties.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::UniqueConstraint { name, .. } | Self::Index { name, .. } => name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::UniqueConstraint { label, .. } | Self::Index { label, .. } => label,
        }
    }

    /// Idempotent Cypher for this declaration.
    pub fn cypher(&self) -> String {
        match self {
            Self::UniqueConstraint {
                name,
                label,
                property,
            } => format!(
                "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
                quote_ident(name),
                quote_ident(label),
                quote_ident(property)
            ),
            Self::Index {
                name,
                label,
                properties,
            } => {
                let props: Vec<String> = properties
                    .iter()
                    .map(|p| format!("n.{}", quote_ident(p)))
                    .collect();
                format!(
                    "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON ({})",
                    quote_ident(name),
                    quote_ident(label),
                    props.join(", ")
                )
            }
        }
    }
}

/// The constraints and indexes one domain relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDefinition {
    pub statements: Vec<SchemaStatement>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unique(mut self, name: &str, label: &str, property: &str) -> Self {
        self.statements
            .push(SchemaStatement::unique(name, label, property));
        self
    }

    pub fn index(mut self, name: &str, label: &str, properties: &[&str]) -> Self {
        self.statements
            .push(SchemaStatement::index(name, label, properties));
        self
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// How a schema pass went.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub applied: usize,
    pub already_present: usize,
    pub failed: Vec<String>,
}

/// Declare every constraint and index of a definition.
///
/// Safe to run multiple times. A declaration that already exists counts as
/// success; any other rejection is logged and recorded, and the pass moves on.
/// Only an unreachable store aborts.
pub async fn ensure_schema(
    session: &dyn GraphSession,
    definition: &SchemaDefinition,
    stats: &mut LoadStats,
) -> HelixResult<SchemaReport> {
    info!("Initializing Neo4j schema...");

    let mut report = SchemaReport::default();
    for statement in &definition.statements {
        match session.apply_schema(statement).await {
            Ok(()) => {
                debug!(name = statement.name(), "Schema statement applied");
                report.applied += 1;
            }
            Err(GraphError::AlreadyExists(msg)) => {
                debug!(name = statement.name(), "Already present: {}", msg);
                report.already_present += 1;
            }
            Err(err @ GraphError::Connection(_)) => return Err(err.into()),
            Err(err) => {
                warn!(name = statement.name(), "Schema statement failed: {}", err);
                let msg = format!("schema {}: {}", statement.name(), err);
                stats.add_error(msg.clone());
                report.failed.push(msg);
            }
        }
    }

    info!(
        "Neo4j schema initialized ({} statements, {} already present, {} failed)",
        report.applied,
        report.already_present,
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;

    fn skills_schema() -> SchemaDefinition {
        SchemaDefinition::new()
            .unique("skill_id_unique", "Skill", "skill_id")
            .index("skill_name", "Skill", &["name"])
    }

    #[test]
    fn test_cypher_rendering() {
        let schema = skills_schema();
        assert_eq!(
            schema.statements[0].cypher(),
            "CREATE CONSTRAINT skill_id_unique IF NOT EXISTS FOR (n:Skill) REQUIRE n.skill_id IS UNIQUE"
        );
        let composite = SchemaStatement::index("campaign_dates", "MarketingCampaign", &["start_date", "end_date"]);
        assert_eq!(
            composite.cypher(),
            "CREATE INDEX campaign_dates IF NOT EXISTS FOR (n:MarketingCampaign) ON (n.start_date, n.end_date)"
        );
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let graph = MemoryGraph::new();
        let mut stats = LoadStats::new();

        let first = ensure_schema(&graph, &skills_schema(), &mut stats).await.unwrap();
        assert_eq!(first.applied, 2);

        let second = ensure_schema(&graph, &skills_schema(), &mut stats).await.unwrap();
        assert_eq!(second.applied, 0);
        assert_eq!(second.already_present, 2);
        assert!(stats.errors.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_statement_is_recorded_not_raised() {
        let graph = MemoryGraph::new();
        graph.fail_schema_when(|s| s.name() == "skill_name");
        let mut stats = LoadStats::new();

        let report = ensure_schema(&graph, &skills_schema(), &mut stats).await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.records_failed, 0);
    }

    #[tokio::test]
    async fn test_unreachable_store_aborts() {
        let graph = MemoryGraph::new();
        graph.set_offline(true);
        let mut stats = LoadStats::new();

        let err = ensure_schema(&graph, &skills_schema(), &mut stats).await.unwrap_err();
        assert!(err.is_connection());
    }
}
