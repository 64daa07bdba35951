//! Reconciliation query against the live store.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use helix_core::{HelixResult, LoadStats};

use crate::session::GraphSession;

/// Authoritative counts held by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStatistics {
    pub total_nodes: u64,
    pub total_relationships: u64,
    pub nodes_by_label: IndexMap<String, u64>,
    pub relationships_by_type: IndexMap<String, u64>,
}

/// Query node and relationship counts by label and type.
pub async fn get_graph_statistics(session: &dyn GraphSession) -> HelixResult<GraphStatistics> {
    let nodes_by_label = session.node_counts().await?;
    let relationships_by_type = session.relationship_counts().await?;
    Ok(GraphStatistics {
        total_nodes: nodes_by_label.values().sum(),
        total_relationships: relationships_by_type.values().sum(),
        nodes_by_label,
        relationships_by_type,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    Label,
    RelationshipType,
}

/// A label or type whose submitted count differs from what the store holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Drift {
    pub kind: DriftKind,
    pub name: String,
    pub submitted: u64,
    pub stored: u64,
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DriftKind::Label => "label",
            DriftKind::RelationshipType => "relationship type",
        };
        write!(
            f,
            "{} {}: submitted {}, stored {}",
            kind, self.name, self.submitted, self.stored
        )
    }
}

/// Compare the run's submission counts with the store's counts.
pub fn reconcile(stats: &LoadStats, graph: &GraphStatistics) -> Vec<Drift> {
    let nodes = stats.nodes_created.iter().filter_map(|(label, &submitted)| {
        let stored = graph.nodes_by_label.get(label).copied().unwrap_or(0);
        (submitted != stored).then(|| Drift {
            kind: DriftKind::Label,
            name: label.clone(),
            submitted,
            stored,
        })
    });
    let relationships = stats
        .relationships_created
        .iter()
        .filter_map(|(rel_type, &submitted)| {
            let stored = graph.relationships_by_type.get(rel_type).copied().unwrap_or(0);
            (submitted != stored).then(|| Drift {
                kind: DriftKind::RelationshipType,
                name: rel_type.clone(),
                submitted,
                stored,
            })
        });
    nodes.chain(relationships).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::session::GraphSession;
    use crate::template::{NodePattern, UpsertTemplate};
    use helix_core::Record;

    #[tokio::test]
    async fn test_statistics_and_drift() {
        let graph = MemoryGraph::new();
        let template = UpsertTemplate::new("skills").merge_node(NodePattern::new("s", "Skill").key("skill_id"));
        let batch = vec![
            Record::new().with("skill_id", "S1"),
            Record::new().with("skill_id", "S1"),
            Record::new().with("skill_id", "S2"),
        ];
        graph.write_batch(&template, &batch).await.unwrap();

        let statistics = get_graph_statistics(&graph).await.unwrap();
        assert_eq!(statistics.total_nodes, 2);
        assert_eq!(statistics.nodes_by_label["Skill"], 2);
        assert_eq!(statistics.total_relationships, 0);

        let mut stats = LoadStats::new();
        stats.add_nodes("Skill", 3);
        stats.add_relationships("HAS_SKILL", 0);
        let drift = reconcile(&stats, &statistics);
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].to_string(), "label Skill: submitted 3, stored 2");
    }
}
