//! Neo4j connection client.

use async_trait::async_trait;
use indexmap::IndexMap;
use neo4rs::{
    BoltBoolean, BoltFloat, BoltInteger, BoltList, BoltMap, BoltNull, BoltString, BoltType,
    ConfigBuilder, Graph, Query,
};
use serde_json::Value;
use tracing::debug;

use helix_core::{GraphConfig, Record};

use crate::error::{GraphError, GraphResult};
use crate::schema::SchemaStatement;
use crate::session::{GraphSession, WriteOutcome};
use crate::template::UpsertTemplate;

/// Client for a Neo4j database.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
    uri: String,
    database: String,
}

impl GraphClient {
    /// Create a new GraphClient from config.
    ///
    /// neo4rs builds its connection pool lazily, so a `RETURN 1` ping runs
    /// right away to surface an unreachable server or bad credentials here.
    pub async fn connect(config: &GraphConfig) -> GraphResult<Self> {
        let password = config.password.clone().unwrap_or_default();
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(format!("invalid Neo4j config: {e}")))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| GraphError::Connection(format!("failed to create connection pool: {e}")))?;

        let client = Self {
            graph,
            uri: config.uri.clone(),
            database: config.database.clone(),
        };
        client.ping().await?;
        Ok(client)
    }

    /// Execute a Cypher statement that returns no rows.
    pub async fn execute(&self, query: Query) -> GraphResult<()> {
        self.graph.run(query).await.map_err(classify)
    }

    /// Execute a Cypher query and collect its rows.
    pub async fn query(&self, query: Query) -> GraphResult<Vec<neo4rs::Row>> {
        let mut result = self
            .graph
            .execute(query)
            .await
            .map_err(|e| GraphError::Read(e.to_string()))?;

        let mut rows = Vec::new();
        while let Some(row) = result
            .next()
            .await
            .map_err(|e| GraphError::Read(e.to_string()))?
        {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn counts(&self, cypher: &str) -> GraphResult<IndexMap<String, u64>> {
        let rows = self.query(Query::new(cypher.to_string())).await?;
        let mut counts = IndexMap::new();
        for row in rows {
            let name: String = row
                .get("name")
                .map_err(|e| GraphError::Read(format!("failed to read 'name': {e:?}")))?;
            let count: i64 = row
                .get("count")
                .map_err(|e| GraphError::Read(format!("failed to read 'count': {e:?}")))?;
            counts.insert(name, count.max(0) as u64);
        }
        Ok(counts)
    }
}

#[async_trait]
impl GraphSession for GraphClient {
    async fn ping(&self) -> GraphResult<()> {
        self.graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| GraphError::Connection(format!("Neo4j is not responding to queries: {e}")))
    }

    async fn apply_schema(&self, statement: &SchemaStatement) -> GraphResult<()> {
        let cypher = statement.cypher();
        debug!("{}", cypher);
        self.execute(Query::new(cypher)).await
    }

    async fn write_batch(&self, template: &UpsertTemplate, batch: &[Record]) -> GraphResult<WriteOutcome> {
        let mut rows = BoltList::new();
        for record in batch {
            rows.push(record_to_bolt(record));
        }
        let query = Query::new(template.cypher()).param("batch", BoltType::List(rows));

        // A single auto-commit statement: Neo4j applies it entirely or not at all.
        let mut result = self.graph.execute(query).await.map_err(classify)?;
        let mut applied = 0u64;
        while let Some(row) = result.next().await.map_err(classify)? {
            let n: i64 = row
                .get("applied")
                .map_err(|e| GraphError::Read(format!("failed to read 'applied': {e:?}")))?;
            applied += n.max(0) as u64;
        }
        Ok(WriteOutcome { applied })
    }

    async fn node_counts(&self) -> GraphResult<IndexMap<String, u64>> {
        self.counts(
            "MATCH (n) RETURN coalesce(labels(n)[0], '') AS name, count(n) AS count ORDER BY name",
        )
        .await
    }

    async fn relationship_counts(&self) -> GraphResult<IndexMap<String, u64>> {
        self.counts("MATCH ()-[r]->() RETURN type(r) AS name, count(r) AS count ORDER BY name")
            .await
    }

    async fn clear(&self) -> GraphResult<()> {
        self.execute(Query::new("MATCH (n) DETACH DELETE n".to_string()))
            .await
    }

    fn describe(&self) -> String {
        format!("{} (database {})", self.uri, self.database)
    }
}

/// Map a driver error onto the loader's error classes.
fn classify(err: neo4rs::Error) -> GraphError {
    match err {
        neo4rs::Error::IOError { .. }
        | neo4rs::Error::ConnectionError
        | neo4rs::Error::AuthenticationError(_) => GraphError::Connection(err.to_string()),
        other => {
            let msg = other.to_string();
            let lower = msg.to_lowercase();
            if lower.contains("already exists") || lower.contains("equivalent") {
                GraphError::AlreadyExists(msg)
            } else {
                GraphError::Rejected(msg)
            }
        }
    }
}

fn record_to_bolt(record: &Record) -> BoltType {
    let mut map = BoltMap::new();
    for (field, value) in record.fields() {
        map.put(BoltString::new(field), json_to_bolt(value));
    }
    BoltType::Map(map)
}

/// Convert a JSON value into a Bolt parameter.
pub fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(BoltNull),
        Value::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(BoltInteger::new(i)),
            None => BoltType::Float(BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => BoltType::String(BoltString::new(s)),
        Value::Array(items) => {
            let mut list = BoltList::new();
            for item in items {
                list.push(json_to_bolt(item));
            }
            BoltType::List(list)
        }
        Value::Object(fields) => {
            let mut map = BoltMap::new();
            for (k, v) in fields {
                map.put(BoltString::new(k), json_to_bolt(v));
            }
            BoltType::Map(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_bolt_scalars() {
        assert!(matches!(json_to_bolt(&json!(null)), BoltType::Null(_)));
        assert!(matches!(json_to_bolt(&json!(7)), BoltType::Integer(i) if i.value == 7));
        assert!(matches!(json_to_bolt(&json!(2.5)), BoltType::Float(f) if f.value == 2.5));
        assert!(matches!(json_to_bolt(&json!("x")), BoltType::String(s) if s.value == "x"));
        assert!(matches!(json_to_bolt(&json!(true)), BoltType::Boolean(b) if b.value));
    }

    #[test]
    fn test_record_to_bolt_is_map() {
        let record = Record::new().with("skill_id", "S1").with("tags", json!(["a", "b"]));
        match record_to_bolt(&record) {
            BoltType::Map(map) => assert_eq!(map.value.len(), 2),
            other => panic!("expected a map, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_connection_errors() {
        assert!(classify(neo4rs::Error::ConnectionError).is_connection());
        assert!(classify(neo4rs::Error::AuthenticationError("bad".into())).is_connection());
    }
}
