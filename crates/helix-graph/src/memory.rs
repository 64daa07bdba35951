//! In-memory graph store.
//!
//! Interprets [`UpsertTemplate`]s directly with the same MERGE / MATCH
//! semantics the rendered Cypher has in Neo4j. Backs `--dry-run` and the test
//! suites; faults can be injected per batch or per schema statement.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use helix_core::{format_timestamp, parse_timestamp, Record};

use crate::error::{GraphError, GraphResult};
use crate::schema::SchemaStatement;
use crate::session::{GraphSession, WriteOutcome};
use crate::template::{Binding, NodePattern, PropertySource, RelPattern, Step, UpsertTemplate};

type BatchFault = Box<dyn Fn(&UpsertTemplate, &[Record]) -> Option<String> + Send + Sync>;
type SchemaFault = Box<dyn Fn(&SchemaStatement) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
struct Node {
    label: String,
    props: Map<String, Value>,
}

#[derive(Debug, Clone)]
struct Relationship {
    rel_type: String,
    from: usize,
    to: usize,
    props: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct Store {
    nodes: Vec<Node>,
    relationships: Vec<Relationship>,
}

/// Variable bindings of one Cypher row.
type Row = Vec<(String, usize)>;

fn bound(row: &Row, alias: &str) -> Option<usize> {
    row.iter().find(|(a, _)| a == alias).map(|(_, id)| *id)
}

fn bind(row: &mut Row, alias: &str, id: usize) {
    match row.iter_mut().find(|(a, _)| a == alias) {
        Some(slot) => slot.1 = id,
        None => row.push((alias.to_string(), id)),
    }
}

/// A graph store held in process memory.
pub struct MemoryGraph {
    store: Mutex<Store>,
    schema: Mutex<Vec<SchemaStatement>>,
    offline: AtomicBool,
    batches: AtomicUsize,
    batch_fault: Mutex<Option<BatchFault>>,
    schema_fault: Mutex<Option<SchemaFault>>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            schema: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            batches: AtomicUsize::new(0),
            batch_fault: Mutex::new(None),
            schema_fault: Mutex::new(None),
        }
    }

    /// Make every call fail with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reject any batch for which `fault` returns a message.
    pub fn fail_batches_when<F>(&self, fault: F)
    where
        F: Fn(&UpsertTemplate, &[Record]) -> Option<String> + Send + Sync + 'static,
    {
        *lock(&self.batch_fault) = Some(Box::new(fault));
    }

    /// Reject schema statements matching `fault`.
    pub fn fail_schema_when<F>(&self, fault: F)
    where
        F: Fn(&SchemaStatement) -> bool + Send + Sync + 'static,
    {
        *lock(&self.schema_fault) = Some(Box::new(fault));
    }

    /// Batches submitted so far, including rejected ones.
    pub fn batches_submitted(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub fn node_count(&self, label: &str) -> u64 {
        lock(&self.store)
            .nodes
            .iter()
            .filter(|n| n.label == label)
            .count() as u64
    }

    pub fn relationship_count(&self, rel_type: &str) -> u64 {
        lock(&self.store)
            .relationships
            .iter()
            .filter(|r| r.rel_type == rel_type)
            .count() as u64
    }

    /// Properties of the node with `label` whose `property` equals `value`.
    pub fn find_node(&self, label: &str, property: &str, value: impl Into<Value>) -> Option<Map<String, Value>> {
        let value = value.into();
        lock(&self.store)
            .nodes
            .iter()
            .find(|n| n.label == label && n.props.get(property) == Some(&value))
            .map(|n| n.props.clone())
    }

    fn check_online(&self) -> GraphResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(GraphError::Connection("in-memory graph is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl GraphSession for MemoryGraph {
    async fn ping(&self) -> GraphResult<()> {
        self.check_online()
    }

    async fn apply_schema(&self, statement: &SchemaStatement) -> GraphResult<()> {
        self.check_online()?;
        if let Some(fault) = lock(&self.schema_fault).as_ref() {
            if fault(statement) {
                return Err(GraphError::Rejected(format!(
                    "Unsupported schema statement: {}",
                    statement.cypher()
                )));
            }
        }

        let mut schema = lock(&self.schema);
        if schema.iter().any(|s| s.name() == statement.name()) {
            return Err(GraphError::AlreadyExists(format!(
                "An equivalent schema rule named '{}' already exists",
                statement.name()
            )));
        }
        schema.push(statement.clone());
        Ok(())
    }

    async fn write_batch(&self, template: &UpsertTemplate, batch: &[Record]) -> GraphResult<WriteOutcome> {
        self.check_online()?;
        self.batches.fetch_add(1, Ordering::SeqCst);

        if let Some(fault) = lock(&self.batch_fault).as_ref() {
            if let Some(msg) = fault(template, batch) {
                return Err(GraphError::Rejected(msg));
            }
        }

        let constraints = lock(&self.schema).clone();
        let mut store = lock(&self.store);
        let mut staged = store.clone();

        let mut applied = 0u64;
        for record in batch {
            applied += apply_record(&mut staged, template, record)?;
        }
        check_constraints(&staged, &constraints)?;

        *store = staged;
        Ok(WriteOutcome { applied })
    }

    async fn node_counts(&self) -> GraphResult<IndexMap<String, u64>> {
        self.check_online()?;
        let store = lock(&self.store);
        let mut counts: IndexMap<String, u64> = IndexMap::new();
        for node in &store.nodes {
            *counts.entry(node.label.clone()).or_insert(0) += 1;
        }
        counts.sort_keys();
        Ok(counts)
    }

    async fn relationship_counts(&self) -> GraphResult<IndexMap<String, u64>> {
        self.check_online()?;
        let store = lock(&self.store);
        let mut counts: IndexMap<String, u64> = IndexMap::new();
        for rel in &store.relationships {
            *counts.entry(rel.rel_type.clone()).or_insert(0) += 1;
        }
        counts.sort_keys();
        Ok(counts)
    }

    async fn clear(&self) -> GraphResult<()> {
        self.check_online()?;
        *lock(&self.store) = Store::default();
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory graph".to_string()
    }
}

/// Run every step for one record, returning the number of surviving rows.
fn apply_record(store: &mut Store, template: &UpsertTemplate, record: &Record) -> GraphResult<u64> {
    let mut rows: Vec<Row> = vec![Vec::new()];

    for step in &template.steps {
        if rows.is_empty() {
            break;
        }
        match step {
            Step::MergeNode(node) => {
                let key = resolve_bindings(&node.key, record)?;
                if let Some((property, _)) = key.iter().find(|(_, v)| v.is_null()) {
                    return Err(GraphError::Rejected(format!(
                        "Cannot merge the following node because of null property value for '{}': (:{} {{{}: null}})",
                        property, node.label, property
                    )));
                }
                let set = resolve_bindings(&node.set, record)?;
                for row in rows.iter_mut() {
                    let id = merge_node(store, node, &key);
                    assign(&mut store.nodes[id].props, &set, node.stamp);
                    bind(row, &node.alias, id);
                }
            }
            Step::MatchNode(node) => {
                let key = resolve_bindings(&node.key, record)?;
                let matches = find_nodes(store, &node.label, &key);
                let mut next = Vec::with_capacity(rows.len());
                for row in &rows {
                    for id in &matches {
                        let mut expanded = row.clone();
                        bind(&mut expanded, &node.alias, *id);
                        next.push(expanded);
                    }
                }
                rows = next;
            }
            Step::MergeRelationship(rel) => {
                let key = resolve_bindings(&rel.key, record)?;
                if let Some((property, _)) = key.iter().find(|(_, v)| v.is_null()) {
                    return Err(GraphError::Rejected(format!(
                        "Cannot merge relationship of type {} because of null property value for '{}'",
                        rel.rel_type, property
                    )));
                }
                let set = resolve_bindings(&rel.set, record)?;
                for row in &rows {
                    let (Some(from), Some(to)) = (bound(row, &rel.from), bound(row, &rel.to)) else {
                        return Err(GraphError::Rejected(format!(
                            "Variable not defined in relationship ({})-[:{}]->({})",
                            rel.from, rel.rel_type, rel.to
                        )));
                    };
                    let id = merge_relationship(store, rel, from, to, &key);
                    assign(&mut store.relationships[id].props, &set, rel.stamp);
                }
            }
            Step::Require(field) => {
                if record.get(field).map_or(true, Value::is_null) {
                    rows.clear();
                }
            }
        }
    }

    Ok(rows.len() as u64)
}

fn resolve_bindings(bindings: &[Binding], record: &Record) -> GraphResult<Vec<(String, Value)>> {
    bindings
        .iter()
        .map(|b| Ok((b.property.clone(), resolve(&b.source, record)?)))
        .collect()
}

fn resolve(source: &PropertySource, record: &Record) -> GraphResult<Value> {
    let value = match source {
        PropertySource::Field(field) => record.get(field).cloned().unwrap_or(Value::Null),
        PropertySource::Literal(value) => value.clone(),
        PropertySource::Date(field) => match record.get(field) {
            None | Some(Value::Null) => Value::Null,
            Some(Value::String(s)) => {
                let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                    GraphError::Rejected(format!("Text cannot be parsed to a Date: \"{s}\""))
                })?;
                Value::String(date.format("%Y-%m-%d").to_string())
            }
            Some(other) => {
                return Err(GraphError::Rejected(format!(
                    "Invalid input for function 'date()': {other}"
                )))
            }
        },
        PropertySource::DateTime(field) => match record.get(field) {
            None | Some(Value::Null) => Value::Null,
            Some(Value::String(s)) => {
                let timestamp = parse_timestamp(s).ok_or_else(|| {
                    GraphError::Rejected(format!("Text cannot be parsed to a DateTime: \"{s}\""))
                })?;
                Value::String(format_timestamp(&timestamp))
            }
            Some(other) => {
                return Err(GraphError::Rejected(format!(
                    "Invalid input for function 'datetime()': {other}"
                )))
            }
        },
    };

    if let Value::Object(_) = value {
        return Err(GraphError::Rejected(
            "Property values can only be of primitive types or arrays thereof".to_string(),
        ));
    }
    Ok(value)
}

fn props_match(props: &Map<String, Value>, key: &[(String, Value)]) -> bool {
    // null never equals anything in Cypher
    key.iter()
        .all(|(property, value)| !value.is_null() && props.get(property) == Some(value))
}

fn find_nodes(store: &Store, label: &str, key: &[(String, Value)]) -> Vec<usize> {
    store
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.label == label && props_match(&n.props, key))
        .map(|(id, _)| id)
        .collect()
}

fn merge_node(store: &mut Store, node: &NodePattern, key: &[(String, Value)]) -> usize {
    if let Some(id) = find_nodes(store, &node.label, key).into_iter().next() {
        return id;
    }
    store.nodes.push(Node {
        label: node.label.clone(),
        props: key.iter().cloned().collect(),
    });
    store.nodes.len() - 1
}

fn merge_relationship(
    store: &mut Store,
    rel: &RelPattern,
    from: usize,
    to: usize,
    key: &[(String, Value)],
) -> usize {
    let existing = store.relationships.iter().position(|r| {
        r.rel_type == rel.rel_type && r.from == from && r.to == to && props_match(&r.props, key)
    });
    if let Some(id) = existing {
        return id;
    }
    store.relationships.push(Relationship {
        rel_type: rel.rel_type.clone(),
        from,
        to,
        props: key.iter().cloned().collect(),
    });
    store.relationships.len() - 1
}

fn assign(props: &mut Map<String, Value>, set: &[(String, Value)], stamp: bool) {
    for (property, value) in set {
        if value.is_null() {
            props.remove(property);
        } else {
            props.insert(property.clone(), value.clone());
        }
    }
    if stamp {
        props.insert("created_at".to_string(), Value::String(Utc::now().to_rfc3339()));
    }
}

fn check_constraints(store: &Store, schema: &[SchemaStatement]) -> GraphResult<()> {
    for statement in schema {
        let SchemaStatement::UniqueConstraint { label, property, .. } = statement else {
            continue;
        };
        let mut seen = HashSet::new();
        for node in store.nodes.iter().filter(|n| &n.label == label) {
            if let Some(value) = node.props.get(property) {
                if !seen.insert(value.to_string()) {
                    return Err(GraphError::Rejected(format!(
                        "Node already exists with label `{label}` and property `{property}` = {value}"
                    )));
                }
            }
        }
    }
    Ok(())
}
