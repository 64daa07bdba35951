//! Declarative upsert templates.
//!
//! A template describes one parameterized write applied to every record of a
//! batch: which nodes to MERGE or MATCH by natural key, which relationships to
//! MERGE between them, and which properties to set. It renders to a single
//! `UNWIND $batch AS row ...` Cypher statement, and the in-memory store
//! interprets the same description directly.

use std::fmt::Write as _;

use serde_json::Value;

/// Where a property value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertySource {
    /// `row.<field>` as-is.
    Field(String),
    /// `date(row.<field>)`, null-safe.
    Date(String),
    /// `datetime(row.<field>)`, null-safe; a space separator is accepted.
    DateTime(String),
    Literal(Value),
}

/// `property = source`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub property: String,
    pub source: PropertySource,
}

impl Binding {
    pub fn field(property: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            source: PropertySource::Field(field.into()),
        }
    }

    pub fn date(property: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            source: PropertySource::Date(field.into()),
        }
    }

    pub fn datetime(property: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            source: PropertySource::DateTime(field.into()),
        }
    }

    pub fn literal(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            source: PropertySource::Literal(value.into()),
        }
    }
}

/// A node identified by label and natural key.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub alias: String,
    pub label: String,
    pub key: Vec<Binding>,
    pub set: Vec<Binding>,
    /// Also set `created_at = datetime()`.
    pub stamp: bool,
}

impl NodePattern {
    pub fn new(alias: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            label: label.into(),
            key: Vec::new(),
            set: Vec::new(),
            stamp: false,
        }
    }

    /// Key property named like the record field.
    pub fn key(self, field: &str) -> Self {
        self.key_from(field, field)
    }

    pub fn key_from(mut self, property: &str, field: &str) -> Self {
        self.key.push(Binding::field(property, field));
        self
    }

    /// Fixed key part, e.g. the level of a category in a hierarchy.
    pub fn key_literal(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.key.push(Binding::literal(property, value));
        self
    }

    pub fn set(mut self, property: &str, field: &str) -> Self {
        self.set.push(Binding::field(property, field));
        self
    }

    /// Copy several record fields into same-named properties.
    pub fn set_fields(mut self, fields: &[&str]) -> Self {
        self.set
            .extend(fields.iter().map(|f| Binding::field(*f, *f)));
        self
    }

    pub fn set_date(mut self, property: &str, field: &str) -> Self {
        self.set.push(Binding::date(property, field));
        self
    }

    pub fn set_datetime(mut self, property: &str, field: &str) -> Self {
        self.set.push(Binding::datetime(property, field));
        self
    }

    pub fn set_literal(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.set.push(Binding::literal(property, value));
        self
    }

    pub fn stamped(mut self) -> Self {
        self.stamp = true;
        self
    }
}

/// A relationship between two bound node aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub from: String,
    pub rel_type: String,
    pub to: String,
    pub key: Vec<Binding>,
    pub set: Vec<Binding>,
    pub stamp: bool,
}

impl RelPattern {
    pub fn new(from: impl Into<String>, rel_type: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            rel_type: rel_type.into(),
            to: to.into(),
            key: Vec::new(),
            set: Vec::new(),
            stamp: false,
        }
    }

    pub fn key_from(mut self, property: &str, field: &str) -> Self {
        self.key.push(Binding::field(property, field));
        self
    }

    pub fn set(mut self, property: &str, field: &str) -> Self {
        self.set.push(Binding::field(property, field));
        self
    }

    pub fn set_fields(mut self, fields: &[&str]) -> Self {
        self.set
            .extend(fields.iter().map(|f| Binding::field(*f, *f)));
        self
    }

    pub fn set_literal(mut self, property: &str, value: impl Into<Value>) -> Self {
        self.set.push(Binding::literal(property, value));
        self
    }

    pub fn stamped(mut self) -> Self {
        self.stamp = true;
        self
    }
}

/// One clause of a template, applied per record in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Find-or-create.
    MergeNode(NodePattern),
    /// Find only; a miss drops the record from the remaining steps.
    MatchNode(NodePattern),
    MergeRelationship(RelPattern),
    /// Drop the record from the remaining steps unless the field is non-null.
    Require(String),
}

/// A parameterized write applied to each record of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertTemplate {
    pub name: String,
    pub steps: Vec<Step>,
}

impl UpsertTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn merge_node(mut self, node: NodePattern) -> Self {
        self.steps.push(Step::MergeNode(node));
        self
    }

    pub fn match_node(mut self, node: NodePattern) -> Self {
        self.steps.push(Step::MatchNode(node));
        self
    }

    pub fn merge_relationship(mut self, rel: RelPattern) -> Self {
        self.steps.push(Step::MergeRelationship(rel));
        self
    }

    pub fn require(mut self, field: &str) -> Self {
        self.steps.push(Step::Require(field.to_string()));
        self
    }

    /// Whether every record is expected to survive all MATCH clauses.
    ///
    /// Templates with a `Require` step drop records on purpose, so a short
    /// applied count says nothing about missing references.
    pub fn expects_full_match(&self) -> bool {
        !self.steps.iter().any(|s| matches!(s, Step::Require(_)))
    }

    /// Labels this template creates for every record, i.e. merged before any
    /// `Require` step.
    pub fn merged_labels(&self) -> Vec<String> {
        self.unconditional_steps()
            .filter_map(|s| match s {
                Step::MergeNode(node) => Some(node.label.clone()),
                _ => None,
            })
            .collect()
    }

    /// Relationship types this template creates for every record.
    pub fn merged_relationship_types(&self) -> Vec<String> {
        self.unconditional_steps()
            .filter_map(|s| match s {
                Step::MergeRelationship(rel) => Some(rel.rel_type.clone()),
                _ => None,
            })
            .collect()
    }

    fn unconditional_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps
            .iter()
            .take_while(|s| !matches!(s, Step::Require(_)))
    }

    /// Render as one Cypher statement taking `$batch` and returning `applied`.
    pub fn cypher(&self) -> String {
        let mut out = String::from("UNWIND $batch AS row\n");
        // Cypher needs a WITH between an updating clause and a following
        // MATCH or WHERE.
        let mut pending_write = false;

        for (index, step) in self.steps.iter().enumerate() {
            match step {
                Step::MergeNode(node) => {
                    let _ = writeln!(out, "MERGE {}", node_pattern(node));
                    write_set(&mut out, &node.alias, &node.set, node.stamp);
                    pending_write = true;
                }
                Step::MatchNode(node) => {
                    if pending_write {
                        out.push_str("WITH *\n");
                        pending_write = false;
                    }
                    let _ = writeln!(out, "MATCH {}", node_pattern(node));
                }
                Step::MergeRelationship(rel) => {
                    let alias = format!("r{index}");
                    let _ = writeln!(
                        out,
                        "MERGE ({})-[{}:{}{}]->({})",
                        quote_ident(&rel.from),
                        alias,
                        quote_ident(&rel.rel_type),
                        property_map(&rel.key),
                        quote_ident(&rel.to)
                    );
                    write_set(&mut out, &alias, &rel.set, rel.stamp);
                    pending_write = true;
                }
                Step::Require(field) => {
                    let _ = writeln!(out, "WITH * WHERE {} IS NOT NULL", row_field(field));
                    pending_write = false;
                }
            }
        }

        out.push_str("RETURN count(*) AS applied");
        out
    }
}

fn node_pattern(node: &NodePattern) -> String {
    format!(
        "({}:{}{})",
        quote_ident(&node.alias),
        quote_ident(&node.label),
        property_map(&node.key)
    )
}

fn property_map(bindings: &[Binding]) -> String {
    if bindings.is_empty() {
        return String::new();
    }
    let entries: Vec<String> = bindings
        .iter()
        .map(|b| format!("{}: {}", quote_ident(&b.property), source_expr(&b.source)))
        .collect();
    format!(" {{{}}}", entries.join(", "))
}

fn write_set(out: &mut String, alias: &str, set: &[Binding], stamp: bool) {
    let mut assignments: Vec<String> = set
        .iter()
        .map(|b| {
            format!(
                "{}.{} = {}",
                alias,
                quote_ident(&b.property),
                source_expr(&b.source)
            )
        })
        .collect();
    if stamp {
        assignments.push(format!("{alias}.created_at = datetime()"));
    }
    if !assignments.is_empty() {
        let _ = writeln!(out, "SET {}", assignments.join(",\n    "));
    }
}

fn source_expr(source: &PropertySource) -> String {
    match source {
        PropertySource::Field(field) => row_field(field),
        PropertySource::Date(field) => {
            let f = row_field(field);
            format!("CASE WHEN {f} IS NULL THEN NULL ELSE date({f}) END")
        }
        PropertySource::DateTime(field) => {
            let f = row_field(field);
            format!("CASE WHEN {f} IS NULL THEN NULL ELSE datetime(replace({f}, ' ', 'T')) END")
        }
        PropertySource::Literal(value) => cypher_literal(value),
    }
}

fn row_field(field: &str) -> String {
    format!("row.{}", quote_ident(field))
}

/// Back-tick quote anything that is not a plain identifier.
pub fn quote_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

/// Render a JSON value as a Cypher literal.
pub fn cypher_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(cypher_literal).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", quote_ident(k), cypher_literal(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn employee_template() -> UpsertTemplate {
        UpsertTemplate::new("employees")
            .merge_node(
                NodePattern::new("e", "Employee")
                    .key("employee_id")
                    .set_fields(&["first_name", "salary"])
                    .set_date("hire_date", "hire_date")
                    .stamped(),
            )
            .match_node(NodePattern::new("d", "Department").key_from("name", "department"))
            .merge_relationship(RelPattern::new("e", "WORKS_IN", "d").stamped())
    }

    #[test]
    fn test_render_inserts_with_between_write_and_match() {
        let cypher = employee_template().cypher();
        let expected = "UNWIND $batch AS row\n\
MERGE (e:Employee {employee_id: row.employee_id})\n\
SET e.first_name = row.first_name,\n    \
e.salary = row.salary,\n    \
e.hire_date = CASE WHEN row.hire_date IS NULL THEN NULL ELSE date(row.hire_date) END,\n    \
e.created_at = datetime()\n\
WITH *\n\
MATCH (d:Department {name: row.department})\n\
MERGE (e)-[r2:WORKS_IN]->(d)\n\
SET r2.created_at = datetime()\n\
RETURN count(*) AS applied";
        assert_eq!(cypher, expected);
    }

    #[test]
    fn test_match_before_merge_needs_no_with() {
        let template = UpsertTemplate::new("has_skill")
            .match_node(NodePattern::new("e", "Employee").key("employee_id"))
            .match_node(NodePattern::new("s", "Skill").key("skill_id"))
            .merge_relationship(
                RelPattern::new("e", "HAS_SKILL", "s").set_fields(&["proficiency_level"]),
            );
        let cypher = template.cypher();
        assert!(!cypher.contains("WITH"));
        assert!(cypher.contains("MERGE (e)-[r2:HAS_SKILL]->(s)"));
        assert!(template.expects_full_match());
    }

    #[test]
    fn test_require_renders_where_and_limits_credits() {
        let template = UpsertTemplate::new("channels")
            .merge_node(NodePattern::new("ch", "MarketingChannel").key("channel_id"))
            .require("parent_id")
            .match_node(NodePattern::new("parent", "MarketingChannel").key_from("channel_id", "parent_id"))
            .merge_relationship(RelPattern::new("ch", "SUB_CHANNEL_OF", "parent"));

        let cypher = template.cypher();
        assert!(cypher.contains("WITH * WHERE row.parent_id IS NOT NULL\nMATCH (parent"));
        assert!(!template.expects_full_match());
        assert_eq!(template.merged_labels(), vec!["MarketingChannel"]);
        assert!(template.merged_relationship_types().is_empty());
    }

    #[test]
    fn test_keyed_relationship_and_literals() {
        let template = UpsertTemplate::new("kpi_results")
            .match_node(NodePattern::new("c", "MarketingCampaign").key("campaign_id"))
            .match_node(NodePattern::new("k", "MarketingKPI").key("kpi_id"))
            .merge_relationship(
                RelPattern::new("c", "KPI_RESULT", "k")
                    .key_from("kpi_id", "kpi_id")
                    .key_from("period_start", "period_start")
                    .set_literal("source", "marketing_data"),
            );
        let cypher = template.cypher();
        assert!(cypher.contains(
            "MERGE (c)-[r2:KPI_RESULT {kpi_id: row.kpi_id, period_start: row.period_start}]->(k)"
        ));
        assert!(cypher.contains("SET r2.source = 'marketing_data'"));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(quote_ident("category_L1"), "category_L1");
        assert_eq!(quote_ident("first name"), "`first name`");
        assert_eq!(quote_ident("1st"), "`1st`");
        assert_eq!(cypher_literal(&json!("O'Brien")), "'O\\'Brien'");
        assert_eq!(cypher_literal(&json!([1, null])), "[1, NULL]");
    }

    #[test]
    fn test_literal_key_and_datetime_rendering() {
        let template = UpsertTemplate::new("products")
            .merge_node(
                NodePattern::new("p", "Product")
                    .key("sku")
                    .set_datetime("dateIssued", "dateIssued"),
            )
            .merge_node(
                NodePattern::new("c1", "ProductCategory")
                    .key_from("name", "category_L1")
                    .key_literal("level", 1),
            );
        let cypher = template.cypher();
        assert!(cypher.contains(
            "SET p.dateIssued = CASE WHEN row.dateIssued IS NULL THEN NULL ELSE datetime(replace(row.dateIssued, ' ', 'T')) END"
        ));
        assert!(cypher.contains("MERGE (c1:ProductCategory {name: row.category_L1, level: 1})"));
    }
}
