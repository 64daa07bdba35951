//! Load stage orchestration.
//!
//! Stages run strictly in the order the caller declares them. Each stage may
//! name the stages it depends on; the plan is rejected up front when a
//! dependency is not declared before its dependent.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::info;

use helix_core::{validate, HelixError, HelixResult, LoadStats, Record, Shape};

use crate::batch::{load_batches, BatchOptions};
use crate::session::GraphSession;
use crate::template::UpsertTemplate;

/// A named unit of loading work.
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub records: Vec<Record>,
    /// Validated inside the stage when present.
    pub shape: Option<Shape>,
    pub template: UpsertTemplate,
    pub depends_on: Vec<String>,
    /// Overrides the run's batch size.
    pub batch_size: Option<usize>,
    /// Labels credited with the processed count.
    pub node_labels: Vec<String>,
    /// Relationship types credited with the processed count.
    pub rel_types: Vec<String>,
}

impl Stage {
    /// Credits default to what the template merges for every record.
    pub fn new(name: impl Into<String>, template: UpsertTemplate, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
            shape: None,
            node_labels: template.merged_labels(),
            rel_types: template.merged_relationship_types(),
            template,
            depends_on: Vec::new(),
            batch_size: None,
        }
    }

    pub fn after(mut self, stage: &str) -> Self {
        self.depends_on.push(stage.to_string());
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Replace the default credits.
    pub fn credits(mut self, node_labels: &[&str], rel_types: &[&str]) -> Self {
        self.node_labels = node_labels.iter().map(|s| s.to_string()).collect();
        self.rel_types = rel_types.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Running,
    Completed,
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// What one stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub name: String,
    pub state: StageState,
    pub seen: usize,
    pub invalid: usize,
    pub processed: u64,
    pub failed: u64,
    pub unmatched: u64,
    pub batches: usize,
}

impl StageReport {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: StageState::Pending,
            seen: 0,
            invalid: 0,
            processed: 0,
            failed: 0,
            unmatched: 0,
            batches: 0,
        }
    }
}

/// Hooks for progress display.
pub trait StageObserver: Send + Sync {
    fn stage_started(&mut self, _stage: &str, _records: usize) {}
    fn batch_done(&mut self, _stage: &str, _processed: usize, _total: usize) {}
    fn stage_finished(&mut self, _report: &StageReport) {}
}

/// Observer that ignores everything.
pub struct NoProgress;

impl StageObserver for NoProgress {}

/// Reject plans where a stage depends on one not declared before it.
pub fn check_order(stages: &[Stage]) -> HelixResult<()> {
    for (position, stage) in stages.iter().enumerate() {
        for dependency in &stage.depends_on {
            let declared_before = stages[..position].iter().any(|s| &s.name == dependency);
            if !declared_before {
                return Err(HelixError::StageOrder {
                    stage: stage.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Run stages sequentially in declared order.
///
/// Batch failures inside a stage are absorbed into `stats`; every stage that
/// starts reaches `Completed`. Connection loss and cancellation abort the run.
pub async fn run_stages(
    session: &dyn GraphSession,
    stages: &[Stage],
    options: &BatchOptions,
    stats: &mut LoadStats,
    cancel: &CancellationToken,
    observer: &mut dyn StageObserver,
) -> HelixResult<Vec<StageReport>> {
    check_order(stages)?;

    let mut reports: Vec<StageReport> = stages.iter().map(|s| StageReport::pending(&s.name)).collect();

    for (stage, report) in stages.iter().zip(reports.iter_mut()) {
        report.state = StageState::Running;
        report.seen = stage.records.len();
        stats.add_seen(stage.records.len() as u64);
        info!(stage = %stage.name, records = stage.records.len(), "Loading {}...", stage.name);

        let validated;
        let records: &[Record] = match &stage.shape {
            Some(shape) => {
                validated = validate(&stage.records, shape);
                for issue in &validated.errors {
                    stats.add_validation_issue(issue);
                }
                report.invalid = validated.errors.len();
                &validated.valid
            }
            None => &stage.records,
        };

        observer.stage_started(&stage.name, records.len());
        let stage_options = BatchOptions {
            batch_size: stage.batch_size.unwrap_or(options.batch_size),
            ..*options
        };
        let name = stage.name.as_str();
        let mut on_batch = |done: usize, total: usize| observer.batch_done(name, done, total);

        let batch = load_batches(
            session,
            records,
            &stage.template,
            &stage_options,
            stats,
            cancel,
            Some(&mut on_batch),
        )
        .await?;

        for label in &stage.node_labels {
            stats.add_nodes(label, batch.processed);
        }
        for rel_type in &stage.rel_types {
            stats.add_relationships(rel_type, batch.processed);
        }

        report.processed = batch.processed;
        report.failed = batch.failed;
        report.unmatched = batch.unmatched;
        report.batches = batch.batches;
        report.state = StageState::Completed;
        info!(
            stage = %stage.name,
            processed = batch.processed,
            failed = batch.failed,
            "✓ Loaded {} {}",
            batch.processed,
            stage.name
        );
        observer.stage_finished(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::template::{NodePattern, RelPattern};
    use helix_core::FieldKind;
    use serde_json::json;

    fn rec(value: serde_json::Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn departments() -> Stage {
        Stage::new(
            "departments",
            UpsertTemplate::new("departments").merge_node(NodePattern::new("d", "Department").key("name")),
            vec![rec(json!({"name": "Sales"})), rec(json!({"name": "Ops"}))],
        )
    }

    fn employees() -> Stage {
        Stage::new(
            "employees",
            UpsertTemplate::new("employees")
                .merge_node(NodePattern::new("e", "Employee").key("employee_id").set_fields(&["salary"]))
                .match_node(NodePattern::new("d", "Department").key_from("name", "department"))
                .merge_relationship(RelPattern::new("e", "WORKS_IN", "d")),
            vec![
                rec(json!({"employee_id": "E1", "department": "Sales", "salary": 10})),
                rec(json!({"employee_id": "E2", "department": "Ops", "salary": -5})),
                rec(json!({"employee_id": "E3", "department": "Ops", "salary": 20})),
            ],
        )
        .after("departments")
        .with_shape(
            Shape::new("Employee")
                .required("employee_id", FieldKind::String)
                .field(helix_core::FieldSpec::required("salary", FieldKind::Float).gt(0.0)),
        )
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl StageObserver for Recorder {
        fn stage_started(&mut self, stage: &str, records: usize) {
            self.events.push(format!("start {stage} {records}"));
        }
        fn stage_finished(&mut self, report: &StageReport) {
            self.events.push(format!("done {} {}", report.name, report.state));
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order_and_credit_stats() {
        let graph = MemoryGraph::new();
        let mut stats = LoadStats::new();
        let mut recorder = Recorder::default();

        let reports = run_stages(
            &graph,
            &[departments(), employees()],
            &BatchOptions::default(),
            &mut stats,
            &CancellationToken::new(),
            &mut recorder,
        )
        .await
        .unwrap();

        assert!(reports.iter().all(|r| r.state == StageState::Completed));
        assert_eq!(reports[1].invalid, 1);
        assert_eq!(stats.nodes_created["Department"], 2);
        assert_eq!(stats.nodes_created["Employee"], 2);
        assert_eq!(stats.relationships_created["WORKS_IN"], 2);
        assert_eq!(stats.records_seen, 5);
        assert_eq!(stats.records_processed, 4);
        assert_eq!(stats.records_failed, 1);
        assert_eq!(stats.errors, vec!["Record 1: salary: must be greater than 0"]);
        assert_eq!(
            recorder.events,
            vec!["start departments 2", "done departments completed", "start employees 2", "done employees completed"]
        );
        assert_eq!(graph.relationship_count("WORKS_IN"), 2);
    }

    #[tokio::test]
    async fn test_dependency_declared_later_is_rejected_before_writing() {
        let graph = MemoryGraph::new();
        let mut stats = LoadStats::new();

        let err = run_stages(
            &graph,
            &[employees(), departments()],
            &BatchOptions::default(),
            &mut stats,
            &CancellationToken::new(),
            &mut NoProgress,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            HelixError::StageOrder { ref stage, ref dependency } if stage == "employees" && dependency == "departments"
        ));
        assert_eq!(graph.batches_submitted(), 0);
    }

    #[test]
    fn test_unknown_dependency_is_rejected() {
        let plan = vec![departments().after("regions")];
        assert!(check_order(&plan).is_err());
    }

    #[test]
    fn test_credits_default_and_override() {
        let stage = employees();
        assert_eq!(stage.node_labels, vec!["Employee"]);
        assert_eq!(stage.rel_types, vec!["WORKS_IN"]);

        let stage = stage.credits(&[], &["WORKS_IN"]);
        assert!(stage.node_labels.is_empty());
    }

    #[tokio::test]
    async fn test_stage_batch_size_override() {
        let graph = MemoryGraph::new();
        let mut stats = LoadStats::new();
        let records = (0..10).map(|i| rec(json!({"name": format!("D{i}")}))).collect();
        let stage = Stage::new(
            "departments",
            UpsertTemplate::new("departments").merge_node(NodePattern::new("d", "Department").key("name")),
            records,
        )
        .with_batch_size(4);

        let reports = run_stages(
            &graph,
            &[stage],
            &BatchOptions::new(100),
            &mut stats,
            &CancellationToken::new(),
            &mut NoProgress,
        )
        .await
        .unwrap();
        assert_eq!(reports[0].batches, 3);
    }

    #[tokio::test]
    async fn test_failures_in_different_stages_name_their_stage() {
        let graph = MemoryGraph::new();
        graph.fail_batches_when(|_, _| Some("Deadlock detected".to_string()));
        let mut stats = LoadStats::new();

        run_stages(
            &graph,
            &[departments(), employees()],
            &BatchOptions::default(),
            &mut stats,
            &CancellationToken::new(),
            &mut NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(
            stats.errors,
            vec![
                "departments: batch 1 failed: Statement rejected: Deadlock detected",
                "Record 1: salary: must be greater than 0",
                "employees: batch 1 failed: Statement rejected: Deadlock detected",
            ]
        );
    }
}
