//! Load statistics for one run.
//!
//! A single-writer aggregate: the schema manager, validator and batch engine
//! mutate it through `&mut`, and it is finalized once when the run ends.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ValidationIssue;

/// Counters and captured errors of one load run.
#[derive(Debug, Clone)]
pub struct LoadStats {
    pub run_id: Uuid,
    pub nodes_created: IndexMap<String, u64>,
    pub relationships_created: IndexMap<String, u64>,
    pub records_seen: u64,
    pub records_processed: u64,
    pub records_failed: u64,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    start: Instant,
    end: Option<Instant>,
}

impl Default for LoadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadStats {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            nodes_created: IndexMap::new(),
            relationships_created: IndexMap::new(),
            records_seen: 0,
            records_processed: 0,
            records_failed: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            start: Instant::now(),
            end: None,
        }
    }

    pub fn add_nodes(&mut self, label: &str, count: u64) {
        *self.nodes_created.entry(label.to_string()).or_insert(0) += count;
    }

    pub fn add_relationships(&mut self, rel_type: &str, count: u64) {
        *self.relationships_created.entry(rel_type.to_string()).or_insert(0) += count;
    }

    /// Record an error message without touching the failure counter.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Records handed to the loader, before validation.
    pub fn add_seen(&mut self, count: u64) {
        self.records_seen += count;
    }

    pub fn add_processed(&mut self, count: u64) {
        self.records_processed += count;
    }

    /// Count `count` records as failed and keep the message.
    pub fn add_failure(&mut self, count: u64, msg: impl Into<String>) {
        self.records_failed += count;
        self.errors.push(msg.into());
    }

    /// A record dropped by the validator.
    pub fn add_validation_issue(&mut self, issue: &ValidationIssue) {
        self.add_failure(1, issue.to_string());
    }

    /// Stamp the end of the run. Later calls keep the first timestamp.
    pub fn finalize(&mut self) {
        if self.end.is_none() {
            self.end = Some(Instant::now());
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.end.is_some()
    }

    /// Elapsed time; still running if not finalized.
    pub fn duration(&self) -> Duration {
        match self.end {
            Some(end) => end.duration_since(self.start),
            None => self.start.elapsed(),
        }
    }

    pub fn total_nodes(&self) -> u64 {
        self.nodes_created.values().sum()
    }

    pub fn total_relationships(&self) -> u64 {
        self.relationships_created.values().sum()
    }

    /// Machine-readable form of the run.
    pub fn summary(&self) -> LoadSummary {
        LoadSummary {
            run_id: self.run_id.to_string(),
            duration_secs: self.duration().as_secs_f64(),
            nodes_created: self.nodes_created.clone(),
            total_nodes: self.total_nodes(),
            relationships_created: self.relationships_created.clone(),
            total_relationships: self.total_relationships(),
            records_seen: self.records_seen,
            records_processed: self.records_processed,
            records_failed: self.records_failed,
            error_count: self.errors.len(),
            errors: self.errors.clone(),
        }
    }

    /// Human-readable statistics block, listing at most `max_errors` errors.
    pub fn report(&self, title: &str, max_errors: usize) -> String {
        let rule = "=".repeat(70);
        let mut out = String::new();

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{title} - Loading Statistics");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "\nDuration: {:.2} seconds", self.duration().as_secs_f64());

        let _ = writeln!(out, "\nNodes Created:");
        write_counts(&mut out, &self.nodes_created, self.total_nodes());

        let _ = writeln!(out, "\nRelationships Created:");
        write_counts(&mut out, &self.relationships_created, self.total_relationships());

        let _ = writeln!(out, "\nRecords:");
        let _ = writeln!(out, "  Processed:  {:>6}", self.records_processed);
        let _ = writeln!(out, "  Failed:     {:>6}", self.records_failed);

        if self.errors.is_empty() {
            let _ = writeln!(out, "\nNo errors");
        } else {
            let _ = writeln!(out, "\nErrors: {}", self.errors.len());
            for (i, error) in self.errors.iter().take(max_errors).enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, truncate(error, 100));
            }
            if self.errors.len() > max_errors {
                let _ = writeln!(
                    out,
                    "  ... and {} more errors",
                    self.errors.len() - max_errors
                );
            }
        }

        let _ = writeln!(out, "\n{rule}");
        out
    }
}

fn write_counts(out: &mut String, counts: &IndexMap<String, u64>, total: u64) {
    for (name, count) in counts {
        let _ = writeln!(out, "  {:<20} {:>6}", name, count);
    }
    let _ = writeln!(out, "  {}", "-".repeat(30));
    let _ = writeln!(out, "  {:<20} {:>6}", "Total", total);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}...")
    }
}

/// Serializable snapshot of [`LoadStats`].
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub run_id: String,
    pub duration_secs: f64,
    pub nodes_created: IndexMap<String, u64>,
    pub total_nodes: u64,
    pub relationships_created: IndexMap<String, u64>,
    pub total_relationships: u64,
    pub records_seen: u64,
    pub records_processed: u64,
    pub records_failed: u64,
    pub error_count: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_per_label() {
        let mut stats = LoadStats::new();
        stats.add_nodes("Employee", 100);
        stats.add_nodes("Skill", 50);
        stats.add_nodes("Employee", 100);
        stats.add_relationships("HAS_SKILL", 500);

        assert_eq!(stats.nodes_created["Employee"], 200);
        assert_eq!(stats.total_nodes(), 250);
        assert_eq!(stats.total_relationships(), 500);
        // insertion order is kept for the report
        let labels: Vec<_> = stats.nodes_created.keys().cloned().collect();
        assert_eq!(labels, vec!["Employee", "Skill"]);
    }

    #[test]
    fn test_failures_and_plain_errors() {
        let mut stats = LoadStats::new();
        stats.add_failure(100, "batch 2 failed: constraint violation");
        stats.add_error("batch 3: 1 of 100 records matched no existing entity");
        stats.add_validation_issue(&ValidationIssue::new(4, "salary", "expected a number"));

        assert_eq!(stats.records_failed, 101);
        assert_eq!(stats.errors.len(), 3);
        assert_eq!(stats.errors[2], "Record 4: salary: expected a number");
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut stats = LoadStats::new();
        stats.finalize();
        let first = stats.finished_at;
        let duration = stats.duration();
        std::thread::sleep(Duration::from_millis(5));
        stats.finalize();
        assert_eq!(stats.finished_at, first);
        assert_eq!(stats.duration(), duration);
    }

    #[test]
    fn test_report_caps_errors() {
        let mut stats = LoadStats::new();
        stats.add_nodes("Skill", 50);
        for i in 0..8 {
            stats.add_failure(1, format!("Record {i}: name: field required"));
        }
        stats.add_failure(1, "x".repeat(150));
        stats.finalize();

        let report = stats.report("HrLoader", 5);
        assert!(report.contains("HrLoader - Loading Statistics"));
        assert!(report.contains("Skill"));
        assert!(report.contains("Errors: 9"));
        assert!(report.contains("  5. Record 4: name: field required"));
        assert!(!report.contains("  6. "));
        assert!(report.contains("... and 4 more errors"));
    }

    #[test]
    fn test_summary_serializes() {
        let mut stats = LoadStats::new();
        stats.add_seen(3);
        stats.add_processed(2);
        stats.add_failure(1, "Record 2: email: field required");
        let json = serde_json::to_value(stats.summary()).unwrap();
        assert_eq!(json["records_processed"], 2);
        assert_eq!(json["records_failed"], 1);
        assert_eq!(json["error_count"], 1);
    }
}
