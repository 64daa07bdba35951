//! Terminal output formatting.

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

use helix_graph::{GraphStatistics, LoadOutcome, SchemaReport, StageObserver, StageReport};

/// Progress bars for the stages of one load.
#[derive(Default)]
pub struct StageProgress {
    bar: Option<ProgressBar>,
}

impl StageProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:>18.cyan} [{bar:40}] {pos}/{len} {elapsed}")
            .map(|style| style.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl StageObserver for StageProgress {
    fn stage_started(&mut self, stage: &str, records: usize) {
        let bar = ProgressBar::new(records as u64);
        bar.set_style(Self::style());
        bar.set_prefix(stage.to_string());
        self.bar = Some(bar);
    }

    fn batch_done(&mut self, _stage: &str, processed: usize, _total: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(processed as u64);
        }
    }

    fn stage_finished(&mut self, report: &StageReport) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        let mark = if report.failed == 0 && report.invalid == 0 {
            "✓".green()
        } else {
            "!".yellow()
        };
        println!(
            "  {} {:<18} {} processed, {} failed",
            mark,
            report.name,
            report.processed,
            report.failed
        );
    }
}

/// Print the per-stage table.
pub fn print_stages(stages: &[StageReport]) {
    if stages.is_empty() {
        return;
    }

    println!();
    println!(
        "{:<18} {:>8} {:>8} {:>10} {:>8} {:>10} {:>8}",
        "Stage", "Seen", "Invalid", "Processed", "Failed", "Unmatched", "Batches"
    );
    println!("{}", "─".repeat(78));

    for stage in stages {
        println!(
            "{:<18} {:>8} {:>8} {:>10} {:>8} {:>10} {:>8}",
            stage.name,
            stage.seen,
            count(stage.invalid as u64, |s| s.yellow()),
            stage.processed,
            count(stage.failed, |s| s.red()),
            count(stage.unmatched, |s| s.yellow()),
            stage.batches
        );
    }
}

fn count(value: u64, paint: fn(&str) -> ColoredString) -> ColoredString {
    let text = value.to_string();
    if value == 0 {
        text.dimmed()
    } else {
        paint(&text)
    }
}

/// Print the outcome of a domain load.
pub fn print_outcome(outcome: &LoadOutcome, max_errors: usize) {
    let summary = &outcome.summary;

    println!();
    println!("{} {}", outcome.loader.cyan().bold(), format!("({})", summary.run_id).dimmed());
    println!("{}", "─".repeat(50));
    println!("  Duration:      {:.2}s", summary.duration_secs);
    println!("  Nodes:         {}", summary.total_nodes.to_string().cyan());
    println!("  Relationships: {}", summary.total_relationships.to_string().cyan());
    println!("  Processed:     {}", summary.records_processed.to_string().green());
    let failed = if summary.records_failed == 0 {
        "0".green()
    } else {
        summary.records_failed.to_string().red()
    };
    println!("  Failed:        {}", failed);

    if !summary.errors.is_empty() {
        println!();
        println!("{} {}", "Errors:".red().bold(), summary.errors.len());
        for error in summary.errors.iter().take(max_errors) {
            println!("  {} {}", "•".red(), error);
        }
        if summary.errors.len() > max_errors {
            println!(
                "  {}",
                format!("... and {} more", summary.errors.len() - max_errors).dimmed()
            );
        }
    }

    if !outcome.drift.is_empty() {
        println!();
        println!("{}", "Reconciliation drift:".yellow().bold());
        for drift in &outcome.drift {
            println!("  {} {}", "→".yellow(), drift);
        }
    }

    println!("{}", "─".repeat(50));
}

/// Print node and relationship counts.
pub fn print_graph_statistics(target: &str, statistics: &GraphStatistics) {
    println!("{} {}", "Graph Status".bold(), target.dimmed());
    println!("{}", "─".repeat(40));

    println!("{}", "Nodes".bold());
    for (label, n) in &statistics.nodes_by_label {
        println!("  {:<26} {:>10}", label, n);
    }
    println!("  {:<26} {:>10}", "Total".bold(), statistics.total_nodes.to_string().cyan());

    println!();
    println!("{}", "Relationships".bold());
    for (rel_type, n) in &statistics.relationships_by_type {
        println!("  {:<26} {:>10}", rel_type, n);
    }
    println!(
        "  {:<26} {:>10}",
        "Total".bold(),
        statistics.total_relationships.to_string().cyan()
    );

    println!("{}", "─".repeat(40));
}

/// Print the result of applying a schema.
pub fn print_schema_report(domain: &str, report: &SchemaReport) {
    println!("{} {}", "Schema".bold(), domain.cyan());
    println!("  Applied:         {}", report.applied.to_string().green());
    println!("  Already present: {}", report.already_present.to_string().dimmed());
    if report.failed.is_empty() {
        println!("  Failed:          {}", "0".green());
    } else {
        println!("  Failed:          {}", report.failed.len().to_string().red());
        for name in &report.failed {
            println!("    {} {}", "✗".red(), name);
        }
    }
}
