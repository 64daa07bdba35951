//! Batch upsert engine.
//!
//! Chunks a validated record set into fixed-size batches and submits one
//! parameterized write per batch. A failed batch is recorded and skipped; only
//! an unreachable store or cancellation stops the loop.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use helix_core::{HelixError, HelixResult, LoadStats, Record};

use crate::error::GraphError;
use crate::session::GraphSession;
use crate::template::UpsertTemplate;

/// Progress callback: `(records processed so far, total records)`.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(usize, usize) + Send);

/// Knobs for one `load_batches` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    /// Re-submit a failed batch one record at a time.
    pub retry_individually: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            retry_individually: false,
        }
    }
}

impl BatchOptions {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry_individually = retry;
        self
    }

    /// Batch size actually used; zero behaves as one.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// A batch the store refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Template the batch was submitted through.
    pub template: String,
    /// 1-based batch number.
    pub batch: usize,
    pub size: usize,
    pub cause: String,
}

impl BatchFailure {
    pub fn message(&self) -> String {
        format!("{}: batch {} failed: {}", self.template, self.batch, self.cause)
    }
}

/// Outcome of one `load_batches` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: u64,
    pub failed: u64,
    pub batches: usize,
    /// Records that went through but matched no existing entity.
    pub unmatched: u64,
    pub failures: Vec<BatchFailure>,
}

/// Submit `records` through `template` in batches.
///
/// Every successful batch adds its length to `records_processed`. A failed
/// batch adds its length to `records_failed` and one
/// `"<template>: batch <n> failed: ..."` error, unless `retry_individually` is set, in which case its records are
/// retried one by one and attributed separately.
pub async fn load_batches(
    session: &dyn GraphSession,
    records: &[Record],
    template: &UpsertTemplate,
    options: &BatchOptions,
    stats: &mut LoadStats,
    cancel: &CancellationToken,
    mut progress: Option<ProgressFn<'_>>,
) -> HelixResult<BatchReport> {
    let batch_size = options.effective_batch_size();
    let total = records.len();
    let mut report = BatchReport::default();

    info!(
        template = %template.name,
        records = total,
        batch_size,
        "Loading {} records in batches of {}",
        total,
        batch_size
    );

    for (index, batch) in records.chunks(batch_size).enumerate() {
        let number = index + 1;
        if cancel.is_cancelled() {
            warn!(template = %template.name, batch = number, "Load cancelled");
            return Err(HelixError::Cancelled {
                processed: report.processed,
            });
        }
        report.batches += 1;

        match session.write_batch(template, batch).await {
            Ok(outcome) => {
                let len = batch.len() as u64;
                report.processed += len;
                stats.add_processed(len);

                if outcome.applied < len && template.expects_full_match() {
                    let missing = len - outcome.applied;
                    report.unmatched += missing;
                    let msg = format!(
                        "{}: batch {number}: {missing} of {len} records matched no existing entity",
                        template.name
                    );
                    warn!(template = %template.name, "{}", msg);
                    stats.add_error(msg);
                }
            }
            Err(GraphError::Connection(msg)) => {
                error!(template = %template.name, batch = number, "Store unreachable: {}", msg);
                return Err(HelixError::Connection(msg));
            }
            Err(err) => {
                let failure = BatchFailure {
                    template: template.name.clone(),
                    batch: number,
                    size: batch.len(),
                    cause: err.to_string(),
                };
                error!(template = %template.name, "{}", failure.message());

                if options.retry_individually {
                    retry_records(session, template, number, batch, stats, &mut report).await?;
                } else {
                    report.failed += batch.len() as u64;
                    stats.add_failure(batch.len() as u64, failure.message());
                }
                report.failures.push(failure);
            }
        }

        let done = report.processed as usize;
        match progress.as_mut() {
            Some(callback) => callback(done, total),
            None => debug!(template = %template.name, "  Processed {}/{} records", done, total),
        }
    }

    info!(
        template = %template.name,
        "Loaded {} records ({} failed)",
        report.processed,
        report.failed
    );
    Ok(report)
}

async fn retry_records(
    session: &dyn GraphSession,
    template: &UpsertTemplate,
    number: usize,
    batch: &[Record],
    stats: &mut LoadStats,
    report: &mut BatchReport,
) -> HelixResult<()> {
    debug!(template = %template.name, batch = number, "Retrying {} records one at a time", batch.len());

    for (i, record) in batch.iter().enumerate() {
        match session.write_batch(template, std::slice::from_ref(record)).await {
            Ok(outcome) => {
                report.processed += 1;
                stats.add_processed(1);
                if outcome.applied == 0 && template.expects_full_match() {
                    report.unmatched += 1;
                    stats.add_error(format!(
                        "{}: batch {number} record {i}: matched no existing entity",
                        template.name
                    ));
                }
            }
            Err(GraphError::Connection(msg)) => return Err(HelixError::Connection(msg)),
            Err(err) => {
                report.failed += 1;
                stats.add_failure(1, format!("{}: batch {number} record {i} failed: {err}", template.name));
            }
        }
    }
    Ok(())
}
