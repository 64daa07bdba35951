//! The caller-owned loader façade and the domain loader contract.

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use helix_core::{validate, GraphConfig, HelixResult, LoadSettings, LoadStats, LoadSummary, Record, Shape};

use crate::batch::{self, BatchOptions, BatchReport};
use crate::client::GraphClient;
use crate::memory::MemoryGraph;
use crate::schema::{self, SchemaDefinition, SchemaReport};
use crate::session::GraphSession;
use crate::stage::{self, NoProgress, Stage, StageObserver, StageReport};
use crate::statistics::{get_graph_statistics, reconcile, Drift, GraphStatistics};
use crate::template::UpsertTemplate;

/// One load run against one graph session.
///
/// Constructed by the caller, used for a single run, then consumed by
/// [`GraphLoader::finish`]. Nothing is shared between loaders.
pub struct GraphLoader {
    session: Box<dyn GraphSession>,
    settings: LoadSettings,
    stats: LoadStats,
    cancel: CancellationToken,
    observer: Box<dyn StageObserver>,
}

impl GraphLoader {
    pub fn new(session: Box<dyn GraphSession>, settings: LoadSettings) -> Self {
        Self {
            session,
            settings,
            stats: LoadStats::new(),
            cancel: CancellationToken::new(),
            observer: Box::new(NoProgress),
        }
    }

    /// Connect to Neo4j.
    pub async fn connect(graph: &GraphConfig, settings: LoadSettings) -> HelixResult<Self> {
        let client = GraphClient::connect(graph).await?;
        info!("Connected to Neo4j at {}", graph.uri);
        Ok(Self::new(Box::new(client), settings))
    }

    /// Load into a fresh in-memory graph.
    pub fn in_memory(settings: LoadSettings) -> Self {
        Self::new(Box::new(MemoryGraph::new()), settings)
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn StageObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Where this loader writes, e.g. `bolt://localhost:7687 (database neo4j)`.
    pub fn describe(&self) -> String {
        self.session.describe()
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::new(self.settings.batch_size).with_retry(self.settings.retry_failed_batches)
    }

    /// Liveness check.
    pub async fn test_connection(&self) -> bool {
        match self.session.ping().await {
            Ok(()) => {
                info!("✓ Connection test successful");
                true
            }
            Err(e) => {
                error!("✗ Connection test failed: {}", e);
                false
            }
        }
    }

    /// Delete every node and relationship. Test and reload workflows only.
    pub async fn clear_database(&self) -> HelixResult<()> {
        warn!("Clearing database...");
        self.session.clear().await?;
        info!("✓ Database cleared");
        Ok(())
    }

    pub async fn ensure_schema(&mut self, definition: &SchemaDefinition) -> HelixResult<SchemaReport> {
        schema::ensure_schema(self.session.as_ref(), definition, &mut self.stats).await
    }

    /// Validate records ahead of a stage, recording every rejection.
    ///
    /// Rejected records count as seen here; valid ones are counted when the
    /// stage carrying them runs.
    pub fn validate(&mut self, records: &[Record], shape: &Shape) -> Vec<Record> {
        let validation = validate(records, shape);
        self.stats.add_seen(validation.errors.len() as u64);
        for issue in &validation.errors {
            self.stats.add_validation_issue(issue);
        }
        validation.valid
    }

    /// Submit records outside of any stage.
    pub async fn load_batches(
        &mut self,
        records: &[Record],
        template: &UpsertTemplate,
        batch_size: Option<usize>,
    ) -> HelixResult<BatchReport> {
        let mut options = self.batch_options();
        if let Some(size) = batch_size {
            options.batch_size = size;
        }
        self.stats.add_seen(records.len() as u64);
        batch::load_batches(
            self.session.as_ref(),
            records,
            template,
            &options,
            &mut self.stats,
            &self.cancel,
            None,
        )
        .await
    }

    pub async fn run_stages(&mut self, stages: &[Stage]) -> HelixResult<Vec<StageReport>> {
        let options = self.batch_options();
        stage::run_stages(
            self.session.as_ref(),
            stages,
            &options,
            &mut self.stats,
            &self.cancel,
            self.observer.as_mut(),
        )
        .await
    }

    pub async fn graph_statistics(&self) -> HelixResult<GraphStatistics> {
        get_graph_statistics(self.session.as_ref()).await
    }

    /// Log the statistics block.
    pub fn print_statistics(&self, title: &str) {
        let report = self.stats.report(title, self.settings.max_reported_errors);
        for line in report.lines() {
            info!("{}", line);
        }
    }

    /// Stop the clock. Idempotent.
    pub fn finalize(&mut self) {
        self.stats.finalize();
    }

    /// End the run and hand back its statistics.
    pub fn finish(mut self) -> LoadStats {
        self.stats.finalize();
        self.stats
    }
}

/// Everything a finished domain load reports.
#[derive(Debug, Clone, Serialize)]
pub struct LoadOutcome {
    pub loader: String,
    pub summary: LoadSummary,
    pub graph: GraphStatistics,
    pub drift: Vec<Drift>,
    #[serde(skip)]
    pub stages: Vec<StageReport>,
}

/// A domain-specific loader: a schema plus a declared sequence of stages.
#[async_trait]
pub trait DomainLoader: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> SchemaDefinition;

    /// Read sources and declare stages. May validate through `loader` when
    /// later stages are derived from validated records.
    async fn stages(&self, loader: &mut GraphLoader) -> HelixResult<Vec<Stage>>;

    /// Schema, stages, then a reconciliation query. Statistics are finalized
    /// whether or not the run succeeds.
    async fn load(&self, loader: &mut GraphLoader) -> HelixResult<LoadOutcome> {
        info!(loader = self.name(), "Starting {} load", self.name());

        let result = async {
            loader.ensure_schema(&self.schema()).await?;
            let stages = self.stages(loader).await?;
            loader.run_stages(&stages).await
        }
        .await;
        loader.finalize();
        let stages = result?;

        let graph = loader.graph_statistics().await?;
        let drift = reconcile(loader.stats(), &graph);
        for d in &drift {
            warn!(loader = self.name(), "Reconciliation drift: {}", d);
        }
        info!(loader = self.name(), "✓ {} load completed", self.name());

        Ok(LoadOutcome {
            loader: self.name().to_string(),
            summary: loader.stats().summary(),
            graph,
            drift,
            stages,
        })
    }
}
