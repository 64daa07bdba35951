//! # Helix Graph
//!
//! Bulk upsert engine for Neo4j.
//!
//! Provides the session abstraction with a Neo4j client and an in-memory
//! store, declarative upsert templates, schema setup, the batch engine, stage
//! orchestration and the reconciliation query.

pub mod batch;
pub mod client;
pub mod error;
pub mod loader;
pub mod memory;
pub mod schema;
pub mod session;
pub mod stage;
pub mod statistics;
pub mod template;

pub use batch::{load_batches, BatchFailure, BatchOptions, BatchReport};
pub use client::GraphClient;
pub use error::{GraphError, GraphResult};
pub use loader::{DomainLoader, GraphLoader, LoadOutcome};
pub use memory::MemoryGraph;
pub use schema::{ensure_schema, SchemaDefinition, SchemaReport, SchemaStatement};
pub use session::{GraphSession, WriteOutcome};
pub use stage::{check_order, run_stages, NoProgress, Stage, StageObserver, StageReport, StageState};
pub use statistics::{get_graph_statistics, reconcile, Drift, DriftKind, GraphStatistics};
pub use template::{NodePattern, RelPattern, UpsertTemplate};
