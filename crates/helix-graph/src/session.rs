//! The seam between the loader and a graph store.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use helix_core::Record;

use crate::error::GraphResult;
use crate::schema::SchemaStatement;
use crate::template::UpsertTemplate;

/// Result of one batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Records that made it through every MATCH of the template.
    pub applied: u64,
}

/// A live session against a graph store.
///
/// `write_batch` is atomic: either every record of the batch is applied or
/// the store is left unchanged and an error is returned.
#[async_trait]
pub trait GraphSession: Send + Sync {
    /// Cheap round-trip to check the store answers.
    async fn ping(&self) -> GraphResult<()>;

    /// Declare one constraint or index.
    async fn apply_schema(&self, statement: &SchemaStatement) -> GraphResult<()>;

    /// Apply a template to a batch of records in one transaction.
    async fn write_batch(&self, template: &UpsertTemplate, batch: &[Record])
        -> GraphResult<WriteOutcome>;

    /// Node counts keyed by first label.
    async fn node_counts(&self) -> GraphResult<IndexMap<String, u64>>;

    /// Relationship counts keyed by type.
    async fn relationship_counts(&self) -> GraphResult<IndexMap<String, u64>>;

    /// Detach-delete every node.
    async fn clear(&self) -> GraphResult<()>;

    /// Short human-readable description of the backend.
    fn describe(&self) -> String;
}

#[async_trait]
impl<T: GraphSession + ?Sized> GraphSession for Arc<T> {
    async fn ping(&self) -> GraphResult<()> {
        (**self).ping().await
    }

    async fn apply_schema(&self, statement: &SchemaStatement) -> GraphResult<()> {
        (**self).apply_schema(statement).await
    }

    async fn write_batch(&self, template: &UpsertTemplate, batch: &[Record])
        -> GraphResult<WriteOutcome> {
        (**self).write_batch(template, batch).await
    }

    async fn node_counts(&self) -> GraphResult<IndexMap<String, u64>> {
        (**self).node_counts().await
    }

    async fn relationship_counts(&self) -> GraphResult<IndexMap<String, u64>> {
        (**self).relationship_counts().await
    }

    async fn clear(&self) -> GraphResult<()> {
        (**self).clear().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
