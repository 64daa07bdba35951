//! Graph store error types.

use helix_core::HelixError;
use thiserror::Error;

/// Errors reported by a [`crate::GraphSession`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The store is unreachable or refused our credentials. Fatal for a run.
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    /// A schema declaration that is already present.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The store refused a statement (bad data, constraint violation, ...).
    #[error("Statement rejected: {0}")]
    Rejected(String),

    #[error("Read query failed: {0}")]
    Read(String),
}

/// Result type for session operations.
pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<GraphError> for HelixError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Connection(msg) => HelixError::Connection(msg),
            other => HelixError::Store(other.to_string()),
        }
    }
}
