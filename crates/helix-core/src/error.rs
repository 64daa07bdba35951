//! Centralized error types for HelixGraph.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a load run.
///
/// Record-level validation problems and failed batches are not errors in this
/// sense: they are recorded in [`crate::LoadStats`] and the run continues.
#[derive(Error, Debug)]
pub enum HelixError {
    #[error("Graph store unreachable: {0}")]
    Connection(String),

    #[error("Cannot read record source {}: {reason}", path.display())]
    Source { path: PathBuf, reason: String },

    #[error("Graph store error: {0}")]
    Store(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Stage '{stage}' depends on '{dependency}', which is not declared before it")]
    StageOrder { stage: String, dependency: String },

    #[error("Load cancelled after {processed} records")]
    Cancelled { processed: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for HelixGraph operations.
pub type HelixResult<T> = Result<T, HelixError>;

impl HelixError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a source error for the given path.
    pub fn source(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Source {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a malformed-input error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error means the store itself is gone.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// A record that failed its shape check.
///
/// Never raised; collected by the validator and appended to the run's errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub index: usize,
    pub field: String,
    pub reason: String,
}

impl ValidationIssue {
    pub fn new(index: usize, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record {}: {}: {}", self.index, self.field, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue::new(3, "salary", "must be greater than 0");
        assert_eq!(issue.to_string(), "Record 3: salary: must be greater than 0");
    }

    #[test]
    fn test_connection_classification() {
        assert!(HelixError::connection("refused").is_connection());
        assert!(!HelixError::malformed("not a list").is_connection());
    }
}
