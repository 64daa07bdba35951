//! HelixGraph Core Library
//!
//! Record model, shape validation, record sources, configuration and load
//! statistics shared by the graph loader and the domain loaders.

pub mod config;
pub mod error;
pub mod record;
pub mod shape;
pub mod source;
pub mod stats;

pub use config::{GraphConfig, HelixConfig, LoadSettings};
pub use error::{HelixError, HelixResult, ValidationIssue};
pub use record::Record;
pub use shape::model::{Bound, FieldKind, FieldSpec, Shape};
pub use shape::{format_timestamp, parse_timestamp, validate, validate_value, Validation};
pub use stats::{LoadStats, LoadSummary};
