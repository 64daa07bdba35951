//! Record sources: JSON and CSV files on disk.
//!
//! Any problem reading a source raises before a single stage runs.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::error::{HelixError, HelixResult};
use crate::record::Record;

/// Read a JSON file holding a list of records (or a single record object).
pub fn read_json_records(path: &Path) -> HelixResult<Vec<Record>> {
    let value = read_json_document(path)?;
    let value = match value {
        Value::Array(_) => value,
        Value::Object(_) => Value::Array(vec![value]),
        _ => {
            return Err(HelixError::source(
                path,
                "expected a JSON array of objects",
            ))
        }
    };

    let records = records_from_value(value).map_err(|e| HelixError::source(path, e))?;
    info!(path = %path.display(), "Loaded {} records", records.len());
    Ok(records)
}

/// Read a whole JSON document (for datasets stored as one nested object).
pub fn read_json_document(path: &Path) -> HelixResult<Value> {
    if !path.exists() {
        return Err(HelixError::source(path, "file not found"));
    }
    let text = fs::read_to_string(path).map_err(|e| HelixError::source(path, e))?;
    serde_json::from_str(&text).map_err(|e| HelixError::source(path, e))
}

/// Convert a JSON array of objects into records.
pub fn records_from_value(value: Value) -> HelixResult<Vec<Record>> {
    let Value::Array(items) = value else {
        return Err(HelixError::malformed("expected a list of records"));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            Record::from_value(item)
                .ok_or_else(|| HelixError::malformed(format!("item {index} is not an object")))
        })
        .collect()
}

/// Take the list stored under `key` of a dataset document.
///
/// A missing key is an empty list; a key holding anything but a list of
/// objects is malformed input.
pub fn dataset_section(document: &Value, key: &str) -> HelixResult<Vec<Record>> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(section) => records_from_value(section.clone())
            .map_err(|e| HelixError::malformed(format!("section '{key}': {e}"))),
    }
}

/// Read a CSV file with a header row. Cells are strings; empty cells are null.
pub fn read_csv_records(path: &Path) -> HelixResult<Vec<Record>> {
    if !path.exists() {
        return Err(HelixError::source(path, "file not found"));
    }

    let mut reader = csv::Reader::from_path(path).map_err(|e| HelixError::source(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| HelixError::source(path, e))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| HelixError::source(path, e))?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (header.to_string(), value)
            })
            .collect();
        records.push(record);
    }

    info!(path = %path.display(), "Loaded {} records", records.len());
    Ok(records)
}
