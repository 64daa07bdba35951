//! Record validation against declared shapes.
//!
//! Partitions raw records into a valid subset (normalised copies) and a list of
//! human-readable issues. A single bad record never raises.

pub mod model;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use tracing::{info, warn};

use crate::error::{HelixError, HelixResult, ValidationIssue};
use crate::record::Record;
use model::{FieldKind, FieldSpec, Shape};

/// Outcome of validating one record set.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub valid: Vec<Record>,
    pub errors: Vec<ValidationIssue>,
}

impl Validation {
    /// Number of records that went in.
    pub fn total(&self) -> usize {
        self.valid.len() + self.errors.len()
    }
}

/// Validate a record set against a shape.
///
/// Every input record ends up either in `valid` or as exactly one entry in
/// `errors` (the first failing field), so `valid + errors == input`.
pub fn validate(records: &[Record], shape: &Shape) -> Validation {
    let mut result = Validation::default();

    for (index, record) in records.iter().enumerate() {
        match validate_record(record, shape) {
            Ok(normalised) => result.valid.push(normalised),
            Err((field, reason)) => {
                let issue = ValidationIssue::new(index, field, reason);
                warn!(shape = %shape.name, "{}", issue);
                result.errors.push(issue);
            }
        }
    }

    info!(
        shape = %shape.name,
        "Validated {}/{} records",
        result.valid.len(),
        records.len()
    );
    result
}

/// Validate raw JSON input. Raises only if the input is not a sequence of objects.
pub fn validate_value(input: &Value, shape: &Shape) -> HelixResult<Validation> {
    let items = input.as_array().ok_or_else(|| {
        HelixError::malformed(format!("{} input is not a list of records", shape.name))
    })?;

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let record = Record::from_value(item.clone()).ok_or_else(|| {
            HelixError::malformed(format!("{} item {} is not an object", shape.name, index))
        })?;
        records.push(record);
    }

    Ok(validate(&records, shape))
}

fn validate_record(record: &Record, shape: &Shape) -> Result<Record, (String, String)> {
    let mut normalised = record.clone();

    for spec in &shape.fields {
        if record.is_blank(&spec.name) {
            if spec.required {
                return Err((spec.name.clone(), "field required".to_string()));
            }
            normalised.insert(spec.name.clone(), Value::Null);
            continue;
        }

        let raw = record.get(&spec.name).unwrap_or(&Value::Null);
        let value = coerce(raw, spec).map_err(|reason| (spec.name.clone(), reason))?;
        normalised.insert(spec.name.clone(), value);
    }

    Ok(normalised)
}

fn coerce(raw: &Value, spec: &FieldSpec) -> Result<Value, String> {
    let value = match &spec.kind {
        FieldKind::String => match raw {
            Value::String(_) => raw.clone(),
            _ => return Err("expected a string".to_string()),
        },
        FieldKind::Float => {
            let n = as_f64(raw).ok_or("expected a number")?;
            Number::from_f64(n)
                .map(Value::Number)
                .ok_or("expected a finite number")?
        }
        FieldKind::Integer => Value::from(as_i64(raw).ok_or("expected an integer")?),
        FieldKind::Bool => Value::Bool(as_bool(raw).ok_or("expected a boolean")?),
        FieldKind::Date => {
            let text = raw.as_str().ok_or("expected a date string")?;
            let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map_err(|_| format!("invalid date '{text}', expected YYYY-MM-DD"))?;
            Value::String(date.format("%Y-%m-%d").to_string())
        }
        FieldKind::DateTime => {
            let text = raw.as_str().ok_or("expected a timestamp string")?;
            let timestamp = parse_timestamp(text)
                .ok_or_else(|| format!("invalid timestamp '{text}', expected YYYY-MM-DD HH:MM:SS"))?;
            Value::String(format_timestamp(&timestamp))
        }
        FieldKind::Enum(allowed) => {
            let text = raw.as_str().ok_or("expected a string")?;
            if !allowed.iter().any(|a| a == text) {
                return Err(format!(
                    "'{}' is not one of [{}]",
                    text,
                    allowed.join(", ")
                ));
            }
            raw.clone()
        }
        FieldKind::List => match raw {
            Value::Array(_) => raw.clone(),
            _ => return Err("expected a list".to_string()),
        },
        FieldKind::Object => match raw {
            Value::Object(_) => raw.clone(),
            _ => return Err("expected an object".to_string()),
        },
    };

    if spec.kind.is_numeric() {
        if let Some(n) = value.as_f64() {
            spec.bound.check(n)?;
        }
    }

    Ok(value)
}

/// Parse a timestamp the way CSV exports write them.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// ISO form accepted by Cypher `datetime()`.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

fn as_f64(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn as_i64(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn employee_shape() -> Shape {
        Shape::new("Employee")
            .required("employee_id", FieldKind::String)
            .required("hire_date", FieldKind::Date)
            .optional("manager_id", FieldKind::String)
            .field(FieldSpec::required("salary", FieldKind::Float).gt(0.0))
    }

    fn employee(id: &str, salary: Value) -> Record {
        Record::new()
            .with("employee_id", id)
            .with("hire_date", "2020-01-15")
            .with("salary", salary)
    }

    #[test]
    fn test_partition_counts() {
        let records = vec![
            employee("E1", json!(85000.0)),
            employee("E2", json!(-1)),
            employee("", json!(10)),
            employee("E4", json!("72000")),
        ];
        let result = validate(&records, &employee_shape());
        assert_eq!(result.valid.len(), 2);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.total(), records.len());
        assert_eq!(result.errors[0].index, 1);
        assert_eq!(result.errors[0].field, "salary");
        assert_eq!(result.errors[1].to_string(), "Record 2: employee_id: field required");
    }

    #[test]
    fn test_valid_records_are_normalised_copies() {
        let records = vec![employee("E4", json!("72000"))];
        let result = validate(&records, &employee_shape());
        let valid = &result.valid[0];
        assert_eq!(valid.get("salary"), Some(&json!(72000.0)));
        assert_eq!(valid.get("manager_id"), Some(&Value::Null));
        // the caller's record is untouched
        assert_eq!(records[0].get("salary"), Some(&json!("72000")));
        assert!(records[0].get("manager_id").is_none());
    }

    #[test]
    fn test_enum_and_date_checks() {
        let shape = Shape::new("EmployeeSkill")
            .required("proficiency_level", FieldKind::one_of(&["Beginner", "Expert"]))
            .required("since", FieldKind::Date);
        let records = vec![
            Record::new().with("proficiency_level", "Guru").with("since", "2021-02-03"),
            Record::new().with("proficiency_level", "Expert").with("since", "03/02/2021"),
            Record::new().with("proficiency_level", "Expert").with("since", " 2021-02-03 "),
        ];
        let result = validate(&records, &shape);
        assert_eq!(result.valid.len(), 1);
        assert!(result.errors[0].reason.contains("not one of"));
        assert!(result.errors[1].reason.contains("invalid date"));
        assert_eq!(result.valid[0].get_str("since"), Some("2021-02-03"));
    }

    #[test]
    fn test_exclusive_upper_bound() {
        let shape = Shape::new("Discount")
            .field(FieldSpec::required("rate", FieldKind::Float).ge(0.0).lt(1.0));
        let records = vec![
            Record::new().with("rate", 0.0),
            Record::new().with("rate", "0.99"),
            Record::new().with("rate", 1),
        ];
        let result = validate(&records, &shape);
        assert_eq!(result.valid.len(), 2);
        assert_eq!(result.errors[0].to_string(), "Record 2: rate: must be less than 1");
    }

    #[test]
    fn test_timestamps_are_normalised() {
        let shape = Shape::new("PurchaseOrder").required("dateIssued", FieldKind::DateTime);
        let records = vec![
            Record::new().with("dateIssued", "2024-03-05 14:30:00"),
            Record::new().with("dateIssued", "2024-03-05T14:30:00.250"),
            Record::new().with("dateIssued", "2024-03-05"),
            Record::new().with("dateIssued", "yesterday"),
        ];
        let result = validate(&records, &shape);
        assert_eq!(result.valid.len(), 3);
        assert_eq!(result.valid[0].get_str("dateIssued"), Some("2024-03-05T14:30:00"));
        assert_eq!(result.valid[1].get_str("dateIssued"), Some("2024-03-05T14:30:00.250"));
        assert_eq!(result.valid[2].get_str("dateIssued"), Some("2024-03-05T00:00:00"));
        assert_eq!(result.errors[0].index, 3);
        assert!(result.errors[0].reason.contains("invalid timestamp"));
    }

    #[test]
    fn test_lax_scalar_coercion() {
        let shape = Shape::new("Supplier")
            .required("active", FieldKind::Bool)
            .required("tier", FieldKind::Integer);
        let records = vec![Record::new().with("active", "True").with("tier", "2")];
        let result = validate(&records, &shape);
        assert_eq!(result.valid[0].get("active"), Some(&json!(true)));
        assert_eq!(result.valid[0].get("tier"), Some(&json!(2)));
    }

    #[test]
    fn test_validate_value_rejects_non_sequence() {
        let err = validate_value(&json!({"employee_id": "E1"}), &employee_shape()).unwrap_err();
        assert!(matches!(err, HelixError::MalformedInput(_)));

        let ok = validate_value(&json!([{"employee_id": "E1"}]), &employee_shape()).unwrap();
        assert_eq!(ok.errors.len(), 1);
    }
}
