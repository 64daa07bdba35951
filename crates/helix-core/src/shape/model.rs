//! Shape declarations for record validation.

use serde::{Deserialize, Serialize};

/// Primitive type a field must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Float,
    Integer,
    Bool,
    /// `YYYY-MM-DD`.
    Date,
    /// `YYYY-MM-DD HH:MM:SS` or ISO `T`-separated; a bare date means midnight.
    DateTime,
    /// One of a closed set of string values.
    Enum(Vec<String>),
    List,
    Object,
}

impl FieldKind {
    pub fn one_of(values: &[&str]) -> Self {
        Self::Enum(values.iter().map(|v| v.to_string()).collect())
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Float | Self::Integer)
    }
}

/// Numeric range for a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub min: Option<f64>,
    pub min_exclusive: bool,
    pub max: Option<f64>,
    pub max_exclusive: bool,
}

impl Bound {
    /// Check a value, returning the violated condition.
    pub fn check(&self, value: f64) -> Result<(), String> {
        if let Some(min) = self.min {
            if self.min_exclusive && value <= min {
                return Err(format!("must be greater than {min}"));
            }
            if !self.min_exclusive && value < min {
                return Err(format!("must be greater than or equal to {min}"));
            }
        }
        if let Some(max) = self.max {
            if self.max_exclusive && value >= max {
                return Err(format!("must be less than {max}"));
            }
            if !self.max_exclusive && value > max {
                return Err(format!("must be less than or equal to {max}"));
            }
        }
        Ok(())
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(default)]
    pub bound: Bound,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            bound: Bound::default(),
        }
    }

    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn gt(mut self, min: f64) -> Self {
        self.bound.min = Some(min);
        self.bound.min_exclusive = true;
        self
    }

    pub fn ge(mut self, min: f64) -> Self {
        self.bound.min = Some(min);
        self.bound.min_exclusive = false;
        self
    }

    pub fn lt(mut self, max: f64) -> Self {
        self.bound.max = Some(max);
        self.bound.max_exclusive = true;
        self
    }

    pub fn le(mut self, max: f64) -> Self {
        self.bound.max = Some(max);
        self.bound.max_exclusive = false;
        self
    }
}

/// The declared shape of one entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl Shape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn required(self, name: &str, kind: FieldKind) -> Self {
        self.field(FieldSpec::required(name, kind))
    }

    pub fn optional(self, name: &str, kind: FieldKind) -> Self {
        self.field(FieldSpec::optional(name, kind))
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_and_inclusive_bounds() {
        let positive = FieldSpec::required("salary", FieldKind::Float).gt(0.0);
        assert!(positive.bound.check(0.0).is_err());
        assert!(positive.bound.check(0.01).is_ok());

        let years = FieldSpec::optional("years", FieldKind::Float).ge(0.0).le(30.0);
        assert!(years.bound.check(0.0).is_ok());
        assert!(years.bound.check(30.0).is_ok());
        assert_eq!(
            years.bound.check(30.5),
            Err("must be less than or equal to 30".to_string())
        );
    }

    #[test]
    fn test_shape_lookup() {
        let shape = Shape::new("Skill")
            .required("skill_id", FieldKind::String)
            .optional("category", FieldKind::one_of(&["Technical", "Tool"]));
        assert!(shape.get("skill_id").unwrap().required);
        assert!(!shape.get("category").unwrap().required);
        assert!(shape.get("name").is_none());
    }
}
