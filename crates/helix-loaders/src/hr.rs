//! HR loader: employees, skills, departments, locations.
//!
//! Reads `hr_employees.json`, `hr_skills.json` and `hr_employee_skills.json`
//! from the data directory and produces:
//! - `Employee`, `Skill`, `Department`, `Location` nodes
//! - `WORKS_IN`, `LOCATED_IN`, `REPORTS_TO` relationships
//! - `HAS_SKILL` relationships carrying proficiency

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use helix_core::source::{read_csv_records, read_json_records};
use helix_core::{FieldKind, FieldSpec, HelixResult, Record, Shape};
use helix_graph::{DomainLoader, GraphLoader, NodePattern, RelPattern, SchemaDefinition, Stage, UpsertTemplate};

pub const EMPLOYEES_FILE: &str = "hr_employees.json";
pub const SKILLS_FILE: &str = "hr_skills.json";
pub const EMPLOYEE_SKILLS_FILE: &str = "hr_employee_skills.json";

const PROFICIENCY_LEVELS: &[&str] = &["Beginner", "Intermediate", "Advanced", "Expert"];
const SKILL_CATEGORIES: &[&str] = &["Technical", "Soft Skill", "Domain", "Tool", "Language"];

pub fn employee_shape() -> Shape {
    Shape::new("Employee")
        .required("employee_id", FieldKind::String)
        .required("first_name", FieldKind::String)
        .required("last_name", FieldKind::String)
        .required("email", FieldKind::String)
        .optional("phone", FieldKind::String)
        .required("hire_date", FieldKind::Date)
        .required("job_title", FieldKind::String)
        .required("department", FieldKind::String)
        .optional("manager_id", FieldKind::String)
        .field(FieldSpec::required("salary", FieldKind::Float).gt(0.0))
        .required("location", FieldKind::String)
}

pub fn skill_shape() -> Shape {
    Shape::new("Skill")
        .required("skill_id", FieldKind::String)
        .required("name", FieldKind::String)
        .required("category", FieldKind::one_of(SKILL_CATEGORIES))
}

pub fn employee_skill_shape() -> Shape {
    Shape::new("EmployeeSkill")
        .required("employee_id", FieldKind::String)
        .required("skill_id", FieldKind::String)
        .required("proficiency_level", FieldKind::one_of(PROFICIENCY_LEVELS))
        .field(
            FieldSpec::optional("years_of_experience", FieldKind::Float)
                .ge(0.0)
                .le(30.0),
        )
}

/// Loads the HR dataset.
#[derive(Debug, Clone)]
pub struct HrLoader {
    data_dir: PathBuf,
}

impl HrLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn departments_template() -> UpsertTemplate {
        UpsertTemplate::new("departments")
            .merge_node(NodePattern::new("d", "Department").key("name").stamped())
    }

    fn locations_template() -> UpsertTemplate {
        UpsertTemplate::new("locations")
            .merge_node(NodePattern::new("l", "Location").key("name").stamped())
    }

    fn skills_template() -> UpsertTemplate {
        UpsertTemplate::new("skills").merge_node(
            NodePattern::new("s", "Skill")
                .key("skill_id")
                .set_fields(&["name", "category"])
                .stamped(),
        )
    }

    fn employees_template() -> UpsertTemplate {
        UpsertTemplate::new("employees")
            .merge_node(
                NodePattern::new("e", "Employee")
                    .key("employee_id")
                    .set_fields(&["first_name", "last_name", "email", "phone"])
                    .set_date("hire_date", "hire_date")
                    .set_fields(&["job_title", "salary"])
                    .stamped(),
            )
            .match_node(NodePattern::new("d", "Department").key_from("name", "department"))
            .merge_relationship(RelPattern::new("e", "WORKS_IN", "d").stamped())
            .match_node(NodePattern::new("l", "Location").key_from("name", "location"))
            .merge_relationship(RelPattern::new("e", "LOCATED_IN", "l").stamped())
    }

    fn reports_to_template() -> UpsertTemplate {
        UpsertTemplate::new("reporting_lines")
            .match_node(NodePattern::new("e", "Employee").key("employee_id"))
            .match_node(NodePattern::new("m", "Employee").key_from("employee_id", "manager_id"))
            .merge_relationship(RelPattern::new("e", "REPORTS_TO", "m").stamped())
    }

    fn has_skill_template() -> UpsertTemplate {
        UpsertTemplate::new("employee_skills")
            .match_node(NodePattern::new("e", "Employee").key("employee_id"))
            .match_node(NodePattern::new("s", "Skill").key("skill_id"))
            .merge_relationship(
                RelPattern::new("e", "HAS_SKILL", "s")
                    .set_fields(&["proficiency_level", "years_of_experience"])
                    .stamped(),
            )
    }
}

/// Read `<dir>/<file>`, falling back to the `.csv` export of the same
/// dataset when the JSON file is absent.
fn read_dataset(dir: &Path, file: &str) -> HelixResult<Vec<Record>> {
    let json = dir.join(file);
    let csv = json.with_extension("csv");
    if !json.exists() && csv.exists() {
        return read_csv_records(&csv);
    }
    read_json_records(&json)
}

/// One `{name}` record per distinct non-blank value of `field`, sorted.
pub(crate) fn distinct_names(records: &[Record], field: &str) -> Vec<Record> {
    let names: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| r.get_str(field))
        .filter(|s| !s.trim().is_empty())
        .collect();
    names
        .into_iter()
        .map(|name| Record::new().with("name", Value::String(name.to_string())))
        .collect()
}

#[async_trait]
impl DomainLoader for HrLoader {
    fn name(&self) -> &str {
        "HRLoader"
    }

    fn schema(&self) -> SchemaDefinition {
        SchemaDefinition::new()
            .unique("employee_id_unique", "Employee", "employee_id")
            .unique("department_name_unique", "Department", "name")
            .unique("location_name_unique", "Location", "name")
            .unique("skill_id_unique", "Skill", "skill_id")
            .index("employee_email", "Employee", &["email"])
            .index("employee_name", "Employee", &["last_name", "first_name"])
            .index("employee_job_title", "Employee", &["job_title"])
            .index("employee_hire_date", "Employee", &["hire_date"])
            .index("skill_name", "Skill", &["name"])
            .index("skill_category", "Skill", &["category"])
    }

    async fn stages(&self, loader: &mut GraphLoader) -> HelixResult<Vec<Stage>> {
        info!(data_dir = %self.data_dir.display(), "Loading data files...");
        let employees = read_dataset(&self.data_dir, EMPLOYEES_FILE)?;
        let skills = read_dataset(&self.data_dir, SKILLS_FILE)?;
        let employee_skills = read_dataset(&self.data_dir, EMPLOYEE_SKILLS_FILE)?;

        // Departments, locations and reporting lines derive from valid employees only.
        let employees = loader.validate(&employees, &employee_shape());
        let departments = distinct_names(&employees, "department");
        let locations = distinct_names(&employees, "location");
        let with_manager: Vec<Record> = employees
            .iter()
            .filter(|e| !e.is_blank("manager_id"))
            .cloned()
            .collect();
        info!(
            "{} of {} employees have a manager",
            with_manager.len(),
            employees.len()
        );

        Ok(vec![
            Stage::new("departments", Self::departments_template(), departments).with_batch_size(50),
            Stage::new("locations", Self::locations_template(), locations).with_batch_size(50),
            Stage::new("skills", Self::skills_template(), skills)
                .with_shape(skill_shape())
                .with_batch_size(50),
            Stage::new("employees", Self::employees_template(), employees)
                .after("departments")
                .after("locations"),
            Stage::new("reporting_lines", Self::reports_to_template(), with_manager).after("employees"),
            Stage::new("employee_skills", Self::has_skill_template(), employee_skills)
                .with_shape(employee_skill_shape())
                .with_batch_size(500)
                .after("employees")
                .after("skills"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helix_core::validate;
    use serde_json::json;

    #[test]
    fn test_employee_shape() {
        let good = Record::from_value(json!({
            "employee_id": "EMP001", "first_name": "John", "last_name": "Doe",
            "email": "john.doe@company.com", "hire_date": "2020-01-15",
            "job_title": "Engineer", "department": "Engineering",
            "salary": "85000", "location": "New York"
        }))
        .unwrap();
        let mut bad = good.clone();
        bad.insert("salary", 0);

        let result = validate(&[good, bad], &employee_shape());
        assert_eq!(result.valid.len(), 1);
        assert_eq!(result.valid[0].get("salary"), Some(&json!(85000.0)));
        assert_eq!(result.errors[0].to_string(), "Record 1: salary: must be greater than 0");
    }

    #[test]
    fn test_employee_skill_shape() {
        let records: Vec<Record> = [
            json!({"employee_id": "E1", "skill_id": "S1", "proficiency_level": "Expert"}),
            json!({"employee_id": "E1", "skill_id": "S2", "proficiency_level": "Guru"}),
            json!({"employee_id": "E1", "skill_id": "S3", "proficiency_level": "Beginner", "years_of_experience": 31}),
        ]
        .into_iter()
        .map(|v| Record::from_value(v).unwrap())
        .collect();

        let result = validate(&records, &employee_skill_shape());
        assert_eq!(result.valid.len(), 1);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_distinct_names_are_sorted() {
        let records: Vec<Record> = ["Sales", "Ops", "Sales", " "]
            .iter()
            .map(|d| Record::new().with("department", *d))
            .collect();
        let names: Vec<_> = distinct_names(&records, "department")
            .iter()
            .map(|r| r.get_str("name").unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Ops", "Sales"]);
    }

    #[test]
    fn test_employee_template_matches_after_merge() {
        let cypher = HrLoader::employees_template().cypher();
        assert!(cypher.contains("WITH *\nMATCH (d:Department {name: row.department})"));
        assert!(cypher.contains("WITH *\nMATCH (l:Location {name: row.location})"));
    }
}
