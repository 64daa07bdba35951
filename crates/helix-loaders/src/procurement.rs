//! Procurement loader: suppliers, contracts, risk scores, purchase orders.
//!
//! Input is one `procurement_data.json` document with `suppliers`,
//! `contracts`, `risk_scores` and `purchase_orders` sections; each purchase
//! order nests its `lines`.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use helix_core::source::{dataset_section, read_json_document};
use helix_core::{FieldKind, FieldSpec, HelixResult, Shape};
use helix_graph::{DomainLoader, GraphLoader, NodePattern, RelPattern, SchemaDefinition, Stage, UpsertTemplate};

use crate::flatten::children;

pub const DATA_FILE: &str = "procurement_data.json";

const CURRENCIES: &[&str] = &["EUR", "USD", "GBP"];
const SUPPLIER_TIERS: &[&str] = &["Strategic", "Preferred", "Approved", "Tactical"];
const RISK_CATEGORIES: &[&str] = &["Financial", "Operational", "ESG", "GeoPolitical", "Compliance"];

pub fn supplier_shape() -> Shape {
    Shape::new("Supplier")
        .required("supplier_id", FieldKind::String)
        .required("name", FieldKind::String)
        .required("country", FieldKind::String)
        .required("industry", FieldKind::String)
        .required("tier", FieldKind::one_of(SUPPLIER_TIERS))
        .required("onboarding_date", FieldKind::Date)
}

pub fn contract_shape() -> Shape {
    Shape::new("Contract")
        .required("contract_id", FieldKind::String)
        .required("supplier_id", FieldKind::String)
        .required("category", FieldKind::String)
        .required("start_date", FieldKind::Date)
        .optional("end_date", FieldKind::Date)
        .required("value", FieldKind::Float)
        .required("currency", FieldKind::one_of(CURRENCIES))
}

pub fn risk_shape() -> Shape {
    Shape::new("RiskScore")
        .required("supplier_id", FieldKind::String)
        .required("category", FieldKind::one_of(RISK_CATEGORIES))
        .field(FieldSpec::required("score", FieldKind::Float).ge(0.0).le(100.0))
        .required("assessed_date", FieldKind::Date)
        .optional("notes", FieldKind::String)
}

pub fn purchase_order_shape() -> Shape {
    Shape::new("PurchaseOrder")
        .required("po_id", FieldKind::String)
        .required("supplier_id", FieldKind::String)
        .required("issue_date", FieldKind::Date)
        .required("expected_delivery_date", FieldKind::Date)
        .required("status", FieldKind::String)
        .required("lines", FieldKind::List)
}

pub fn order_line_shape() -> Shape {
    Shape::new("PurchaseOrderLine")
        .required("line_id", FieldKind::String)
        .required("po_id", FieldKind::String)
        .required("contract_id", FieldKind::String)
        .required("product_category", FieldKind::String)
        .required("quantity", FieldKind::Float)
        .required("unit_price", FieldKind::Float)
        .required("currency", FieldKind::one_of(CURRENCIES))
}

/// Loads the procurement dataset.
#[derive(Debug, Clone)]
pub struct ProcurementLoader {
    data_file: PathBuf,
}

impl ProcurementLoader {
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
        }
    }

    fn suppliers_template() -> UpsertTemplate {
        UpsertTemplate::new("suppliers").merge_node(
            NodePattern::new("s", "Supplier")
                .key("supplier_id")
                .set_fields(&["name", "country", "industry", "tier"])
                .set_date("onboarding_date", "onboarding_date")
                .stamped(),
        )
    }

    fn contracts_template() -> UpsertTemplate {
        UpsertTemplate::new("contracts")
            .match_node(NodePattern::new("s", "Supplier").key("supplier_id"))
            .merge_node(
                NodePattern::new("c", "Contract")
                    .key("contract_id")
                    .set("category", "category")
                    .set_date("start_date", "start_date")
                    .set_date("end_date", "end_date")
                    .set_fields(&["value", "currency"])
                    .stamped(),
            )
            .merge_relationship(
                RelPattern::new("s", "HAS_CONTRACT", "c")
                    .stamped()
                    .set_literal("source", "procurement_data"),
            )
    }

    fn risks_template() -> UpsertTemplate {
        UpsertTemplate::new("risk_scores")
            .match_node(NodePattern::new("s", "Supplier").key("supplier_id"))
            .merge_node(
                NodePattern::new("score", "SupplierRisk")
                    .key("supplier_id")
                    .key("category")
                    .key("assessed_date")
                    .set_fields(&["score", "notes"])
                    .stamped(),
            )
            .merge_relationship(RelPattern::new("s", "HAS_RISK", "score").stamped())
    }

    fn purchase_orders_template() -> UpsertTemplate {
        UpsertTemplate::new("purchase_orders")
            .match_node(NodePattern::new("s", "Supplier").key("supplier_id"))
            .merge_node(
                NodePattern::new("p", "PurchaseOrder")
                    .key("po_id")
                    .set_date("issue_date", "issue_date")
                    .set_date("expected_delivery_date", "expected_delivery_date")
                    .set("status", "status")
                    .stamped(),
            )
            .merge_relationship(RelPattern::new("s", "PLACED_ORDER", "p").stamped())
    }

    fn order_lines_template() -> UpsertTemplate {
        UpsertTemplate::new("order_lines")
            .match_node(NodePattern::new("po", "PurchaseOrder").key("po_id"))
            .match_node(NodePattern::new("c", "Contract").key("contract_id"))
            .merge_node(
                NodePattern::new("l", "PurchaseOrderLine")
                    .key("line_id")
                    .set_fields(&["product_category", "quantity", "unit_price", "currency"])
                    .stamped(),
            )
            .merge_relationship(RelPattern::new("po", "HAS_LINE", "l").stamped())
            .merge_relationship(RelPattern::new("l", "FULFILLED_BY", "c").stamped())
    }
}

#[async_trait]
impl DomainLoader for ProcurementLoader {
    fn name(&self) -> &str {
        "ProcurementLoader"
    }

    fn schema(&self) -> SchemaDefinition {
        SchemaDefinition::new()
            .unique("procurement_supplier_id_unique", "Supplier", "supplier_id")
            .unique("procurement_contract_id_unique", "Contract", "contract_id")
            .unique("procurement_purchase_order_id_unique", "PurchaseOrder", "po_id")
            .unique("procurement_po_line_id_unique", "PurchaseOrderLine", "line_id")
            .index("procurement_supplier_name", "Supplier", &["name"])
            .index("procurement_supplier_country", "Supplier", &["country"])
            .index("procurement_contract_category", "Contract", &["category"])
            .index("procurement_po_status", "PurchaseOrder", &["status"])
    }

    async fn stages(&self, loader: &mut GraphLoader) -> HelixResult<Vec<Stage>> {
        info!("Loading procurement dataset from {}", self.data_file.display());
        let document = read_json_document(&self.data_file)?;
        let suppliers = dataset_section(&document, "suppliers")?;
        let contracts = dataset_section(&document, "contracts")?;
        let risk_scores = dataset_section(&document, "risk_scores")?;
        let purchase_orders = dataset_section(&document, "purchase_orders")?;
        info!(
            "Loaded procurement dataset: {} suppliers, {} contracts",
            suppliers.len(),
            contracts.len()
        );

        let purchase_orders = loader.validate(&purchase_orders, &purchase_order_shape());
        let lines = children(&purchase_orders, "lines", &[("po_id", "po_id")]);

        Ok(vec![
            Stage::new("suppliers", Self::suppliers_template(), suppliers)
                .with_shape(supplier_shape())
                .with_batch_size(500),
            Stage::new("contracts", Self::contracts_template(), contracts)
                .with_shape(contract_shape())
                .after("suppliers")
                .with_batch_size(500),
            Stage::new("risk_scores", Self::risks_template(), risk_scores)
                .with_shape(risk_shape())
                .after("suppliers")
                .with_batch_size(500),
            Stage::new("purchase_orders", Self::purchase_orders_template(), purchase_orders)
                .after("suppliers")
                .with_batch_size(500),
            Stage::new("order_lines", Self::order_lines_template(), lines)
                .with_shape(order_line_shape())
                .after("purchase_orders")
                .after("contracts")
                .with_batch_size(1000),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helix_core::{validate, Record};
    use serde_json::json;

    #[test]
    fn test_risk_score_bounds() {
        let records: Vec<Record> = [
            json!({"supplier_id": "S1", "category": "ESG", "score": 55.5, "assessed_date": "2024-03-01", "notes": null}),
            json!({"supplier_id": "S1", "category": "ESG", "score": 101, "assessed_date": "2024-03-01"}),
            json!({"supplier_id": "S1", "category": "Weather", "score": 5, "assessed_date": "2024-03-01"}),
        ]
        .into_iter()
        .map(|v| Record::from_value(v).unwrap())
        .collect();

        let result = validate(&records, &risk_shape());
        assert_eq!(result.valid.len(), 1);
        assert_eq!(result.errors[0].to_string(), "Record 1: score: must be less than or equal to 100");
        assert_eq!(result.errors[1].field, "category");
    }

    #[test]
    fn test_order_lines_credit_line_and_both_links() {
        let template = ProcurementLoader::order_lines_template();
        assert_eq!(template.merged_labels(), vec!["PurchaseOrderLine"]);
        assert_eq!(
            template.merged_relationship_types(),
            vec!["HAS_LINE", "FULFILLED_BY"]
        );
    }

    #[test]
    fn test_risk_merge_key_is_composite() {
        let cypher = ProcurementLoader::risks_template().cypher();
        assert!(cypher.contains(
            "MERGE (score:SupplierRisk {supplier_id: row.supplier_id, category: row.category, assessed_date: row.assessed_date})"
        ));
    }
}
