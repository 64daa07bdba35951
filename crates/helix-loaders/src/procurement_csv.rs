//! Procurement CSV loader: the exports of the procurement data generator.
//!
//! Reads `suppliers.csv`, `products.csv`, `purchase_orders.csv`,
//! `invoices.csv` and `risks.csv` from the data directory and produces:
//! - `Supplier`, `Product`, `PurchaseOrder`, `Invoice`, `SupplierRisk` nodes
//! - a four-level `ProductCategory` tree (`IN_CATEGORY`, `PARENT_CATEGORY`)
//! - `FROM_SUPPLIER`, `FOR_PRODUCT`, `FOR_PURCHASE_ORDER`, `ASSESSES`
//!
//! `purchase_orders.csv` has one row per order item. The order itself is
//! merged once from its first row; each item becomes a `FOR_PRODUCT`
//! relationship keyed by its item number.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use helix_core::source::read_csv_records;
use helix_core::{FieldKind, FieldSpec, HelixResult, Shape};
use helix_graph::{DomainLoader, GraphLoader, NodePattern, RelPattern, SchemaDefinition, Stage, UpsertTemplate};

use crate::flatten::first_per_key;

pub const SUPPLIERS_FILE: &str = "suppliers.csv";
pub const PRODUCTS_FILE: &str = "products.csv";
pub const PURCHASE_ORDERS_FILE: &str = "purchase_orders.csv";
pub const INVOICES_FILE: &str = "invoices.csv";
pub const RISKS_FILE: &str = "risks.csv";

const FINANCIAL_HEALTH: &[&str] = &["High", "Medium", "Low"];
const CATEGORY_LEVELS: [&str; 4] = ["category_L1", "category_L2", "category_L3", "category_L4"];

pub fn supplier_shape() -> Shape {
    Shape::new("Supplier")
        .required("vendorCode", FieldKind::String)
        .required("legalName", FieldKind::String)
        .optional("address", FieldKind::String)
        .required("country", FieldKind::String)
        .optional("contactPerson", FieldKind::String)
        .optional("isActive", FieldKind::Bool)
        .optional("financialHealth", FieldKind::one_of(FINANCIAL_HEALTH))
        .field(FieldSpec::optional("riskScore", FieldKind::Float).ge(0.0).le(100.0))
}

pub fn product_shape() -> Shape {
    let shape = Shape::new("Product")
        .required("sku", FieldKind::String)
        .required("name", FieldKind::String)
        .optional("description", FieldKind::String)
        .optional("unitOfMeasure", FieldKind::String)
        .optional("isCritical", FieldKind::Bool);
    CATEGORY_LEVELS
        .iter()
        .fold(shape, |shape, level| shape.optional(level, FieldKind::String))
}

/// One row of `purchase_orders.csv`: order header fields plus one item.
pub fn order_item_shape() -> Shape {
    Shape::new("PurchaseOrderItem")
        .required("orderNumber", FieldKind::String)
        .field(FieldSpec::required("item", FieldKind::Integer).ge(0.0))
        .required("dateIssued", FieldKind::DateTime)
        .optional("dateChanged", FieldKind::DateTime)
        .required("orderStatus", FieldKind::String)
        .optional("approvedBy", FieldKind::String)
        .required("supplierVendorCode", FieldKind::String)
        .required("productSku", FieldKind::String)
        .field(FieldSpec::optional("quantity", FieldKind::Float).ge(0.0))
        .field(FieldSpec::optional("unitPrice", FieldKind::Float).ge(0.0))
        .optional("orderTotalValue", FieldKind::Float)
        .optional("deliveryDate", FieldKind::DateTime)
        .optional("still_to_be_delivered_qty", FieldKind::Float)
        .optional("still_to_be_delivered_value", FieldKind::Float)
        .optional("still_to_be_invoiced_qty", FieldKind::Float)
        .optional("still_to_be_invoiced_value", FieldKind::Float)
        .optional("contractReference", FieldKind::String)
        .optional("paymentTerms", FieldKind::String)
        .optional("requisitioner", FieldKind::String)
        .optional("costCenter", FieldKind::String)
}

pub fn invoice_shape() -> Shape {
    Shape::new("Invoice")
        .required("invoiceNumber", FieldKind::String)
        .optional("supplierReference", FieldKind::String)
        .required("dateCreated", FieldKind::DateTime)
        .optional("paymentDueDate", FieldKind::DateTime)
        .optional("totalPaymentDue", FieldKind::Float)
        .required("paymentStatus", FieldKind::String)
        .optional("late_payment_flag", FieldKind::Bool)
        .required("poOrderNumber", FieldKind::String)
        .optional("glAccount", FieldKind::String)
        .optional("costCenter", FieldKind::String)
        .optional("invoiceText", FieldKind::String)
        .optional("postingDate", FieldKind::DateTime)
}

pub fn risk_shape() -> Shape {
    Shape::new("SupplierRisk")
        .required("riskId", FieldKind::String)
        .required("supplierVendorCode", FieldKind::String)
        .required("riskType", FieldKind::String)
        .field(FieldSpec::required("riskScore", FieldKind::Float).ge(0.0).le(100.0))
        .optional("riskDescription", FieldKind::String)
        .optional("mitigationPlan", FieldKind::String)
        .optional("riskStatus", FieldKind::String)
}

/// Loads the procurement CSV exports.
#[derive(Debug, Clone)]
pub struct ProcurementCsvLoader {
    data_dir: PathBuf,
}

impl ProcurementCsvLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn suppliers_template() -> UpsertTemplate {
        UpsertTemplate::new("suppliers").merge_node(
            NodePattern::new("s", "Supplier")
                .key("vendorCode")
                .set_fields(&[
                    "legalName",
                    "address",
                    "country",
                    "contactPerson",
                    "isActive",
                    "financialHealth",
                    "riskScore",
                ])
                .stamped(),
        )
    }

    /// Each level links the product and, below the top, its parent level.
    /// The chain stops at the first blank level.
    fn products_template() -> UpsertTemplate {
        let mut template = UpsertTemplate::new("products").merge_node(
            NodePattern::new("p", "Product")
                .key("sku")
                .set_fields(&["name", "description", "unitOfMeasure", "isCritical"])
                .set_fields(&CATEGORY_LEVELS)
                .stamped(),
        );

        for (index, field) in CATEGORY_LEVELS.iter().enumerate() {
            let level = index + 1;
            let alias = format!("c{level}");
            template = template
                .require(field)
                .merge_node(
                    NodePattern::new(alias.as_str(), "ProductCategory")
                        .key_from("name", field)
                        .key_literal("level", level),
                )
                .merge_relationship(RelPattern::new("p", "IN_CATEGORY", alias.as_str()));
            if level > 1 {
                template = template.merge_relationship(RelPattern::new(
                    alias.as_str(),
                    "PARENT_CATEGORY",
                    format!("c{index}"),
                ));
            }
        }
        template
    }

    fn purchase_orders_template() -> UpsertTemplate {
        UpsertTemplate::new("purchase_orders")
            .merge_node(
                NodePattern::new("po", "PurchaseOrder")
                    .key("orderNumber")
                    .set_datetime("dateIssued", "dateIssued")
                    .set_datetime("dateChanged", "dateChanged")
                    .set_datetime("deliveryDate", "deliveryDate")
                    .set_fields(&[
                        "orderStatus",
                        "approvedBy",
                        "contractReference",
                        "paymentTerms",
                        "requisitioner",
                        "costCenter",
                    ])
                    .stamped(),
            )
            .match_node(NodePattern::new("s", "Supplier").key_from("vendorCode", "supplierVendorCode"))
            .merge_relationship(RelPattern::new("po", "FROM_SUPPLIER", "s").stamped())
    }

    fn order_items_template() -> UpsertTemplate {
        UpsertTemplate::new("purchase_order_items")
            .match_node(NodePattern::new("po", "PurchaseOrder").key("orderNumber"))
            .match_node(NodePattern::new("prod", "Product").key_from("sku", "productSku"))
            .merge_relationship(
                RelPattern::new("po", "FOR_PRODUCT", "prod")
                    .key_from("item", "item")
                    .set_fields(&[
                        "quantity",
                        "unitPrice",
                        "orderTotalValue",
                        "still_to_be_delivered_qty",
                        "still_to_be_delivered_value",
                        "still_to_be_invoiced_qty",
                        "still_to_be_invoiced_value",
                    ])
                    .stamped(),
            )
    }

    fn invoices_template() -> UpsertTemplate {
        UpsertTemplate::new("invoices")
            .merge_node(
                NodePattern::new("i", "Invoice")
                    .key("invoiceNumber")
                    .set_fields(&[
                        "supplierReference",
                        "totalPaymentDue",
                        "paymentStatus",
                        "late_payment_flag",
                        "glAccount",
                        "costCenter",
                        "invoiceText",
                    ])
                    .set_datetime("dateCreated", "dateCreated")
                    .set_datetime("paymentDueDate", "paymentDueDate")
                    .set_datetime("postingDate", "postingDate")
                    .stamped(),
            )
            .match_node(NodePattern::new("po", "PurchaseOrder").key_from("orderNumber", "poOrderNumber"))
            .merge_relationship(RelPattern::new("i", "FOR_PURCHASE_ORDER", "po").stamped())
    }

    fn risks_template() -> UpsertTemplate {
        UpsertTemplate::new("risks")
            .merge_node(
                NodePattern::new("r", "SupplierRisk")
                    .key("riskId")
                    .set_fields(&["riskType", "riskScore", "riskDescription", "mitigationPlan", "riskStatus"])
                    .stamped(),
            )
            .match_node(NodePattern::new("s", "Supplier").key_from("vendorCode", "supplierVendorCode"))
            .merge_relationship(RelPattern::new("r", "ASSESSES", "s").stamped())
    }
}

#[async_trait]
impl DomainLoader for ProcurementCsvLoader {
    fn name(&self) -> &str {
        "ProcurementCSVLoader"
    }

    fn schema(&self) -> SchemaDefinition {
        SchemaDefinition::new()
            .unique("procurement_supplier_vendor_code_unique", "Supplier", "vendorCode")
            .unique("procurement_product_sku_unique", "Product", "sku")
            .unique("procurement_purchase_order_number_unique", "PurchaseOrder", "orderNumber")
            .unique("procurement_invoice_number_unique", "Invoice", "invoiceNumber")
            .unique("procurement_risk_id_unique", "SupplierRisk", "riskId")
            .index("procurement_supplier_country", "Supplier", &["country"])
            .index("procurement_product_category", "Product", &["category_L1"])
            .index("procurement_po_order_status", "PurchaseOrder", &["orderStatus"])
            .index("procurement_invoice_status", "Invoice", &["paymentStatus"])
            .index("procurement_risk_type", "SupplierRisk", &["riskType"])
    }

    async fn stages(&self, loader: &mut GraphLoader) -> HelixResult<Vec<Stage>> {
        info!(data_dir = %self.data_dir.display(), "Loading procurement CSV data");
        let suppliers = read_csv_records(&self.data_dir.join(SUPPLIERS_FILE))?;
        let products = read_csv_records(&self.data_dir.join(PRODUCTS_FILE))?;
        let order_items = read_csv_records(&self.data_dir.join(PURCHASE_ORDERS_FILE))?;
        let invoices = read_csv_records(&self.data_dir.join(INVOICES_FILE))?;
        let risks = read_csv_records(&self.data_dir.join(RISKS_FILE))?;
        info!(
            "Loaded procurement data: {} suppliers, {} products, {} order items, {} invoices, {} risks",
            suppliers.len(),
            products.len(),
            order_items.len(),
            invoices.len(),
            risks.len()
        );

        // Orders derive from valid item rows only.
        let order_items = loader.validate(&order_items, &order_item_shape());
        let orders = first_per_key(&order_items, "orderNumber");

        Ok(vec![
            Stage::new("suppliers", Self::suppliers_template(), suppliers)
                .with_shape(supplier_shape())
                .with_batch_size(500),
            Stage::new("products", Self::products_template(), products)
                .with_shape(product_shape())
                .with_batch_size(200),
            Stage::new("purchase_orders", Self::purchase_orders_template(), orders)
                .after("suppliers")
                .with_batch_size(500),
            Stage::new("purchase_order_items", Self::order_items_template(), order_items)
                .after("purchase_orders")
                .after("products")
                .with_batch_size(500),
            Stage::new("invoices", Self::invoices_template(), invoices)
                .with_shape(invoice_shape())
                .after("purchase_orders")
                .with_batch_size(500),
            Stage::new("risks", Self::risks_template(), risks)
                .with_shape(risk_shape())
                .after("suppliers")
                .with_batch_size(500),
        ])
    }
}
