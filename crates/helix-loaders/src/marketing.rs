//! Marketing loader: campaigns, channels, KPIs and attributed orders.
//!
//! Input is one `marketing_data.json` document with `brands`, `objectives`,
//! `kpis`, `channels` and `campaigns` sections. Campaigns nest their channel
//! activations (each with KPI results) and their orders.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use helix_core::source::{dataset_section, read_json_document};
use helix_core::{FieldKind, FieldSpec, HelixResult, Shape};
use helix_graph::{DomainLoader, GraphLoader, NodePattern, RelPattern, SchemaDefinition, Stage, UpsertTemplate};

use crate::flatten::children;

pub const DATA_FILE: &str = "marketing_data.json";

const CURRENCIES: &[&str] = &["EUR", "USD", "GBP"];
const KPI_UNITS: &[&str] = &["Percent", "Count", "Currency", "Ratio", "Index"];
const CHANNEL_TYPES: &[&str] = &["Digital", "Social", "Email", "Search", "Display", "Retail", "PR"];

pub fn brand_shape() -> Shape {
    Shape::new("Brand")
        .required("brand_id", FieldKind::String)
        .required("name", FieldKind::String)
        .required("category", FieldKind::String)
        .required("market", FieldKind::String)
}

pub fn objective_shape() -> Shape {
    Shape::new("Objective")
        .required("objective_id", FieldKind::String)
        .required("name", FieldKind::String)
        .required("description", FieldKind::String)
}

pub fn kpi_shape() -> Shape {
    Shape::new("KPI")
        .required("kpi_id", FieldKind::String)
        .required("name", FieldKind::String)
        .required("description", FieldKind::String)
        .required("unit", FieldKind::one_of(KPI_UNITS))
        .required("direction", FieldKind::String)
}

pub fn channel_shape() -> Shape {
    Shape::new("Channel")
        .required("channel_id", FieldKind::String)
        .required("name", FieldKind::String)
        .required("type", FieldKind::one_of(CHANNEL_TYPES))
        .optional("parent_id", FieldKind::String)
}

pub fn campaign_shape() -> Shape {
    Shape::new("Campaign")
        .required("campaign_id", FieldKind::String)
        .required("name", FieldKind::String)
        .required("objective_id", FieldKind::String)
        .required("brand_id", FieldKind::String)
        .required("region", FieldKind::String)
        .required("start_date", FieldKind::Date)
        .required("end_date", FieldKind::Date)
        .required("budget", FieldKind::Float)
        .required("currency", FieldKind::one_of(CURRENCIES))
        .required("channels", FieldKind::List)
        .optional("orders", FieldKind::List)
}

pub fn campaign_channel_shape() -> Shape {
    Shape::new("CampaignChannel")
        .required("campaign_id", FieldKind::String)
        .required("channel_id", FieldKind::String)
        .required("spend", FieldKind::Float)
        .required("currency", FieldKind::one_of(CURRENCIES))
        .optional("kpis", FieldKind::List)
}

pub fn kpi_result_shape() -> Shape {
    Shape::new("CampaignChannelKPI")
        .required("campaign_id", FieldKind::String)
        .required("channel_id", FieldKind::String)
        .required("kpi_id", FieldKind::String)
        .required("value", FieldKind::Float)
        .required("unit", FieldKind::one_of(KPI_UNITS))
        .required("period_start", FieldKind::Date)
        .required("period_end", FieldKind::Date)
}

pub fn order_shape() -> Shape {
    Shape::new("CampaignOrder")
        .required("campaign_id", FieldKind::String)
        .required("order_id", FieldKind::String)
        .required("platform", FieldKind::String)
        .field(FieldSpec::required("revenue", FieldKind::Float))
        .required("currency", FieldKind::one_of(CURRENCIES))
        .required("conversion_date", FieldKind::Date)
}

/// Loads the marketing dataset.
#[derive(Debug, Clone)]
pub struct MarketingLoader {
    data_file: PathBuf,
}

impl MarketingLoader {
    pub fn new(data_file: impl Into<PathBuf>) -> Self {
        Self {
            data_file: data_file.into(),
        }
    }

    fn brands_template() -> UpsertTemplate {
        UpsertTemplate::new("brands").merge_node(
            NodePattern::new("b", "Brand")
                .key("brand_id")
                .set_fields(&["name", "category", "market"])
                .stamped(),
        )
    }

    fn objectives_template() -> UpsertTemplate {
        UpsertTemplate::new("objectives").merge_node(
            NodePattern::new("o", "MarketingObjective")
                .key("objective_id")
                .set_fields(&["name", "description"])
                .stamped(),
        )
    }

    fn kpis_template() -> UpsertTemplate {
        UpsertTemplate::new("kpis").merge_node(
            NodePattern::new("k", "MarketingKPI")
                .key("kpi_id")
                .set_fields(&["name", "description", "unit", "direction"])
                .stamped(),
        )
    }

    fn channels_template() -> UpsertTemplate {
        UpsertTemplate::new("channels")
            .merge_node(
                NodePattern::new("ch", "MarketingChannel")
                    .key("channel_id")
                    .set_fields(&["name", "type"])
                    .stamped(),
            )
            .require("parent_id")
            .match_node(NodePattern::new("parent", "MarketingChannel").key_from("channel_id", "parent_id"))
            .merge_relationship(RelPattern::new("ch", "SUB_CHANNEL_OF", "parent").stamped())
    }

    fn campaigns_template() -> UpsertTemplate {
        UpsertTemplate::new("campaigns")
            .merge_node(
                NodePattern::new("c", "MarketingCampaign")
                    .key("campaign_id")
                    .set_fields(&["name", "region"])
                    .set_date("start_date", "start_date")
                    .set_date("end_date", "end_date")
                    .set_fields(&["budget", "currency"])
                    .stamped(),
            )
            .match_node(NodePattern::new("b", "Brand").key("brand_id"))
            .merge_relationship(RelPattern::new("c", "FOR_BRAND", "b").stamped())
            .match_node(NodePattern::new("o", "MarketingObjective").key("objective_id"))
            .merge_relationship(RelPattern::new("c", "HAS_OBJECTIVE", "o").stamped())
    }

    fn activations_template() -> UpsertTemplate {
        UpsertTemplate::new("campaign_channels")
            .match_node(NodePattern::new("c", "MarketingCampaign").key("campaign_id"))
            .match_node(NodePattern::new("ch", "MarketingChannel").key("channel_id"))
            .merge_relationship(
                RelPattern::new("c", "ACTIVATED_ON", "ch")
                    .set_fields(&["spend", "currency"])
                    .stamped(),
            )
    }

    fn kpi_results_template() -> UpsertTemplate {
        UpsertTemplate::new("kpi_results")
            .match_node(NodePattern::new("c", "MarketingCampaign").key("campaign_id"))
            .match_node(NodePattern::new("ch", "MarketingChannel").key("channel_id"))
            .match_node(NodePattern::new("k", "MarketingKPI").key("kpi_id"))
            .merge_relationship(
                RelPattern::new("c", "KPI_RESULT", "k")
                    .key_from("kpi_id", "kpi_id")
                    .key_from("channel_id", "channel_id")
                    .key_from("period_start", "period_start")
                    .set_fields(&["value", "unit", "period_end"])
                    .stamped()
                    .set_literal("source", "marketing_data"),
            )
    }

    fn orders_template() -> UpsertTemplate {
        UpsertTemplate::new("orders")
            .match_node(NodePattern::new("c", "MarketingCampaign").key("campaign_id"))
            .merge_node(
                NodePattern::new("o", "CommerceOrder")
                    .key("order_id")
                    .set_fields(&["platform", "revenue", "currency"])
                    .set_date("conversion_date", "conversion_date")
                    .stamped(),
            )
            .merge_relationship(
                RelPattern::new("o", "ATTRIBUTED_TO", "c")
                    .stamped()
                    .set_literal("source", "marketing_data"),
            )
    }
}

#[async_trait]
impl DomainLoader for MarketingLoader {
    fn name(&self) -> &str {
        "MarketingLoader"
    }

    fn schema(&self) -> SchemaDefinition {
        SchemaDefinition::new()
            .unique("marketing_campaign_id_unique", "MarketingCampaign", "campaign_id")
            .unique("marketing_brand_id_unique", "Brand", "brand_id")
            .unique("marketing_objective_id_unique", "MarketingObjective", "objective_id")
            .unique("marketing_channel_id_unique", "MarketingChannel", "channel_id")
            .unique("marketing_kpi_id_unique", "MarketingKPI", "kpi_id")
            .index("marketing_campaign_name", "MarketingCampaign", &["name"])
            .index("marketing_campaign_dates", "MarketingCampaign", &["start_date", "end_date"])
            .index("marketing_channel_type", "MarketingChannel", &["type"])
            .index("marketing_kpi_name", "MarketingKPI", &["name"])
    }

    async fn stages(&self, loader: &mut GraphLoader) -> HelixResult<Vec<Stage>> {
        info!("Loading marketing dataset from {}", self.data_file.display());
        let document = read_json_document(&self.data_file)?;
        let brands = dataset_section(&document, "brands")?;
        let objectives = dataset_section(&document, "objectives")?;
        let kpis = dataset_section(&document, "kpis")?;
        let channels = dataset_section(&document, "channels")?;
        let campaigns = dataset_section(&document, "campaigns")?;
        info!(
            "Loaded marketing dataset: {} campaigns, {} brands",
            campaigns.len(),
            brands.len()
        );

        // Nested sections only come from campaigns that passed validation.
        let campaigns = loader.validate(&campaigns, &campaign_shape());
        let activations = children(&campaigns, "channels", &[("campaign_id", "campaign_id")]);
        let activations = loader.validate(&activations, &campaign_channel_shape());
        let kpi_results = children(
            &activations,
            "kpis",
            &[("campaign_id", "campaign_id"), ("channel_id", "channel_id")],
        );
        let orders = children(&campaigns, "orders", &[("campaign_id", "campaign_id")]);

        Ok(vec![
            Stage::new("brands", Self::brands_template(), brands)
                .with_shape(brand_shape())
                .with_batch_size(200),
            Stage::new("objectives", Self::objectives_template(), objectives)
                .with_shape(objective_shape())
                .with_batch_size(200),
            Stage::new("kpis", Self::kpis_template(), kpis)
                .with_shape(kpi_shape())
                .with_batch_size(200),
            Stage::new("channels", Self::channels_template(), channels)
                .with_shape(channel_shape())
                .with_batch_size(200),
            Stage::new("campaigns", Self::campaigns_template(), campaigns)
                .after("brands")
                .after("objectives")
                .with_batch_size(200),
            Stage::new("campaign_channels", Self::activations_template(), activations)
                .after("campaigns")
                .after("channels")
                .with_batch_size(500),
            Stage::new("kpi_results", Self::kpi_results_template(), kpi_results)
                .with_shape(kpi_result_shape())
                .after("campaigns")
                .after("channels")
                .after("kpis")
                .with_batch_size(1000),
            Stage::new("orders", Self::orders_template(), orders)
                .with_shape(order_shape())
                .after("campaigns")
                .with_batch_size(500),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_template_requires_parent() {
        let template = MarketingLoader::channels_template();
        assert!(!template.expects_full_match());
        assert_eq!(template.merged_labels(), vec!["MarketingChannel"]);
        assert!(template.merged_relationship_types().is_empty());
    }

    #[test]
    fn test_orders_credit_order_and_attribution() {
        let template = MarketingLoader::orders_template();
        assert_eq!(template.merged_labels(), vec!["CommerceOrder"]);
        assert_eq!(template.merged_relationship_types(), vec!["ATTRIBUTED_TO"]);
        assert!(template.cypher().starts_with(
            "UNWIND $batch AS row\nMATCH (c:MarketingCampaign {campaign_id: row.campaign_id})\nMERGE (o:CommerceOrder"
        ));
    }

    #[test]
    fn test_schema_matches_labels() {
        let schema = MarketingLoader::new(DATA_FILE).schema();
        assert_eq!(schema.len(), 9);
        assert!(schema
            .statements
            .iter()
            .any(|s| s.name() == "marketing_campaign_dates"));
    }
}
