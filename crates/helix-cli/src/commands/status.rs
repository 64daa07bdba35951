//! Graph status.

use anyhow::Result;

use helix_core::HelixConfig;

use crate::output;

pub async fn execute(config: &HelixConfig) -> Result<()> {
    let loader = super::connect(config).await?;
    let statistics = loader.graph_statistics().await?;
    output::print_graph_statistics(&loader.describe(), &statistics);
    Ok(())
}
