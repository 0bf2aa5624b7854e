use crate::adapters::{CensusClient, GeoPackage};
use crate::config::EtlConfig;
use crate::core::transform::{chunk_variables, clean_statistics, merge_chunks};
use crate::core::{Pipeline, Result, StatTable};
use crate::domain::layer::Layer;
use crate::domain::model::zipcodes_in_layer;
use crate::domain::table::RawTable;
use std::sync::Arc;

pub struct AcsOutput {
    pub merged: Layer,
    pub table: Layer,
}

/// ACS estimates for every configured variable, joined onto the boundary
/// layer.
pub struct AcsPipeline {
    config: Arc<EtlConfig>,
}

impl AcsPipeline {
    pub fn new(config: Arc<EtlConfig>) -> Self {
        Self { config }
    }

    fn read_boundaries(&self) -> Result<Layer> {
        GeoPackage::open_existing(self.config.geopackage_path())?
            .read_layer(&self.config.layers.boundaries)
    }
}

#[async_trait::async_trait]
impl Pipeline for AcsPipeline {
    type Extracted = Vec<RawTable>;
    type Transformed = AcsOutput;

    fn name(&self) -> &str {
        "acs"
    }

    async fn extract(&self) -> Result<Vec<RawTable>> {
        let client = CensusClient::new(self.config.census.clone())?;

        let variables = self.config.all_variables();
        let chunks = chunk_variables(&variables, self.config.census.max_vars_per_request);
        tracing::info!(
            "📊 Requesting {} variables in {} chunks from {}",
            variables.len(),
            chunks.len(),
            client.endpoint()
        );
        client.fetch_chunks(&chunks).await
    }

    async fn transform(&self, tables: Vec<RawTable>) -> Result<AcsOutput> {
        let ids = &self.config.identifiers;
        let merged = merge_chunks(tables, &ids.statistic_aliases)?;
        let mut stats: StatTable =
            clean_statistics(merged, ids, &self.config.all_variables())?;

        let boundaries = self.read_boundaries();
        match &boundaries {
            Ok(layer) => {
                let known = zipcodes_in_layer(layer, &ids.canonical)?;
                if known.is_empty() {
                    tracing::warn!(
                        "⚠️ Layer '{}' has no zipcodes, keeping all rows",
                        layer.name
                    );
                } else {
                    let before = stats.len();
                    stats.retain_known(&known);
                    tracing::info!(
                        "Kept {} of {} zipcodes present in '{}'",
                        stats.len(),
                        before,
                        layer.name
                    );
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Boundary layer unavailable, keeping all rows: {}", e);
            }
        }

        let boundaries = boundaries?;
        let layers = &self.config.layers;
        let merged = stats.left_join(&boundaries, &ids.canonical, &layers.merged)?;
        let table = stats.to_attribute_layer(&layers.table, &ids.canonical)?;
        Ok(AcsOutput { merged, table })
    }

    async fn load(&self, output: AcsOutput) -> Result<String> {
        let path = self.config.geopackage_path();
        let mut gpkg = GeoPackage::open_existing(&path)?;
        gpkg.write_layer(&output.merged)?;
        gpkg.write_layer(&output.table)?;

        tracing::info!(
            "💾 Saved '{}' ({} features) and '{}' ({} rows, {} variables)",
            output.merged.name,
            output.merged.len(),
            output.table.name,
            output.table.len(),
            output.table.fields.len().saturating_sub(1)
        );
        Ok(path.display().to_string())
    }
}
