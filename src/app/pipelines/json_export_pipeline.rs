use crate::adapters::GeoPackage;
use crate::config::EtlConfig;
use crate::core::{Pipeline, Result, StatTable};
use crate::domain::layer::Layer;
use crate::utils::error::EtlError;
use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;

/// Exports the merged layer as a GeoJSON FeatureCollection.
pub struct JsonExportPipeline {
    config: Arc<EtlConfig>,
}

impl JsonExportPipeline {
    pub fn new(config: Arc<EtlConfig>) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Pipeline for JsonExportPipeline {
    type Extracted = Layer;
    type Transformed = (usize, JsonValue);

    fn name(&self) -> &str {
        "export"
    }

    /// Prefers the merged layer; otherwise rebuilds it from the attribute
    /// table and the boundaries.
    async fn extract(&self) -> Result<Layer> {
        let gpkg = GeoPackage::open_existing(self.config.geopackage_path())?;
        let layers = &self.config.layers;
        let id_field = &self.config.identifiers.canonical;

        if gpkg.has_layer(&layers.merged)? {
            return gpkg.read_layer(&layers.merged);
        }
        if gpkg.has_layer(&layers.table)? && gpkg.has_layer(&layers.boundaries)? {
            tracing::info!(
                "Layer '{}' missing, joining '{}' onto '{}'",
                layers.merged,
                layers.table,
                layers.boundaries
            );
            let stats = StatTable::from_layer(&gpkg.read_layer(&layers.table)?, id_field)?;
            let boundaries = gpkg.read_layer(&layers.boundaries)?;
            return stats.left_join(&boundaries, id_field, &layers.merged);
        }

        Err(EtlError::LayerNotFound {
            layer: layers.merged.clone(),
        })
    }

    async fn transform(&self, layer: Layer) -> Result<(usize, JsonValue)> {
        let mut features = Vec::with_capacity(layer.len());
        for (index, feature) in layer.features.iter().enumerate() {
            let properties: Map<String, JsonValue> = layer
                .field_names()
                .zip(&feature.values)
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect();
            let geometry = match &feature.geometry {
                Some(geometry) => serde_json::to_value(geometry)?,
                None => JsonValue::Null,
            };
            features.push(json!({
                "id": index.to_string(),
                "type": "Feature",
                "properties": properties,
                "geometry": geometry,
            }));
        }

        let count = features.len();
        Ok((
            count,
            json!({
                "type": "FeatureCollection",
                "features": features,
            }),
        ))
    }

    async fn load(&self, result: (usize, JsonValue)) -> Result<String> {
        let (count, collection) = result;
        let path = self.config.json_export_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, serde_json::to_vec(&collection)?).await?;

        tracing::info!("📤 Exported {} features to {}", count, path.display());
        Ok(path.display().to_string())
    }
}
