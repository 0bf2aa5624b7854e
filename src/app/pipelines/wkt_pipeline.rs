use crate::adapters::GeoPackage;
use crate::config::EtlConfig;
use crate::core::{Pipeline, Result};
use crate::domain::layer::{Field, Layer, Value};
use std::sync::Arc;

/// Adds a WKT text copy of each boundary geometry to the `zipcodes` layer.
pub struct WktPipeline {
    config: Arc<EtlConfig>,
}

impl WktPipeline {
    pub fn new(config: Arc<EtlConfig>) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Pipeline for WktPipeline {
    type Extracted = Layer;
    type Transformed = Layer;

    fn name(&self) -> &str {
        "wkt"
    }

    async fn extract(&self) -> Result<Layer> {
        GeoPackage::open_existing(self.config.geopackage_path())?
            .read_layer(&self.config.layers.boundaries)
    }

    async fn transform(&self, mut layer: Layer) -> Result<Layer> {
        let wkt = layer
            .features
            .iter()
            .map(|f| match &f.geometry {
                Some(geometry) => Value::Text(geometry.to_string()),
                None => Value::Null,
            })
            .collect();
        layer.set_column(Field::text(&self.config.layers.wkt_field), wkt)?;
        Ok(layer)
    }

    async fn load(&self, layer: Layer) -> Result<String> {
        let path = self.config.geopackage_path();
        GeoPackage::open_existing(&path)?.write_layer(&layer)?;
        tracing::info!(
            "📝 Wrote '{}' for {} features in '{}'",
            self.config.layers.wkt_field,
            layer.len(),
            layer.name
        );
        Ok(path.display().to_string())
    }
}
