use crate::adapters::shapes::{self, SourceCrs};
use crate::adapters::tiger::{self, TigerDownloader};
use crate::adapters::GeoPackage;
use crate::config::EtlConfig;
use crate::core::transform::normalize_boundaries;
use crate::core::{Pipeline, Result};
use crate::domain::layer::Layer;
use std::path::PathBuf;
use std::sync::Arc;

/// ZCTA boundaries for the region, from the TIGER archive into the
/// `zipcodes` layer.
pub struct BoundaryPipeline {
    config: Arc<EtlConfig>,
}

impl BoundaryPipeline {
    pub fn new(config: Arc<EtlConfig>) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Pipeline for BoundaryPipeline {
    type Extracted = PathBuf;
    type Transformed = Layer;

    fn name(&self) -> &str {
        "boundaries"
    }

    /// Locates or downloads the archive and returns the extracted `.shp`.
    async fn extract(&self) -> Result<PathBuf> {
        let candidates = tiger::archive_candidates(&self.config.tiger);
        let downloader = TigerDownloader::new(self.config.tiger.clone())?;
        let (candidate, archive) = downloader
            .fetch_archive(&candidates, &self.config.raw_dir())
            .await?;
        tracing::info!("Using TIGER {} ZCTA archive", candidate.year);

        tiger::extract_archive(&archive, &self.config.extract_dir(), &candidate.shp_name())
    }

    async fn transform(&self, shp_path: PathBuf) -> Result<Layer> {
        let crs = SourceCrs::detect(&shp_path)?;

        let ids = &self.config.identifiers;
        let mut wanted = ids.boundary_aliases.clone();
        wanted.extend(ids.boundary_metadata.iter().cloned());

        let bbox = &self.config.region.bbox;
        let records = shapes::read_shapes(&shp_path, &wanted, Some(bbox))?;
        tracing::info!(
            "🗺️ {} boundaries intersect {} ({}, {}, {}, {})",
            records.len(),
            self.config.region.name,
            bbox.min_x,
            bbox.min_y,
            bbox.max_x,
            bbox.max_y
        );

        let records = if crs == SourceCrs::Wgs84 {
            records
        } else {
            tracing::info!("Reprojecting EPSG:{} -> EPSG:4326", crs.epsg());
            records
                .into_iter()
                .map(|mut record| {
                    record.geometry = crs.to_wgs84(record.geometry);
                    record
                })
                .collect()
        };

        normalize_boundaries(records, ids, &self.config.layers.boundaries)
    }

    async fn load(&self, layer: Layer) -> Result<String> {
        let path = self.config.geopackage_path();
        let mut gpkg = GeoPackage::open(&path)?;
        gpkg.write_layer(&layer)?;
        tracing::info!(
            "💾 Saved {} zipcodes to layer '{}'",
            layer.len(),
            layer.name
        );
        Ok(path.display().to_string())
    }
}
