// Adapters layer: concrete implementations for external systems (GeoPackage storage, TIGER downloads, Census API, shapefiles)

pub mod census_api;
pub mod geopackage;
pub mod shapes;
pub mod tiger;

pub use census_api::CensusClient;
pub use geopackage::GeoPackage;
pub use tiger::{archive_candidates, ArchiveCandidate, TigerDownloader};
