pub mod acs_pipeline;
pub mod boundary_pipeline;
pub mod json_export_pipeline;
pub mod wkt_pipeline;

pub use acs_pipeline::AcsPipeline;
pub use boundary_pipeline::BoundaryPipeline;
pub use json_export_pipeline::JsonExportPipeline;
pub use wkt_pipeline::WktPipeline;
