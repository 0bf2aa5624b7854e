pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{Cli, Command};

pub use app::pipelines::{AcsPipeline, BoundaryPipeline, JsonExportPipeline, WktPipeline};
pub use config::EtlConfig;
pub use core::etl::EtlEngine;
pub use utils::error::{EtlError, Result};
