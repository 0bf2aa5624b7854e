use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "census-etl")]
#[command(about = "Census ZCTA boundaries and ACS statistics for the Kansas City metro")]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory the data/ tree is created under
    #[arg(long, global = true)]
    pub project_root: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Download TIGER ZCTA boundaries into the `zipcodes` layer
    Boundaries,
    /// Fetch ACS statistics and join them onto the boundaries
    Acs,
    /// Add a WKT text column to the `zipcodes` layer
    Wkt,
    /// Export the merged layer as GeoJSON
    Export,
    /// Run boundaries, acs, wkt and export in order
    All,
    /// Show what a run would do without touching the network or disk
    Plan,
}
