//! Dry-run report: what a full run would fetch and write, with no network or
//! disk access.

use crate::adapters::tiger::archive_candidates;
use crate::config::EtlConfig;
use crate::core::transform::chunk_variables;
use crate::utils::error::{EtlError, Result};
use std::fmt::Write;

pub fn render_plan(config: &EtlConfig) -> Result<String> {
    let mut out = String::new();
    write_plan(config, &mut out).map_err(|e| EtlError::ProcessingError {
        message: e.to_string(),
    })?;

    let resolved = toml::to_string_pretty(config).map_err(|e| EtlError::ProcessingError {
        message: format!("could not render configuration: {}", e),
    })?;
    out.push_str("\n🧾 Resolved configuration:\n");
    out.push_str(&resolved);
    Ok(out)
}

fn write_plan(config: &EtlConfig, out: &mut String) -> std::fmt::Result {
    let bbox = &config.region.bbox;
    writeln!(out, "📋 Census ETL Plan: {}", config.region.name)?;
    writeln!(
        out,
        "  Bounding box: ({}, {}) - ({}, {})",
        bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y
    )?;
    for state in &config.region.states {
        let counties: Vec<String> = state
            .counties
            .iter()
            .map(|c| format!("{} {}", c.name, c.fips))
            .collect();
        writeln!(
            out,
            "  {} ({}): {}",
            state.name,
            state.fips,
            counties.join(", ")
        )?;
    }
    writeln!(out)?;

    writeln!(out, "📥 Boundary archive candidates:")?;
    for (index, candidate) in archive_candidates(&config.tiger).iter().enumerate() {
        writeln!(out, "  {}. {}", index + 1, candidate.url)?;
    }
    writeln!(out)?;

    let variables = config.all_variables();
    let chunks = chunk_variables(&variables, config.census.max_vars_per_request);
    writeln!(
        out,
        "📊 ACS {} {}: {} variables in {} categories, {} request(s)",
        config.census.year,
        config.census.dataset,
        variables.len(),
        config.variables.len(),
        chunks.len()
    )?;
    for (index, chunk) in chunks.iter().enumerate() {
        writeln!(out, "  chunk {}: {} variables", index + 1, chunk.len())?;
    }
    let key_status = if config.api_key().is_ok() {
        "set"
    } else {
        "MISSING"
    };
    writeln!(out, "  API key: {}", key_status)?;
    writeln!(out)?;

    writeln!(out, "💾 Outputs:")?;
    writeln!(out, "  Raw downloads: {}", config.raw_dir().display())?;
    writeln!(
        out,
        "  GeoPackage: {} (layers: {}, {}, {})",
        config.geopackage_path().display(),
        config.layers.boundaries,
        config.layers.merged,
        config.layers.table
    )?;
    writeln!(out, "  GeoJSON: {}", config.json_export_path().display())?;
    Ok(())
}
