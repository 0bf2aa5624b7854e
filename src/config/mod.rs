pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::domain::geometry::BoundingBox;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_list, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_url, Validate,
};
use catalog::{StateRegion, VariableCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

pub const API_KEY_ENV: &str = "CENSUS_API_KEY";

/// Everything a run needs, built once at start-up and handed to each stage.
/// Defaults are the Kansas City settings; a TOML file may override any
/// section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub paths: PathsConfig,
    pub census: CensusConfig,
    pub tiger: TigerConfig,
    pub region: RegionConfig,
    pub variables: Vec<VariableCategory>,
    pub identifiers: IdentifierConfig,
    pub layers: LayerNames,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            census: CensusConfig::default(),
            tiger: TigerConfig::default(),
            region: RegionConfig::default(),
            variables: catalog::acs_categories(),
            identifiers: IdentifierConfig::default(),
            layers: LayerNames::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub project_root: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub extract_dir: String,
    pub geopackage: String,
    pub json_export: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            raw_dir: PathBuf::from("data/raw/census"),
            processed_dir: PathBuf::from("data/processed/census"),
            extract_dir: "tiger_zcta".to_string(),
            geopackage: "census_zipcode_data.gpkg".to_string(),
            json_export: "census_zipcode_data.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CensusConfig {
    pub base_url: String,
    pub year: u16,
    pub dataset: String,
    pub geography: String,
    /// Filled from `CENSUS_API_KEY` when not set in the file.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub max_vars_per_request: usize,
    pub rate_limit_ms: u64,
    pub request_timeout_seconds: u64,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.census.gov".to_string(),
            year: 2023,
            dataset: "acs/acs5".to_string(),
            geography: "zip code tabulation area".to_string(),
            api_key: None,
            max_vars_per_request: 50,
            rate_limit_ms: 200,
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TigerConfig {
    pub base_url: String,
    pub year: u16,
    /// How many earlier years to try when the configured one is unavailable.
    pub fallback_years: u16,
    /// Fallback years below this are never tried.
    pub min_year: u16,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub read_timeout_seconds: u64,
    /// Used for the attempts after a timeout.
    pub extended_read_timeout_seconds: u64,
}

impl Default for TigerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www2.census.gov/geo/tiger".to_string(),
            year: 2025,
            fallback_years: 1,
            min_year: 2020,
            retry_attempts: 3,
            retry_delay_seconds: 5,
            connect_timeout_seconds: 60,
            read_timeout_seconds: 300,
            extended_read_timeout_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub name: String,
    pub bbox: BoundingBox,
    pub states: Vec<StateRegion>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: "Kansas City Metro".to_string(),
            bbox: catalog::kansas_city_bbox(),
            states: catalog::kansas_city_counties(),
        }
    }
}

/// Column-name aliases, resolved once where data enters the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierConfig {
    pub canonical: String,
    pub boundary_aliases: Vec<String>,
    pub statistic_aliases: Vec<String>,
    pub boundary_metadata: Vec<String>,
    pub dropped_geography: Vec<String>,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        let owned = |names: &[&str]| -> Vec<String> { names.iter().map(|n| n.to_string()).collect() };
        Self {
            canonical: "ZIPCODE".to_string(),
            boundary_aliases: owned(&["ZCTA5CE20", "ZCTA5CE10", "ZCTA5"]),
            statistic_aliases: owned(&["zip code tabulation area", "ZCTA5", "ZIPCODE"]),
            boundary_metadata: owned(&["GEOID20", "GEOID10", "AFFGEOID20", "AFFGEOID10"]),
            dropped_geography: owned(&["state", "county", "tract", "block group", "name"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerNames {
    pub boundaries: String,
    pub merged: String,
    pub table: String,
    pub wkt_field: String,
}

impl Default for LayerNames {
    fn default() -> Self {
        Self {
            boundaries: "zipcodes".to_string(),
            merged: "acs_data".to_string(),
            table: "acs_data_table".to_string(),
            wkt_field: "geometry_wkt".to_string(),
        }
    }
}

impl EtlConfig {
    pub fn kansas_city() -> Self {
        Self::default()
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths.project_root = root.into();
        self
    }

    /// Takes the API key from the environment unless one is already set.
    pub fn resolve_api_key_from_env(&mut self) {
        let configured = self
            .census
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !configured {
            self.census.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty());
        }
    }

    pub fn api_key(&self) -> Result<&str> {
        self.census
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(EtlError::MissingApiKey)
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.paths.project_root.join(&self.paths.raw_dir)
    }

    pub fn extract_dir(&self) -> PathBuf {
        self.raw_dir().join(&self.paths.extract_dir)
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.paths.project_root.join(&self.paths.processed_dir)
    }

    pub fn geopackage_path(&self) -> PathBuf {
        self.processed_dir().join(&self.paths.geopackage)
    }

    pub fn json_export_path(&self) -> PathBuf {
        self.processed_dir().join(&self.paths.json_export)
    }

    /// Every variable code across all categories, duplicates removed,
    /// first occurrence order kept.
    pub fn all_variables(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.variables
            .iter()
            .flat_map(|category| category.variables.iter())
            .filter(|code| seen.insert(code.as_str()))
            .cloned()
            .collect()
    }
}

impl Validate for EtlConfig {
    fn validate(&self) -> Result<()> {
        validate_url("census.base_url", &self.census.base_url)?;
        validate_url("tiger.base_url", &self.tiger.base_url)?;
        validate_non_empty_string("census.dataset", &self.census.dataset)?;
        validate_non_empty_string("census.geography", &self.census.geography)?;
        validate_positive_number(
            "census.max_vars_per_request",
            self.census.max_vars_per_request,
            1,
        )?;
        validate_positive_number("tiger.retry_attempts", self.tiger.retry_attempts as usize, 1)?;
        validate_range("tiger.year", self.tiger.year, self.tiger.min_year, 9999)?;

        validate_path("paths.raw_dir", &self.paths.raw_dir.to_string_lossy())?;
        validate_path("paths.processed_dir", &self.paths.processed_dir.to_string_lossy())?;
        validate_path("paths.geopackage", &self.paths.geopackage)?;
        validate_path("paths.json_export", &self.paths.json_export)?;

        let bbox = &self.region.bbox;
        validate_range("region.bbox.min_x", bbox.min_x, -180.0, 180.0)?;
        validate_range("region.bbox.max_x", bbox.max_x, -180.0, 180.0)?;
        validate_range("region.bbox.min_y", bbox.min_y, -90.0, 90.0)?;
        validate_range("region.bbox.max_y", bbox.max_y, -90.0, 90.0)?;
        if bbox.min_x >= bbox.max_x || bbox.min_y >= bbox.max_y {
            return Err(EtlError::ConfigValidationError {
                field: "region.bbox".to_string(),
                message: "min corner must be south-west of max corner".to_string(),
            });
        }

        validate_non_empty_list("variables", &self.variables)?;
        if self.all_variables().is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "variables[].variables".to_string(),
            });
        }

        validate_non_empty_string("identifiers.canonical", &self.identifiers.canonical)?;
        validate_non_empty_list("identifiers.boundary_aliases", &self.identifiers.boundary_aliases)?;
        validate_non_empty_list(
            "identifiers.statistic_aliases",
            &self.identifiers.statistic_aliases,
        )?;

        for (field, name) in [
            ("layers.boundaries", &self.layers.boundaries),
            ("layers.merged", &self.layers.merged),
            ("layers.table", &self.layers.table),
            ("layers.wkt_field", &self.layers.wkt_field),
        ] {
            validate_non_empty_string(field, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EtlConfig::kansas_city();
        assert!(config.validate().is_ok());
        let fips: Vec<&str> = config.region.states.iter().map(|s| s.fips.as_str()).collect();
        assert_eq!(fips, vec!["29", "20"]);
        assert_eq!(
            config.region.states.iter().map(|s| s.counties.len()).sum::<usize>(),
            8
        );
    }

    #[test]
    fn test_all_variables_has_no_duplicates() {
        let config = EtlConfig::kansas_city();
        let variables = config.all_variables();

        let distinct: HashSet<&String> = config
            .variables
            .iter()
            .flat_map(|c| c.variables.iter())
            .collect();
        assert_eq!(variables.len(), distinct.len());

        let unique: HashSet<&String> = variables.iter().collect();
        assert_eq!(unique.len(), variables.len());
    }

    #[test]
    fn test_all_variables_keeps_first_occurrence_order() {
        let mut config = EtlConfig::kansas_city();
        config.variables = vec![
            VariableCategory {
                key: "a".to_string(),
                name: "A".to_string(),
                variables: vec!["B2".to_string(), "B1".to_string()],
            },
            VariableCategory {
                key: "b".to_string(),
                name: "B".to_string(),
                variables: vec!["B1".to_string(), "B3".to_string()],
            },
        ];
        assert_eq!(config.all_variables(), vec!["B2", "B1", "B3"]);
    }

    #[test]
    fn test_paths_hang_off_project_root() {
        let config = EtlConfig::kansas_city().with_project_root("/tmp/run");
        assert_eq!(
            config.geopackage_path(),
            PathBuf::from("/tmp/run/data/processed/census/census_zipcode_data.gpkg")
        );
        assert_eq!(
            config.extract_dir(),
            PathBuf::from("/tmp/run/data/raw/census/tiger_zcta")
        );
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = EtlConfig::kansas_city();
        config.census.api_key = Some("  ".to_string());
        assert!(matches!(config.api_key(), Err(EtlError::MissingApiKey)));
        config.census.api_key = Some("abc".to_string());
        assert_eq!(config.api_key().unwrap(), "abc");
    }

    #[test]
    fn test_inverted_bbox_is_rejected() {
        let mut config = EtlConfig::kansas_city();
        config.region.bbox = BoundingBox::new(-94.0, 38.5, -95.5, 40.0);
        assert!(config.validate().is_err());
    }
}
