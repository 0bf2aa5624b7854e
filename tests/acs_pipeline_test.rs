mod common;

use census_etl::adapters::GeoPackage;
use census_etl::domain::layer::Value;
use census_etl::{AcsPipeline, EtlEngine, EtlError};
use common::{acs_body, seed_boundaries, test_config, VARIABLES};
use httpmock::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_acs_end_to_end() {
    let server = MockServer::start();
    let census = server.mock(|when, then| {
        when.method(GET)
            .path("/data/2023/acs/acs5")
            .query_param("get", VARIABLES.join(",").as_str())
            .query_param("for", "zip code tabulation area:*")
            .query_param("key", "test-key");
        then.status(200)
            .json_body(acs_body(&["64101", "64102", "64999"]));
    });

    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), &server.base_url()));
    seed_boundaries(&config, &["64101", "64102"]);

    EtlEngine::new(AcsPipeline::new(config.clone()))
        .run()
        .await
        .unwrap();
    census.assert_hits(1);

    let gpkg = GeoPackage::open_existing(config.geopackage_path()).unwrap();
    let merged = gpkg.read_layer("acs_data").unwrap();
    assert_eq!(merged.len(), 2);
    assert!(merged.has_geometry);
    for feature in &merged.features {
        assert!(feature.geometry.is_some());
        for variable in VARIABLES {
            let index = merged.field_index(variable).unwrap();
            assert!(!feature.values[index].is_null(), "{variable}");
        }
    }
    assert_eq!(
        merged.features[0].values[merged.field_index("B01001_001E").unwrap()],
        Value::Real(1000.0)
    );

    // 64999 has no boundary and is filtered out
    let table = gpkg.read_layer("acs_data_table").unwrap();
    assert!(!table.has_geometry);
    assert_eq!(table.len(), 2);
    assert_eq!(
        table.field_names().collect::<Vec<_>>(),
        vec!["ZIPCODE", "B01001_001E", "B19013_001E", "B25077_001E"]
    );
    assert!(table.field_index("state").is_none());
}

#[tokio::test]
async fn test_unmatched_boundaries_keep_geometry() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/data/2023/acs/acs5");
        then.status(200).json_body(acs_body(&["64101"]));
    });

    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), &server.base_url()));
    seed_boundaries(&config, &["64101", "64102"]);

    EtlEngine::new(AcsPipeline::new(config.clone()))
        .run()
        .await
        .unwrap();

    let merged = GeoPackage::open_existing(config.geopackage_path())
        .unwrap()
        .read_layer("acs_data")
        .unwrap();
    assert_eq!(merged.len(), 2);
    let unmatched = &merged.features[1];
    assert_eq!(unmatched.values[0], Value::Text("64102".to_string()));
    assert!(unmatched.geometry.is_some());
    let index = merged.field_index("B19013_001E").unwrap();
    assert!(unmatched.values[index].is_null());
}

#[tokio::test]
async fn test_all_chunks_failing() {
    let server = MockServer::start();
    let census = server.mock(|when, then| {
        when.method(GET);
        then.status(500).body("internal error");
    });

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), &server.base_url());
    config.census.max_vars_per_request = 1;
    let config = Arc::new(config);
    seed_boundaries(&config, &["64101"]);

    let err = EtlEngine::new(AcsPipeline::new(config))
        .run()
        .await
        .unwrap_err();
    census.assert_hits(3);
    assert!(matches!(err, EtlError::NoChunksFetched { attempted: 3 }));
}

#[tokio::test]
async fn test_missing_api_key_makes_no_request() {
    let server = MockServer::start();
    let census = server.mock(|when, then| {
        when.any_request();
        then.status(200);
    });

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), &server.base_url());
    config.census.api_key = None;

    let err = EtlEngine::new(AcsPipeline::new(Arc::new(config)))
        .run()
        .await
        .unwrap_err();
    census.assert_hits(0);
    assert!(matches!(err, EtlError::MissingApiKey));
}

#[tokio::test]
async fn test_join_requires_geopackage() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(200).json_body(acs_body(&["64101"]));
    });

    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), &server.base_url()));

    let err = EtlEngine::new(AcsPipeline::new(config))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, EtlError::GeoPackageNotFound { .. }));
}

#[tokio::test]
async fn test_empty_boundary_layer_keeps_all_rows() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET);
        then.status(200).json_body(acs_body(&["64101", "64102"]));
    });

    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), &server.base_url()));
    seed_boundaries(&config, &[]);

    EtlEngine::new(AcsPipeline::new(config.clone()))
        .run()
        .await
        .unwrap();

    let gpkg = GeoPackage::open_existing(config.geopackage_path()).unwrap();
    assert_eq!(gpkg.read_layer("acs_data_table").unwrap().len(), 2);
    assert!(gpkg.read_layer("acs_data").unwrap().is_empty());
}
