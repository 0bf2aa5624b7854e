mod common;

use census_etl::adapters::GeoPackage;
use census_etl::core::{StatRow, StatTable, ZipCode};
use census_etl::domain::layer::Value;
use census_etl::{EtlEngine, EtlError, JsonExportPipeline, WktPipeline};
use common::{seed_boundaries, test_config};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_wkt_column_added() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), "http://localhost"));
    seed_boundaries(&config, &["64101", "64102"]);

    let engine = EtlEngine::new(WktPipeline::new(config.clone()));
    engine.run().await.unwrap();
    // running twice replaces the column instead of adding another
    engine.run().await.unwrap();

    let layer = GeoPackage::open_existing(config.geopackage_path())
        .unwrap()
        .read_layer("zipcodes")
        .unwrap();
    assert_eq!(
        layer.field_names().collect::<Vec<_>>(),
        vec!["ZIPCODE", "GEOID20", "geometry_wkt"]
    );
    let wkt: Vec<&str> = layer
        .column("geometry_wkt")
        .unwrap()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(wkt.len(), 2);
    assert!(wkt[0].starts_with("POLYGON (("));
    assert!(wkt[0].contains("-94.6 39"));
}

#[tokio::test]
async fn test_wkt_requires_geopackage() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), "http://localhost"));
    let err = EtlEngine::new(WktPipeline::new(config))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, EtlError::GeoPackageNotFound { .. }));
}

fn sample_stats() -> StatTable {
    let mut stats = StatTable::new(vec!["B01001_001E".to_string()]);
    stats.rows.push(StatRow {
        zipcode: ZipCode::canonicalize("64101").unwrap(),
        values: vec![Some(1200.0)],
    });
    stats
}

#[tokio::test]
async fn test_geojson_from_merged_layer() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), "http://localhost"));
    let boundaries = seed_boundaries(&config, &["64101", "64102"]);
    let merged = sample_stats()
        .left_join(&boundaries, "ZIPCODE", "acs_data")
        .unwrap();
    GeoPackage::open_existing(config.geopackage_path())
        .unwrap()
        .write_layer(&merged)
        .unwrap();

    let output = EtlEngine::new(JsonExportPipeline::new(config.clone()))
        .run()
        .await
        .unwrap();
    assert_eq!(output, config.json_export_path().display().to_string());

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(config.json_export_path()).unwrap()).unwrap();
    assert_eq!(json["type"], "FeatureCollection");
    let features = json["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["id"], "0");
    assert_eq!(features[0]["type"], "Feature");
    assert_eq!(features[0]["properties"]["ZIPCODE"], "64101");
    assert_eq!(features[0]["properties"]["B01001_001E"], 1200.0);
    assert_eq!(features[0]["geometry"]["type"], "Polygon");
    assert!(features[1]["properties"]["B01001_001E"].is_null());
}

#[tokio::test]
async fn test_geojson_falls_back_to_table_join() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), "http://localhost"));
    seed_boundaries(&config, &["64101", "64102", "64105"]);
    let table = sample_stats()
        .to_attribute_layer("acs_data_table", "ZIPCODE")
        .unwrap();
    GeoPackage::open_existing(config.geopackage_path())
        .unwrap()
        .write_layer(&table)
        .unwrap();

    EtlEngine::new(JsonExportPipeline::new(config.clone()))
        .run()
        .await
        .unwrap();

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(config.json_export_path()).unwrap()).unwrap();
    let features = json["features"].as_array().unwrap();
    assert_eq!(features.len(), 3);
    assert_eq!(features[2]["id"], "2");
    assert_eq!(features[0]["properties"]["B01001_001E"], 1200.0);
    assert!(features.iter().all(|f| f["geometry"].is_object()));
}

#[tokio::test]
async fn test_geojson_without_sources() {
    let dir = TempDir::new().unwrap();
    let config = Arc::new(test_config(dir.path(), "http://localhost"));

    let err = EtlEngine::new(JsonExportPipeline::new(config.clone()))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, EtlError::GeoPackageNotFound { .. }));

    // container present but only boundaries
    seed_boundaries(&config, &["64101"]);
    let err = EtlEngine::new(JsonExportPipeline::new(config))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, EtlError::LayerNotFound { .. }));
}
