#![allow(dead_code)]

use census_etl::adapters::GeoPackage;
use census_etl::config::catalog::VariableCategory;
use census_etl::domain::geometry::Geometry;
use census_etl::domain::layer::{Feature, Field, Layer, Value};
use census_etl::EtlConfig;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};
use std::io::{Cursor, Write};
use std::path::Path;

pub const VARIABLES: [&str; 3] = ["B01001_001E", "B19013_001E", "B25077_001E"];

/// A zipcode square with its south-west corner at (x, y).
pub struct Zcta {
    pub zip: &'static str,
    pub x: f64,
    pub y: f64,
}

pub fn kc_zctas() -> Vec<Zcta> {
    vec![
        Zcta { zip: "64102", x: -94.60, y: 39.08 },
        // outside the metro box
        Zcta { zip: "10001", x: -74.00, y: 40.70 },
        Zcta { zip: "64101", x: -94.62, y: 39.10 },
    ]
}

/// Builds a TIGER-style zip archive holding `tl_{year}_us_zcta520.*`.
pub fn zcta_archive(year: u16, zctas: &[Zcta]) -> Vec<u8> {
    let dir = tempfile::TempDir::new().unwrap();
    let stem = format!("tl_{}_us_zcta520", year);
    let shp_path = dir.path().join(format!("{}.shp", stem));

    {
        let table = TableWriterBuilder::new()
            .add_character_field(FieldName::try_from("ZCTA5CE20").unwrap(), 5)
            .add_character_field(FieldName::try_from("GEOID20").unwrap(), 5);
        let mut writer = shapefile::Writer::from_path(&shp_path, table).unwrap();
        for zcta in zctas {
            let polygon = Polygon::new(PolygonRing::Outer(vec![
                Point::new(zcta.x, zcta.y),
                Point::new(zcta.x, zcta.y + 0.01),
                Point::new(zcta.x + 0.01, zcta.y + 0.01),
                Point::new(zcta.x + 0.01, zcta.y),
                Point::new(zcta.x, zcta.y),
            ]));
            let mut record = Record::default();
            record.insert(
                "ZCTA5CE20".to_string(),
                FieldValue::Character(Some(zcta.zip.to_string())),
            );
            record.insert(
                "GEOID20".to_string(),
                FieldValue::Character(Some(zcta.zip.to_string())),
            );
            writer.write_shape_and_record(&polygon, &record).unwrap();
        }
    }
    std::fs::write(
        dir.path().join(format!("{}.prj", stem)),
        r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137,298.257222101]],PRIMEM["Greenwich",0],UNIT["Degree",0.017453292519943295]]"#,
    )
    .unwrap();

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for ext in ["shp", "shx", "dbf", "prj"] {
        let name = format!("{}.{}", stem, ext);
        zip.start_file(name.as_str(), options).unwrap();
        zip.write_all(&std::fs::read(dir.path().join(&name)).unwrap())
            .unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn test_config(root: &Path, base_url: &str) -> EtlConfig {
    let mut config = EtlConfig::kansas_city().with_project_root(root);
    config.tiger.base_url = base_url.to_string();
    config.tiger.retry_delay_seconds = 0;
    config.census.base_url = base_url.to_string();
    config.census.api_key = Some("test-key".to_string());
    config.census.rate_limit_ms = 0;
    config.variables = vec![VariableCategory {
        key: "sample".to_string(),
        name: "Sample".to_string(),
        variables: VARIABLES.iter().map(|v| v.to_string()).collect(),
    }];
    config
}

/// Census API body with the given zipcodes and one value per variable.
pub fn acs_body(zips: &[&str]) -> serde_json::Value {
    let mut header: Vec<String> = VARIABLES.iter().map(|v| v.to_string()).collect();
    header.push("state".to_string());
    header.push("zip code tabulation area".to_string());

    let mut rows = vec![serde_json::json!(header)];
    for (i, zip) in zips.iter().enumerate() {
        let mut row: Vec<String> = VARIABLES
            .iter()
            .enumerate()
            .map(|(j, _)| ((i + 1) * 1000 + j).to_string())
            .collect();
        row.push("29".to_string());
        row.push(zip.to_string());
        rows.push(serde_json::json!(row));
    }
    serde_json::Value::Array(rows)
}

/// Writes a `zipcodes` layer straight into the project's GeoPackage.
pub fn seed_boundaries(config: &EtlConfig, zips: &[&str]) -> Layer {
    let mut layer = Layer::features(
        config.layers.boundaries.as_str(),
        vec![Field::text("ZIPCODE"), Field::text("GEOID20")],
    );
    for (i, zip) in zips.iter().enumerate() {
        let x = -94.6 + i as f64 * 0.02;
        layer
            .push(Feature {
                geometry: Some(Geometry::polygon(vec![vec![
                    [x, 39.0],
                    [x + 0.01, 39.0],
                    [x + 0.01, 39.01],
                    [x, 39.0],
                ]])),
                values: vec![Value::Text(zip.to_string()), Value::Text(zip.to_string())],
            })
            .unwrap();
    }
    GeoPackage::open(config.geopackage_path())
        .unwrap()
        .write_layer(&layer)
        .unwrap();
    layer
}
