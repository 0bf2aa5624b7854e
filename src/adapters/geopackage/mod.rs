//! Layer storage in a single GeoPackage (SQLite) file.
//!
//! Feature layers get a `geom` column with GeoPackage binary geometries and
//! an entry in `gpkg_geometry_columns`; attribute layers are plain tables
//! registered with `data_type = 'attributes'`. Writing a layer always
//! replaces it wholesale inside one transaction.

pub mod wkb;

use crate::domain::layer::{Feature, Field, FieldKind, Layer, Value};
use crate::utils::error::{EtlError, Result};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

pub const WGS84_SRS_ID: i32 = 4326;

const GPKG_APPLICATION_ID: i32 = 0x4750_4B47;
const GPKG_USER_VERSION: i32 = 10300;
const GEOMETRY_COLUMN: &str = "geom";
const FID_COLUMN: &str = "fid";

const WGS84_DEFINITION: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;

const CORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS gpkg_spatial_ref_sys (
    srs_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL PRIMARY KEY,
    organization TEXT NOT NULL,
    organization_coordsys_id INTEGER NOT NULL,
    definition TEXT NOT NULL,
    description TEXT
);
CREATE TABLE IF NOT EXISTS gpkg_contents (
    table_name TEXT NOT NULL PRIMARY KEY,
    data_type TEXT NOT NULL,
    identifier TEXT UNIQUE,
    description TEXT DEFAULT '',
    last_change DATETIME NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
    min_x DOUBLE,
    min_y DOUBLE,
    max_x DOUBLE,
    max_y DOUBLE,
    srs_id INTEGER,
    CONSTRAINT fk_gc_r_srs_id FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
CREATE TABLE IF NOT EXISTS gpkg_geometry_columns (
    table_name TEXT NOT NULL,
    column_name TEXT NOT NULL,
    geometry_type_name TEXT NOT NULL,
    srs_id INTEGER NOT NULL,
    z TINYINT NOT NULL,
    m TINYINT NOT NULL,
    CONSTRAINT pk_geom_cols PRIMARY KEY (table_name, column_name),
    CONSTRAINT uk_gc_table_name UNIQUE (table_name),
    CONSTRAINT fk_gc_tn FOREIGN KEY (table_name) REFERENCES gpkg_contents(table_name),
    CONSTRAINT fk_gc_srs FOREIGN KEY (srs_id) REFERENCES gpkg_spatial_ref_sys(srs_id)
);
"#;

pub struct GeoPackage {
    conn: Connection,
    path: PathBuf,
}

impl GeoPackage {
    /// Opens the container, creating the file and the core tables when
    /// missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let gpkg = Self {
            conn,
            path: path.to_path_buf(),
        };
        gpkg.init_schema()?;
        Ok(gpkg)
    }

    /// Opens a container that must already exist.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EtlError::GeoPackageNotFound {
                path: path.display().to_string(),
            });
        }
        Self::open(path)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.pragma_update(None, "application_id", GPKG_APPLICATION_ID)?;
        self.conn.pragma_update(None, "user_version", GPKG_USER_VERSION)?;
        self.conn.execute_batch(CORE_SCHEMA)?;

        let mut insert = self.conn.prepare(
            "INSERT OR IGNORE INTO gpkg_spatial_ref_sys
                 (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        insert.execute(params![
            "Undefined cartesian SRS",
            -1,
            "NONE",
            -1,
            "undefined",
            "undefined cartesian coordinate reference system"
        ])?;
        insert.execute(params![
            "Undefined geographic SRS",
            0,
            "NONE",
            0,
            "undefined",
            "undefined geographic coordinate reference system"
        ])?;
        insert.execute(params![
            "WGS 84 geodetic",
            WGS84_SRS_ID,
            "EPSG",
            WGS84_SRS_ID,
            WGS84_DEFINITION,
            "longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid"
        ])?;
        Ok(())
    }

    pub fn has_layer(&self, name: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT table_name FROM gpkg_contents WHERE table_name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn layer_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT table_name FROM gpkg_contents ORDER BY table_name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Drops any previous layer of the same name and writes this one.
    pub fn write_layer(&mut self, layer: &Layer) -> Result<()> {
        let table = quote_ident(&layer.name);
        let tx = self.conn.transaction()?;

        tx.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
        tx.execute(
            "DELETE FROM gpkg_geometry_columns WHERE table_name = ?1",
            params![layer.name],
        )?;
        tx.execute(
            "DELETE FROM gpkg_contents WHERE table_name = ?1",
            params![layer.name],
        )?;

        let mut columns = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL",
            quote_ident(FID_COLUMN)
        )];
        if layer.has_geometry {
            columns.push(format!(
                "{} {}",
                quote_ident(GEOMETRY_COLUMN),
                layer.geometry_type_name()
            ));
        }
        columns.extend(
            layer
                .fields
                .iter()
                .map(|f| format!("{} {}", quote_ident(&f.name), sql_type(f.kind))),
        );
        tx.execute(&format!("CREATE TABLE {} ({})", table, columns.join(", ")), [])?;

        let mut insert_columns: Vec<String> = Vec::new();
        if layer.has_geometry {
            insert_columns.push(quote_ident(GEOMETRY_COLUMN));
        }
        insert_columns.extend(layer.fields.iter().map(|f| quote_ident(&f.name)));
        if !insert_columns.is_empty() {
            let placeholders = (1..=insert_columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                insert_columns.join(", "),
                placeholders
            ))?;
            for feature in &layer.features {
                let mut row: Vec<SqlValue> = Vec::with_capacity(insert_columns.len());
                if layer.has_geometry {
                    row.push(match &feature.geometry {
                        Some(geometry) => SqlValue::Blob(wkb::encode(geometry, WGS84_SRS_ID)),
                        None => SqlValue::Null,
                    });
                }
                row.extend(feature.values.iter().map(to_sql));
                insert.execute(params_from_iter(row))?;
            }
        }

        let last_change = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        let bounds = layer.bounds();
        if layer.has_geometry {
            tx.execute(
                "INSERT INTO gpkg_contents
                     (table_name, data_type, identifier, last_change, min_x, min_y, max_x, max_y, srs_id)
                 VALUES (?1, 'features', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    layer.name,
                    last_change,
                    bounds.map(|b| b.min_x),
                    bounds.map(|b| b.min_y),
                    bounds.map(|b| b.max_x),
                    bounds.map(|b| b.max_y),
                    WGS84_SRS_ID
                ],
            )?;
            tx.execute(
                "INSERT INTO gpkg_geometry_columns
                     (table_name, column_name, geometry_type_name, srs_id, z, m)
                 VALUES (?1, ?2, ?3, ?4, 0, 0)",
                params![
                    layer.name,
                    GEOMETRY_COLUMN,
                    layer.geometry_type_name(),
                    WGS84_SRS_ID
                ],
            )?;
        } else {
            tx.execute(
                "INSERT INTO gpkg_contents (table_name, data_type, identifier, last_change)
                 VALUES (?1, 'attributes', ?1, ?2)",
                params![layer.name, last_change],
            )?;
        }

        tx.commit()?;
        tracing::debug!(
            "Wrote layer '{}' ({} rows) to {}",
            layer.name,
            layer.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn read_layer(&self, name: &str) -> Result<Layer> {
        if !self.has_layer(name)? {
            return Err(EtlError::LayerNotFound {
                layer: name.to_string(),
            });
        }

        let geometry_column: Option<String> = self
            .conn
            .query_row(
                "SELECT column_name FROM gpkg_geometry_columns WHERE table_name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        let table = quote_ident(name);
        let mut fields = Vec::new();
        {
            let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", table))?;
            let columns = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    row.get::<_, i64>(5)?,
                ))
            })?;
            for column in columns {
                let (column_name, declared_type, pk) = column?;
                if pk > 0 || Some(&column_name) == geometry_column.as_ref() {
                    continue;
                }
                fields.push(Field {
                    name: column_name,
                    kind: field_kind(&declared_type),
                });
            }
        }

        let mut select_columns: Vec<String> = Vec::new();
        if let Some(geom) = &geometry_column {
            select_columns.push(quote_ident(geom));
        }
        select_columns.extend(fields.iter().map(|f| quote_ident(&f.name)));

        let mut layer = match geometry_column {
            Some(_) => Layer::features(name, fields),
            None => Layer::attributes(name, fields),
        };
        if select_columns.is_empty() {
            return Ok(layer);
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY rowid",
            select_columns.join(", "),
            table
        ))?;
        let mut rows = stmt.query([])?;
        let offset = usize::from(layer.has_geometry);
        while let Some(row) = rows.next()? {
            let geometry = if layer.has_geometry {
                match row.get_ref(0)? {
                    ValueRef::Blob(blob) => Some(wkb::decode(blob)?),
                    _ => None,
                }
            } else {
                None
            };
            let mut values = Vec::with_capacity(layer.fields.len());
            for (i, field) in layer.fields.iter().enumerate() {
                values.push(from_sql(row.get_ref(i + offset)?, field.kind));
            }
            layer.features.push(Feature { geometry, values });
        }
        Ok(layer)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "TEXT",
        FieldKind::Real => "REAL",
    }
}

fn field_kind(declared: &str) -> FieldKind {
    let upper = declared.to_ascii_uppercase();
    if upper.contains("CHAR") || upper.contains("TEXT") || upper.contains("CLOB") {
        FieldKind::Text
    } else {
        FieldKind::Real
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Real(v) if v.is_nan() => SqlValue::Null,
        Value::Real(v) => SqlValue::Real(*v),
    }
}

fn from_sql(value: ValueRef<'_>, kind: FieldKind) -> Value {
    match (value, kind) {
        (ValueRef::Null, _) => Value::Null,
        (ValueRef::Integer(i), FieldKind::Real) => Value::Real(i as f64),
        (ValueRef::Real(v), FieldKind::Real) => Value::Real(v),
        (ValueRef::Text(t), FieldKind::Real) => String::from_utf8_lossy(t)
            .trim()
            .parse::<f64>()
            .map(Value::Real)
            .unwrap_or(Value::Null),
        (ValueRef::Integer(i), FieldKind::Text) => Value::Text(i.to_string()),
        (ValueRef::Real(v), FieldKind::Text) => Value::Text(v.to_string()),
        (ValueRef::Text(t), FieldKind::Text) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        (ValueRef::Blob(_), _) => Value::Null,
    }
}
