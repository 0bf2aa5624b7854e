//! Polygon shapefile reading (geometry + dBASE attributes) and `.prj` CRS
//! detection.

use crate::domain::geometry::{BoundingBox, Coord, Geometry, Ring};
use crate::utils::error::{EtlError, Result};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use std::collections::BTreeMap;
use std::path::Path;

/// One shapefile record restricted to the requested attribute columns.
/// Columns absent from the `.dbf` are simply not in `attributes`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    pub geometry: Geometry,
    pub attributes: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCrs {
    Nad83,
    Wgs84,
}

impl SourceCrs {
    /// Reads the `.prj` next to `shp_path`. A missing sidecar means the
    /// TIGER default, NAD83.
    pub fn detect(shp_path: &Path) -> Result<Self> {
        let prj_path = shp_path.with_extension("prj");
        if !prj_path.exists() {
            tracing::warn!(
                "No .prj found for {}, assuming NAD83 (EPSG:4269)",
                shp_path.display()
            );
            return Ok(SourceCrs::Nad83);
        }
        let wkt = std::fs::read_to_string(&prj_path)?;
        Self::from_prj(&wkt)
    }

    pub fn from_prj(wkt: &str) -> Result<Self> {
        let text = wkt.trim();
        let upper = text.to_ascii_uppercase();
        let unsupported = || EtlError::UnsupportedCrs {
            crs: text.chars().take(80).collect(),
        };

        if !upper.starts_with("GEOGCS") {
            return Err(unsupported());
        }
        if upper.contains("NAD83") || upper.contains("NORTH_AMERICAN_1983") {
            Ok(SourceCrs::Nad83)
        } else if upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84")
        {
            Ok(SourceCrs::Wgs84)
        } else {
            Err(unsupported())
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            SourceCrs::Nad83 => 4269,
            SourceCrs::Wgs84 => 4326,
        }
    }

    /// NAD83 and WGS84 coincide at this resolution, so no coordinate changes.
    pub fn to_wgs84(&self, geometry: Geometry) -> Geometry {
        geometry
    }
}

/// Reads every polygon record of a shapefile. `within`, when given, keeps
/// only records whose bounding box intersects it.
pub fn read_shapes(
    shp_path: &Path,
    wanted_fields: &[String],
    within: Option<&BoundingBox>,
) -> Result<Vec<ShapeRecord>> {
    let mut reader = shapefile::Reader::from_path(shp_path)?;
    let mut records = Vec::new();
    let mut skipped_null = 0usize;
    let mut total = 0usize;

    for item in reader.iter_shapes_and_records() {
        let (shape, record) = item?;
        total += 1;

        let Some(geometry) = shape_to_geometry(shape)? else {
            skipped_null += 1;
            continue;
        };
        if let Some(bbox) = within {
            match geometry.bbox() {
                Some(shape_bbox) if shape_bbox.intersects(bbox) => {}
                _ => continue,
            }
        }

        let attributes = wanted_fields
            .iter()
            .filter_map(|name| {
                record
                    .get(name)
                    .map(|value| (name.clone(), field_value_to_string(value)))
            })
            .collect();
        records.push(ShapeRecord {
            geometry,
            attributes,
        });
    }

    if skipped_null > 0 {
        tracing::debug!("Skipped {} null shapes", skipped_null);
    }
    tracing::debug!(
        "Read {} of {} shapes from {}",
        records.len(),
        total,
        shp_path.display()
    );
    Ok(records)
}

fn shape_to_geometry(shape: Shape) -> Result<Option<Geometry>> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => Geometry::point(p.x, p.y),
        Shape::PointM(p) => Geometry::point(p.x, p.y),
        Shape::PointZ(p) => Geometry::point(p.x, p.y),
        Shape::Polygon(polygon) => assemble(polygon.rings().iter().map(|ring| {
            let coords = ring.points().iter().map(|p| [p.x, p.y]).collect();
            (matches!(ring, PolygonRing::Outer(_)), coords)
        })),
        Shape::PolygonM(polygon) => assemble(polygon.rings().iter().map(|ring| {
            let coords = ring.points().iter().map(|p| [p.x, p.y]).collect();
            (matches!(ring, PolygonRing::Outer(_)), coords)
        })),
        Shape::PolygonZ(polygon) => assemble(polygon.rings().iter().map(|ring| {
            let coords = ring.points().iter().map(|p| [p.x, p.y]).collect();
            (matches!(ring, PolygonRing::Outer(_)), coords)
        })),
        other => {
            return Err(EtlError::InvalidGeometry {
                message: format!("unsupported shape type {:?}", other.shapetype()),
            })
        }
    };
    Ok(Some(geometry))
}

/// Groups rings into polygons: each outer ring opens a polygon and the inner
/// rings that follow are its holes.
fn assemble(rings: impl Iterator<Item = (bool, Vec<Coord>)>) -> Geometry {
    let mut polygons: Vec<Vec<Ring>> = Vec::new();
    for (is_outer, ring) in rings {
        match polygons.last_mut() {
            Some(polygon) if !is_outer => polygon.push(ring),
            // a hole before any shell becomes its own shell
            _ => polygons.push(vec![ring]),
        }
    }
    Geometry::from_polygons(polygons)
}

fn field_value_to_string(value: &FieldValue) -> Option<String> {
    let text = match value {
        FieldValue::Character(s) => s.clone()?,
        FieldValue::Memo(s) => s.clone(),
        FieldValue::Numeric(n) => format_number((*n)?),
        FieldValue::Float(n) => format_number(f64::from((*n)?)),
        FieldValue::Double(n) | FieldValue::Currency(n) => format_number(*n),
        FieldValue::Integer(n) => n.to_string(),
        FieldValue::Logical(b) => b.map(|b| b.to_string())?,
        _ => return None,
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
