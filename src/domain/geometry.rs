//! Planar lon/lat geometries for zipcode boundaries.
//!
//! The serde representation is the GeoJSON geometry object, so a
//! [`Geometry`] can be dropped straight into an exported feature.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `[longitude, latitude]`
pub type Coord = [f64; 2];

/// A closed ring of coordinates (first == last).
pub type Ring = Vec<Coord>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: Coord,
    },

    /// Exterior ring first, holes after.
    Polygon {
        coordinates: Vec<Ring>,
    },

    MultiPolygon {
        coordinates: Vec<Vec<Ring>>,
    },
}

impl Geometry {
    pub fn point(lon: f64, lat: f64) -> Self {
        Geometry::Point {
            coordinates: [lon, lat],
        }
    }

    pub fn polygon(rings: Vec<Ring>) -> Self {
        Geometry::Polygon { coordinates: rings }
    }

    /// Collapses a list of polygons into the smallest fitting geometry:
    /// a single polygon stays a `Polygon`, several become a `MultiPolygon`.
    pub fn from_polygons(mut polygons: Vec<Vec<Ring>>) -> Self {
        if polygons.len() == 1 {
            Geometry::Polygon {
                coordinates: polygons.remove(0),
            }
        } else {
            Geometry::MultiPolygon {
                coordinates: polygons,
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "POINT",
            Geometry::Polygon { .. } => "POLYGON",
            Geometry::MultiPolygon { .. } => "MULTIPOLYGON",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point { .. } => false,
            Geometry::Polygon { coordinates } => coordinates.iter().all(|ring| ring.is_empty()),
            Geometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .all(|polygon| polygon.iter().all(|ring| ring.is_empty())),
        }
    }

    fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Geometry::Point { coordinates } => Box::new(std::iter::once(coordinates)),
            Geometry::Polygon { coordinates } => Box::new(coordinates.iter().flatten()),
            Geometry::MultiPolygon { coordinates } => {
                Box::new(coordinates.iter().flatten().flatten())
            }
        }
    }

    /// `None` for empty geometries.
    pub fn bbox(&self) -> Option<BoundingBox> {
        let mut coords = self.coords();
        let first = coords.next()?;
        let mut bbox = BoundingBox::from_coord(*first);
        for coord in coords {
            bbox.expand_to(*coord);
        }
        Some(bbox)
    }
}

fn write_ring(f: &mut fmt::Formatter<'_>, ring: &Ring) -> fmt::Result {
    write!(f, "(")?;
    for (i, [x, y]) in ring.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{} {}", x, y)?;
    }
    write!(f, ")")
}

fn write_polygon(f: &mut fmt::Formatter<'_>, rings: &[Ring]) -> fmt::Result {
    write!(f, "(")?;
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_ring(f, ring)?;
    }
    write!(f, ")")
}

/// Well-known text.
impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{} EMPTY", self.type_name());
        }
        match self {
            Geometry::Point { coordinates: [x, y] } => write!(f, "POINT ({} {})", x, y),
            Geometry::Polygon { coordinates } => {
                write!(f, "POLYGON ")?;
                write_polygon(f, coordinates)
            }
            Geometry::MultiPolygon { coordinates } => {
                write!(f, "MULTIPOLYGON (")?;
                for (i, polygon) in coordinates.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_polygon(f, polygon)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    fn from_coord([x, y]: Coord) -> Self {
        Self::new(x, y, x, y)
    }

    pub fn expand_to(&mut self, [x, y]: Coord) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Edges touching counts as intersecting.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}
