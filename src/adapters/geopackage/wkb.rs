//! GeoPackage geometry blobs: an 8-byte `GP` header, an optional envelope,
//! then ISO well-known binary.
//!
//! Writes are always little-endian with an XY envelope. Reads accept either
//! byte order and any envelope size; only 2D points, polygons and
//! multipolygons are understood.

use crate::domain::geometry::{Coord, Geometry, Ring};
use crate::utils::error::{EtlError, Result};

const MAGIC: &[u8; 2] = b"GP";
const VERSION: u8 = 0;

const FLAG_LITTLE_ENDIAN: u8 = 0b0000_0001;
const FLAG_ENVELOPE_XY: u8 = 0b0000_0010;
const FLAG_EMPTY: u8 = 0b0001_0000;

const WKB_POINT: u32 = 1;
const WKB_POLYGON: u32 = 3;
const WKB_MULTIPOLYGON: u32 = 6;

pub fn encode(geometry: &Geometry, srs_id: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(MAGIC);
    out.push(VERSION);

    match geometry.bbox() {
        Some(bbox) => {
            out.push(FLAG_LITTLE_ENDIAN | FLAG_ENVELOPE_XY);
            out.extend_from_slice(&srs_id.to_le_bytes());
            // envelope order is minx, maxx, miny, maxy
            for v in [bbox.min_x, bbox.max_x, bbox.min_y, bbox.max_y] {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        None => {
            out.push(FLAG_LITTLE_ENDIAN | FLAG_EMPTY);
            out.extend_from_slice(&srs_id.to_le_bytes());
        }
    }

    write_wkb(geometry, &mut out);
    out
}

pub fn decode(blob: &[u8]) -> Result<Geometry> {
    if blob.len() < 8 || &blob[0..2] != MAGIC {
        return Err(invalid("missing GeoPackage header"));
    }
    let flags = blob[3];
    let envelope_len = match (flags >> 1) & 0b111 {
        0 => 0,
        1 => 32,
        2 | 3 => 48,
        4 => 64,
        other => return Err(invalid(&format!("bad envelope indicator {}", other))),
    };
    let start = 8 + envelope_len;
    if blob.len() < start {
        return Err(invalid("truncated envelope"));
    }

    let mut reader = WkbReader {
        bytes: &blob[start..],
        pos: 0,
        little_endian: true,
    };
    reader.geometry()
}

fn write_wkb(geometry: &Geometry, out: &mut Vec<u8>) {
    out.push(1); // little-endian
    match geometry {
        Geometry::Point { coordinates } => {
            out.extend_from_slice(&WKB_POINT.to_le_bytes());
            write_coord(coordinates, out);
        }
        Geometry::Polygon { coordinates } => {
            out.extend_from_slice(&WKB_POLYGON.to_le_bytes());
            write_rings(coordinates, out);
        }
        Geometry::MultiPolygon { coordinates } => {
            out.extend_from_slice(&WKB_MULTIPOLYGON.to_le_bytes());
            out.extend_from_slice(&(coordinates.len() as u32).to_le_bytes());
            for polygon in coordinates {
                out.push(1);
                out.extend_from_slice(&WKB_POLYGON.to_le_bytes());
                write_rings(polygon, out);
            }
        }
    }
}

fn write_rings(rings: &[Ring], out: &mut Vec<u8>) {
    out.extend_from_slice(&(rings.len() as u32).to_le_bytes());
    for ring in rings {
        out.extend_from_slice(&(ring.len() as u32).to_le_bytes());
        for coord in ring {
            write_coord(coord, out);
        }
    }
}

fn write_coord([x, y]: &Coord, out: &mut Vec<u8>) {
    out.extend_from_slice(&x.to_le_bytes());
    out.extend_from_slice(&y.to_le_bytes());
}

fn invalid(message: &str) -> EtlError {
    EtlError::InvalidGeometry {
        message: message.to_string(),
    }
}

struct WkbReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl WkbReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| invalid("truncated WKB"))?;
        self.pos = end;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        Ok(buf)
    }

    fn u32(&mut self) -> Result<u32> {
        let buf = self.take::<4>()?;
        Ok(if self.little_endian {
            u32::from_le_bytes(buf)
        } else {
            u32::from_be_bytes(buf)
        })
    }

    fn f64(&mut self) -> Result<f64> {
        let buf = self.take::<8>()?;
        Ok(if self.little_endian {
            f64::from_le_bytes(buf)
        } else {
            f64::from_be_bytes(buf)
        })
    }

    fn header(&mut self) -> Result<u32> {
        let [order] = self.take::<1>()?;
        self.little_endian = match order {
            0 => false,
            1 => true,
            other => return Err(invalid(&format!("bad WKB byte order {}", other))),
        };
        self.u32()
    }

    fn coord(&mut self) -> Result<Coord> {
        Ok([self.f64()?, self.f64()?])
    }

    fn rings(&mut self) -> Result<Vec<Ring>> {
        let ring_count = self.u32()? as usize;
        let mut rings = Vec::with_capacity(ring_count.min(1024));
        for _ in 0..ring_count {
            let point_count = self.u32()? as usize;
            let mut ring = Vec::with_capacity(point_count.min(1 << 16));
            for _ in 0..point_count {
                ring.push(self.coord()?);
            }
            rings.push(ring);
        }
        Ok(rings)
    }

    fn geometry(&mut self) -> Result<Geometry> {
        match self.header()? {
            WKB_POINT => Ok(Geometry::Point {
                coordinates: self.coord()?,
            }),
            WKB_POLYGON => Ok(Geometry::Polygon {
                coordinates: self.rings()?,
            }),
            WKB_MULTIPOLYGON => {
                let count = self.u32()? as usize;
                let mut polygons = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    match self.header()? {
                        WKB_POLYGON => polygons.push(self.rings()?),
                        other => {
                            return Err(invalid(&format!(
                                "multipolygon member has WKB type {}",
                                other
                            )))
                        }
                    }
                }
                Ok(Geometry::MultiPolygon {
                    coordinates: polygons,
                })
            }
            other => Err(invalid(&format!("unsupported WKB type {}", other))),
        }
    }
}
