// Domain layer: core models and ports. No I/O here.

pub mod geometry;
pub mod layer;
pub mod model;
pub mod ports;
pub mod table;
