//! Geometry and feature model of the SpatiaLite datasource, plus the codec for the
//! SpatiaLite geometry BLOB format.

mod model;
pub mod spatialite;
pub mod transform;

pub use model::*;
