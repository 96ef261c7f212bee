mod crs;
mod spatial_extent;

pub use crs::*;
pub use spatial_extent::*;
