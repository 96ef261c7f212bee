//! Shared primitives for the SpatiaLite datasource crates.

pub mod io;
pub mod types;

pub use types::*;
