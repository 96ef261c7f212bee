//! SpatiaLite datasource for mapget.
//!
//! Serves the features of a SpatiaLite database layer by layer. The host opens a
//! [`Datasource`] from a validated [`DatasourceConfig`] and asks for features with a
//! [`FeatureRequest`]:
//!
//! ```no_run
//! use spatialite_core::{Crs, SpatialExtent};
//! use spatialite_datasource::{Datasource, DatasourceConfig, FeatureRequest};
//!
//! let config = DatasourceConfig::from_path("datasource.yaml".as_ref())?;
//! let datasource = Datasource::open(config)?;
//!
//! let extent = SpatialExtent::new(13.0, 52.0, 14.0, 53.0, Crs::WGS84)?;
//! let request = FeatureRequest::new("Roads", extent).with_filter("lanes >= 2").with_limit(100);
//! let mut features = datasource.fetch_features(&request)?;
//! for feature in features.by_ref() {
//! 	let feature = feature?;
//! 	println!("{} {:?}", feature.id, feature.geometry.kind());
//! }
//! println!("{:?}", features.diagnostics());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod assembler;
pub mod catalog;
pub mod config;
pub mod connection;
mod datasource;
mod error;
pub mod query;
mod stream;

pub use catalog::LayerInfo;
pub use config::DatasourceConfig;
pub use datasource::*;
pub use error::*;
pub use query::FeatureRequest;
pub use stream::*;

#[cfg(test)]
#[path = "../tests/common/mod.rs"]
mod test_fixtures;
