//! Serde model of the YAML configuration document.
//!
//! This layer only checks the structure: known keys, value types and enumerated values.
//! Everything that needs more than one value to decide is done in [`super::validate`].

use serde::Deserialize;
use std::{collections::BTreeMap, path::PathBuf};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ConfigDocument {
	#[serde(default)]
	pub map: MapSection,

	#[serde(default)]
	pub spatialite: SpatialiteSection,

	/// CRS of returned geometries, `EPSG:4326` when omitted.
	pub output_crs: Option<String>,

	#[serde(default)]
	pub pool: PoolSection,

	#[serde(default)]
	pub global: GlobalSection,

	/// Expose every table of `geometry_columns` that no layer entry names.
	#[serde(default)]
	pub load_remaining_layers_from_db: bool,

	/// Serve geometries only.
	#[serde(default)]
	pub disable_attributes: bool,

	#[serde(default)]
	pub layers: Vec<LayerDocument>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MapSection {
	pub path: Option<PathBuf>,
	pub name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SpatialiteSection {
	/// Name or path of the loadable extension, e.g. `mod_spatialite`.
	pub extension: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PoolSection {
	pub connections: Option<u32>,
	pub statement_cache_size: Option<usize>,
	pub acquire_timeout_ms: Option<u64>,
	pub page_size: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct GlobalSection {
	pub coordinates_scaling: Option<ScalingDocument>,
}

/// Scaling factors keyed by axis letters; `xy: 0.01` sets both `x` and `y`.
pub type ScalingDocument = BTreeMap<String, f64>;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct LayerDocument {
	pub table: String,

	/// Defaults to the table name.
	pub name: Option<String>,

	pub geometry_column: Option<String>,

	pub primary_key: Option<String>,

	pub crs: Option<String>,

	#[serde(default)]
	pub exact_filtering: bool,

	/// Static SQL predicate added to every query of the layer.
	pub filter: Option<String>,

	pub coordinates_scaling: Option<ScalingDocument>,

	#[serde(default = "default_true")]
	pub load_remaining_attributes_from_db: bool,

	#[serde(default)]
	pub attributes: Vec<AttributeDocument>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AttributeDocument {
	pub name: String,

	#[serde(rename = "type")]
	pub kind: Option<AttributeType>,

	/// Source column, defaults to `name`.
	pub column: Option<String>,

	pub relation: Option<RelationDocument>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RelationDocument {
	/// Columns of related tables as `table.column`.
	pub related_columns: Vec<String>,

	pub delimiter: Option<String>,

	/// SQL condition joining the related tables, the layer table is aliased `t`.
	pub match_condition: String,
}

/// Semantic type an attribute is coerced into.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
	#[serde(alias = "int", alias = "int64")]
	Integer,
	#[serde(alias = "float", alias = "double")]
	Real,
	Text,
	#[serde(alias = "bool")]
	Boolean,
	/// Raw bytes, served as lowercase hex text.
	Blob,
}

impl AttributeType {
	#[must_use]
	pub fn as_str(&self) -> &'static str {
		match self {
			AttributeType::Integer => "integer",
			AttributeType::Real => "real",
			AttributeType::Text => "text",
			AttributeType::Boolean => "boolean",
			AttributeType::Blob => "blob",
		}
	}

	/// Maps a declared SQLite column type onto an attribute type using SQLite's affinity rules.
	#[must_use]
	pub fn from_declared_type(declared: &str) -> AttributeType {
		let declared = declared.to_ascii_uppercase();
		if declared.contains("INT") {
			AttributeType::Integer
		} else if declared.contains("BOOL") {
			AttributeType::Boolean
		} else if declared.contains("CHAR") || declared.contains("CLOB") || declared.contains("TEXT") {
			AttributeType::Text
		} else if declared.is_empty() || declared.contains("BLOB") {
			AttributeType::Blob
		} else {
			AttributeType::Real
		}
	}
}

impl std::fmt::Display for AttributeType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

fn default_true() -> bool {
	true
}
