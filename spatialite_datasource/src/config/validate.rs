use super::document::*;
use crate::error::{DatasourceError, DatasourceResult};
use lazy_static::lazy_static;
use regex::Regex;
use spatialite_core::Crs;
use spatialite_geometry::transform::{CoordinateScaling, CoordinateTransform};
use std::{
	collections::HashSet,
	path::{Path, PathBuf},
	time::Duration,
};

lazy_static! {
	static ref REG_RELATED_COLUMN: Regex = Regex::new(r"^([^.\s]+)\.([^.\s]+)$").unwrap();
	static ref REG_SCALING_KEY: Regex = Regex::new(r"^[xyz]+$").unwrap();
}

pub const DEFAULT_STATEMENT_CACHE_SIZE: usize = 32;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PAGE_SIZE: u32 = 256;
pub const DEFAULT_DELIMITER: &str = "|";

/// Validated, immutable configuration of a datasource.
///
/// Replaced as a whole on reconfiguration, never mutated while in use.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasourceConfig {
	/// `None` until either the document or the host provides it.
	pub database_path: Option<PathBuf>,
	pub map_name: Option<String>,
	pub extension: Option<String>,
	pub output_crs: Crs,
	pub pool: PoolOptions,
	pub load_remaining_layers: bool,
	pub disable_attributes: bool,
	pub default_scaling: CoordinateScaling,
	/// Layers in document order.
	pub layers: Vec<LayerSpec>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolOptions {
	pub connections: u32,
	pub statement_cache_size: usize,
	pub acquire_timeout: Duration,
	pub page_size: u32,
}

impl Default for PoolOptions {
	fn default() -> Self {
		PoolOptions {
			connections: num_cpus::get().max(1) as u32,
			statement_cache_size: DEFAULT_STATEMENT_CACHE_SIZE,
			acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
			page_size: DEFAULT_PAGE_SIZE,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerSpec {
	pub name: String,
	pub table: String,
	pub geometry_column: Option<String>,
	pub primary_key: Option<String>,
	pub crs: Option<Crs>,
	pub exact_filtering: bool,
	pub filter: Option<String>,
	pub scaling: CoordinateScaling,
	pub load_remaining_attributes: bool,
	pub attributes: Vec<AttributeSpec>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttributeSpec {
	pub name: String,
	/// Resolved from the column declaration when `None`.
	pub kind: Option<AttributeType>,
	pub source: AttributeSource,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AttributeSource {
	Column(String),
	Relation(Relation),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
	pub columns: Vec<RelatedColumn>,
	pub delimiter: String,
	pub match_condition: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RelatedColumn {
	pub table: String,
	pub column: String,
}

impl DatasourceConfig {
	/// Runs the semantic checks on a structurally valid document.
	pub fn from_document(document: ConfigDocument) -> DatasourceResult<DatasourceConfig> {
		let output_crs = match &document.output_crs {
			Some(text) => parse_crs("outputCrs", text)?,
			None => Crs::WGS84,
		};

		let default_scaling = match &document.global.coordinates_scaling {
			Some(scaling) => parse_scaling("global.coordinatesScaling", scaling, CoordinateScaling::NONE)?,
			None => CoordinateScaling::NONE,
		};

		let pool = parse_pool(&document.pool)?;

		if let Some(extension) = &document.spatialite.extension {
			require_non_empty("spatialite.extension", extension)?;
		}
		if let Some(name) = &document.map.name {
			require_non_empty("map.name", name)?;
		}

		let mut names = HashSet::new();
		let mut layers = Vec::with_capacity(document.layers.len());
		for (index, layer) in document.layers.iter().enumerate() {
			let path = format!("layers[{index}]");
			let spec = parse_layer(&path, layer, default_scaling, output_crs)?;
			if !names.insert(spec.name.clone()) {
				return Err(DatasourceError::configuration(
					format!("{path}.name"),
					format!("layer name '{}' is used more than once", spec.name),
				));
			}
			layers.push(spec);
		}

		Ok(DatasourceConfig {
			database_path: document.map.path,
			map_name: document.map.name,
			extension: document.spatialite.extension,
			output_crs,
			pool,
			load_remaining_layers: document.load_remaining_layers_from_db,
			disable_attributes: document.disable_attributes,
			default_scaling,
			layers,
		})
	}

	/// Overrides `map.path`, as a host command line option would.
	#[must_use]
	pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.database_path = Some(path.into());
		self
	}

	/// The database path, failing if neither the document nor the host set one.
	pub fn require_database_path(&self) -> DatasourceResult<&Path> {
		self
			.database_path
			.as_deref()
			.ok_or_else(|| DatasourceError::configuration("map.path", "no database path given in the document or by the host"))
	}

	/// Name announced to the host, falls back to the database file name.
	#[must_use]
	pub fn map_name(&self) -> String {
		if let Some(name) = &self.map_name {
			return name.clone();
		}
		self
			.database_path
			.as_deref()
			.and_then(Path::file_name)
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_default()
	}

	#[must_use]
	pub fn layer(&self, name: &str) -> Option<&LayerSpec> {
		self.layers.iter().find(|layer| layer.name == name)
	}

	pub fn layer_names(&self) -> impl Iterator<Item = &str> {
		self.layers.iter().map(|layer| layer.name.as_str())
	}
}

fn parse_layer(
	path: &str,
	layer: &LayerDocument,
	default_scaling: CoordinateScaling,
	output_crs: Crs,
) -> DatasourceResult<LayerSpec> {
	require_non_empty(&format!("{path}.table"), &layer.table)?;
	let name = layer.name.clone().unwrap_or_else(|| layer.table.clone());
	require_non_empty(&format!("{path}.name"), &name)?;
	if let Some(column) = &layer.geometry_column {
		require_non_empty(&format!("{path}.geometryColumn"), column)?;
	}
	if let Some(column) = &layer.primary_key {
		require_non_empty(&format!("{path}.primaryKey"), column)?;
	}

	let scaling = match &layer.coordinates_scaling {
		Some(scaling) => parse_scaling(&format!("{path}.coordinatesScaling"), scaling, default_scaling)?,
		None => default_scaling,
	};

	let crs = match &layer.crs {
		Some(text) => {
			let crs = parse_crs(&format!("{path}.crs"), text)?;
			CoordinateTransform::new(crs, output_crs, scaling)
				.map_err(|e| DatasourceError::configuration(format!("{path}.crs"), e.to_string()))?;
			Some(crs)
		}
		None => None,
	};

	if let Some(filter) = &layer.filter {
		let filter_path = format!("{path}.filter");
		require_non_empty(&filter_path, filter)?;
		require_single_statement(&filter_path, filter)?;
	}

	let mut names = HashSet::new();
	let mut attributes = Vec::with_capacity(layer.attributes.len());
	for (index, attribute) in layer.attributes.iter().enumerate() {
		let attribute_path = format!("{path}.attributes[{index}]");
		let spec = parse_attribute(&attribute_path, attribute)?;
		if !names.insert(spec.name.clone()) {
			return Err(DatasourceError::configuration(
				format!("{attribute_path}.name"),
				format!("attribute '{}' is declared more than once", spec.name),
			));
		}
		attributes.push(spec);
	}

	Ok(LayerSpec {
		name,
		table: layer.table.clone(),
		geometry_column: layer.geometry_column.clone(),
		primary_key: layer.primary_key.clone(),
		crs,
		exact_filtering: layer.exact_filtering,
		filter: layer.filter.clone(),
		scaling,
		load_remaining_attributes: layer.load_remaining_attributes_from_db,
		attributes,
	})
}

fn parse_attribute(path: &str, attribute: &AttributeDocument) -> DatasourceResult<AttributeSpec> {
	require_non_empty(&format!("{path}.name"), &attribute.name)?;

	let source = match (&attribute.relation, &attribute.column) {
		(Some(_), Some(_)) => {
			return Err(DatasourceError::configuration(
				path,
				"'column' and 'relation' are mutually exclusive",
			));
		}
		(Some(relation), None) => AttributeSource::Relation(parse_relation(&format!("{path}.relation"), relation)?),
		(None, Some(column)) => {
			require_non_empty(&format!("{path}.column"), column)?;
			AttributeSource::Column(column.clone())
		}
		(None, None) => AttributeSource::Column(attribute.name.clone()),
	};

	// concatenated related columns are always text
	let kind = match (&source, attribute.kind) {
		(AttributeSource::Relation(relation), None) if relation.columns.len() > 1 => Some(AttributeType::Text),
		(_, kind) => kind,
	};

	Ok(AttributeSpec {
		name: attribute.name.clone(),
		kind,
		source,
	})
}

fn parse_relation(path: &str, relation: &RelationDocument) -> DatasourceResult<Relation> {
	if relation.related_columns.is_empty() {
		return Err(DatasourceError::configuration(
			format!("{path}.relatedColumns"),
			"at least one 'table.column' entry is required",
		));
	}

	let mut columns = Vec::with_capacity(relation.related_columns.len());
	for (index, entry) in relation.related_columns.iter().enumerate() {
		let Some(captures) = REG_RELATED_COLUMN.captures(entry.trim()) else {
			return Err(DatasourceError::configuration(
				format!("{path}.relatedColumns[{index}]"),
				format!("'{entry}' must have the form 'table.column'"),
			));
		};
		columns.push(RelatedColumn {
			table: captures[1].to_string(),
			column: captures[2].to_string(),
		});
	}

	let condition_path = format!("{path}.matchCondition");
	require_non_empty(&condition_path, &relation.match_condition)?;
	require_single_statement(&condition_path, &relation.match_condition)?;

	Ok(Relation {
		columns,
		delimiter: relation.delimiter.clone().unwrap_or_else(|| DEFAULT_DELIMITER.to_string()),
		match_condition: relation.match_condition.clone(),
	})
}

fn parse_pool(pool: &PoolSection) -> DatasourceResult<PoolOptions> {
	let defaults = PoolOptions::default();
	let connections = positive("pool.connections", pool.connections, defaults.connections)?;
	let statement_cache_size = positive(
		"pool.statementCacheSize",
		pool.statement_cache_size,
		defaults.statement_cache_size,
	)?;
	let acquire_timeout_ms = positive(
		"pool.acquireTimeoutMs",
		pool.acquire_timeout_ms,
		defaults.acquire_timeout.as_millis() as u64,
	)?;
	let page_size = positive("pool.pageSize", pool.page_size, defaults.page_size)?;
	Ok(PoolOptions {
		connections,
		statement_cache_size,
		acquire_timeout: Duration::from_millis(acquire_timeout_ms),
		page_size,
	})
}

fn positive<T>(path: &str, value: Option<T>, default: T) -> DatasourceResult<T>
where
	T: Copy + PartialOrd + Default + std::fmt::Display,
{
	match value {
		Some(value) if value <= T::default() => Err(DatasourceError::configuration(
			path,
			format!("must be positive, got {value}"),
		)),
		Some(value) => Ok(value),
		None => Ok(default),
	}
}

/// Applies axis keys like `x`, `yz` or `xyz` on top of `base`.
pub(crate) fn parse_scaling(
	path: &str,
	document: &ScalingDocument,
	base: CoordinateScaling,
) -> DatasourceResult<CoordinateScaling> {
	let mut scaling = base;
	for (key, factor) in document {
		let key_path = format!("{path}.{key}");
		if !REG_SCALING_KEY.is_match(key) {
			return Err(DatasourceError::configuration(
				key_path,
				"keys may only combine the axes 'x', 'y' and 'z'",
			));
		}
		if !factor.is_finite() || *factor == 0.0 {
			return Err(DatasourceError::configuration(
				key_path,
				format!("scaling factor must be finite and non-zero, got {factor}"),
			));
		}
		for axis in key.chars() {
			match axis {
				'x' => scaling.x = *factor,
				'y' => scaling.y = *factor,
				_ => scaling.z = *factor,
			}
		}
	}
	Ok(scaling)
}

fn parse_crs(path: &str, text: &str) -> DatasourceResult<Crs> {
	Crs::parse(text).map_err(|e| DatasourceError::configuration(path, e.to_string()))
}

fn require_non_empty(path: &str, value: &str) -> DatasourceResult<()> {
	if value.trim().is_empty() {
		return Err(DatasourceError::configuration(path, "must not be empty"));
	}
	Ok(())
}

fn require_single_statement(path: &str, sql: &str) -> DatasourceResult<()> {
	if sql.contains(';') {
		return Err(DatasourceError::configuration(path, "must not contain ';'"));
	}
	Ok(())
}
