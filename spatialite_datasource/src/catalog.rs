//! Resolves configured layers against the database.
//!
//! Everything a layer leaves open in the configuration (geometry column, primary key,
//! CRS, attribute types, remaining attributes and layers) is looked up once when the
//! datasource opens. Missing tables or columns fail the initialisation.

use crate::{
	config::{AttributeSource, AttributeSpec, AttributeType, DatasourceConfig, LayerSpec},
	error::{DatasourceError, DatasourceResult},
};
use rusqlite::{Connection, OptionalExtension};
use spatialite_core::Crs;
use spatialite_geometry::{
	GeometryKind,
	spatialite::{Dimension, parse_geometry_type},
	transform::{CoordinateScaling, CoordinateTransform},
};
use std::{collections::HashSet, sync::Arc};

/// How rows of a layer are pre-selected by bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpatialIndex {
	/// No index, rows are checked against the MBR in the BLOB header.
	None,
	/// SQLite R*Tree table `idx_<table>_<column>`.
	RTree,
	/// SpatiaLite MBR cache `cache_<table>_<column>`, needs the extension.
	MbrCache,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrimaryKey {
	Column(String),
	RowId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedAttribute {
	pub name: String,
	pub kind: AttributeType,
	pub source: AttributeSource,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedLayer {
	pub name: String,
	pub table: String,
	pub geometry_column: String,
	pub primary_key: PrimaryKey,
	pub crs: Crs,
	pub kind: GeometryKind,
	pub dimension: Dimension,
	pub spatial_index: SpatialIndex,
	pub exact_filtering: bool,
	pub filter: Option<String>,
	pub scaling: CoordinateScaling,
	pub attributes: Vec<ResolvedAttribute>,
	/// From stored coordinates to the output CRS.
	pub transform: CoordinateTransform,
}

impl ResolvedLayer {
	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<&ResolvedAttribute> {
		self.attributes.iter().find(|a| a.name == name)
	}

	#[must_use]
	pub fn info(&self) -> LayerInfo {
		LayerInfo {
			name: self.name.clone(),
			table: self.table.clone(),
			geometry_kind: self.kind,
			crs: self.crs,
			attributes: self.attributes.iter().map(|a| (a.name.clone(), a.kind)).collect(),
		}
	}
}

/// What the host learns about a layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerInfo {
	pub name: String,
	pub table: String,
	pub geometry_kind: GeometryKind,
	/// CRS of the stored geometries.
	pub crs: Crs,
	pub attributes: Vec<(String, AttributeType)>,
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
	layers: Vec<Arc<ResolvedLayer>>,
}

#[derive(Clone, Debug)]
struct TableColumn {
	name: String,
	declared_type: String,
	pk: i64,
}

struct GeometryColumn {
	column: String,
	type_code: i64,
	srid: i64,
	spatial_index: i64,
}

impl Catalog {
	pub fn resolve(config: &DatasourceConfig, connection: &Connection, has_extension: bool) -> DatasourceResult<Catalog> {
		let mut layers = Vec::new();
		let mut tables = HashSet::new();

		for (index, spec) in config.layers.iter().enumerate() {
			let path = format!("layers[{index}]");
			let layer = resolve_layer(&path, spec, config, connection, has_extension)?;
			tables.insert(layer.table.to_lowercase());
			layers.push(Arc::new(layer));
		}

		if config.load_remaining_layers {
			let mut names: HashSet<String> = layers.iter().map(|l| l.name.clone()).collect();
			for table in spatial_tables(connection)? {
				if tables.contains(&table.to_lowercase()) || names.contains(&table) {
					continue;
				}
				let spec = LayerSpec {
					name: table.clone(),
					table: table.clone(),
					geometry_column: None,
					primary_key: None,
					crs: None,
					exact_filtering: false,
					filter: None,
					scaling: config.default_scaling,
					load_remaining_attributes: true,
					attributes: Vec::new(),
				};
				let path = format!("geometry_columns.{table}");
				let layer = resolve_layer(&path, &spec, config, connection, has_extension)?;
				log::debug!("discovered layer '{}'", layer.name);
				names.insert(table);
				layers.push(Arc::new(layer));
			}
		}

		Ok(Catalog { layers })
	}

	#[must_use]
	pub fn layer(&self, name: &str) -> Option<&Arc<ResolvedLayer>> {
		self.layers.iter().find(|l| l.name == name)
	}

	pub fn layers(&self) -> impl Iterator<Item = &Arc<ResolvedLayer>> {
		self.layers.iter()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.layers.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.layers.is_empty()
	}
}

fn resolve_layer(
	path: &str,
	spec: &LayerSpec,
	config: &DatasourceConfig,
	connection: &Connection,
	has_extension: bool,
) -> DatasourceResult<ResolvedLayer> {
	let columns = table_columns(connection, &spec.table).map_err(sql_error(path))?;
	if columns.is_empty() {
		return Err(DatasourceError::configuration(
			format!("{path}.table"),
			format!("table '{}' does not exist", spec.table),
		));
	}

	let geometry = geometry_column(connection, &spec.table, spec.geometry_column.as_deref())
		.map_err(sql_error(path))?
		.ok_or_else(|| {
			let constraint = match &spec.geometry_column {
				Some(column) => format!("'{}.{column}' is not registered in geometry_columns", spec.table),
				None => format!("table '{}' has no entry in geometry_columns", spec.table),
			};
			DatasourceError::configuration(format!("{path}.geometryColumn"), constraint)
		})?;

	let (kind, dimension) = parse_geometry_type(geometry.type_code)
		.map_err(|e| DatasourceError::configuration(format!("{path}.geometryColumn"), format!("{e:#}")))?;

	let crs = match spec.crs {
		Some(crs) => crs,
		None => Crs::try_from_srid(geometry.srid)
			.map_err(|e| DatasourceError::configuration(format!("{path}.crs"), format!("{e:#}")))?,
	};
	let transform = CoordinateTransform::new(crs, config.output_crs, spec.scaling)
		.map_err(|e| DatasourceError::configuration(format!("{path}.crs"), e.to_string()))?;

	let primary_key = resolve_primary_key(path, spec, &columns)?;
	let spatial_index = resolve_spatial_index(connection, spec, &geometry, has_extension).map_err(sql_error(path))?;

	let attributes = if config.disable_attributes {
		Vec::new()
	} else {
		resolve_attributes(path, spec, connection, &columns, &geometry.column, &primary_key)?
	};

	log::debug!(
		"layer '{}': table '{}', {kind} {dimension:?} in {crs}, {spatial_index:?} index, {} attributes",
		spec.name,
		spec.table,
		attributes.len()
	);

	Ok(ResolvedLayer {
		name: spec.name.clone(),
		table: spec.table.clone(),
		geometry_column: geometry.column,
		primary_key,
		crs,
		kind,
		dimension,
		spatial_index,
		exact_filtering: spec.exact_filtering,
		filter: spec.filter.clone(),
		scaling: spec.scaling,
		attributes,
		transform,
	})
}

/// Declared primary key, then a single-column primary key, then a column named `id`, then `rowid`.
fn resolve_primary_key(path: &str, spec: &LayerSpec, columns: &[TableColumn]) -> DatasourceResult<PrimaryKey> {
	if let Some(name) = &spec.primary_key {
		return match find_column(columns, name) {
			Some(column) => Ok(PrimaryKey::Column(column.name.clone())),
			None => Err(DatasourceError::configuration(
				format!("{path}.primaryKey"),
				format!("table '{}' has no column '{name}'", spec.table),
			)),
		};
	}
	let keys: Vec<&TableColumn> = columns.iter().filter(|c| c.pk > 0).collect();
	if let [key] = keys.as_slice() {
		return Ok(PrimaryKey::Column(key.name.clone()));
	}
	if let Some(column) = find_column(columns, "id") {
		return Ok(PrimaryKey::Column(column.name.clone()));
	}
	Ok(PrimaryKey::RowId)
}

fn resolve_spatial_index(
	connection: &Connection,
	spec: &LayerSpec,
	geometry: &GeometryColumn,
	has_extension: bool,
) -> rusqlite::Result<SpatialIndex> {
	let (index, table) = match geometry.spatial_index {
		1 => (SpatialIndex::RTree, format!("idx_{}_{}", spec.table, geometry.column)),
		2 => (SpatialIndex::MbrCache, format!("cache_{}_{}", spec.table, geometry.column)),
		_ => return Ok(SpatialIndex::None),
	};
	if index == SpatialIndex::MbrCache && !has_extension {
		log::warn!("layer '{}': MBR cache needs the SpatiaLite extension, falling back to a scan", spec.name);
		return Ok(SpatialIndex::None);
	}
	if !table_exists(connection, &table)? {
		log::warn!("layer '{}': spatial index table '{table}' is missing, falling back to a scan", spec.name);
		return Ok(SpatialIndex::None);
	}
	Ok(index)
}

fn resolve_attributes(
	path: &str,
	spec: &LayerSpec,
	connection: &Connection,
	columns: &[TableColumn],
	geometry_column: &str,
	primary_key: &PrimaryKey,
) -> DatasourceResult<Vec<ResolvedAttribute>> {
	let mut attributes = Vec::with_capacity(spec.attributes.len());
	let mut used_columns = HashSet::new();

	for (index, attribute) in spec.attributes.iter().enumerate() {
		let attribute_path = format!("{path}.attributes[{index}]");
		let resolved = resolve_attribute(&attribute_path, spec, attribute, connection, columns)?;
		if let AttributeSource::Column(column) = &resolved.source {
			used_columns.insert(column.to_lowercase());
		}
		attributes.push(resolved);
	}

	if spec.load_remaining_attributes {
		let mut names: HashSet<String> = attributes.iter().map(|a| a.name.clone()).collect();
		for column in columns {
			let lower = column.name.to_lowercase();
			let is_key = matches!(primary_key, PrimaryKey::Column(key) if key.eq_ignore_ascii_case(&column.name));
			if is_key
				|| lower == geometry_column.to_lowercase()
				|| used_columns.contains(&lower)
				|| names.contains(&column.name)
			{
				continue;
			}
			names.insert(column.name.clone());
			attributes.push(ResolvedAttribute {
				name: column.name.clone(),
				kind: AttributeType::from_declared_type(&column.declared_type),
				source: AttributeSource::Column(column.name.clone()),
			});
		}
	}

	Ok(attributes)
}

fn resolve_attribute(
	path: &str,
	spec: &LayerSpec,
	attribute: &AttributeSpec,
	connection: &Connection,
	columns: &[TableColumn],
) -> DatasourceResult<ResolvedAttribute> {
	match &attribute.source {
		AttributeSource::Column(name) => {
			let Some(column) = find_column(columns, name) else {
				return Err(DatasourceError::configuration(
					format!("{path}.column"),
					format!("table '{}' has no column '{name}'", spec.table),
				));
			};
			Ok(ResolvedAttribute {
				name: attribute.name.clone(),
				kind: attribute
					.kind
					.unwrap_or_else(|| AttributeType::from_declared_type(&column.declared_type)),
				source: AttributeSource::Column(column.name.clone()),
			})
		}
		AttributeSource::Relation(relation) => {
			let mut declared = None;
			for (index, related) in relation.columns.iter().enumerate() {
				let related_columns = table_columns(connection, &related.table).map_err(sql_error(path))?;
				let Some(column) = find_column(&related_columns, &related.column) else {
					return Err(DatasourceError::configuration(
						format!("{path}.relation.relatedColumns[{index}]"),
						format!("table '{}' has no column '{}'", related.table, related.column),
					));
				};
				declared.get_or_insert_with(|| column.declared_type.clone());
			}
			let kind = attribute.kind.unwrap_or_else(|| match relation.columns.as_slice() {
				[_] => AttributeType::from_declared_type(declared.as_deref().unwrap_or_default()),
				_ => AttributeType::Text,
			});
			Ok(ResolvedAttribute {
				name: attribute.name.clone(),
				kind,
				source: AttributeSource::Relation(relation.clone()),
			})
		}
	}
}

fn find_column<'a>(columns: &'a [TableColumn], name: &str) -> Option<&'a TableColumn> {
	columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
}

fn table_columns(connection: &Connection, table: &str) -> rusqlite::Result<Vec<TableColumn>> {
	let mut statement = connection.prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
	statement
		.query_map([table], |row| {
			Ok(TableColumn {
				name: row.get(0)?,
				declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
				pk: row.get(2)?,
			})
		})?
		.collect()
}

fn geometry_column(connection: &Connection, table: &str, column: Option<&str>) -> rusqlite::Result<Option<GeometryColumn>> {
	connection
		.query_row(
			"SELECT f_geometry_column, geometry_type, srid, spatial_index_enabled
			FROM geometry_columns
			WHERE lower(f_table_name) = lower(?1) AND (?2 IS NULL OR lower(f_geometry_column) = lower(?2))
			ORDER BY f_geometry_column
			LIMIT 1",
			(table, column),
			|row| {
				Ok(GeometryColumn {
					column: row.get(0)?,
					type_code: row.get(1)?,
					srid: row.get(2)?,
					spatial_index: row.get(3)?,
				})
			},
		)
		.optional()
}

fn spatial_tables(connection: &Connection) -> DatasourceResult<Vec<String>> {
	let query = || -> rusqlite::Result<Vec<String>> {
		let mut statement = connection.prepare("SELECT DISTINCT f_table_name FROM geometry_columns ORDER BY f_table_name")?;
		statement.query_map([], |row| row.get(0))?.collect()
	};
	query().map_err(sql_error("geometry_columns"))
}

fn table_exists(connection: &Connection, name: &str) -> rusqlite::Result<bool> {
	connection.query_row(
		"SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND lower(name) = lower(?1)",
		[name],
		|row| row.get(0),
	)
}

fn sql_error(path: &str) -> impl Fn(rusqlite::Error) -> DatasourceError + '_ {
	move |e| DatasourceError::configuration(path, format!("reading the database schema failed: {e}"))
}
