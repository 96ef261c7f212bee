//! Translates a feature request into parameterised SQL.
//!
//! The statement text only depends on the layer and on the structure of the request
//! (which filters are present, how many `IN` values), never on literal values, so equal
//! requests hit the same cached statement. Rows are read in pages ordered by `rowid`,
//! the cursor and the page size are the first and the last parameter.

mod filter;

pub use filter::{CompareOp, FilterExpression, Literal, MAX_NESTING_DEPTH, parse_filter};

use crate::{
	catalog::{PrimaryKey, ResolvedAttribute, ResolvedLayer, SpatialIndex},
	config::AttributeSource,
	error::{DatasourceError, DatasourceResult},
};
use anyhow::Context;
use itertools::Itertools;
use rusqlite::types::Value;
use spatialite_core::SpatialExtent;
use spatialite_geometry::transform::project_extent;
use std::{
	fmt::Debug,
	sync::Arc,
};

/// Column positions in every generated statement.
pub const GEOMETRY_COLUMN: usize = 0;
pub const ROWID_COLUMN: usize = 1;
pub const ID_COLUMN: usize = 2;
pub const ATTRIBUTE_OFFSET: usize = 3;

/// A feature request as received from the host.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRequest {
	pub layer: String,
	pub extent: SpatialExtent,
	/// Attribute filter expression, see [`parse_filter`].
	pub filter: Option<String>,
	/// Maximum number of features to return.
	pub limit: Option<usize>,
}

impl FeatureRequest {
	#[must_use]
	pub fn new(layer: impl Into<String>, extent: SpatialExtent) -> Self {
		FeatureRequest {
			layer: layer.into(),
			extent,
			filter: None,
			limit: None,
		}
	}

	#[must_use]
	pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
		self.filter = Some(filter.into());
		self
	}

	#[must_use]
	pub fn with_limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);
		self
	}
}

/// Statement shape of a request: the layer plus the statement text. Requests that only
/// differ in bound values have equal shapes. Connections cache statements by the text.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct QueryShape {
	layer: Arc<str>,
	sql: Arc<str>,
}

impl QueryShape {
	#[must_use]
	pub fn new(layer: &str, sql: &str) -> Self {
		QueryShape {
			layer: Arc::from(layer),
			sql: Arc::from(sql),
		}
	}

	#[must_use]
	pub fn layer(&self) -> &str {
		&self.layer
	}

	#[must_use]
	pub fn sql(&self) -> &str {
		&self.sql
	}
}

impl Debug for QueryShape {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		// statement text is long, show the layer and a short fingerprint
		let hash = self.sql.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
			(h ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
		});
		write!(f, "QueryShape({}, {hash:016x})", self.layer)
	}
}

/// A request translated into SQL for one layer.
#[derive(Clone, Debug)]
pub struct BuiltQuery {
	pub layer: Arc<ResolvedLayer>,
	pub shape: QueryShape,
	/// Request extent in the stored coordinates of the layer.
	pub stored_extent: SpatialExtent,
	/// Request extent in the output CRS.
	pub output_extent: SpatialExtent,
	pub limit: Option<usize>,
	parameters: Vec<Value>,
}

impl BuiltQuery {
	/// Parameters for one page: `rowid > cursor`, the request parameters, `LIMIT page_size`.
	#[must_use]
	pub fn page_parameters(&self, cursor: i64, page_size: usize) -> Vec<Value> {
		let mut parameters = Vec::with_capacity(self.parameters.len() + 2);
		parameters.push(Value::Integer(cursor));
		parameters.extend(self.parameters.iter().cloned());
		parameters.push(Value::Integer(i64::try_from(page_size).unwrap_or(i64::MAX)));
		parameters
	}

	#[must_use]
	pub fn sql(&self) -> &str {
		self.shape.sql()
	}
}

/// Builds the statement for `request` against `layer`.
///
/// # Errors
/// [`DatasourceError::RequestValidation`] when the extent cannot be expressed in the
/// layer's CRS, [`DatasourceError::QueryBuild`] for invalid filter expressions.
pub fn build_query(layer: &Arc<ResolvedLayer>, request: &FeatureRequest) -> DatasourceResult<BuiltQuery> {
	let stored_extent = layer
		.transform
		.stored_extent(&request.extent)
		.with_context(|| format!("mapping the extent into layer '{}'", layer.name))
		.map_err(|e| DatasourceError::RequestValidation(format!("{e:#}")))?;
	let output_extent = project_extent(&request.extent, layer.transform.target())
		.map_err(|e| DatasourceError::RequestValidation(format!("{e:#}")))?;

	let mut parameters = Vec::new();
	let mut conditions = vec![String::from("t.rowid > ?")];

	match layer.spatial_index {
		SpatialIndex::RTree => {
			conditions.push(format!(
				"t.rowid IN (SELECT pkid FROM {} WHERE xmin <= ? AND xmax >= ? AND ymin <= ? AND ymax >= ?)",
				quote_identifier(&format!("idx_{}_{}", layer.table, layer.geometry_column))
			));
			parameters.extend(
				[
					stored_extent.x_max,
					stored_extent.x_min,
					stored_extent.y_max,
					stored_extent.y_min,
				]
				.map(Value::Real),
			);
		}
		SpatialIndex::MbrCache => {
			conditions.push(format!(
				"t.rowid IN (SELECT rowid FROM {} WHERE mbr = FilterMbrIntersects(?, ?, ?, ?))",
				quote_identifier(&format!("cache_{}_{}", layer.table, layer.geometry_column))
			));
			parameters.extend(stored_extent.as_array().map(Value::Real));
		}
		SpatialIndex::None => {}
	}

	if let Some(filter) = &layer.filter {
		conditions.push(format!("({filter})"));
	}

	let mut related_tables = Vec::new();
	for attribute in &layer.attributes {
		if let AttributeSource::Relation(relation) = &attribute.source {
			for column in &relation.columns {
				let table = quote_identifier(&column.table);
				if !related_tables.contains(&table) {
					related_tables.push(table);
				}
			}
			let condition = format!("({})", relation.match_condition);
			if !conditions.contains(&condition) {
				conditions.push(condition);
			}
		}
	}

	if let Some(text) = request.filter.as_deref().filter(|f| !f.trim().is_empty()) {
		let expression = parse_filter(text)
			.context("parsing the attribute filter")
			.map_err(|e| DatasourceError::query_build(&e))?;
		let resolve = |name: &str| layer.attribute(name).map(attribute_expression);
		let mut sql = String::new();
		expression
			.render(&resolve, &mut sql, &mut parameters)
			.with_context(|| format!("attribute filter on layer '{}'", layer.name))
			.map_err(|e| DatasourceError::query_build(&e))?;
		conditions.push(sql);
	}

	let id = match &layer.primary_key {
		PrimaryKey::Column(column) => format!("t.{}", quote_identifier(column)),
		PrimaryKey::RowId => String::from("t.rowid"),
	};
	let columns = [
		format!("t.{} AS __geometry", quote_identifier(&layer.geometry_column)),
		String::from("t.rowid AS __rowid"),
		format!("{id} AS __id"),
	]
	.into_iter()
	.chain(layer.attributes.iter().map(attribute_expression));

	let sql = format!(
		"SELECT {} FROM {} AS t{} WHERE {} ORDER BY t.rowid LIMIT ?",
		columns.format(", "),
		quote_identifier(&layer.table),
		related_tables.iter().map(|t| format!(", {t}")).join(""),
		conditions.join(" AND "),
	);
	log::trace!("layer '{}': {sql}", layer.name);

	Ok(BuiltQuery {
		layer: Arc::clone(layer),
		shape: QueryShape::new(&layer.name, &sql),
		stored_extent,
		output_extent,
		limit: request.limit,
		parameters,
	})
}

/// SQL expression selecting an attribute.
fn attribute_expression(attribute: &ResolvedAttribute) -> String {
	match &attribute.source {
		AttributeSource::Column(column) => format!("t.{}", quote_identifier(column)),
		AttributeSource::Relation(relation) => relation
			.columns
			.iter()
			.map(|c| format!("{}.{}", quote_identifier(&c.table), quote_identifier(&c.column)))
			.join(&format!(" || {} || ", quote_literal(&relation.delimiter))),
	}
}

fn quote_identifier(name: &str) -> String {
	format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
	format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{AttributeType, RelatedColumn, Relation};
	use pretty_assertions::assert_eq;
	use spatialite_core::Crs;
	use spatialite_geometry::{
		GeometryKind,
		spatialite::Dimension,
		transform::{CoordinateScaling, CoordinateTransform},
	};

	fn layer(spatial_index: SpatialIndex) -> Arc<ResolvedLayer> {
		Arc::new(ResolvedLayer {
			name: String::from("Roads"),
			table: String::from("roads"),
			geometry_column: String::from("geometry"),
			primary_key: PrimaryKey::Column(String::from("id")),
			crs: Crs::WGS84,
			kind: GeometryKind::LineString,
			dimension: Dimension::Xy,
			spatial_index,
			exact_filtering: false,
			filter: None,
			scaling: CoordinateScaling::NONE,
			attributes: vec![
				ResolvedAttribute {
					name: String::from("lanes"),
					kind: AttributeType::Integer,
					source: AttributeSource::Column(String::from("lanes")),
				},
				ResolvedAttribute {
					name: String::from("label"),
					kind: AttributeType::Text,
					source: AttributeSource::Column(String::from("name")),
				},
			],
			transform: CoordinateTransform::identity(Crs::WGS84),
		})
	}

	fn request() -> FeatureRequest {
		FeatureRequest::new("Roads", SpatialExtent::new(1.0, 2.0, 3.0, 4.0, Crs::WGS84).unwrap())
	}

	#[test]
	fn rtree_query() {
		let query = build_query(&layer(SpatialIndex::RTree), &request()).unwrap();
		assert_eq!(
			query.sql(),
			"SELECT t.\"geometry\" AS __geometry, t.rowid AS __rowid, t.\"id\" AS __id, t.\"lanes\", t.\"name\" \
			FROM \"roads\" AS t \
			WHERE t.rowid > ? \
			AND t.rowid IN (SELECT pkid FROM \"idx_roads_geometry\" WHERE xmin <= ? AND xmax >= ? AND ymin <= ? AND ymax >= ?) \
			ORDER BY t.rowid LIMIT ?"
		);
		assert_eq!(
			query.page_parameters(7, 100),
			[
				Value::Integer(7),
				Value::Real(3.0),
				Value::Real(1.0),
				Value::Real(4.0),
				Value::Real(2.0),
				Value::Integer(100)
			]
		);
	}

	#[test]
	fn scan_and_mbr_cache() {
		let scan = build_query(&layer(SpatialIndex::None), &request()).unwrap();
		assert!(scan.sql().contains("WHERE t.rowid > ? ORDER BY"));
		assert_eq!(scan.page_parameters(0, 1).len(), 2);

		let cache = build_query(&layer(SpatialIndex::MbrCache), &request()).unwrap();
		assert!(cache.sql().contains("FROM \"cache_roads_geometry\" WHERE mbr = FilterMbrIntersects(?, ?, ?, ?)"));
		assert_eq!(cache.page_parameters(0, 1)[1..5], [1.0, 2.0, 3.0, 4.0].map(Value::Real));
	}

	#[test]
	fn attribute_filter_is_bound() {
		let query = build_query(
			&layer(SpatialIndex::None),
			&request().with_filter("lanes >= 2 AND label <> 'x'' OR 1=1'"),
		)
		.unwrap();
		assert!(query.sql().ends_with("WHERE t.rowid > ? AND (t.\"lanes\" >= ? AND t.\"name\" <> ?) ORDER BY t.rowid LIMIT ?"));
		assert_eq!(
			query.page_parameters(0, 10),
			[
				Value::Integer(0),
				Value::Integer(2),
				Value::Text(String::from("x' OR 1=1")),
				Value::Integer(10)
			]
		);
	}

	#[test]
	fn shape_ignores_values() {
		let layer = layer(SpatialIndex::RTree);
		let a = build_query(&layer, &request().with_filter("lanes = 1")).unwrap();
		let mut other = request().with_filter("lanes = 5").with_limit(3);
		other.extent = SpatialExtent::new(-50.0, -50.0, 50.0, 50.0, Crs::WGS84).unwrap();
		let b = build_query(&layer, &other).unwrap();
		let c = build_query(&layer, &request().with_filter("lanes IS NULL")).unwrap();
		assert_eq!(a.shape, b.shape);
		assert_ne!(a.shape, c.shape);
	}

	#[test]
	fn layer_filter_and_relations() {
		let mut resolved = (*layer(SpatialIndex::None)).clone();
		resolved.filter = Some(String::from("t.deleted = 0"));
		resolved.primary_key = PrimaryKey::RowId;
		resolved.attributes.push(ResolvedAttribute {
			name: String::from("country"),
			kind: AttributeType::Text,
			source: AttributeSource::Relation(Relation {
				columns: vec![
					RelatedColumn {
						table: String::from("countries"),
						column: String::from("name"),
					},
					RelatedColumn {
						table: String::from("countries"),
						column: String::from("iso"),
					},
				],
				delimiter: String::from("'"),
				match_condition: String::from("countries.id = t.country_id"),
			}),
		});
		let query = build_query(&Arc::new(resolved), &request().with_filter("country LIKE 'D%'")).unwrap();
		assert_eq!(
			query.sql(),
			"SELECT t.\"geometry\" AS __geometry, t.rowid AS __rowid, t.rowid AS __id, t.\"lanes\", t.\"name\", \
			\"countries\".\"name\" || '''' || \"countries\".\"iso\" \
			FROM \"roads\" AS t, \"countries\" \
			WHERE t.rowid > ? AND (t.deleted = 0) AND (countries.id = t.country_id) \
			AND \"countries\".\"name\" || '''' || \"countries\".\"iso\" LIKE ? \
			ORDER BY t.rowid LIMIT ?"
		);
	}

	#[test]
	fn extent_is_mapped_into_stored_coordinates() {
		let mut resolved = (*layer(SpatialIndex::RTree)).clone();
		resolved.scaling = CoordinateScaling::new(0.1, 0.1, 1.0).unwrap();
		resolved.transform = CoordinateTransform::new(Crs::WGS84, Crs::WGS84, resolved.scaling).unwrap();
		let query = build_query(&Arc::new(resolved), &request()).unwrap();
		assert_eq!(query.stored_extent.as_array(), [10.0, 20.0, 30.0, 40.0]);
		assert_eq!(query.output_extent.as_array(), [1.0, 2.0, 3.0, 4.0]);
	}

	#[rstest::rstest]
	#[case("speed > 3", "unknown attribute 'speed'")]
	#[case("lanes >", "parsing the attribute filter")]
	#[case("lanes = 1; DROP TABLE roads", "parsing the attribute filter")]
	fn invalid_filters(#[case] filter: &str, #[case] message: &str) {
		match build_query(&layer(SpatialIndex::None), &request().with_filter(filter)).unwrap_err() {
			DatasourceError::QueryBuild(text) => assert!(text.contains(message), "{text}"),
			other => panic!("unexpected error {other:?}"),
		}
	}

	#[test]
	fn deeply_nested_filter_is_rejected() {
		let filter = format!("{}lanes = 1{}", "(".repeat(10_000), ")".repeat(10_000));
		match build_query(&layer(SpatialIndex::None), &request().with_filter(filter)).unwrap_err() {
			DatasourceError::QueryBuild(text) => assert!(text.contains("nesting too deep")),
			other => panic!("unexpected error {other:?}"),
		}
	}

	#[test]
	fn blank_filter_is_ignored() {
		let a = build_query(&layer(SpatialIndex::None), &request().with_filter("  ")).unwrap();
		let b = build_query(&layer(SpatialIndex::None), &request()).unwrap();
		assert_eq!(a.shape, b.shape);
	}
}
