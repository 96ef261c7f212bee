//! SQLite fixtures with SpatiaLite metadata, built without the extension.
//!
//! `geometry_columns` is created with the SpatiaLite 4 layout and spatial indexes are
//! plain SQLite R*Tree tables, so the bundled SQLite is enough to run the tests.
//! Also compiled into the library's unit tests.
#![allow(dead_code)]

use rusqlite::{Connection, ToSql, types::Value};
use spatialite_geometry::{Geometry, spatialite::encode_blob};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const POINT: i64 = 1;
pub const LINESTRING: i64 = 2;
pub const POLYGON: i64 = 3;
pub const MULTIPOLYGON: i64 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Index {
	None,
	RTree,
}

pub struct TestDatabase {
	_dir: TempDir,
	path: PathBuf,
	connection: Connection,
}

impl TestDatabase {
	pub fn new() -> Self {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("map.sqlite");
		let connection = Connection::open(&path).unwrap();
		connection
			.execute_batch(
				"CREATE TABLE geometry_columns (
					f_table_name TEXT NOT NULL,
					f_geometry_column TEXT NOT NULL,
					geometry_type INTEGER NOT NULL,
					coord_dimension INTEGER NOT NULL,
					srid INTEGER NOT NULL,
					spatial_index_enabled INTEGER NOT NULL
				);",
			)
			.unwrap();
		TestDatabase {
			_dir: dir,
			path,
			connection,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn connection(&self) -> &Connection {
		&self.connection
	}

	pub fn execute(&self, sql: &str) {
		self.connection.execute_batch(sql).unwrap();
	}

	/// Creates `table (id INTEGER PRIMARY KEY, <columns>, geometry BLOB)` and registers it.
	pub fn create_layer(&self, table: &str, columns: &[&str], geometry_type: i64, srid: i64, index: Index) {
		let mut definition = vec![String::from("id INTEGER PRIMARY KEY")];
		definition.extend(columns.iter().map(|c| c.to_string()));
		definition.push(String::from("geometry BLOB"));
		self.execute(&format!("CREATE TABLE {table} ({});", definition.join(", ")));
		self.register(table, "geometry", geometry_type, srid, index);
	}

	pub fn register(&self, table: &str, column: &str, geometry_type: i64, srid: i64, index: Index) {
		let dimension = if geometry_type > 1000 { 3 } else { 2 };
		self
			.connection
			.execute(
				"INSERT INTO geometry_columns VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
				(table, column, geometry_type, dimension, srid, i64::from(index == Index::RTree)),
			)
			.unwrap();
		if index == Index::RTree {
			self.execute(&format!(
				"CREATE VIRTUAL TABLE idx_{table}_{column} USING rtree(pkid, xmin, xmax, ymin, ymax);"
			));
		}
	}

	pub fn insert(&self, table: &str, id: i64, geometry: &Geometry, values: &[(&str, Value)]) {
		let srid: i64 = self
			.connection
			.query_row(
				"SELECT srid FROM geometry_columns WHERE f_table_name = ?1",
				[table],
				|row| row.get(0),
			)
			.unwrap();
		let blob = encode_blob(geometry, srid as i32).unwrap();
		self.insert_blob(table, id, blob, geometry.compute_bounds(), values);
	}

	/// Inserts raw bytes as geometry; `bounds` feeds the spatial index if there is one.
	pub fn insert_blob(&self, table: &str, id: i64, blob: Vec<u8>, bounds: Option<[f64; 4]>, values: &[(&str, Value)]) {
		let mut columns = vec!["id", "geometry"];
		columns.extend(values.iter().map(|(name, _)| *name));
		let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
		let mut parameters: Vec<&dyn ToSql> = vec![&id, &blob];
		parameters.extend(values.iter().map(|(_, value)| value as &dyn ToSql));
		self
			.connection
			.execute(
				&format!(
					"INSERT INTO {table} ({}) VALUES ({})",
					columns.join(", "),
					placeholders.join(", ")
				),
				parameters.as_slice(),
			)
			.unwrap();

		let index = format!("idx_{table}_geometry");
		if let (Some([x_min, y_min, x_max, y_max]), true) = (bounds, self.has_table(&index)) {
			self
				.connection
				.execute(
					&format!("INSERT INTO {index} VALUES (?1, ?2, ?3, ?4, ?5)"),
					(id, x_min, x_max, y_min, y_max),
				)
				.unwrap();
		}
	}

	pub fn has_table(&self, name: &str) -> bool {
		self
			.connection
			.query_row(
				"SELECT count(*) FROM sqlite_master WHERE name = ?1",
				[name],
				|row| row.get::<_, i64>(0),
			)
			.unwrap() > 0
	}
}

/// Text value shorthand.
pub fn text(value: &str) -> Value {
	Value::Text(value.to_string())
}
