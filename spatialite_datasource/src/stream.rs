//! Lazy, single-pass sequence of features for one request.
//!
//! Rows are read in pages with a `rowid` cursor. The statement is only borrowed while a
//! page is read, rows are buffered as owned values and decoded on demand. The pooled
//! connection is held by the stream and handed back as soon as the last page was read,
//! an error ended the stream or the caller dropped it.

use crate::{
	assembler::assemble_feature,
	connection::{CacheOutcome, ConnectionHandle, ConnectionManager, SpatialiteConnection, is_io_error},
	error::{DatasourceError, DatasourceResult},
	query::{ATTRIBUTE_OFFSET, BuiltQuery, GEOMETRY_COLUMN, ID_COLUMN, QueryShape, ROWID_COLUMN},
};
use rusqlite::{Row, params_from_iter, types::Value};
use spatialite_geometry::{
	Feature,
	spatialite::{decode_blob, read_blob_header},
};
use std::{collections::VecDeque, iter::FusedIterator, sync::Arc};

/// What happened while a stream was consumed. Updated as features are pulled.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
	/// Rows returned by the database.
	pub rows_read: usize,
	pub features_returned: usize,
	/// Rows dropped because their geometry could not be decoded.
	pub skipped_rows: usize,
	/// One [`DatasourceError::GeometryDecode`] per skipped row.
	pub decode_errors: Vec<DatasourceError>,
	/// Rows whose MBR does not overlap the extent.
	pub coarse_rejected: usize,
	/// Rows rejected by the exact intersection test.
	pub exact_rejected: usize,
	pub attribute_warnings: usize,
	pub cache_hits: usize,
	pub cache_misses: usize,
	pub reconnects: usize,
}

struct RawRow {
	rowid: i64,
	geometry: Value,
	id: Value,
	values: Vec<Value>,
}

enum PageFailure {
	Io(String),
	Query(String),
}

impl From<PageFailure> for DatasourceError {
	fn from(failure: PageFailure) -> Self {
		match failure {
			PageFailure::Io(reason) => DatasourceError::TransientIo(reason),
			PageFailure::Query(reason) => DatasourceError::QueryBuild(reason),
		}
	}
}

pub struct FeatureStream {
	query: BuiltQuery,
	connections: ConnectionManager,
	connection: Option<ConnectionHandle>,
	buffer: VecDeque<RawRow>,
	cursor: i64,
	page_size: usize,
	remaining: Option<usize>,
	exhausted: bool,
	reconnected: bool,
	diagnostics: Diagnostics,
}

impl FeatureStream {
	pub(crate) fn new(query: BuiltQuery, connections: ConnectionManager, connection: ConnectionHandle, page_size: usize) -> Self {
		FeatureStream {
			remaining: query.limit,
			query,
			connections,
			connection: Some(connection),
			buffer: VecDeque::new(),
			cursor: i64::MIN,
			page_size: page_size.max(1),
			exhausted: false,
			reconnected: false,
			diagnostics: Diagnostics::default(),
		}
	}

	#[must_use]
	pub fn diagnostics(&self) -> &Diagnostics {
		&self.diagnostics
	}

	#[must_use]
	pub fn into_diagnostics(mut self) -> Diagnostics {
		std::mem::take(&mut self.diagnostics)
	}

	/// Name of the layer this stream reads.
	#[must_use]
	pub fn layer(&self) -> &str {
		&self.query.layer.name
	}

	/// True while the stream holds a pooled connection.
	#[must_use]
	pub fn holds_connection(&self) -> bool {
		self.connection.is_some()
	}

	fn finish(&mut self) {
		self.exhausted = true;
		self.buffer.clear();
		if let Some(handle) = self.connection.take() {
			self.connections.release(handle);
			log::trace!(
				"layer '{}': {} rows read, {} features returned",
				self.query.layer.name,
				self.diagnostics.rows_read,
				self.diagnostics.features_returned
			);
		}
	}

	fn fetch_page(&mut self) -> DatasourceResult<()> {
		let page_size = self.remaining.map_or(self.page_size, |r| r.min(self.page_size));

		let rows = match self.read_page(page_size) {
			Ok(rows) => rows,
			Err(PageFailure::Io(reason)) if !self.reconnected => {
				log::warn!("layer '{}': {reason}, reconnecting once", self.query.layer.name);
				self.reconnect().map_err(|e| match e {
					DatasourceError::PoolExhausted { .. } => e,
					other => DatasourceError::TransientIo(format!("{reason}, reconnect failed: {other}")),
				})?;
				self.read_page(page_size)?
			}
			Err(failure) => return Err(failure.into()),
		};

		log::trace!(
			"layer '{}': page of {} rows after rowid {}",
			self.query.layer.name,
			rows.len(),
			self.cursor
		);
		if rows.len() < page_size {
			self.exhausted = true;
		}
		if let Some(last) = rows.last() {
			self.cursor = last.rowid;
		}
		self.diagnostics.rows_read += rows.len();
		self.buffer.extend(rows);
		if self.exhausted {
			self.finish_reading();
		}
		Ok(())
	}

	/// Returns the connection early, buffered rows are still delivered.
	fn finish_reading(&mut self) {
		if let Some(handle) = self.connection.take() {
			self.connections.release(handle);
		}
	}

	fn read_page(&mut self, page_size: usize) -> Result<Vec<RawRow>, PageFailure> {
		let Some(handle) = self.connection.as_mut() else {
			return Err(PageFailure::Io(String::from("stream holds no connection")));
		};
		if handle.is_broken() {
			return Err(PageFailure::Io(format!("connection {} is broken", handle.id())));
		}

		let parameters = self.query.page_parameters(self.cursor, page_size);
		let attributes = self.query.layer.attributes.len();
		let result = query_page(handle, &self.query.shape, parameters, attributes);
		match handle.observe(result) {
			Ok((rows, outcome)) => {
				match outcome {
					CacheOutcome::Hit => self.diagnostics.cache_hits += 1,
					CacheOutcome::Miss => self.diagnostics.cache_misses += 1,
				}
				Ok(rows)
			}
			Err(e) if is_io_error(&e) => Err(PageFailure::Io(e.to_string())),
			Err(e) => Err(PageFailure::Query(format!(
				"query on layer '{}' failed: {e}",
				self.query.layer.name
			))),
		}
	}

	fn reconnect(&mut self) -> DatasourceResult<()> {
		self.reconnected = true;
		self.diagnostics.reconnects += 1;
		if let Some(mut handle) = self.connection.take() {
			handle.mark_broken();
			self.connections.release(handle);
		}
		self.connection = Some(self.connections.acquire()?);
		Ok(())
	}

	/// Decodes, filters and assembles one row. `None` if the row is skipped or rejected.
	fn process(&mut self, row: RawRow) -> Option<Feature> {
		let layer = Arc::clone(&self.query.layer);

		let blob = match row.geometry {
			Value::Blob(blob) => blob,
			Value::Null => return self.skip(row.rowid, String::from("geometry is NULL")),
			_ => return self.skip(row.rowid, String::from("geometry is not a BLOB")),
		};

		match read_blob_header(&blob) {
			Ok(header) => {
				if !self.query.stored_extent.intersects_bounds(&header.mbr) {
					self.diagnostics.coarse_rejected += 1;
					return None;
				}
			}
			Err(e) => return self.skip(row.rowid, format!("{e:#}")),
		}

		let decoded = match decode_blob(&blob) {
			Ok(decoded) => decoded,
			Err(e) => return self.skip(row.rowid, format!("{e:#}")),
		};

		let geometry = layer.transform.apply(&decoded.geometry);
		if layer.exact_filtering && !geometry.intersects_extent(&self.query.output_extent) {
			self.diagnostics.exact_rejected += 1;
			return None;
		}

		let (feature, warnings) = assemble_feature(&layer, &row.id, row.rowid, geometry, row.values);
		self.diagnostics.attribute_warnings += warnings;
		Some(feature)
	}

	fn skip(&mut self, row_id: i64, reason: String) -> Option<Feature> {
		log::warn!("layer '{}': skipping row {row_id}: {reason}", self.query.layer.name);
		self.diagnostics.skipped_rows += 1;
		self
			.diagnostics
			.decode_errors
			.push(DatasourceError::GeometryDecode { row_id, reason });
		None
	}
}

impl Iterator for FeatureStream {
	type Item = DatasourceResult<Feature>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if self.remaining == Some(0) {
				self.finish();
				return None;
			}
			if let Some(row) = self.buffer.pop_front() {
				if let Some(feature) = self.process(row) {
					if let Some(remaining) = self.remaining.as_mut() {
						*remaining -= 1;
					}
					self.diagnostics.features_returned += 1;
					return Some(Ok(feature));
				}
				continue;
			}
			if self.exhausted {
				self.finish();
				return None;
			}
			if let Err(e) = self.fetch_page() {
				self.finish();
				return Some(Err(e));
			}
		}
	}
}

impl FusedIterator for FeatureStream {}

impl Drop for FeatureStream {
	fn drop(&mut self) {
		self.finish();
	}
}

fn query_page(
	connection: &mut SpatialiteConnection,
	shape: &QueryShape,
	parameters: Vec<Value>,
	attributes: usize,
) -> rusqlite::Result<(Vec<RawRow>, CacheOutcome)> {
	let (mut statement, outcome) = connection.prepare(shape)?;
	let rows = statement
		.query_map(params_from_iter(parameters), |row| read_row(row, attributes))?
		.collect::<rusqlite::Result<Vec<_>>>()?;
	Ok((rows, outcome))
}

fn read_row(row: &Row<'_>, attributes: usize) -> rusqlite::Result<RawRow> {
	Ok(RawRow {
		rowid: row.get(ROWID_COLUMN)?,
		geometry: row.get(GEOMETRY_COLUMN)?,
		id: row.get(ID_COLUMN)?,
		values: (0..attributes)
			.map(|i| row.get(ATTRIBUTE_OFFSET + i))
			.collect::<rusqlite::Result<_>>()?,
	})
}

#[cfg(test)]
mod tests {
	use crate::{Datasource, DatasourceConfig, FeatureRequest, test_fixtures::*};
	use spatialite_core::{Crs, SpatialExtent};
	use spatialite_geometry::Geometry;

	fn datasource(rows: i64, page_size: u32) -> (TestDatabase, Datasource) {
		let db = TestDatabase::new();
		db.create_layer("poi", &["name TEXT"], POINT, 4326, Index::RTree);
		for id in 1..=rows {
			db.insert("poi", id, &Geometry::new_point([id as f64, 0.0]), &[("name", text(&format!("p{id}")))]);
		}
		let config = DatasourceConfig::from_string(&format!(
			"pool: {{ connections: 1, pageSize: {page_size}, acquireTimeoutMs: 200 }}\nlayers: [{{ table: poi }}]"
		))
		.unwrap()
		.with_database_path(db.path());
		(db, Datasource::open(config).unwrap())
	}

	fn everything() -> FeatureRequest {
		FeatureRequest::new("poi", SpatialExtent::new(-180.0, -90.0, 180.0, 90.0, Crs::WGS84).unwrap())
	}

	#[test]
	fn reads_across_pages() {
		let (_db, datasource) = datasource(7, 3);
		let mut stream = datasource.fetch_features(&everything()).unwrap();
		let ids: Vec<i64> = stream.by_ref().map(|f| f.unwrap().id).collect();
		assert_eq!(ids, [1, 2, 3, 4, 5, 6, 7]);
		let diagnostics = stream.diagnostics();
		assert_eq!(diagnostics.rows_read, 7);
		// three pages, the shape is compiled once
		assert_eq!(diagnostics.cache_misses, 1);
		assert_eq!(diagnostics.cache_hits, 2);
		assert!(!stream.holds_connection());
	}

	#[test]
	fn connection_is_returned_with_the_last_page() {
		let (_db, datasource) = datasource(2, 10);
		let mut stream = datasource.fetch_features(&everything()).unwrap();
		assert!(stream.holds_connection());
		assert!(stream.next().is_some());
		// the single page was shorter than the page size
		assert!(!stream.holds_connection());
		assert!(datasource.fetch_features(&everything()).is_ok());
	}

	#[test]
	fn reconnects_once_and_resumes() {
		let (_db, datasource) = datasource(5, 2);
		let mut stream = datasource.fetch_features(&everything()).unwrap();
		let mut ids = vec![stream.next().unwrap().unwrap().id, stream.next().unwrap().unwrap().id];

		stream.connection.as_mut().unwrap().mark_broken();
		ids.extend(stream.by_ref().map(|f| f.unwrap().id));

		assert_eq!(ids, [1, 2, 3, 4, 5]);
		assert_eq!(stream.diagnostics().reconnects, 1);
	}

	#[test]
	fn second_failure_is_transient_io() {
		let (_db, datasource) = datasource(9, 2);
		let mut stream = datasource.fetch_features(&everything()).unwrap();
		stream.next().unwrap().unwrap();
		stream.next().unwrap().unwrap();
		stream.connection.as_mut().unwrap().mark_broken();
		stream.next().unwrap().unwrap();
		stream.next().unwrap().unwrap();
		stream.connection.as_mut().unwrap().mark_broken();

		let error = stream.next().unwrap().unwrap_err();
		assert!(matches!(error, crate::DatasourceError::TransientIo(_)), "{error:?}");
		assert!(error.is_retryable());
		assert!(stream.next().is_none());
		assert!(!stream.holds_connection());
	}

	#[test]
	fn failed_reconnect_is_transient_io() {
		let (db, datasource) = datasource(5, 2);
		let mut stream = datasource.fetch_features(&everything()).unwrap();
		stream.next().unwrap().unwrap();
		stream.next().unwrap().unwrap();

		stream.connection.as_mut().unwrap().mark_broken();
		std::fs::remove_file(db.path()).unwrap();

		let error = stream.next().unwrap().unwrap_err();
		assert!(matches!(error, crate::DatasourceError::TransientIo(_)), "{error:?}");
		assert!(error.is_retryable());
		assert_eq!(stream.diagnostics().reconnects, 1);
		assert!(stream.next().is_none());
		assert!(!stream.holds_connection());
	}
}
