//! Bounded pool of read-only SpatiaLite connections.
//!
//! Each pooled connection owns its own statement cache, so cached statements are never
//! shared between two requests. A connection that reported an I/O failure is flagged as
//! broken and dropped by the pool instead of being handed out again.

use crate::{
	error::{DatasourceError, DatasourceResult},
	query::QueryShape,
};
use lru::LruCache;
use parking_lot::Mutex;
use r2d2::{ManageConnection, Pool, PooledConnection};
use rusqlite::{CachedStatement, Connection, ErrorCode, OpenFlags};
use std::{
	num::NonZeroUsize,
	path::{Path, PathBuf},
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::{Duration, Instant},
};

pub type ConnectionHandle = PooledConnection<SpatialiteConnectionManager>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionOptions {
	pub path: PathBuf,
	pub extension: Option<String>,
	pub connections: u32,
	pub statement_cache_size: usize,
	pub acquire_timeout: Duration,
}

/// Whether a prepared statement came out of the connection's cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
	Hit,
	Miss,
}

/// Counters shared by all connections of one pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStatistics {
	pub connections_opened: u64,
	pub statements_executed: u64,
	pub cache_hits: u64,
	pub cache_misses: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolStatus {
	pub max_size: u32,
	pub connections: u32,
	pub idle_connections: u32,
	pub statistics: PoolStatistics,
}

pub struct SpatialiteConnection {
	id: u64,
	connection: Connection,
	/// SQL texts held by the statement cache, in the same order of use.
	statements: LruCache<Arc<str>, ()>,
	broken: bool,
	statistics: Arc<Mutex<PoolStatistics>>,
}

impl SpatialiteConnection {
	#[must_use]
	pub fn id(&self) -> u64 {
		self.id
	}

	/// The raw connection, for catalog lookups that bypass the statement cache.
	#[must_use]
	pub fn connection(&self) -> &Connection {
		&self.connection
	}

	/// Returns the compiled statement for `shape`, compiling it on a cache miss.
	///
	/// Statements are cached by SQL text, so layers that generate the same SQL share one
	/// compiled statement. The least recently used statement is evicted once the cache is
	/// full. Bindings of a statement are cleared when it goes back into the cache.
	pub fn prepare(&mut self, shape: &QueryShape) -> rusqlite::Result<(CachedStatement<'_>, CacheOutcome)> {
		let outcome = if self.statements.get(shape.sql()).is_some() {
			CacheOutcome::Hit
		} else {
			self.statements.put(Arc::from(shape.sql()), ());
			CacheOutcome::Miss
		};

		let statement = match self.connection.prepare_cached(shape.sql()) {
			Ok(statement) => statement,
			Err(e) => {
				self.statements.pop(shape.sql());
				if is_io_error(&e) {
					self.broken = true;
				}
				return Err(e);
			}
		};

		let mut statistics = self.statistics.lock();
		statistics.statements_executed += 1;
		match outcome {
			CacheOutcome::Hit => statistics.cache_hits += 1,
			CacheOutcome::Miss => statistics.cache_misses += 1,
		}
		drop(statistics);

		log::trace!("connection {} prepared {shape:?}: {outcome:?}", self.id);
		Ok((statement, outcome))
	}

	/// Flags the connection so the pool discards it instead of reusing it.
	pub fn mark_broken(&mut self) {
		if !self.broken {
			log::warn!("connection {} is broken and will be discarded", self.id);
		}
		self.broken = true;
	}

	#[must_use]
	pub fn is_broken(&self) -> bool {
		self.broken
	}

	/// Inspects a query result and flags the connection on I/O class errors.
	pub fn observe<T>(&mut self, result: rusqlite::Result<T>) -> rusqlite::Result<T> {
		if let Err(e) = &result {
			if is_io_error(e) {
				self.mark_broken();
			}
		}
		result
	}
}

/// True for errors that mean the connection itself can no longer be trusted.
#[must_use]
pub fn is_io_error(error: &rusqlite::Error) -> bool {
	matches!(
		error.sqlite_error_code(),
		Some(ErrorCode::SystemIoFailure | ErrorCode::CannotOpen | ErrorCode::NotADatabase)
	)
}

/// `r2d2` manager creating read-only connections with the SpatiaLite extension loaded.
pub struct SpatialiteConnectionManager {
	path: PathBuf,
	extension: Option<String>,
	statement_cache_size: NonZeroUsize,
	next_id: AtomicU64,
	statistics: Arc<Mutex<PoolStatistics>>,
}

impl SpatialiteConnectionManager {
	fn new(options: &ConnectionOptions, statistics: Arc<Mutex<PoolStatistics>>) -> Self {
		SpatialiteConnectionManager {
			path: options.path.clone(),
			extension: options.extension.clone(),
			statement_cache_size: NonZeroUsize::new(options.statement_cache_size).unwrap_or(NonZeroUsize::MIN),
			next_id: AtomicU64::new(0),
			statistics,
		}
	}
}

impl ManageConnection for SpatialiteConnectionManager {
	type Connection = SpatialiteConnection;
	type Error = rusqlite::Error;

	fn connect(&self) -> Result<SpatialiteConnection, rusqlite::Error> {
		let connection = open_database(&self.path, self.statement_cache_size.get())?;
		if let Some(extension) = &self.extension {
			load_extension(&connection, extension)?;
		}
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.statistics.lock().connections_opened += 1;
		log::debug!("opened connection {id} to {:?}", self.path);
		Ok(SpatialiteConnection {
			id,
			connection,
			statements: LruCache::new(self.statement_cache_size),
			broken: false,
			statistics: Arc::clone(&self.statistics),
		})
	}

	fn is_valid(&self, conn: &mut SpatialiteConnection) -> Result<(), rusqlite::Error> {
		let result = conn.connection.execute_batch("");
		conn.observe(result)
	}

	fn has_broken(&self, conn: &mut SpatialiteConnection) -> bool {
		conn.broken
	}
}

fn open_database(path: &Path, statement_cache_size: usize) -> rusqlite::Result<Connection> {
	let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
	let connection = Connection::open_with_flags(path, flags)?;
	connection.set_prepared_statement_cache_capacity(statement_cache_size);
	Ok(connection)
}

fn load_extension(connection: &Connection, extension: &str) -> rusqlite::Result<()> {
	// SAFETY: the extension comes from the operator's configuration, and loading is
	// switched off again before the connection is used for queries.
	unsafe {
		connection.load_extension_enable()?;
		let result = connection.load_extension(extension, None::<&str>);
		connection.load_extension_disable()?;
		result
	}
}

/// Owns the pool and hands out connections with a bounded wait.
#[derive(Clone)]
pub struct ConnectionManager {
	pool: Pool<SpatialiteConnectionManager>,
	acquire_timeout: Duration,
	has_extension: bool,
	statistics: Arc<Mutex<PoolStatistics>>,
}

impl ConnectionManager {
	/// Probes a first connection, then builds the pool.
	///
	/// A failure to load the extension is reported as [`DatasourceError::ExtensionLoad`].
	pub fn open(options: &ConnectionOptions) -> DatasourceResult<ConnectionManager> {
		log::debug!("open connection pool for {:?} with {} connections", options.path, options.connections);

		let probe = open_database(&options.path, options.statement_cache_size)
			.map_err(|e| DatasourceError::Connection(format!("cannot open {:?}: {e}", options.path)))?;
		if let Some(extension) = &options.extension {
			load_extension(&probe, extension).map_err(|e| DatasourceError::ExtensionLoad {
				extension: extension.clone(),
				reason: e.to_string(),
			})?;
		}
		drop(probe);

		let statistics = Arc::new(Mutex::new(PoolStatistics::default()));
		let manager = SpatialiteConnectionManager::new(options, Arc::clone(&statistics));
		let pool = Pool::builder()
			.max_size(options.connections)
			.min_idle(Some(1))
			.connection_timeout(options.acquire_timeout)
			.build(manager)
			.map_err(|e| DatasourceError::Connection(e.to_string()))?;

		Ok(ConnectionManager {
			pool,
			acquire_timeout: options.acquire_timeout,
			has_extension: options.extension.is_some(),
			statistics,
		})
	}

	/// Waits at most the configured acquire timeout for a free connection.
	pub fn acquire(&self) -> DatasourceResult<ConnectionHandle> {
		self.acquire_within(self.acquire_timeout)
	}

	pub fn acquire_within(&self, timeout: Duration) -> DatasourceResult<ConnectionHandle> {
		let started = Instant::now();
		match self.pool.get_timeout(timeout) {
			Ok(handle) => {
				log::trace!("acquired connection {} after {:?}", handle.id(), started.elapsed());
				Ok(handle)
			}
			Err(e) => {
				let state = self.pool.state();
				if state.connections >= self.pool.max_size() && state.idle_connections == 0 {
					let waited = started.elapsed();
					log::debug!("connection pool exhausted after {waited:?}");
					Err(DatasourceError::PoolExhausted {
						waited,
						retry_after: self.retry_after(),
					})
				} else {
					Err(DatasourceError::Connection(e.to_string()))
				}
			}
		}
	}

	/// Hands a connection back to the pool. Dropping the handle has the same effect.
	pub fn release(&self, handle: ConnectionHandle) {
		log::trace!("release connection {}", handle.id());
		drop(handle);
	}

	/// Suggested delay before retrying after [`DatasourceError::PoolExhausted`].
	#[must_use]
	pub fn retry_after(&self) -> Duration {
		(self.acquire_timeout / 2).max(Duration::from_millis(10))
	}

	#[must_use]
	pub fn has_extension(&self) -> bool {
		self.has_extension
	}

	#[must_use]
	pub fn status(&self) -> PoolStatus {
		let state = self.pool.state();
		PoolStatus {
			max_size: self.pool.max_size(),
			connections: state.connections,
			idle_connections: state.idle_connections,
			statistics: self.statistics.lock().clone(),
		}
	}
}
