//! Entry point for the host service.
//!
//! A [`Datasource`] owns the active configuration, the resolved catalog and the
//! connection pool as one immutable state. Requests work on a snapshot of that state,
//! [`Datasource::reconfigure`] replaces it in one atomic swap while running streams keep
//! reading from the state they started with.

use crate::{
	catalog::{Catalog, LayerInfo},
	config::DatasourceConfig,
	connection::{ConnectionManager, ConnectionOptions, PoolStatus},
	error::{DatasourceError, DatasourceResult},
	query::{FeatureRequest, build_query},
	stream::FeatureStream,
};
use arc_swap::ArcSwap;
use std::sync::Arc;

struct ActiveState {
	config: DatasourceConfig,
	options: ConnectionOptions,
	catalog: Catalog,
	connections: ConnectionManager,
}

impl ActiveState {
	/// Opens (or reuses) the pool and resolves the catalog for `config`.
	fn activate(config: DatasourceConfig, previous: Option<&ActiveState>) -> DatasourceResult<ActiveState> {
		let options = ConnectionOptions {
			path: config.require_database_path()?.to_path_buf(),
			extension: config.extension.clone(),
			connections: config.pool.connections,
			statement_cache_size: config.pool.statement_cache_size,
			acquire_timeout: config.pool.acquire_timeout,
		};

		let connections = match previous {
			Some(state) if state.options == options => {
				log::debug!("reusing the connection pool for {:?}", options.path);
				state.connections.clone()
			}
			_ => ConnectionManager::open(&options)?,
		};

		let handle = connections.acquire()?;
		let catalog = Catalog::resolve(&config, handle.connection(), connections.has_extension());
		connections.release(handle);
		let catalog = catalog?;

		log::debug!(
			"datasource '{}' serves {} layers: {}",
			config.map_name(),
			catalog.len(),
			catalog.layers().map(|l| l.name.as_str()).collect::<Vec<_>>().join(", ")
		);

		Ok(ActiveState {
			config,
			options,
			catalog,
			connections,
		})
	}
}

/// SpatiaLite backed feature source.
///
/// `Datasource` is `Send + Sync`, every method takes `&self` and may be called from
/// many threads at once.
pub struct Datasource {
	state: ArcSwap<ActiveState>,
}

impl Datasource {
	/// Opens the database, loads the extension and resolves every configured layer.
	///
	/// # Errors
	/// [`DatasourceError::Configuration`] when the configuration does not match the database,
	/// [`DatasourceError::ExtensionLoad`] and [`DatasourceError::Connection`] when the
	/// database cannot be opened.
	pub fn open(config: DatasourceConfig) -> DatasourceResult<Datasource> {
		let state = ActiveState::activate(config, None)?;
		Ok(Datasource {
			state: ArcSwap::from_pointee(state),
		})
	}

	/// Replaces the configuration.
	///
	/// The new state is built completely before it is swapped in, a failure leaves the
	/// current state untouched. The pool is kept when the connection settings did not change.
	pub fn reconfigure(&self, config: DatasourceConfig) -> DatasourceResult<()> {
		let current = self.state.load_full();
		let next = ActiveState::activate(config, Some(&current))?;
		log::debug!(
			"reconfigured datasource '{}' with {} layers",
			next.config.map_name(),
			next.catalog.len()
		);
		self.state.store(Arc::new(next));
		Ok(())
	}

	/// Starts a request. Nothing is read from the database until the stream is polled.
	///
	/// The layer is checked before any SQL is issued. The stream holds one pooled
	/// connection until it is exhausted or dropped.
	///
	/// # Errors
	/// [`DatasourceError::RequestValidation`] for unknown layers or unusable extents,
	/// [`DatasourceError::QueryBuild`] for invalid filters and
	/// [`DatasourceError::PoolExhausted`] when no connection is free in time.
	pub fn fetch_features(&self, request: &FeatureRequest) -> DatasourceResult<FeatureStream> {
		let state = self.state.load_full();
		let layer = state.catalog.layer(&request.layer).ok_or_else(|| {
			DatasourceError::RequestValidation(format!("unknown layer '{}'", request.layer))
		})?;
		let query = build_query(layer, request)?;
		let connection = state.connections.acquire()?;
		log::trace!("fetch features of layer '{}' in {:?}", request.layer, request.extent);
		Ok(FeatureStream::new(
			query,
			state.connections.clone(),
			connection,
			state.config.pool.page_size as usize,
		))
	}

	/// Layers of the active configuration, in configuration order.
	#[must_use]
	pub fn layers(&self) -> Vec<LayerInfo> {
		self.state.load().catalog.layers().map(|l| l.info()).collect()
	}

	#[must_use]
	pub fn map_name(&self) -> String {
		self.state.load().config.map_name()
	}

	/// Snapshot of the active configuration.
	#[must_use]
	pub fn config(&self) -> DatasourceConfig {
		self.state.load().config.clone()
	}

	#[must_use]
	pub fn pool_status(&self) -> PoolStatus {
		self.state.load().connections.status()
	}
}
