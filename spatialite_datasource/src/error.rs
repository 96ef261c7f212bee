//! Typed errors returned to the host service.
//!
//! Internally the crate works with `anyhow` chains, they are classified into
//! [`DatasourceError`] where a request or the initialisation fails.

use std::time::Duration;
use thiserror::Error;

pub type DatasourceResult<T> = std::result::Result<T, DatasourceError>;

#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum DatasourceError {
	/// The configuration document is malformed or does not match the database.
	#[error("invalid configuration at '{path}': {constraint}")]
	Configuration {
		/// Location of the offending value, e.g. `layers[1].attributes[0].type`.
		path: String,
		/// The constraint that was violated.
		constraint: String,
	},

	/// The SpatiaLite extension could not be loaded. Fatal at startup.
	#[error("failed to load SpatiaLite extension '{extension}': {reason}")]
	ExtensionLoad { extension: String, reason: String },

	/// No connection to the database could be established.
	#[error("database connection failed: {0}")]
	Connection(String),

	/// A connection broke during a request and the single retry failed as well.
	#[error("transient I/O failure after reconnect: {0}")]
	TransientIo(String),

	/// Every connection of the pool stayed busy until the acquire deadline.
	#[error("connection pool exhausted after {waited:?}, retry after {retry_after:?}")]
	PoolExhausted { waited: Duration, retry_after: Duration },

	/// The request could not be translated into SQL, e.g. an invalid filter expression.
	#[error("invalid query: {0}")]
	QueryBuild(String),

	/// A geometry BLOB could not be decoded. Recovered per row.
	#[error("malformed geometry in row {row_id}: {reason}")]
	GeometryDecode { row_id: i64, reason: String },

	/// An attribute value could not be coerced into its declared type. Recovered as null.
	#[error("attribute '{attribute}': {reason}")]
	AttributeCoercion { attribute: String, reason: String },

	/// The request names something the active configuration does not know.
	#[error("invalid request: {0}")]
	RequestValidation(String),
}

impl DatasourceError {
	pub(crate) fn configuration(path: impl Into<String>, constraint: impl Into<String>) -> Self {
		DatasourceError::Configuration {
			path: path.into(),
			constraint: constraint.into(),
		}
	}

	/// Builds a [`DatasourceError::QueryBuild`] from an `anyhow` chain, keeping every context line.
	pub(crate) fn query_build(error: &anyhow::Error) -> Self {
		DatasourceError::QueryBuild(format!("{error:#}"))
	}

	/// True for errors the host may retry later without changing the request.
	#[must_use]
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			DatasourceError::PoolExhausted { .. } | DatasourceError::TransientIo(_)
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display() {
		let error = DatasourceError::configuration("layers[0].table", "must not be empty");
		assert_eq!(
			error.to_string(),
			"invalid configuration at 'layers[0].table': must not be empty"
		);

		let error = DatasourceError::GeometryDecode {
			row_id: 7,
			reason: "unexpected end marker".into(),
		};
		assert_eq!(error.to_string(), "malformed geometry in row 7: unexpected end marker");
	}

	#[test]
	fn query_build_keeps_context() {
		let inner = anyhow::anyhow!("unknown attribute 'speed'").context("parsing filter");
		let error = DatasourceError::query_build(&inner);
		assert_eq!(
			error.to_string(),
			"invalid query: parsing filter: unknown attribute 'speed'"
		);
	}

	#[test]
	fn retryable() {
		let exhausted = DatasourceError::PoolExhausted {
			waited: Duration::from_millis(100),
			retry_after: Duration::from_millis(50),
		};
		assert!(exhausted.is_retryable());
		assert!(!DatasourceError::RequestValidation("x".into()).is_retryable());
	}
}
