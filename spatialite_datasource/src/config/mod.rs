//! Configuration document: structural model, semantic validation and the embedded schema.

mod document;
mod validate;

pub use document::*;
pub use validate::*;

use crate::error::{DatasourceError, DatasourceResult};
use std::{fs, path::Path};

/// Annotated description of every accepted key, ending with a complete example document.
pub const CONFIG_SCHEMA: &str = include_str!("config_schema.yaml");

impl DatasourceConfig {
	/// Parses and validates a YAML document. A malformed document is never defaulted.
	pub fn from_string(text: &str) -> DatasourceResult<DatasourceConfig> {
		let document: ConfigDocument = serde_yaml_ng::from_str(text).map_err(|e| {
			let path = match e.location() {
				Some(location) => format!("line {}, column {}", location.line(), location.column()),
				None => String::from("document"),
			};
			DatasourceError::configuration(path, e.to_string())
		})?;
		DatasourceConfig::from_document(document)
	}

	/// Reads a document from disk. A relative `map.path` is resolved against the document's directory.
	pub fn from_path(path: &Path) -> DatasourceResult<DatasourceConfig> {
		log::debug!("read config {path:?}");
		let text = fs::read_to_string(path)
			.map_err(|e| DatasourceError::configuration(path.display().to_string(), format!("cannot read file: {e}")))?;
		let mut config = DatasourceConfig::from_string(&text)?;
		if let (Some(database), Some(base)) = (&config.database_path, path.parent()) {
			if database.is_relative() {
				config.database_path = Some(base.join(database));
			}
		}
		Ok(config)
	}

	/// The `example` document embedded in [`CONFIG_SCHEMA`].
	#[must_use]
	pub fn example_yaml() -> String {
		serde_yaml_ng::from_str::<serde_yaml_ng::Value>(CONFIG_SCHEMA)
			.ok()
			.and_then(|schema| schema.get("example").and_then(|v| v.as_str()).map(str::to_string))
			.unwrap_or_default()
	}
}
