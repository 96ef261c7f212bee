//! Turns a decoded row into a [`Feature`].
//!
//! SQLite is dynamically typed, so every attribute value is coerced into the type
//! the layer declares for it. A value that does not fit becomes `Null` and the
//! feature carries a warning, the row itself is never dropped for that.

use crate::{
	catalog::ResolvedLayer,
	config::AttributeType,
	error::{DatasourceError, DatasourceResult},
};
use itertools::Itertools;
use rusqlite::types::Value;
use spatialite_geometry::{Feature, FeatureProperties, FeatureValue, Geometry};

/// Builds a feature from the row values following the geometry, rowid and id columns.
///
/// `values` holds one entry per layer attribute, in declared order. Returns the feature
/// and the number of attribute warnings it carries.
pub fn assemble_feature(layer: &ResolvedLayer, id: &Value, rowid: i64, geometry: Geometry, values: Vec<Value>) -> (Feature, usize) {
	let mut feature = Feature::new(rowid, geometry);
	match feature_id(id) {
		Some(id) => feature.id = id,
		None => feature.add_warning(format!(
			"primary key {} is not an integer, using rowid {rowid}",
			describe(id)
		)),
	}

	let mut properties = FeatureProperties::with_capacity(layer.attributes.len());
	let mut warnings = 0;
	for (attribute, value) in layer.attributes.iter().zip(values) {
		let value = match coerce(&attribute.name, value, attribute.kind) {
			Ok(value) => value,
			Err(error) => {
				log::warn!("layer '{}', feature {}: {error}", layer.name, feature.id);
				feature.add_warning(error.to_string());
				warnings += 1;
				FeatureValue::Null
			}
		};
		properties.insert(attribute.name.as_str(), value);
	}
	feature.properties = properties;

	(feature, warnings)
}

/// Integer primary keys are used as they are, integral text and reals are converted.
fn feature_id(value: &Value) -> Option<i64> {
	match value {
		Value::Integer(v) => Some(*v),
		Value::Real(v) => real_to_integer(*v),
		Value::Text(v) => v.trim().parse().ok(),
		Value::Null | Value::Blob(_) => None,
	}
}

/// Coerces one SQLite value into `kind`.
///
/// # Errors
/// [`DatasourceError::AttributeCoercion`] when the value has no representation in `kind`.
pub fn coerce(attribute: &str, value: Value, kind: AttributeType) -> DatasourceResult<FeatureValue> {
	if let Value::Null = value {
		return Ok(FeatureValue::Null);
	}
	let coerced = match kind {
		AttributeType::Integer => to_integer(&value).map(FeatureValue::Integer),
		AttributeType::Real => to_real(&value).map(FeatureValue::Real),
		AttributeType::Boolean => to_boolean(&value).map(FeatureValue::Boolean),
		AttributeType::Text => to_text(value, false).map(FeatureValue::Text),
		AttributeType::Blob => to_text(value, true).map(FeatureValue::Text),
	};
	coerced.map_err(|value| DatasourceError::AttributeCoercion {
		attribute: attribute.to_string(),
		reason: format!("cannot coerce {} to {kind}", describe(&value)),
	})
}

fn to_integer(value: &Value) -> Result<i64, Value> {
	match value {
		Value::Integer(v) => Some(*v),
		Value::Real(v) => real_to_integer(*v),
		Value::Text(v) => {
			let text = v.trim();
			text
				.parse::<i64>()
				.ok()
				.or_else(|| text.parse::<f64>().ok().and_then(real_to_integer))
		}
		_ => None,
	}
	.ok_or_else(|| value.clone())
}

fn to_real(value: &Value) -> Result<f64, Value> {
	match value {
		Value::Integer(v) => Some(*v as f64),
		Value::Real(v) => Some(*v),
		Value::Text(v) => v.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
		_ => None,
	}
	.ok_or_else(|| value.clone())
}

fn to_boolean(value: &Value) -> Result<bool, Value> {
	match value {
		Value::Integer(0) => Some(false),
		Value::Integer(1) => Some(true),
		Value::Text(v) => match v.trim().to_ascii_lowercase().as_str() {
			"true" | "yes" | "1" => Some(true),
			"false" | "no" | "0" => Some(false),
			_ => None,
		},
		_ => None,
	}
	.ok_or_else(|| value.clone())
}

/// Scalars are formatted, BLOBs become lowercase hex for `blob` attributes and UTF-8 text otherwise.
fn to_text(value: Value, hex: bool) -> Result<String, Value> {
	match value {
		Value::Integer(v) => Ok(v.to_string()),
		Value::Real(v) => Ok(v.to_string()),
		Value::Text(v) => Ok(v),
		Value::Blob(bytes) if hex => Ok(bytes.iter().map(|b| format!("{b:02x}")).join("")),
		Value::Blob(bytes) => String::from_utf8(bytes).map_err(|e| Value::Blob(e.into_bytes())),
		Value::Null => Err(Value::Null),
	}
}

fn real_to_integer(value: f64) -> Option<i64> {
	// i64::MAX is not representable as f64, the bound is exclusive
	if value.is_finite() && value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64 {
		Some(value as i64)
	} else {
		None
	}
}

fn describe(value: &Value) -> String {
	match value {
		Value::Null => String::from("NULL"),
		Value::Integer(v) => format!("INTEGER {v}"),
		Value::Real(v) => format!("REAL {v}"),
		Value::Text(v) => format!("TEXT '{v}'"),
		Value::Blob(v) => format!("BLOB of {} bytes", v.len()),
	}
}
