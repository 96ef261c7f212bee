use std::fmt::{Debug, Display};

/// A typed attribute value of a feature.
#[derive(Clone, PartialEq)]
pub enum FeatureValue {
	Boolean(bool),
	Integer(i64),
	Null,
	Real(f64),
	Text(String),
}

impl FeatureValue {
	#[must_use]
	pub fn is_null(&self) -> bool {
		matches!(self, FeatureValue::Null)
	}

	#[must_use]
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			FeatureValue::Integer(v) => Some(*v),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			FeatureValue::Real(v) => Some(*v),
			FeatureValue::Integer(v) => Some(*v as f64),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		match self {
			FeatureValue::Text(v) => Some(v),
			_ => None,
		}
	}

	#[must_use]
	pub fn as_bool(&self) -> Option<bool> {
		match self {
			FeatureValue::Boolean(v) => Some(*v),
			_ => None,
		}
	}

	/// Name of the variant, as used in warnings.
	#[must_use]
	pub fn type_name(&self) -> &'static str {
		match self {
			FeatureValue::Boolean(_) => "boolean",
			FeatureValue::Integer(_) => "integer",
			FeatureValue::Null => "null",
			FeatureValue::Real(_) => "real",
			FeatureValue::Text(_) => "text",
		}
	}
}

impl Debug for FeatureValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Boolean(v) => f.debug_tuple("Boolean").field(v).finish(),
			Self::Integer(v) => f.debug_tuple("Integer").field(v).finish(),
			Self::Null => f.write_str("Null"),
			Self::Real(v) => f.debug_tuple("Real").field(v).finish(),
			Self::Text(v) => f.debug_tuple("Text").field(v).finish(),
		}
	}
}

impl Display for FeatureValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			FeatureValue::Boolean(v) => write!(f, "{v}"),
			FeatureValue::Integer(v) => write!(f, "{v}"),
			FeatureValue::Null => f.write_str("null"),
			FeatureValue::Real(v) => write!(f, "{v}"),
			FeatureValue::Text(v) => f.write_str(v),
		}
	}
}

impl From<&str> for FeatureValue {
	fn from(value: &str) -> Self {
		FeatureValue::Text(value.to_string())
	}
}

impl From<String> for FeatureValue {
	fn from(value: String) -> Self {
		FeatureValue::Text(value)
	}
}

impl From<i32> for FeatureValue {
	fn from(value: i32) -> Self {
		FeatureValue::Integer(i64::from(value))
	}
}

impl From<i64> for FeatureValue {
	fn from(value: i64) -> Self {
		FeatureValue::Integer(value)
	}
}

impl From<f64> for FeatureValue {
	fn from(value: f64) -> Self {
		FeatureValue::Real(value)
	}
}

impl From<bool> for FeatureValue {
	fn from(value: bool) -> Self {
		FeatureValue::Boolean(value)
	}
}

impl<T> From<Option<T>> for FeatureValue
where
	FeatureValue: From<T>,
{
	fn from(value: Option<T>) -> Self {
		value.map_or(FeatureValue::Null, FeatureValue::from)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case(FeatureValue::from(true), "true", "boolean")]
	#[case(FeatureValue::from(42), "42", "integer")]
	#[case(FeatureValue::from(2.5), "2.5", "real")]
	#[case(FeatureValue::from("main street"), "main street", "text")]
	#[case(FeatureValue::from(None::<i64>), "null", "null")]
	fn display_and_type_name(#[case] value: FeatureValue, #[case] text: &str, #[case] name: &str) {
		assert_eq!(value.to_string(), text);
		assert_eq!(value.type_name(), name);
	}

	#[test]
	fn accessors() {
		assert_eq!(FeatureValue::from(7).as_i64(), Some(7));
		assert_eq!(FeatureValue::from(7).as_f64(), Some(7.0));
		assert_eq!(FeatureValue::from("x").as_str(), Some("x"));
		assert_eq!(FeatureValue::from(false).as_bool(), Some(false));
		assert_eq!(FeatureValue::from(1.5).as_i64(), None);
		assert!(FeatureValue::Null.is_null());
	}

	#[test]
	fn debug_output() {
		assert_eq!(format!("{:?}", FeatureValue::from("a")), "Text(\"a\")");
		assert_eq!(format!("{:?}", FeatureValue::Null), "Null");
	}
}
