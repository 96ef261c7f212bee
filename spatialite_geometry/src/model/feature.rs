use super::*;

/// One geospatial record: identifier, geometry and typed attributes.
///
/// `warnings` collects non-fatal problems found while assembling the feature,
/// e.g. an attribute value that could not be coerced to its declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
	pub id: i64,
	pub geometry: Geometry,
	pub properties: FeatureProperties,
	pub warnings: Vec<String>,
}

impl Feature {
	#[must_use]
	pub fn new(id: i64, geometry: Geometry) -> Self {
		Self {
			id,
			geometry,
			properties: FeatureProperties::new(),
			warnings: Vec::new(),
		}
	}

	pub fn set_property<T>(&mut self, key: impl Into<String>, value: T)
	where
		FeatureValue: From<T>,
	{
		self.properties.insert(key, FeatureValue::from(value));
	}

	pub fn add_warning(&mut self, warning: impl Into<String>) {
		self.warnings.push(warning.into());
	}

	#[must_use]
	pub fn has_warnings(&self) -> bool {
		!self.warnings.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn build_feature() {
		let mut feature = Feature::new(13, Geometry::new_point(&[8, 50]));
		feature.set_property("name", "Nice");
		feature.set_property("population", 348_085);
		feature.set_property("speed", None::<f64>);
		assert_eq!(feature.properties.get("population"), Some(&FeatureValue::Integer(348_085)));
		assert_eq!(feature.properties.get("speed"), Some(&FeatureValue::Null));
		assert!(!feature.has_warnings());

		feature.add_warning("speed: cannot coerce 'fast' to real");
		assert_eq!(feature.warnings.len(), 1);
	}
}
