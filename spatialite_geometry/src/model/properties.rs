use super::FeatureValue;
use std::fmt::Debug;

/// Attribute values of a feature in declaration order.
///
/// Layers declare only a handful of attributes, so a vector keeps the order
/// and lookups stay cheap.
#[derive(Clone, Default, PartialEq)]
pub struct FeatureProperties {
	entries: Vec<(String, FeatureValue)>,
}

impl FeatureProperties {
	#[must_use]
	pub fn new() -> FeatureProperties {
		FeatureProperties { entries: Vec::new() }
	}

	#[must_use]
	pub fn with_capacity(capacity: usize) -> FeatureProperties {
		FeatureProperties {
			entries: Vec::with_capacity(capacity),
		}
	}

	/// Sets `key`, replacing an existing value in place or appending a new entry.
	pub fn insert(&mut self, key: impl Into<String>, value: FeatureValue) {
		let key = key.into();
		match self.entries.iter_mut().find(|(k, _)| *k == key) {
			Some(entry) => entry.1 = value,
			None => self.entries.push((key, value)),
		}
	}

	#[must_use]
	pub fn get(&self, key: &str) -> Option<&FeatureValue> {
		self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|(k, _)| k.as_str())
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl IntoIterator for FeatureProperties {
	type Item = (String, FeatureValue);
	type IntoIter = std::vec::IntoIter<(String, FeatureValue)>;
	fn into_iter(self) -> Self::IntoIter {
		self.entries.into_iter()
	}
}

impl From<Vec<(&str, FeatureValue)>> for FeatureProperties {
	fn from(value: Vec<(&str, FeatureValue)>) -> Self {
		value.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
	}
}

impl FromIterator<(String, FeatureValue)> for FeatureProperties {
	fn from_iter<T: IntoIterator<Item = (String, FeatureValue)>>(iter: T) -> Self {
		let mut properties = FeatureProperties::new();
		for (k, v) in iter {
			properties.insert(k, v);
		}
		properties
	}
}

impl Debug for FeatureProperties {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v))).finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use pretty_assertions::assert_eq;

	#[test]
	fn keeps_insertion_order() {
		let mut properties = FeatureProperties::new();
		properties.insert("name", FeatureValue::from("A1"));
		properties.insert("lanes", FeatureValue::from(2));
		properties.insert("bridge", FeatureValue::from(false));
		assert_eq!(properties.keys().collect::<Vec<_>>(), vec!["name", "lanes", "bridge"]);
	}

	#[test]
	fn insert_replaces_in_place() {
		let mut properties = FeatureProperties::from(vec![("a", FeatureValue::from(1)), ("b", FeatureValue::from(2))]);
		properties.insert("a", FeatureValue::Null);
		assert_eq!(properties.len(), 2);
		assert_eq!(properties.get("a"), Some(&FeatureValue::Null));
		assert_eq!(properties.keys().collect::<Vec<_>>(), vec!["a", "b"]);
		assert_eq!(properties.get("c"), None);
	}

	#[test]
	fn debug_output() {
		let properties = FeatureProperties::from(vec![("name", FeatureValue::from("Nice"))]);
		assert_eq!(format!("{properties:?}"), "{\"name\": Text(\"Nice\")}");
	}
}
