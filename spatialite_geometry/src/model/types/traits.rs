use super::Coordinates;
use anyhow::Result;
use std::fmt::Debug;

/// Common interface of all geometry primitives.
pub trait GeometryTrait: Debug + Clone + Sized {
	/// Checks structural validity, e.g. closed rings with enough positions.
	fn verify(&self) -> Result<()>;

	/// Returns `[x_min, y_min, x_max, y_max]`, or `None` for an empty geometry.
	fn compute_bounds(&self) -> Option<[f64; 4]>;

	/// Returns a copy with every position passed through `f`, keeping the structure.
	fn map_coordinates(&self, f: &mut impl FnMut(&Coordinates) -> Coordinates) -> Self;

	/// Calls `f` for every position in order.
	fn for_each_coordinate(&self, f: &mut impl FnMut(&Coordinates));
}

/// Geometries that are collections of simpler elements,
/// e.g. a polygon made of rings or a multi line string made of lines.
pub trait CompositeGeometryTrait<Item>: Debug + Clone {
	fn new() -> Self;

	fn as_vec(&self) -> &Vec<Item>;

	fn as_mut_vec(&mut self) -> &mut Vec<Item>;

	fn into_inner(self) -> Vec<Item>;

	fn is_empty(&self) -> bool {
		self.as_vec().is_empty()
	}

	fn len(&self) -> usize {
		self.as_vec().len()
	}

	fn push(&mut self, item: Item) {
		self.as_mut_vec().push(item);
	}

	fn first(&self) -> Option<&Item> {
		self.as_vec().first()
	}

	fn last(&self) -> Option<&Item> {
		self.as_vec().last()
	}
}

/// Merges two optional bounding boxes.
pub(crate) fn merge_bounds(a: Option<[f64; 4]>, b: Option<[f64; 4]>) -> Option<[f64; 4]> {
	match (a, b) {
		(Some(a), Some(b)) => Some([a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])]),
		(a, None) => a,
		(None, b) => b,
	}
}

/// Bounding box of a list of positions.
pub(crate) fn bounds_of(coordinates: &[Coordinates]) -> Option<[f64; 4]> {
	coordinates
		.iter()
		.map(|c| [c.x(), c.y(), c.x(), c.y()])
		.reduce(|a, b| [a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])])
}
