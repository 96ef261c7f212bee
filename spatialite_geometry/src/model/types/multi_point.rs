use super::*;
use anyhow::{Result, ensure};
use std::fmt::Debug;

#[derive(Clone, PartialEq)]
pub struct MultiPointGeometry(pub Vec<PointGeometry>);

impl GeometryTrait for MultiPointGeometry {
	fn verify(&self) -> Result<()> {
		ensure!(!self.0.is_empty(), "MultiPoint must have at least one point");
		self.0.iter().try_for_each(PointGeometry::verify)
	}

	fn compute_bounds(&self) -> Option<[f64; 4]> {
		self.0.iter().fold(None, |acc, p| merge_bounds(acc, p.compute_bounds()))
	}

	fn map_coordinates(&self, f: &mut impl FnMut(&Coordinates) -> Coordinates) -> Self {
		MultiPointGeometry(self.0.iter().map(|p| p.map_coordinates(f)).collect())
	}

	fn for_each_coordinate(&self, f: &mut impl FnMut(&Coordinates)) {
		self.0.iter().for_each(|p| p.for_each_coordinate(f));
	}
}

impl CompositeGeometryTrait<PointGeometry> for MultiPointGeometry {
	fn new() -> Self {
		Self(Vec::new())
	}
	fn as_vec(&self) -> &Vec<PointGeometry> {
		&self.0
	}
	fn as_mut_vec(&mut self) -> &mut Vec<PointGeometry> {
		&mut self.0
	}
	fn into_inner(self) -> Vec<PointGeometry> {
		self.0
	}
}

impl Debug for MultiPointGeometry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(&self.0).finish()
	}
}

crate::impl_from_array!(MultiPointGeometry, PointGeometry);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bounds_cover_all_points() {
		let points = MultiPointGeometry::from(&[[1, 5], [-3, 2], [4, 0]]);
		assert_eq!(points.compute_bounds(), Some([-3.0, 0.0, 4.0, 5.0]));
		assert_eq!(points.len(), 3);
	}

	#[test]
	fn verify_rejects_empty() {
		assert!(MultiPointGeometry::new().verify().is_err());
	}
}
