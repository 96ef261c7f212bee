use super::{CompositeGeometryTrait, Coordinates, GeometryTrait, bounds_of};
use anyhow::{Result, ensure};
use std::fmt::Debug;

#[derive(Clone, PartialEq)]
pub struct LineStringGeometry(pub Vec<Coordinates>);

impl GeometryTrait for LineStringGeometry {
	fn verify(&self) -> Result<()> {
		ensure!(self.0.len() >= 2, "LineString must have at least 2 points");
		ensure!(
			self.0.iter().all(Coordinates::is_finite),
			"LineString coordinates must be finite"
		);
		Ok(())
	}

	fn compute_bounds(&self) -> Option<[f64; 4]> {
		bounds_of(&self.0)
	}

	fn map_coordinates(&self, f: &mut impl FnMut(&Coordinates) -> Coordinates) -> Self {
		LineStringGeometry(self.0.iter().map(|c| f(c)).collect())
	}

	fn for_each_coordinate(&self, f: &mut impl FnMut(&Coordinates)) {
		self.0.iter().for_each(|c| f(c));
	}
}

impl CompositeGeometryTrait<Coordinates> for LineStringGeometry {
	fn new() -> Self {
		Self(Vec::new())
	}
	fn as_vec(&self) -> &Vec<Coordinates> {
		&self.0
	}
	fn as_mut_vec(&mut self) -> &mut Vec<Coordinates> {
		&mut self.0
	}
	fn into_inner(self) -> Vec<Coordinates> {
		self.0
	}
}

impl Debug for LineStringGeometry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(&self.0).finish()
	}
}

crate::impl_from_array!(LineStringGeometry, Coordinates);

impl From<&LineStringGeometry> for geo::LineString<f64> {
	fn from(value: &LineStringGeometry) -> Self {
		geo::LineString(value.0.iter().map(geo::Coord::from).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn verify_needs_two_points() {
		assert!(LineStringGeometry::from(&[[0, 0]]).verify().is_err());
		assert!(LineStringGeometry::from(&[[0, 0], [1, 1]]).verify().is_ok());
	}

	#[test]
	fn bounds() {
		let line = LineStringGeometry::from(&[[0, 5], [10, -2], [3, 1]]);
		assert_eq!(line.compute_bounds(), Some([0.0, -2.0, 10.0, 5.0]));
		assert_eq!(LineStringGeometry::new().compute_bounds(), None);
	}

	#[test]
	fn map_coordinates_keeps_length() {
		let line = LineStringGeometry::from(&[[1, 2], [3, 4]]);
		let moved = line.map_coordinates(&mut |c| c.with_xy(c.x() + 1.0, c.y() * 2.0));
		assert_eq!(moved, LineStringGeometry::from(&[[2, 4], [4, 8]]));
	}
}
