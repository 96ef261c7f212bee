use super::*;
use anyhow::{Result, ensure};
use std::fmt::Debug;

/// A polygon: the first ring is the outer boundary, the others are holes.
#[derive(Clone, PartialEq)]
pub struct PolygonGeometry(pub Vec<RingGeometry>);

impl PolygonGeometry {
	/// Orients the outer ring counter-clockwise and all holes clockwise.
	pub fn normalize_winding(&mut self) {
		for (index, ring) in self.0.iter_mut().enumerate() {
			ring.orient(index == 0);
		}
	}

	/// Area of the outer ring minus the holes.
	#[must_use]
	pub fn area(&self) -> f64 {
		let mut rings = self.0.iter();
		let outer = rings.next().map_or(0.0, |r| r.signed_area().abs());
		outer - rings.map(|r| r.signed_area().abs()).sum::<f64>()
	}
}

impl GeometryTrait for PolygonGeometry {
	fn verify(&self) -> Result<()> {
		ensure!(!self.0.is_empty(), "Polygon must have at least one ring");
		for ring in &self.0 {
			ring.verify()?;
		}
		Ok(())
	}

	fn compute_bounds(&self) -> Option<[f64; 4]> {
		// holes lie inside the outer ring
		self.0.first().and_then(RingGeometry::compute_bounds)
	}

	fn map_coordinates(&self, f: &mut impl FnMut(&Coordinates) -> Coordinates) -> Self {
		PolygonGeometry(self.0.iter().map(|r| r.map_coordinates(f)).collect())
	}

	fn for_each_coordinate(&self, f: &mut impl FnMut(&Coordinates)) {
		self.0.iter().for_each(|r| r.for_each_coordinate(f));
	}
}

impl CompositeGeometryTrait<RingGeometry> for PolygonGeometry {
	fn new() -> Self {
		Self(Vec::new())
	}
	fn as_vec(&self) -> &Vec<RingGeometry> {
		&self.0
	}
	fn as_mut_vec(&mut self) -> &mut Vec<RingGeometry> {
		&mut self.0
	}
	fn into_inner(self) -> Vec<RingGeometry> {
		self.0
	}
}

impl Debug for PolygonGeometry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(&self.0).finish()
	}
}

crate::impl_from_array!(PolygonGeometry, RingGeometry);

impl From<&PolygonGeometry> for geo::Polygon<f64> {
	fn from(value: &PolygonGeometry) -> Self {
		let mut rings = value.0.iter().map(geo::LineString::from);
		let exterior = rings.next().unwrap_or_else(|| geo::LineString(Vec::new()));
		geo::Polygon::new(exterior, rings.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn with_hole() -> PolygonGeometry {
		PolygonGeometry::from(&[
			[[0, 0], [0, 10], [10, 10], [10, 0], [0, 0]],
			[[2, 2], [4, 2], [4, 4], [2, 4], [2, 2]],
		])
	}

	#[test]
	fn area_subtracts_holes() {
		assert_eq!(with_hole().area(), 96.0);
	}

	#[test]
	fn normalize_winding() {
		let mut polygon = with_hole();
		assert!(!polygon.0[0].is_ccw());
		assert!(polygon.0[1].is_ccw());

		polygon.normalize_winding();
		assert!(polygon.0[0].is_ccw());
		assert!(!polygon.0[1].is_ccw());
		assert!(polygon.verify().is_ok());
	}

	#[test]
	fn verify_checks_every_ring() {
		let polygon = PolygonGeometry::from(&[
			[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
			[[2, 2], [4, 2], [4, 4], [2, 4], [2, 3]],
		]);
		assert!(polygon.verify().is_err());
		assert!(PolygonGeometry::new().verify().is_err());
	}

	#[test]
	fn to_geo_polygon() {
		let polygon = geo::Polygon::from(&with_hole());
		assert_eq!(polygon.exterior().0.len(), 5);
		assert_eq!(polygon.interiors().len(), 1);
	}
}
