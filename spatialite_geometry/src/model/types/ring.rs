use super::{CompositeGeometryTrait, Coordinates, GeometryTrait, bounds_of};
use anyhow::{Result, ensure};
use std::fmt::Debug;

/// A closed sequence of positions, the building block of polygons.
/// The first and last positions are identical.
#[derive(Clone, PartialEq)]
pub struct RingGeometry(pub Vec<Coordinates>);

impl RingGeometry {
	/// Signed area by the shoelace formula: positive for counter-clockwise rings.
	#[must_use]
	pub fn signed_area(&self) -> f64 {
		let mut sum = 0f64;
		if let Some(mut prev) = self.0.last() {
			for current in &self.0 {
				sum += (prev.x() - current.x()) * (prev.y() + current.y());
				prev = current;
			}
		}
		sum / 2.0
	}

	#[must_use]
	pub fn is_ccw(&self) -> bool {
		self.signed_area() > 0.0
	}

	/// Reverses the ring in place if its orientation differs from `ccw`.
	/// Degenerate rings with zero area are left untouched.
	pub fn orient(&mut self, ccw: bool) {
		let area = self.signed_area();
		if area != 0.0 && (area > 0.0) != ccw {
			self.0.reverse();
		}
	}

	/// True when first and last positions agree in x and y.
	#[must_use]
	pub fn is_closed(&self) -> bool {
		match (self.0.first(), self.0.last()) {
			(Some(a), Some(b)) => a.x() == b.x() && a.y() == b.y(),
			_ => false,
		}
	}
}

impl GeometryTrait for RingGeometry {
	fn verify(&self) -> Result<()> {
		ensure!(self.0.len() >= 4, "Ring must have at least 4 points");
		ensure!(self.is_closed(), "Ring must be closed");
		ensure!(
			self.0.iter().all(Coordinates::is_finite),
			"Ring coordinates must be finite"
		);
		Ok(())
	}

	fn compute_bounds(&self) -> Option<[f64; 4]> {
		bounds_of(&self.0)
	}

	fn map_coordinates(&self, f: &mut impl FnMut(&Coordinates) -> Coordinates) -> Self {
		RingGeometry(self.0.iter().map(|c| f(c)).collect())
	}

	fn for_each_coordinate(&self, f: &mut impl FnMut(&Coordinates)) {
		self.0.iter().for_each(|c| f(c));
	}
}

impl CompositeGeometryTrait<Coordinates> for RingGeometry {
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

impl Debug for RingGeometry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(&self.0).finish()
	}
}

crate::impl_from_array!(RingGeometry, Coordinates);

impl From<&RingGeometry> for geo::LineString<f64> {
	fn from(value: &RingGeometry) -> Self {
		geo::LineString(value.0.iter().map(geo::Coord::from).collect())
	}
}
