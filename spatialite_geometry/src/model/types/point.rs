use super::{Coordinates, GeometryTrait};
use anyhow::{Result, ensure};
use std::fmt::Debug;

#[derive(Clone, Copy, PartialEq)]
pub struct PointGeometry(pub Coordinates);

impl PointGeometry {
	#[must_use]
	pub fn new(coordinates: Coordinates) -> Self {
		Self(coordinates)
	}

	#[must_use]
	pub fn x(&self) -> f64 {
		self.0.x()
	}

	#[must_use]
	pub fn y(&self) -> f64 {
		self.0.y()
	}
}

impl GeometryTrait for PointGeometry {
	fn verify(&self) -> Result<()> {
		ensure!(self.0.is_finite(), "Point coordinates must be finite");
		Ok(())
	}

	fn compute_bounds(&self) -> Option<[f64; 4]> {
		Some([self.x(), self.y(), self.x(), self.y()])
	}

	fn map_coordinates(&self, f: &mut impl FnMut(&Coordinates) -> Coordinates) -> Self {
		PointGeometry(f(&self.0))
	}

	fn for_each_coordinate(&self, f: &mut impl FnMut(&Coordinates)) {
		f(&self.0);
	}
}

impl Debug for PointGeometry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

impl<T> From<T> for PointGeometry
where
	Coordinates: From<T>,
{
	fn from(value: T) -> Self {
		Self(Coordinates::from(value))
	}
}
