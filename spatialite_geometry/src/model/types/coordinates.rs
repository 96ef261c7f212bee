use std::fmt::Debug;

/// A position with an optional elevation.
///
/// SpatiaLite tables may be declared XYZ; the `z` value is kept when present.
/// Measures (M) are not carried.
#[derive(Clone, Copy, PartialEq)]
pub struct Coordinates {
	x: f64,
	y: f64,
	z: Option<f64>,
}

impl Coordinates {
	#[must_use]
	pub fn new(x: f64, y: f64) -> Self {
		Self { x, y, z: None }
	}

	#[must_use]
	pub fn new_3d(x: f64, y: f64, z: f64) -> Self {
		Self { x, y, z: Some(z) }
	}

	#[must_use]
	pub fn x(&self) -> f64 {
		self.x
	}

	#[must_use]
	pub fn y(&self) -> f64 {
		self.y
	}

	#[must_use]
	pub fn z(&self) -> Option<f64> {
		self.z
	}

	#[must_use]
	pub fn is_finite(&self) -> bool {
		self.x.is_finite() && self.y.is_finite() && self.z.is_none_or(f64::is_finite)
	}

	/// Returns the position with `x` and `y` replaced, keeping `z`.
	#[must_use]
	pub fn with_xy(&self, x: f64, y: f64) -> Self {
		Self { x, y, z: self.z }
	}
}

impl<'a, T> From<&'a [T; 2]> for Coordinates
where
	T: Copy + Into<f64>,
{
	fn from(value: &'a [T; 2]) -> Self {
		Coordinates::new(value[0].into(), value[1].into())
	}
}

impl<'a, T> From<&'a [T; 3]> for Coordinates
where
	T: Copy + Into<f64>,
{
	fn from(value: &'a [T; 3]) -> Self {
		Coordinates::new_3d(value[0].into(), value[1].into(), value[2].into())
	}
}

impl From<[f64; 2]> for Coordinates {
	fn from(value: [f64; 2]) -> Self {
		Coordinates::new(value[0], value[1])
	}
}

impl From<(f64, f64)> for Coordinates {
	fn from(value: (f64, f64)) -> Self {
		Coordinates::new(value.0, value.1)
	}
}

impl From<Coordinates> for geo::Coord {
	fn from(value: Coordinates) -> Self {
		geo::Coord { x: value.x, y: value.y }
	}
}

impl From<&Coordinates> for geo::Coord {
	fn from(value: &Coordinates) -> Self {
		geo::Coord { x: value.x, y: value.y }
	}
}

impl Debug for Coordinates {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.z {
			Some(z) => [self.x, self.y, z].fmt(f),
			None => [self.x, self.y].fmt(f),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_and_accessors() {
		let c = Coordinates::new(13.404954, 52.520008);
		assert_eq!(c.x(), 13.404954);
		assert_eq!(c.y(), 52.520008);
		assert_eq!(c.z(), None);

		let c = Coordinates::new_3d(1.0, 2.0, 3.0);
		assert_eq!(c.z(), Some(3.0));
	}

	#[test]
	fn debug_formats_like_array() {
		assert_eq!(format!("{:?}", Coordinates::new(1.0, 2.0)), "[1.0, 2.0]");
		assert_eq!(format!("{:?}", Coordinates::new_3d(1.0, 2.0, 3.5)), "[1.0, 2.0, 3.5]");
	}

	#[test]
	fn from_arrays() {
		assert_eq!(Coordinates::from(&[7, 8]), Coordinates::new(7.0, 8.0));
		assert_eq!(Coordinates::from(&[1.0, 2.0, 3.0]), Coordinates::new_3d(1.0, 2.0, 3.0));
		assert_eq!(Coordinates::from((3.0, 4.0)), Coordinates::new(3.0, 4.0));
	}

	#[test]
	fn with_xy_keeps_z() {
		let c = Coordinates::new_3d(1.0, 2.0, 3.0).with_xy(5.0, 6.0);
		assert_eq!(c, Coordinates::new_3d(5.0, 6.0, 3.0));
	}

	#[test]
	fn finiteness() {
		assert!(Coordinates::new(1.0, 2.0).is_finite());
		assert!(!Coordinates::new(f64::NAN, 2.0).is_finite());
		assert!(!Coordinates::new_3d(1.0, 2.0, f64::INFINITY).is_finite());
	}

	#[test]
	fn into_geo_coord() {
		let coord: geo::Coord = Coordinates::new_3d(11.0, 22.0, 33.0).into();
		assert_eq!(coord, geo::Coord { x: 11.0, y: 22.0 });
	}
}
