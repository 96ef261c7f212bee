use super::Crs;
use anyhow::{Result, ensure};
use std::fmt::Debug;

/// A rectangular region in a known coordinate reference system.
///
/// The rectangle is closed: points and boxes touching the border intersect it.
///
/// # Examples
///
/// ```
/// use spatialite_core::{Crs, SpatialExtent};
///
/// let extent = SpatialExtent::new(-10.0, -5.0, 10.0, 5.0, Crs::WGS84).unwrap();
/// assert_eq!(extent.as_tuple(), (-10.0, -5.0, 10.0, 5.0));
/// assert!(extent.intersects_bounds(&[10.0, 5.0, 20.0, 8.0]));
/// assert!(!extent.intersects_bounds(&[10.5, 0.0, 20.0, 8.0]));
/// ```
#[derive(Clone, Copy, PartialEq)]
pub struct SpatialExtent {
	pub x_min: f64,
	pub y_min: f64,
	pub x_max: f64,
	pub y_max: f64,
	crs: Crs,
}

impl SpatialExtent {
	/// Creates an extent from `x_min, y_min, x_max, y_max`.
	///
	/// # Errors
	/// Fails for non-finite values and for inverted ranges.
	pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64, crs: Crs) -> Result<SpatialExtent> {
		SpatialExtent {
			x_min,
			y_min,
			x_max,
			y_max,
			crs,
		}
		.checked()
	}

	/// Smallest extent containing all given points.
	///
	/// # Errors
	/// Fails when `points` is empty or contains non-finite values.
	pub fn from_points(points: impl IntoIterator<Item = [f64; 2]>, crs: Crs) -> Result<SpatialExtent> {
		let mut bounds: Option<[f64; 4]> = None;
		for [x, y] in points {
			bounds = Some(match bounds {
				None => [x, y, x, y],
				Some(b) => [b[0].min(x), b[1].min(y), b[2].max(x), b[3].max(y)],
			});
		}
		ensure!(bounds.is_some(), "cannot build an extent from zero points");
		let [x_min, y_min, x_max, y_max] = bounds.unwrap_or_default();
		SpatialExtent::new(x_min, y_min, x_max, y_max, crs)
	}

	#[must_use]
	pub fn crs(&self) -> Crs {
		self.crs
	}

	/// Returns `[x_min, y_min, x_max, y_max]`.
	#[must_use]
	pub fn as_array(&self) -> [f64; 4] {
		[self.x_min, self.y_min, self.x_max, self.y_max]
	}

	#[must_use]
	pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
		(self.x_min, self.y_min, self.x_max, self.y_max)
	}

	/// The four corners, counter-clockwise from the lower left.
	#[must_use]
	pub fn corners(&self) -> [[f64; 2]; 4] {
		[
			[self.x_min, self.y_min],
			[self.x_max, self.y_min],
			[self.x_max, self.y_max],
			[self.x_min, self.y_max],
		]
	}

	/// Tests a bounding box `[x_min, y_min, x_max, y_max]` in the same CRS for overlap.
	#[must_use]
	pub fn intersects_bounds(&self, bounds: &[f64; 4]) -> bool {
		bounds[0] <= self.x_max && bounds[2] >= self.x_min && bounds[1] <= self.y_max && bounds[3] >= self.y_min
	}

	#[must_use]
	pub fn contains_point(&self, x: f64, y: f64) -> bool {
		x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
	}

	fn checked(self) -> Result<Self> {
		for (name, value) in [
			("x_min", self.x_min),
			("y_min", self.y_min),
			("x_max", self.x_max),
			("y_max", self.y_max),
		] {
			ensure!(value.is_finite(), "{name} ({value}) must be finite");
		}
		ensure!(
			self.x_min <= self.x_max,
			"x_min ({}) must be <= x_max ({})",
			self.x_min,
			self.x_max
		);
		ensure!(
			self.y_min <= self.y_max,
			"y_min ({}) must be <= y_max ({})",
			self.y_min,
			self.y_max
		);
		Ok(self)
	}
}

impl Debug for SpatialExtent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"SpatialExtent({}, {}, {}, {}; {})",
			self.x_min, self.y_min, self.x_max, self.y_max, self.crs
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn extent() -> SpatialExtent {
		SpatialExtent::new(-10.0, -5.0, 10.0, 5.0, Crs::WGS84).unwrap()
	}

	#[test]
	fn creation() {
		let e = extent();
		assert_eq!(e.as_array(), [-10.0, -5.0, 10.0, 5.0]);
		assert_eq!(e.crs(), Crs::WGS84);
		assert_eq!(format!("{e:?}"), "SpatialExtent(-10, -5, 10, 5; EPSG:4326)");
	}

	#[rstest]
	#[case(1.0, 0.0, 0.0, 1.0)]
	#[case(0.0, 1.0, 1.0, 0.0)]
	#[case(f64::NAN, 0.0, 1.0, 1.0)]
	#[case(0.0, 0.0, f64::INFINITY, 1.0)]
	fn rejects_invalid(#[case] x0: f64, #[case] y0: f64, #[case] x1: f64, #[case] y1: f64) {
		assert!(SpatialExtent::new(x0, y0, x1, y1, Crs::WGS84).is_err());
	}

	#[test]
	fn degenerate_extent_is_valid() {
		let e = SpatialExtent::new(1.0, 2.0, 1.0, 2.0, Crs::WGS84).unwrap();
		assert!(e.contains_point(1.0, 2.0));
	}

	#[rstest]
	#[case([0.0, 0.0, 1.0, 1.0], true)]
	#[case([-20.0, -20.0, 20.0, 20.0], true)]
	#[case([10.0, 5.0, 11.0, 6.0], true)]
	#[case([10.1, 0.0, 11.0, 1.0], false)]
	#[case([-30.0, 6.0, 30.0, 7.0], false)]
	fn intersects(#[case] bounds: [f64; 4], #[case] expected: bool) {
		assert_eq!(extent().intersects_bounds(&bounds), expected);
	}

	#[test]
	fn from_points() {
		let e = SpatialExtent::from_points([[3.0, -1.0], [-2.0, 4.0], [0.0, 0.0]], Crs::WEB_MERCATOR).unwrap();
		assert_eq!(e.as_tuple(), (-2.0, -1.0, 3.0, 4.0));
		assert!(SpatialExtent::from_points([], Crs::WGS84).is_err());
	}

	#[test]
	fn corners() {
		assert_eq!(
			extent().corners(),
			[[-10.0, -5.0], [10.0, -5.0], [10.0, 5.0], [-10.0, 5.0]]
		);
	}
}
