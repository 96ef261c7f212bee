//! Coordinate scaling and reprojection between the stored and the requested CRS.
//!
//! Only the projections a mapget deployment actually needs are supported: identity,
//! WGS 84 to spherical Web Mercator and back.

use crate::{Coordinates, Geometry};
use anyhow::{Result, bail, ensure};
use spatialite_core::{Crs, SpatialExtent};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// Spherical Mercator radius (WGS 84 semi-major axis)
const RADIUS: f64 = 6_378_137.0;
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;
const MAX_MERCATOR_LNG: f64 = 180.0;

/// Per-axis factors stored coordinates are multiplied with.
///
/// Integer-encoded tables store e.g. centimeters, a factor of `0.01` turns them back into meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateScaling {
	pub x: f64,
	pub y: f64,
	pub z: f64,
}

impl CoordinateScaling {
	pub const NONE: CoordinateScaling = CoordinateScaling { x: 1.0, y: 1.0, z: 1.0 };

	pub fn new(x: f64, y: f64, z: f64) -> Result<Self> {
		for (axis, factor) in [("x", x), ("y", y), ("z", z)] {
			ensure!(
				factor.is_finite() && factor != 0.0,
				"scaling factor for {axis} must be finite and non-zero, got {factor}"
			);
		}
		Ok(CoordinateScaling { x, y, z })
	}

	#[must_use]
	pub fn is_identity(&self) -> bool {
		*self == Self::NONE
	}

	/// Combines two scalings, e.g. a global one with a layer specific one.
	#[must_use]
	pub fn then(&self, other: &CoordinateScaling) -> CoordinateScaling {
		CoordinateScaling {
			x: self.x * other.x,
			y: self.y * other.y,
			z: self.z * other.z,
		}
	}

	fn apply(&self, c: &Coordinates) -> Coordinates {
		match c.z() {
			Some(z) => Coordinates::new_3d(c.x() * self.x, c.y() * self.y, z * self.z),
			None => Coordinates::new(c.x() * self.x, c.y() * self.y),
		}
	}
}

impl Default for CoordinateScaling {
	fn default() -> Self {
		Self::NONE
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Projection {
	Identity,
	GeographicToMercator,
	MercatorToGeographic,
}

impl Projection {
	fn between(source: Crs, target: Crs) -> Result<Projection> {
		Ok(match (source, target) {
			(s, t) if s == t => Projection::Identity,
			(Crs::WGS84, Crs::WEB_MERCATOR) => Projection::GeographicToMercator,
			(Crs::WEB_MERCATOR, Crs::WGS84) => Projection::MercatorToGeographic,
			_ => bail!("no transformation from {source} to {target} available"),
		})
	}

	fn project(self, x: f64, y: f64) -> (f64, f64) {
		match self {
			Projection::Identity => (x, y),
			Projection::GeographicToMercator => {
				let lon = x.clamp(-MAX_MERCATOR_LNG, MAX_MERCATOR_LNG);
				let lat = y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
				(
					RADIUS * lon.to_radians(),
					RADIUS * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
				)
			}
			Projection::MercatorToGeographic => (
				(x / RADIUS).to_degrees(),
				(2.0 * (y / RADIUS).exp().atan() - FRAC_PI_2).to_degrees(),
			),
		}
	}
}

/// Turns stored coordinates into coordinates of the requested CRS.
///
/// Scaling is applied first, the result is then projected from `source` to `target`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateTransform {
	source: Crs,
	target: Crs,
	scaling: CoordinateScaling,
	projection: Projection,
}

impl CoordinateTransform {
	pub fn new(source: Crs, target: Crs, scaling: CoordinateScaling) -> Result<Self> {
		Ok(CoordinateTransform {
			source,
			target,
			scaling,
			projection: Projection::between(source, target)?,
		})
	}

	#[must_use]
	pub fn identity(crs: Crs) -> Self {
		CoordinateTransform {
			source: crs,
			target: crs,
			scaling: CoordinateScaling::NONE,
			projection: Projection::Identity,
		}
	}

	#[must_use]
	pub fn source(&self) -> Crs {
		self.source
	}

	#[must_use]
	pub fn target(&self) -> Crs {
		self.target
	}

	#[must_use]
	pub fn is_identity(&self) -> bool {
		self.projection == Projection::Identity && self.scaling.is_identity()
	}

	#[must_use]
	pub fn apply_coordinates(&self, c: &Coordinates) -> Coordinates {
		let scaled = self.scaling.apply(c);
		let (x, y) = self.projection.project(scaled.x(), scaled.y());
		scaled.with_xy(x, y)
	}

	/// Transforms every position of `geometry`.
	///
	/// Negative scaling factors mirror the geometry, so polygon winding is normalized again.
	#[must_use]
	pub fn apply(&self, geometry: &Geometry) -> Geometry {
		if self.is_identity() {
			return geometry.clone();
		}
		let mut result = geometry.map_coordinates(|c| self.apply_coordinates(c));
		result.normalize_winding();
		result
	}

	/// Converts a request extent into the unscaled coordinates stored in the table.
	///
	/// The extent may be given in any CRS that can be projected into `source`.
	pub fn stored_extent(&self, extent: &SpatialExtent) -> Result<SpatialExtent> {
		let projected = project_extent(extent, self.source)?;
		let corners = projected
			.corners()
			.map(|[x, y]| [x / self.scaling.x, y / self.scaling.y]);
		SpatialExtent::from_points(corners, self.source)
	}
}

/// Projects a point between two supported reference systems.
pub fn project_point(source: Crs, target: Crs, x: f64, y: f64) -> Result<(f64, f64)> {
	Ok(Projection::between(source, target)?.project(x, y))
}

/// Projects an extent into `target`.
///
/// Both supported projections are monotonic per axis, so projecting the corners is exact.
pub fn project_extent(extent: &SpatialExtent, target: Crs) -> Result<SpatialExtent> {
	let projection = Projection::between(extent.crs(), target)?;
	if projection == Projection::Identity {
		return Ok(*extent);
	}
	let corners = extent.corners().map(|[x, y]| {
		let (x, y) = projection.project(x, y);
		[x, y]
	});
	SpatialExtent::from_points(corners, target)
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;
	use rstest::rstest;

	#[rstest]
	#[case(0.0, 0.0, 0.0, 0.0)]
	#[case(180.0, 0.0, 20_037_508.342_789_244, 0.0)]
	#[case(13.404954, 52.520008, 1_492_232.65, 6_894_701.26)]
	#[case(0.0, 90.0, 0.0, 20_037_508.342_789_244)]
	fn wgs84_to_mercator(#[case] lon: f64, #[case] lat: f64, #[case] x: f64, #[case] y: f64) {
		let (px, py) = project_point(Crs::WGS84, Crs::WEB_MERCATOR, lon, lat).unwrap();
		assert_relative_eq!(px, x, max_relative = 1e-6);
		assert_relative_eq!(py, y, max_relative = 1e-6, epsilon = 1e-6);
	}

	#[test]
	fn mercator_round_trip() {
		let (x, y) = project_point(Crs::WGS84, Crs::WEB_MERCATOR, -73.9857, 40.7484).unwrap();
		let (lon, lat) = project_point(Crs::WEB_MERCATOR, Crs::WGS84, x, y).unwrap();
		assert_relative_eq!(lon, -73.9857, epsilon = 1e-9);
		assert_relative_eq!(lat, 40.7484, epsilon = 1e-9);
	}

	#[test]
	fn unsupported_pair() {
		let err = CoordinateTransform::new(Crs::from_srid(25832), Crs::WGS84, CoordinateScaling::NONE).unwrap_err();
		assert_eq!(err.to_string(), "no transformation from EPSG:25832 to EPSG:4326 available");
	}

	#[test]
	fn scaling_is_validated() {
		assert!(CoordinateScaling::new(0.01, 0.01, 1.0).is_ok());
		assert!(CoordinateScaling::new(0.0, 1.0, 1.0).is_err());
		assert!(CoordinateScaling::new(1.0, f64::NAN, 1.0).is_err());
	}

	#[test]
	fn scale_then_project() {
		let scaling = CoordinateScaling::new(1e-7, 1e-7, 0.5).unwrap();
		let transform = CoordinateTransform::new(Crs::WGS84, Crs::WEB_MERCATOR, scaling).unwrap();
		let point = Geometry::new_point(&[1_800_000_000.0, 0.0, 8.0]);
		let Geometry::Point(result) = transform.apply(&point) else {
			panic!("kind changed")
		};
		assert_relative_eq!(result.0.x(), 20_037_508.342_789_244, max_relative = 1e-9);
		assert_eq!(result.0.z(), Some(4.0));
	}

	#[test]
	fn mirrored_polygon_keeps_winding() {
		let scaling = CoordinateScaling::new(-1.0, 1.0, 1.0).unwrap();
		let transform = CoordinateTransform::new(Crs::WEB_MERCATOR, Crs::WEB_MERCATOR, scaling).unwrap();
		let polygon = Geometry::new_polygon(&[[[0, 0], [4, 0], [4, 4], [0, 4], [0, 0]]]);
		let Geometry::Polygon(mirrored) = transform.apply(&polygon) else {
			panic!("kind changed")
		};
		assert!(mirrored.0[0].is_ccw());
		assert_eq!(transform.apply(&polygon).compute_bounds(), Some([-4.0, 0.0, 0.0, 4.0]));
	}

	#[test]
	fn stored_extent_unprojects_and_unscales() {
		let scaling = CoordinateScaling::new(0.5, 0.25, 1.0).unwrap();
		let transform = CoordinateTransform::new(Crs::WGS84, Crs::WGS84, scaling).unwrap();
		let request = SpatialExtent::new(-1.0, -1.0, 2.0, 1.0, Crs::WGS84).unwrap();
		let stored = transform.stored_extent(&request).unwrap();
		assert_eq!(stored.as_array(), [-2.0, -4.0, 4.0, 4.0]);
	}

	#[test]
	fn stored_extent_from_other_crs() {
		let transform = CoordinateTransform::identity(Crs::WGS84);
		let request = SpatialExtent::new(0.0, 0.0, 1_113_194.908, 1_118_889.975, Crs::WEB_MERCATOR).unwrap();
		let stored = transform.stored_extent(&request).unwrap();
		assert_relative_eq!(stored.x_max, 10.0, epsilon = 1e-6);
		assert_relative_eq!(stored.y_max, 10.0, epsilon = 1e-6);
	}
}
