use super::*;
use anyhow::{Result, bail};
use geo::Intersects;
use spatialite_core::SpatialExtent;
use std::fmt::{Debug, Display};

/// The six geometry kinds a layer can hold.
///
/// The numeric codes are the ones SpatiaLite uses for geometry classes and in
/// `geometry_columns.geometry_type` (modulo 1000).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GeometryKind {
	Point = 1,
	LineString = 2,
	Polygon = 3,
	MultiPoint = 4,
	MultiLineString = 5,
	MultiPolygon = 6,
}

impl GeometryKind {
	pub fn from_code(code: u32) -> Result<Self> {
		use GeometryKind::*;
		Ok(match code {
			1 => Point,
			2 => LineString,
			3 => Polygon,
			4 => MultiPoint,
			5 => MultiLineString,
			6 => MultiPolygon,
			7 => bail!("geometry collections are not supported"),
			_ => bail!("unknown geometry class {code}"),
		})
	}

	#[must_use]
	pub fn code(&self) -> u32 {
		*self as u32
	}

	#[must_use]
	pub fn as_str(&self) -> &'static str {
		use GeometryKind::*;
		match self {
			Point => "Point",
			LineString => "LineString",
			Polygon => "Polygon",
			MultiPoint => "MultiPoint",
			MultiLineString => "MultiLineString",
			MultiPolygon => "MultiPolygon",
		}
	}
}

impl Display for GeometryKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Clone, PartialEq)]
pub enum Geometry {
	Point(PointGeometry),
	LineString(LineStringGeometry),
	Polygon(PolygonGeometry),
	MultiPoint(MultiPointGeometry),
	MultiLineString(MultiLineStringGeometry),
	MultiPolygon(MultiPolygonGeometry),
}

macro_rules! delegate {
	($self:expr, $g:ident => $body:expr) => {
		match $self {
			Geometry::Point($g) => $body,
			Geometry::LineString($g) => $body,
			Geometry::Polygon($g) => $body,
			Geometry::MultiPoint($g) => $body,
			Geometry::MultiLineString($g) => $body,
			Geometry::MultiPolygon($g) => $body,
		}
	};
}

macro_rules! delegate_map {
	($self:expr, $g:ident => $body:expr) => {
		match $self {
			Geometry::Point($g) => Geometry::Point($body),
			Geometry::LineString($g) => Geometry::LineString($body),
			Geometry::Polygon($g) => Geometry::Polygon($body),
			Geometry::MultiPoint($g) => Geometry::MultiPoint($body),
			Geometry::MultiLineString($g) => Geometry::MultiLineString($body),
			Geometry::MultiPolygon($g) => Geometry::MultiPolygon($body),
		}
	};
}

impl Geometry {
	#[must_use]
	pub fn kind(&self) -> GeometryKind {
		match self {
			Geometry::Point(_) => GeometryKind::Point,
			Geometry::LineString(_) => GeometryKind::LineString,
			Geometry::Polygon(_) => GeometryKind::Polygon,
			Geometry::MultiPoint(_) => GeometryKind::MultiPoint,
			Geometry::MultiLineString(_) => GeometryKind::MultiLineString,
			Geometry::MultiPolygon(_) => GeometryKind::MultiPolygon,
		}
	}

	pub fn verify(&self) -> Result<()> {
		delegate!(self, g => g.verify())
	}

	#[must_use]
	pub fn compute_bounds(&self) -> Option<[f64; 4]> {
		delegate!(self, g => g.compute_bounds())
	}

	#[must_use]
	pub fn map_coordinates(&self, mut f: impl FnMut(&Coordinates) -> Coordinates) -> Geometry {
		delegate_map!(self, g => g.map_coordinates(&mut f))
	}

	pub fn for_each_coordinate(&self, mut f: impl FnMut(&Coordinates)) {
		delegate!(self, g => g.for_each_coordinate(&mut f));
	}

	/// True if any position carries an elevation.
	#[must_use]
	pub fn has_z(&self) -> bool {
		let mut has_z = false;
		self.for_each_coordinate(|c| has_z |= c.z().is_some());
		has_z
	}

	/// Orients outer polygon rings counter-clockwise and holes clockwise.
	pub fn normalize_winding(&mut self) {
		match self {
			Geometry::Polygon(p) => p.normalize_winding(),
			Geometry::MultiPolygon(p) => p.normalize_winding(),
			_ => {}
		}
	}

	/// Exact test whether the geometry shares at least one point with `extent`.
	///
	/// Both have to be expressed in the same CRS.
	#[must_use]
	pub fn intersects_extent(&self, extent: &SpatialExtent) -> bool {
		let rect = geo::Rect::new(
			geo::coord! { x: extent.x_min, y: extent.y_min },
			geo::coord! { x: extent.x_max, y: extent.y_max },
		);
		self.to_geo().intersects(&geo::Geometry::Rect(rect))
	}

	/// Converts into the `geo` crate representation (x and y only).
	#[must_use]
	pub fn to_geo(&self) -> geo::Geometry<f64> {
		match self {
			Geometry::Point(p) => geo::Geometry::Point(geo::Point(geo::Coord::from(p.0))),
			Geometry::LineString(l) => geo::Geometry::LineString(geo::LineString::from(l)),
			Geometry::Polygon(p) => geo::Geometry::Polygon(geo::Polygon::from(p)),
			Geometry::MultiPoint(m) => geo::Geometry::MultiPoint(geo::MultiPoint(
				m.0.iter().map(|p| geo::Point(geo::Coord::from(p.0))).collect(),
			)),
			Geometry::MultiLineString(m) => {
				geo::Geometry::MultiLineString(geo::MultiLineString(m.0.iter().map(geo::LineString::from).collect()))
			}
			Geometry::MultiPolygon(m) => {
				geo::Geometry::MultiPolygon(geo::MultiPolygon(m.0.iter().map(geo::Polygon::from).collect()))
			}
		}
	}

	#[must_use]
	pub fn new_point<T>(value: T) -> Self
	where
		PointGeometry: From<T>,
	{
		Self::Point(PointGeometry::from(value))
	}

	#[must_use]
	pub fn new_line_string<T>(value: T) -> Self
	where
		LineStringGeometry: From<T>,
	{
		Self::LineString(LineStringGeometry::from(value))
	}

	#[must_use]
	pub fn new_polygon<T>(value: T) -> Self
	where
		PolygonGeometry: From<T>,
	{
		Self::Polygon(PolygonGeometry::from(value))
	}

	#[must_use]
	pub fn new_multi_point<T>(value: T) -> Self
	where
		MultiPointGeometry: From<T>,
	{
		Self::MultiPoint(MultiPointGeometry::from(value))
	}

	#[must_use]
	pub fn new_multi_line_string<T>(value: T) -> Self
	where
		MultiLineStringGeometry: From<T>,
	{
		Self::MultiLineString(MultiLineStringGeometry::from(value))
	}

	#[must_use]
	pub fn new_multi_polygon<T>(value: T) -> Self
	where
		MultiPolygonGeometry: From<T>,
	{
		Self::MultiPolygon(MultiPolygonGeometry::from(value))
	}
}

impl Debug for Geometry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let (name, inner): (&str, &dyn Debug) = match self {
			Geometry::Point(g) => ("Point", g),
			Geometry::LineString(g) => ("LineString", g),
			Geometry::Polygon(g) => ("Polygon", g),
			Geometry::MultiPoint(g) => ("MultiPoint", g),
			Geometry::MultiLineString(g) => ("MultiLineString", g),
			Geometry::MultiPolygon(g) => ("MultiPolygon", g),
		};
		f.debug_tuple(name).field(inner).finish()
	}
}
