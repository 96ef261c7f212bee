use anyhow::{Context, Result, bail};
use lazy_static::lazy_static;
use regex::Regex;
use std::{
	fmt::{Debug, Display},
	str::FromStr,
};

lazy_static! {
	static ref REG_EPSG: Regex = Regex::new(r"^(?i)epsg:(\d{1,9})$").unwrap();
}

/// A coordinate reference system, identified by its EPSG code.
///
/// SpatiaLite stores the code as the SRID of a geometry column, configuration documents
/// write it as `EPSG:<code>`.
///
/// ```
/// use spatialite_core::Crs;
///
/// let crs: Crs = "EPSG:3857".parse().unwrap();
/// assert_eq!(crs, Crs::WEB_MERCATOR);
/// assert_eq!(crs.to_string(), "EPSG:3857");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Crs {
	srid: u32,
}

impl Crs {
	/// Geographic WGS 84 (longitude/latitude in degrees).
	pub const WGS84: Crs = Crs { srid: 4326 };
	/// Spherical Web Mercator in meters.
	pub const WEB_MERCATOR: Crs = Crs { srid: 3857 };

	#[must_use]
	pub const fn from_srid(srid: u32) -> Crs {
		Crs { srid }
	}

	/// Converts a SRID as stored by SpatiaLite. Zero and negative values mean "undefined".
	pub fn try_from_srid(srid: i64) -> Result<Crs> {
		if srid <= 0 {
			bail!("SRID {srid} does not identify a coordinate reference system");
		}
		let srid = u32::try_from(srid).with_context(|| format!("SRID {srid} is out of range"))?;
		Ok(Crs { srid })
	}

	/// Parses `EPSG:<code>`, ignoring case and surrounding whitespace.
	pub fn parse(text: &str) -> Result<Crs> {
		let text = text.trim();
		let Some(captures) = REG_EPSG.captures(text) else {
			bail!("'{text}' is not a CRS identifier of the form 'EPSG:<code>'");
		};
		let srid: u32 = captures[1]
			.parse()
			.with_context(|| format!("invalid EPSG code in '{text}'"))?;
		if srid == 0 {
			bail!("EPSG code in '{text}' must be positive");
		}
		Ok(Crs { srid })
	}

	#[must_use]
	pub fn srid(&self) -> u32 {
		self.srid
	}

	/// True for coordinates in degrees.
	#[must_use]
	pub fn is_geographic(&self) -> bool {
		self.srid == 4326
	}
}

impl FromStr for Crs {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		Crs::parse(s)
	}
}

impl Display for Crs {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "EPSG:{}", self.srid)
	}
}

impl Debug for Crs {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "Crs(EPSG:{})", self.srid)
	}
}
