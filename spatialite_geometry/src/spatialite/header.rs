use crate::GeometryKind;
use anyhow::{Result, bail, ensure};
use spatialite_core::io::{ValueReader, ValueReaderSlice};
use std::fmt::Debug;

pub const BLOB_START: u8 = 0x00;
pub const BYTE_ORDER_BIG: u8 = 0x00;
pub const BYTE_ORDER_LITTLE: u8 = 0x01;
pub const TINY_POINT_BIG: u8 = 0x80;
pub const TINY_POINT_LITTLE: u8 = 0x81;
pub const MBR_END: u8 = 0x7C;
pub const ENTITY_MARKER: u8 = 0x69;
pub const BLOB_END: u8 = 0xFE;

/// Bytes in front of the class type of a regular BLOB.
pub const HEADER_LENGTH: usize = 39;

const COMPRESSED_OFFSET: u32 = 1_000_000;

/// Coordinate dimensions of a SpatiaLite geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
	Xy,
	Xyz,
	Xym,
	Xyzm,
}

impl Dimension {
	pub fn from_code(code: u32) -> Result<Self> {
		Ok(match code {
			0 => Dimension::Xy,
			1 => Dimension::Xyz,
			2 => Dimension::Xym,
			3 => Dimension::Xyzm,
			_ => bail!("unknown dimension code {code}"),
		})
	}

	#[must_use]
	pub fn code(&self) -> u32 {
		match self {
			Dimension::Xy => 0,
			Dimension::Xyz => 1,
			Dimension::Xym => 2,
			Dimension::Xyzm => 3,
		}
	}

	#[must_use]
	pub fn has_z(&self) -> bool {
		matches!(self, Dimension::Xyz | Dimension::Xyzm)
	}

	#[must_use]
	pub fn has_m(&self) -> bool {
		matches!(self, Dimension::Xym | Dimension::Xyzm)
	}

	/// Number of ordinates per position.
	#[must_use]
	pub fn ordinates(&self) -> u64 {
		2 + u64::from(self.has_z()) + u64::from(self.has_m())
	}
}

/// A decoded class type: geometry kind, dimension and compression flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClassType {
	pub kind: GeometryKind,
	pub dimension: Dimension,
	pub compressed: bool,
}

impl ClassType {
	#[must_use]
	pub fn new(kind: GeometryKind, dimension: Dimension) -> Self {
		ClassType {
			kind,
			dimension,
			compressed: false,
		}
	}

	pub fn from_code(code: i32) -> Result<Self> {
		ensure!(code > 0, "invalid class type {code}");
		let mut code = code as u32;
		let compressed = code >= COMPRESSED_OFFSET;
		if compressed {
			code -= COMPRESSED_OFFSET;
		}
		let kind = GeometryKind::from_code(code % 1000)?;
		let dimension = Dimension::from_code(code / 1000)?;
		if compressed {
			ensure!(
				matches!(kind, GeometryKind::LineString | GeometryKind::Polygon),
				"compression is not defined for {kind}"
			);
		}
		Ok(ClassType {
			kind,
			dimension,
			compressed,
		})
	}

	#[must_use]
	pub fn code(&self) -> i32 {
		let mut code = self.kind.code() + self.dimension.code() * 1000;
		if self.compressed {
			code += COMPRESSED_OFFSET;
		}
		code as i32
	}
}

/// Header fields of a BLOB, readable without decoding the body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlobHeader {
	pub little_endian: bool,
	pub srid: i32,
	/// `[min_x, min_y, max_x, max_y]`
	pub mbr: [f64; 4],
	pub class: ClassType,
}

/// Reads the header of a BLOB: byte order, SRID, MBR and class type.
///
/// The body is not touched, so this is cheap enough for a bounding-box check on
/// every row of an unindexed table.
pub fn read_blob_header(blob: &[u8]) -> Result<BlobHeader> {
	ensure!(blob.len() >= 2, "BLOB too short ({} bytes)", blob.len());
	ensure!(blob[0] == BLOB_START, "BLOB does not start with 0x00");
	match blob[1] {
		BYTE_ORDER_LITTLE => read_header_with(&mut ValueReaderSlice::new_le(blob), true),
		BYTE_ORDER_BIG => read_header_with(&mut ValueReaderSlice::new_be(blob), false),
		TINY_POINT_LITTLE => read_tiny_header_with(&mut ValueReaderSlice::new_le(blob), true),
		TINY_POINT_BIG => read_tiny_header_with(&mut ValueReaderSlice::new_be(blob), false),
		other => bail!("unknown byte order marker 0x{other:02x}"),
	}
}

pub(crate) fn read_header_with<'a, R, E>(reader: &mut R, little_endian: bool) -> Result<BlobHeader>
where
	R: ValueReader<'a, E>,
	E: byteorder::ByteOrder + 'a,
{
	reader.set_position(2)?;
	// rest of the header, class type and end marker
	reader.ensure_remaining(HEADER_LENGTH as u64 - 2 + 5)?;
	let srid = reader.read_i32()?;
	let mbr = [reader.read_f64()?, reader.read_f64()?, reader.read_f64()?, reader.read_f64()?];
	ensure!(reader.read_u8()? == MBR_END, "missing MBR end marker 0x7C");
	let class = ClassType::from_code(reader.read_i32()?)?;
	Ok(BlobHeader {
		little_endian,
		srid,
		mbr,
		class,
	})
}

/// TinyPoint header. The MBR is the point itself.
pub(crate) fn read_tiny_header_with<'a, R, E>(reader: &mut R, little_endian: bool) -> Result<BlobHeader>
where
	R: ValueReader<'a, E>,
	E: byteorder::ByteOrder + 'a,
{
	reader.set_position(2)?;
	let srid = reader.read_i32()?;
	let code = u32::from(reader.read_u8()?);
	ensure!((1..=4).contains(&code), "unknown TinyPoint type {code}");
	let dimension = Dimension::from_code(code - 1)?;
	let x = reader.read_f64()?;
	let y = reader.read_f64()?;
	Ok(BlobHeader {
		little_endian,
		srid,
		mbr: [x, y, x, y],
		class: ClassType::new(GeometryKind::Point, dimension),
	})
}
