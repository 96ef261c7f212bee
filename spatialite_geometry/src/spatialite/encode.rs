use super::header::*;
use crate::*;
use anyhow::Result;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use spatialite_core::io::{ValueWriter, ValueWriterVec};

/// Options for [`encode_blob_with`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlobWriteOptions {
	pub big_endian: bool,
	/// Store line strings and polygon rings with `f32` offsets.
	pub compressed: bool,
}

/// Encodes a geometry as a little-endian, uncompressed SpatiaLite BLOB.
///
/// Geometries with elevation are written as XYZ, positions without `z` get `0.0`.
pub fn encode_blob(geometry: &Geometry, srid: i32) -> Result<Vec<u8>> {
	encode_blob_with(geometry, srid, BlobWriteOptions::default())
}

pub fn encode_blob_with(geometry: &Geometry, srid: i32, options: BlobWriteOptions) -> Result<Vec<u8>> {
	if options.big_endian {
		let mut writer = ValueWriterVec::<BigEndian>::new();
		write_blob(&mut writer, geometry, srid, BYTE_ORDER_BIG, options.compressed)?;
		Ok(writer.into_inner())
	} else {
		let mut writer = ValueWriterVec::<LittleEndian>::new();
		write_blob(&mut writer, geometry, srid, BYTE_ORDER_LITTLE, options.compressed)?;
		Ok(writer.into_inner())
	}
}

fn write_blob<E: ByteOrder>(
	writer: &mut impl ValueWriter<E>,
	geometry: &Geometry,
	srid: i32,
	byte_order: u8,
	compressed: bool,
) -> Result<()> {
	let dimension = if geometry.has_z() { Dimension::Xyz } else { Dimension::Xy };
	writer.write_u8(BLOB_START)?;
	writer.write_u8(byte_order)?;
	writer.write_i32(srid)?;
	for value in geometry.compute_bounds().unwrap_or_default() {
		writer.write_f64(value)?;
	}
	writer.write_u8(MBR_END)?;
	write_class(writer, geometry.kind(), dimension, compressed)?;
	write_body(writer, geometry, dimension, compressed)?;
	writer.write_u8(BLOB_END)
}

fn write_class<E: ByteOrder>(
	writer: &mut impl ValueWriter<E>,
	kind: GeometryKind,
	dimension: Dimension,
	compressed: bool,
) -> Result<()> {
	let class = ClassType {
		kind,
		dimension,
		compressed: compressed && matches!(kind, GeometryKind::LineString | GeometryKind::Polygon),
	};
	writer.write_i32(class.code())
}

fn write_body<E: ByteOrder>(
	writer: &mut impl ValueWriter<E>,
	geometry: &Geometry,
	dimension: Dimension,
	compressed: bool,
) -> Result<()> {
	match geometry {
		Geometry::Point(p) => write_coordinates(writer, &p.0, dimension),
		Geometry::LineString(l) => write_sequence(writer, &l.0, dimension, compressed),
		Geometry::Polygon(p) => write_polygon(writer, p, dimension, compressed),
		Geometry::MultiPoint(m) => {
			writer.write_count(m.0.len())?;
			for point in &m.0 {
				write_entity(writer, GeometryKind::Point, dimension, compressed)?;
				write_coordinates(writer, &point.0, dimension)?;
			}
			Ok(())
		}
		Geometry::MultiLineString(m) => {
			writer.write_count(m.0.len())?;
			for line in &m.0 {
				write_entity(writer, GeometryKind::LineString, dimension, compressed)?;
				write_sequence(writer, &line.0, dimension, compressed)?;
			}
			Ok(())
		}
		Geometry::MultiPolygon(m) => {
			writer.write_count(m.0.len())?;
			for polygon in &m.0 {
				write_entity(writer, GeometryKind::Polygon, dimension, compressed)?;
				write_polygon(writer, polygon, dimension, compressed)?;
			}
			Ok(())
		}
	}
}

fn write_entity<E: ByteOrder>(
	writer: &mut impl ValueWriter<E>,
	kind: GeometryKind,
	dimension: Dimension,
	compressed: bool,
) -> Result<()> {
	writer.write_u8(ENTITY_MARKER)?;
	write_class(writer, kind, dimension, compressed)
}

fn write_polygon<E: ByteOrder>(
	writer: &mut impl ValueWriter<E>,
	polygon: &PolygonGeometry,
	dimension: Dimension,
	compressed: bool,
) -> Result<()> {
	writer.write_count(polygon.0.len())?;
	for ring in &polygon.0 {
		write_sequence(writer, &ring.0, dimension, compressed)?;
	}
	Ok(())
}

fn write_coordinates<E: ByteOrder>(
	writer: &mut impl ValueWriter<E>,
	coordinates: &Coordinates,
	dimension: Dimension,
) -> Result<()> {
	writer.write_f64(coordinates.x())?;
	writer.write_f64(coordinates.y())?;
	if dimension.has_z() {
		writer.write_f64(coordinates.z().unwrap_or_default())?;
	}
	Ok(())
}

fn write_sequence<E: ByteOrder>(
	writer: &mut impl ValueWriter<E>,
	positions: &[Coordinates],
	dimension: Dimension,
	compressed: bool,
) -> Result<()> {
	writer.write_count(positions.len())?;
	let last_index = positions.len().saturating_sub(1);
	let mut previous: Option<&Coordinates> = None;
	for (index, position) in positions.iter().enumerate() {
		match previous {
			Some(prev) if compressed && index < last_index => {
				writer.write_f32((position.x() - prev.x()) as f32)?;
				writer.write_f32((position.y() - prev.y()) as f32)?;
				if dimension.has_z() {
					let delta = position.z().unwrap_or_default() - prev.z().unwrap_or_default();
					writer.write_f32(delta as f32)?;
				}
			}
			_ => write_coordinates(writer, position, dimension)?,
		}
		previous = Some(position);
	}
	Ok(())
}
