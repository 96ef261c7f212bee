use super::header::*;
use crate::*;
use anyhow::{Context, Result, bail, ensure};
use byteorder::ByteOrder;
use spatialite_core::io::{ValueReader, ValueReaderSlice};

/// A decoded SpatiaLite BLOB.
#[derive(Clone, Debug, PartialEq)]
pub struct SpatialiteBlob {
	pub srid: i32,
	/// MBR as stored in the header: `[min_x, min_y, max_x, max_y]`.
	pub mbr: [f64; 4],
	pub geometry: Geometry,
}

/// Decodes a SpatiaLite geometry BLOB.
///
/// The result is validated (closed rings, enough positions, finite values) and polygon
/// rings are normalised to a counter-clockwise outer ring and clockwise holes. Decoding
/// is deterministic: the same bytes always give the same geometry.
///
/// ## Errors
///
/// Fails for truncated or malformed data, unknown class types, geometry collections and
/// trailing bytes after the end marker.
pub fn decode_blob(blob: &[u8]) -> Result<SpatialiteBlob> {
	let result = match blob.get(1) {
		Some(&BYTE_ORDER_LITTLE) => decode_with(&mut ValueReaderSlice::new_le(blob), true),
		Some(&BYTE_ORDER_BIG) => decode_with(&mut ValueReaderSlice::new_be(blob), false),
		Some(&TINY_POINT_LITTLE) => decode_tiny_point_with(&mut ValueReaderSlice::new_le(blob), true),
		Some(&TINY_POINT_BIG) => decode_tiny_point_with(&mut ValueReaderSlice::new_be(blob), false),
		Some(other) => Err(anyhow::anyhow!("unknown byte order marker 0x{other:02x}")),
		None => Err(anyhow::anyhow!("BLOB too short")),
	};
	result.with_context(|| format!("decoding SpatiaLite BLOB of {} bytes", blob.len()))
}

fn decode_with<'a, R, E>(reader: &mut R, little_endian: bool) -> Result<SpatialiteBlob>
where
	R: ValueReader<'a, E>,
	E: ByteOrder + 'a,
{
	ensure!(reader.read_u8()? == BLOB_START, "BLOB does not start with 0x00");
	let header = read_header_with(reader, little_endian)?;
	let geometry = read_body(reader, header.class)?;
	finish(reader, header, geometry)
}

fn decode_tiny_point_with<'a, R, E>(reader: &mut R, little_endian: bool) -> Result<SpatialiteBlob>
where
	R: ValueReader<'a, E>,
	E: ByteOrder + 'a,
{
	ensure!(reader.read_u8()? == BLOB_START, "BLOB does not start with 0x00");
	let header = read_tiny_header_with(reader, little_endian)?;
	let [x, y, ..] = header.mbr;
	let dimension = header.class.dimension;
	let coordinates = if dimension.has_z() {
		Coordinates::new_3d(x, y, reader.read_f64()?)
	} else {
		Coordinates::new(x, y)
	};
	if dimension.has_m() {
		reader.read_f64()?;
	}
	finish(reader, header, Geometry::Point(PointGeometry(coordinates)))
}

fn finish<'a, R, E>(reader: &mut R, header: BlobHeader, mut geometry: Geometry) -> Result<SpatialiteBlob>
where
	R: ValueReader<'a, E>,
	E: ByteOrder + 'a,
{
	ensure!(reader.read_u8()? == BLOB_END, "missing end marker 0xFE");
	ensure!(
		!reader.has_remaining(),
		"{} trailing bytes after end marker",
		reader.remaining()
	);
	geometry.verify()?;
	geometry.normalize_winding();
	Ok(SpatialiteBlob {
		srid: header.srid,
		mbr: header.mbr,
		geometry,
	})
}

fn read_body<'a, R, E>(reader: &mut R, class: ClassType) -> Result<Geometry>
where
	R: ValueReader<'a, E>,
	E: ByteOrder + 'a,
{
	use GeometryKind::*;
	Ok(match class.kind {
		Point => Geometry::Point(PointGeometry(read_coordinates(reader, class.dimension)?)),
		LineString => Geometry::LineString(LineStringGeometry(read_sequence(reader, class)?)),
		Polygon => Geometry::Polygon(read_polygon(reader, class)?),
		MultiPoint => Geometry::MultiPoint(MultiPointGeometry(read_members(reader, Point, |r, c| {
			Ok(PointGeometry(read_coordinates(r, c.dimension)?))
		})?)),
		MultiLineString => Geometry::MultiLineString(MultiLineStringGeometry(read_members(
			reader,
			LineString,
			|r, c| Ok(LineStringGeometry(read_sequence(r, c)?)),
		)?)),
		MultiPolygon => Geometry::MultiPolygon(MultiPolygonGeometry(read_members(
			reader,
			Polygon,
			read_polygon,
		)?)),
	})
}

/// Reads the members of a multi geometry; each one starts with the entity marker
/// and its own class type.
fn read_members<'a, R, E, T>(
	reader: &mut R,
	member_kind: GeometryKind,
	mut read_member: impl FnMut(&mut R, ClassType) -> Result<T>,
) -> Result<Vec<T>>
where
	R: ValueReader<'a, E>,
	E: ByteOrder + 'a,
{
	let count = reader.read_count()?;
	// marker, class type and at least four more bytes per member
	reader.ensure_remaining(count as u64 * 9)?;
	let mut members = Vec::with_capacity(count);
	for index in 0..count {
		let marker = reader.read_u8()?;
		ensure!(
			marker == ENTITY_MARKER,
			"member {index}: expected entity marker 0x69, found 0x{marker:02x}"
		);
		let class = ClassType::from_code(reader.read_i32()?)?;
		ensure!(
			class.kind == member_kind,
			"member {index}: expected {member_kind}, found {}",
			class.kind
		);
		members.push(read_member(reader, class).with_context(|| format!("reading member {index}"))?);
	}
	Ok(members)
}

fn read_polygon<'a, R, E>(reader: &mut R, class: ClassType) -> Result<PolygonGeometry>
where
	R: ValueReader<'a, E>,
	E: ByteOrder + 'a,
{
	let count = reader.read_count()?;
	reader.ensure_remaining(count as u64 * 4)?;
	let mut rings = Vec::with_capacity(count);
	for index in 0..count {
		let ring = read_sequence(reader, class).with_context(|| format!("reading ring {index}"))?;
		rings.push(RingGeometry(ring));
	}
	Ok(PolygonGeometry(rings))
}

fn read_coordinates<'a, R, E>(reader: &mut R, dimension: Dimension) -> Result<Coordinates>
where
	R: ValueReader<'a, E>,
	E: ByteOrder + 'a,
{
	let x = reader.read_f64()?;
	let y = reader.read_f64()?;
	let coordinates = if dimension.has_z() {
		Coordinates::new_3d(x, y, reader.read_f64()?)
	} else {
		Coordinates::new(x, y)
	};
	if dimension.has_m() {
		reader.read_f64()?;
	}
	Ok(coordinates)
}

/// Reads a counted sequence of positions, plain or compressed.
///
/// In compressed sequences the first and last positions are stored as doubles, all
/// others as `f32` offsets to the preceding position. M values are never compressed.
fn read_sequence<'a, R, E>(reader: &mut R, class: ClassType) -> Result<Vec<Coordinates>>
where
	R: ValueReader<'a, E>,
	E: ByteOrder + 'a,
{
	let count = reader.read_count()?;
	let dimension = class.dimension;
	let full_size = dimension.ordinates() * 8;
	if !class.compressed {
		reader.ensure_remaining(count as u64 * full_size)?;
		return (0..count).map(|_| read_coordinates(reader, dimension)).collect();
	}

	let delta_size = (if dimension.has_z() { 12 } else { 8 }) + (if dimension.has_m() { 8 } else { 0 });
	let needed = match count {
		0 => 0,
		1 => full_size,
		n => 2 * full_size + (n as u64 - 2) * delta_size,
	};
	reader.ensure_remaining(needed)?;

	let mut positions: Vec<Coordinates> = Vec::with_capacity(count);
	for index in 0..count {
		let position = match positions.last() {
			Some(last) if index + 1 < count => {
				let x = last.x() + f64::from(reader.read_f32()?);
				let y = last.y() + f64::from(reader.read_f32()?);
				let position = match last.z() {
					Some(z) if dimension.has_z() => Coordinates::new_3d(x, y, z + f64::from(reader.read_f32()?)),
					_ => Coordinates::new(x, y),
				};
				if dimension.has_m() {
					reader.read_f64()?;
				}
				position
			}
			_ => read_coordinates(reader, dimension)?,
		};
		positions.push(position);
	}
	Ok(positions)
}

/// Decodes the class type code found in `geometry_columns.geometry_type`
/// into kind and dimension.
pub fn parse_geometry_type(code: i64) -> Result<(GeometryKind, Dimension)> {
	let Ok(code) = i32::try_from(code) else {
		bail!("geometry type {code} out of range")
	};
	let class = ClassType::from_code(code)?;
	ensure!(!class.compressed, "geometry type {code} is not a column type");
	Ok((class.kind, class.dimension))
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;
	use pretty_assertions::assert_eq;
	use crate::spatialite::{BlobWriteOptions, encode_blob, encode_blob_with};

	/// Little-endian XY point (1.5, -2.0) with SRID 4326, written byte by byte.
	fn point_blob() -> Vec<u8> {
		let mut b = vec![0x00, 0x01];
		b.extend(4326i32.to_le_bytes());
		for v in [1.5f64, -2.0, 1.5, -2.0] {
			b.extend(v.to_le_bytes());
		}
		b.push(0x7C);
		b.extend(1i32.to_le_bytes());
		b.extend(1.5f64.to_le_bytes());
		b.extend((-2.0f64).to_le_bytes());
		b.push(0xFE);
		b
	}

	#[test]
	fn decode_handwritten_point() -> Result<()> {
		let blob = decode_blob(&point_blob())?;
		assert_eq!(blob.srid, 4326);
		assert_eq!(blob.mbr, [1.5, -2.0, 1.5, -2.0]);
		assert_eq!(blob.geometry, Geometry::new_point([1.5, -2.0]));
		Ok(())
	}

	#[test]
	fn decode_handwritten_big_endian_linestring() -> Result<()> {
		let mut b = vec![0x00, 0x00];
		b.extend(3857i32.to_be_bytes());
		for v in [0f64, 0.0, 10.0, 5.0] {
			b.extend(v.to_be_bytes());
		}
		b.push(0x7C);
		b.extend(2i32.to_be_bytes());
		b.extend(2i32.to_be_bytes());
		for v in [0f64, 0.0, 10.0, 5.0] {
			b.extend(v.to_be_bytes());
		}
		b.push(0xFE);

		let blob = decode_blob(&b)?;
		assert_eq!(blob.srid, 3857);
		assert_eq!(blob.geometry, Geometry::new_line_string(&[[0, 0], [10, 5]]));
		Ok(())
	}

	#[test]
	fn decode_tiny_point() -> Result<()> {
		let mut b = vec![0x00, 0x81];
		b.extend(4326i32.to_le_bytes());
		b.push(2); // XYZ
		for v in [7.0f64, 8.0, 9.0] {
			b.extend(v.to_le_bytes());
		}
		b.push(0xFE);

		let blob = decode_blob(&b)?;
		assert_eq!(blob.geometry, Geometry::new_point(&[7.0, 8.0, 9.0]));
		assert_eq!(blob.mbr, [7.0, 8.0, 7.0, 8.0]);
		Ok(())
	}

	#[test]
	fn decoding_is_idempotent() -> Result<()> {
		let bytes = point_blob();
		assert_eq!(decode_blob(&bytes)?, decode_blob(&bytes)?);
		Ok(())
	}

	#[test]
	fn rejects_truncated_and_trailing_data() {
		let bytes = point_blob();
		for len in [0, 1, 10, 38, 43, bytes.len() - 1] {
			assert!(decode_blob(&bytes[..len]).is_err(), "length {len} should fail");
		}
		let mut trailing = bytes.clone();
		trailing.push(0x00);
		assert!(decode_blob(&trailing).is_err());

		let mut bad_end = bytes;
		let last = bad_end.len() - 1;
		bad_end[last] = 0xFF;
		assert!(decode_blob(&bad_end).is_err());
	}

	#[test]
	fn rejects_huge_counts() {
		let mut b = vec![0x00, 0x01];
		b.extend(4326i32.to_le_bytes());
		b.extend([0u8; 32]);
		b.push(0x7C);
		b.extend(2i32.to_le_bytes());
		b.extend(i32::MAX.to_le_bytes());
		b.push(0xFE);
		let error = decode_blob(&b).unwrap_err();
		assert!(format!("{error:#}").contains("more bytes"));
	}

	#[test]
	fn rejects_unclosed_ring() {
		let polygon = Geometry::new_polygon(&[[[0, 0], [1, 0], [1, 1], [0, 1], [0, 0]]]);
		let mut bytes = encode_blob(&polygon, 4326).unwrap();
		// last ring position starts 17 bytes before the end: patch its x
		let at = bytes.len() - 17;
		bytes[at..at + 8].copy_from_slice(&0.5f64.to_le_bytes());
		assert!(decode_blob(&bytes).is_err());
	}

	#[test]
	fn decode_compressed_linestring() -> Result<()> {
		let line = Geometry::new_line_string(&[[10.0, 50.0], [10.25, 50.5], [10.75, 50.25], [11.0, 51.0]]);
		let options = BlobWriteOptions {
			compressed: true,
			..BlobWriteOptions::default()
		};
		let bytes = encode_blob_with(&line, 4326, options)?;
		assert!(ClassType::from_code(i32::from_le_bytes(bytes[39..43].try_into()?))?.compressed);

		let Geometry::LineString(decoded) = decode_blob(&bytes)?.geometry else {
			panic!("expected a line string");
		};
		let Geometry::LineString(expected) = line else { unreachable!() };
		assert_eq!(decoded.0.len(), expected.0.len());
		for (a, b) in decoded.0.iter().zip(expected.0.iter()) {
			assert_relative_eq!(a.x(), b.x(), epsilon = 1e-5);
			assert_relative_eq!(a.y(), b.y(), epsilon = 1e-5);
		}
		Ok(())
	}

	#[test]
	fn decode_multi_polygon_with_holes_normalizes_winding() -> Result<()> {
		// outer ring clockwise, hole counter-clockwise: both get flipped
		let input = Geometry::new_multi_polygon(&[
			[
				[[0, 0], [0, 10], [10, 10], [10, 0], [0, 0]],
				[[2, 2], [4, 2], [4, 4], [2, 4], [2, 2]],
			],
			[
				[[20, 20], [20, 30], [30, 30], [30, 20], [20, 20]],
				[[22, 22], [24, 22], [24, 24], [22, 24], [22, 22]],
			],
		]);
		let decoded = decode_blob(&encode_blob(&input, 4326)?)?.geometry;
		let Geometry::MultiPolygon(polygons) = &decoded else {
			panic!("expected a multi polygon");
		};
		assert_eq!(polygons.0.len(), 2);
		for polygon in &polygons.0 {
			assert_eq!(polygon.0.len(), 2);
			assert!(polygon.0[0].is_ccw());
			assert!(!polygon.0[1].is_ccw());
		}
		assert_eq!(decoded.compute_bounds(), Some([0.0, 0.0, 30.0, 30.0]));
		Ok(())
	}

	#[test]
	fn rejects_wrong_member_kind() -> Result<()> {
		let mut bytes = encode_blob(&Geometry::new_multi_point(&[[1, 1]]), 4326)?;
		// member class type directly follows the count and the entity marker
		bytes[48..52].copy_from_slice(&2i32.to_le_bytes());
		assert!(decode_blob(&bytes).is_err());
		Ok(())
	}

	#[test]
	fn geometry_type_codes() -> Result<()> {
		assert_eq!(parse_geometry_type(2)?, (GeometryKind::LineString, Dimension::Xy));
		assert_eq!(parse_geometry_type(1006)?, (GeometryKind::MultiPolygon, Dimension::Xyz));
		assert!(parse_geometry_type(7).is_err());
		assert!(parse_geometry_type(1000002).is_err());
		Ok(())
	}
}
