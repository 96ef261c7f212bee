//! `ValueReaderSlice` reads values from a borrowed byte slice.
//!
//! # Examples
//!
//! ```rust
//! use spatialite_core::io::{ValueReader, ValueReaderSlice};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let data = &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F];
//!     let mut reader = ValueReaderSlice::new_le(data);
//!     assert_eq!(reader.read_f64()?, 1.0);
//!     assert!(!reader.has_remaining());
//!     Ok(())
//! }
//! ```

use super::{SeekRead, ValueReader};
use anyhow::{Result, bail};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::{io::Cursor, marker::PhantomData};

/// Reads from a byte slice using the byte order `E`.
pub struct ValueReaderSlice<'a, E: ByteOrder> {
	_phantom: PhantomData<E>,
	cursor: Cursor<&'a [u8]>,
	len: u64,
}

impl<'a, E: ByteOrder> ValueReaderSlice<'a, E> {
	#[must_use]
	pub fn new(slice: &'a [u8]) -> ValueReaderSlice<'a, E> {
		ValueReaderSlice {
			_phantom: PhantomData,
			len: slice.len() as u64,
			cursor: Cursor::new(slice),
		}
	}
}

impl<'a> ValueReaderSlice<'a, LittleEndian> {
	/// Creates a little-endian reader.
	#[must_use]
	pub fn new_le(slice: &'a [u8]) -> ValueReaderSlice<'a, LittleEndian> {
		ValueReaderSlice::new(slice)
	}
}

impl<'a> ValueReaderSlice<'a, BigEndian> {
	/// Creates a big-endian reader.
	#[must_use]
	pub fn new_be(slice: &'a [u8]) -> ValueReaderSlice<'a, BigEndian> {
		ValueReaderSlice::new(slice)
	}
}

impl SeekRead for Cursor<&[u8]> {}

impl<'a, E: ByteOrder + 'a> ValueReader<'a, E> for ValueReaderSlice<'a, E> {
	fn get_reader(&mut self) -> &mut dyn SeekRead {
		&mut self.cursor
	}

	fn len(&self) -> u64 {
		self.len
	}

	fn position(&mut self) -> u64 {
		self.cursor.position()
	}

	fn set_position(&mut self, position: u64) -> Result<()> {
		if position > self.len {
			bail!("set position {position} outside length {}", self.len)
		}
		self.cursor.set_position(position);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_len() {
		let reader = ValueReaderSlice::new_le(&[0x80; 42]);
		assert_eq!(reader.len(), 42);
		assert!(!reader.is_empty());
	}

	#[test]
	fn test_read_i32_le() -> Result<()> {
		let mut reader = ValueReaderSlice::new_le(&[0xFD, 0xFF, 0xFF, 0xFF]);
		assert_eq!(reader.read_i32()?, -3);
		Ok(())
	}

	#[test]
	fn test_read_i32_be() -> Result<()> {
		let mut reader = ValueReaderSlice::new_be(&[0xFF, 0xFF, 0xFF, 0xFD]);
		assert_eq!(reader.read_i32()?, -3);
		Ok(())
	}

	#[test]
	fn test_read_floats() -> Result<()> {
		let mut data = 1.5f32.to_be_bytes().to_vec();
		data.extend_from_slice(&(-2.25f64).to_be_bytes());
		let mut reader = ValueReaderSlice::new_be(&data);
		assert_eq!(reader.read_f32()?, 1.5);
		assert_eq!(reader.read_f64()?, -2.25);
		assert!(reader.read_u8().is_err());
		Ok(())
	}

	#[test]
	fn test_set_and_get_position() -> Result<()> {
		let mut reader = ValueReaderSlice::new_le(&[0x01, 0x02, 0x03, 0x04]);
		reader.set_position(2)?;
		assert_eq!(reader.position(), 2);
		assert_eq!(reader.remaining(), 2);
		assert_eq!(reader.read_u8()?, 0x03);
		assert!(reader.set_position(5).is_err());
		Ok(())
	}

	#[test]
	fn test_read_count() -> Result<()> {
		let mut reader = ValueReaderSlice::new_le(&[0x02, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
		assert_eq!(reader.read_count()?, 2);
		assert!(reader.read_count().is_err());
		Ok(())
	}

	#[test]
	fn test_ensure_remaining() -> Result<()> {
		let mut reader = ValueReaderSlice::new_le(&[0x00; 8]);
		reader.ensure_remaining(8)?;
		reader.read_u32()?;
		assert!(reader.ensure_remaining(5).is_err());
		Ok(())
	}
}
