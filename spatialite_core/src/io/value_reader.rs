// The `ValueReader` trait reads fixed-width numbers from a positioned source.
//
// Implementations decide the byte order through the type parameter `E`, so a decoder
// can be written once and instantiated for little-endian and big-endian input.
//
// ```rust
// use spatialite_core::io::{ValueReader, ValueReaderSlice};
//
// let data = &[0x01, 0x02, 0x03, 0x04];
// let mut reader_le = ValueReaderSlice::new_le(data);
// assert_eq!(reader_le.read_u32().unwrap(), 0x04030201);
//
// let mut reader_be = ValueReaderSlice::new_be(data);
// assert_eq!(reader_be.read_u32().unwrap(), 0x01020304);
// ```

use anyhow::{Context, Result, ensure};
use byteorder::{ByteOrder, ReadBytesExt};
use std::io::{Read, Seek};

/// A simple alias for types implementing both `Seek` and `Read`.
pub trait SeekRead: Seek + Read {}

/// Reads values from a source with a fixed byte order.
pub trait ValueReader<'a, E: ByteOrder + 'a> {
	/// Returns the underlying reader.
	fn get_reader(&mut self) -> &mut dyn SeekRead;

	/// Total length of the readable data in bytes.
	fn len(&self) -> u64;

	/// Current read position in bytes.
	fn position(&mut self) -> u64;

	/// Moves the read position.
	///
	/// # Errors
	/// Returns an error if the position lies outside the data.
	fn set_position(&mut self, position: u64) -> Result<()>;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Number of bytes left to read.
	fn remaining(&mut self) -> u64 {
		self.len().saturating_sub(self.position())
	}

	fn has_remaining(&mut self) -> bool {
		self.remaining() > 0
	}

	/// Fails unless at least `count` bytes are left.
	///
	/// Decoders call this before trusting a length prefix so that a corrupt count
	/// cannot trigger a huge allocation.
	fn ensure_remaining(&mut self, count: u64) -> Result<()> {
		let remaining = self.remaining();
		ensure!(
			count <= remaining,
			"need {count} more bytes at offset {}, but only {remaining} are left",
			self.position()
		);
		Ok(())
	}

	fn read_u8(&mut self) -> Result<u8> {
		self.get_reader().read_u8().context("reading u8")
	}

	fn read_i32(&mut self) -> Result<i32> {
		self.get_reader().read_i32::<E>().context("reading i32")
	}

	fn read_u32(&mut self) -> Result<u32> {
		self.get_reader().read_u32::<E>().context("reading u32")
	}

	fn read_f32(&mut self) -> Result<f32> {
		self.get_reader().read_f32::<E>().context("reading f32")
	}

	fn read_f64(&mut self) -> Result<f64> {
		self.get_reader().read_f64::<E>().context("reading f64")
	}

	/// Reads an `i32` count and checks that it is non-negative.
	fn read_count(&mut self) -> Result<usize> {
		let count = self.read_i32()?;
		ensure!(count >= 0, "negative element count {count}");
		Ok(count as usize)
	}
}
