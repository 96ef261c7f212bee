//! The `ValueWriter` trait writes fixed-width numbers in a chosen byte order.

use anyhow::{Context, Result};
use byteorder::{ByteOrder, WriteBytesExt};
use std::io::Write;

/// Writes values to a destination with the byte order `E`.
pub trait ValueWriter<E: ByteOrder> {
	/// Returns the underlying writer.
	fn get_writer(&mut self) -> &mut dyn Write;

	/// Number of bytes written so far.
	fn position(&mut self) -> u64;

	fn write_u8(&mut self, value: u8) -> Result<()> {
		self.get_writer().write_u8(value).context("writing u8")
	}

	fn write_i32(&mut self, value: i32) -> Result<()> {
		self.get_writer().write_i32::<E>(value).context("writing i32")
	}

	fn write_f32(&mut self, value: f32) -> Result<()> {
		self.get_writer().write_f32::<E>(value).context("writing f32")
	}

	fn write_f64(&mut self, value: f64) -> Result<()> {
		self.get_writer().write_f64::<E>(value).context("writing f64")
	}

	/// Writes a length as `i32`, failing for lengths beyond `i32::MAX`.
	fn write_count(&mut self, count: usize) -> Result<()> {
		let count = i32::try_from(count).context("element count does not fit into i32")?;
		self.write_i32(count)
	}
}
