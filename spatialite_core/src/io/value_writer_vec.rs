//! `ValueWriterVec` collects written values in a growable buffer.
//!
//! # Examples
//!
//! ```rust
//! use spatialite_core::io::{ValueWriter, ValueWriterVec};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let mut writer = ValueWriterVec::new_be();
//!     writer.write_i32(1)?;
//!     assert_eq!(writer.into_inner(), vec![0, 0, 0, 1]);
//!     Ok(())
//! }
//! ```

use super::ValueWriter;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::{
	io::{Cursor, Write},
	marker::PhantomData,
};

/// Writes into an in-memory `Vec<u8>` using the byte order `E`.
pub struct ValueWriterVec<E: ByteOrder> {
	_phantom: PhantomData<E>,
	cursor: Cursor<Vec<u8>>,
}

impl<E: ByteOrder> ValueWriterVec<E> {
	#[must_use]
	pub fn new() -> ValueWriterVec<E> {
		ValueWriterVec {
			_phantom: PhantomData,
			cursor: Cursor::new(Vec::new()),
		}
	}

	/// Returns the written bytes.
	#[must_use]
	pub fn into_inner(self) -> Vec<u8> {
		self.cursor.into_inner()
	}
}

impl<E: ByteOrder> Default for ValueWriterVec<E> {
	fn default() -> Self {
		Self::new()
	}
}

impl ValueWriterVec<LittleEndian> {
	#[must_use]
	pub fn new_le() -> ValueWriterVec<LittleEndian> {
		ValueWriterVec::new()
	}
}

impl ValueWriterVec<BigEndian> {
	#[must_use]
	pub fn new_be() -> ValueWriterVec<BigEndian> {
		ValueWriterVec::new()
	}
}

impl<E: ByteOrder> ValueWriter<E> for ValueWriterVec<E> {
	fn get_writer(&mut self) -> &mut dyn Write {
		&mut self.cursor
	}

	fn position(&mut self) -> u64 {
		self.cursor.position()
	}
}
