//! Value readers and writers for binary encodings with either byte order.
//!
//! The SpatiaLite BLOB format declares its byte order in the header, so decoders pick
//! `ValueReaderSlice::new_le` or `ValueReaderSlice::new_be` at runtime and stay generic
//! over [`byteorder::ByteOrder`] afterwards.

mod value_reader;
mod value_reader_slice;
mod value_writer;
mod value_writer_vec;

pub use value_reader::*;
pub use value_reader_slice::*;
pub use value_writer::*;
pub use value_writer_vec::*;
