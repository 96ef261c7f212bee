//! Codec for the SpatiaLite geometry BLOB format.
//!
//! ## Layout
//!
//! ```text
//! 0x00                 start
//! 0x00 | 0x01          byte order (big | little endian)
//! i32                  SRID
//! f64 x4               MBR: min x, min y, max x, max y
//! 0x7C                 end of MBR
//! i32                  class type
//! ...                  geometry body
//! 0xFE                 end
//! ```
//!
//! The class type encodes the kind (`% 1000`: 1 point ... 6 multi polygon), the
//! dimension (`+1000` XYZ, `+2000` XYM, `+3000` XYZM) and compression (`+1000000`,
//! line strings and polygons only). Members of multi geometries are prefixed with the
//! entity marker `0x69` and their own class type.
//!
//! Newer SpatiaLite versions write single points as "TinyPoint": byte order marker
//! `0x80`/`0x81`, SRID, a one-byte dimension code, the coordinates and `0xFE`.

mod decode;
mod encode;
mod header;

pub use decode::*;
pub use encode::*;
pub use header::*;
