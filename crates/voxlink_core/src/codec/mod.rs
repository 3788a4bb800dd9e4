//! # Wire Codec
//!
//! Binary encode/decode of primitives and small composites.
//!
//! ## Format
//!
//! - All multi-byte integers and floats are little-endian
//! - Strings: `[len: i32][utf8 bytes]`, never empty
//! - Byte blobs: `[len: i32][bytes]`
//! - GUIDs: 16 raw bytes
//! - Var-ints: LEB128, at most 5 bytes for a `u32`
//!
//! ## Buffers
//!
//! Both sides own their buffers and keep them between uses. A writer is
//! `reset` and refilled; a reader is re-`load`ed. Steady-state traffic
//! therefore does not allocate.

mod compressed;
mod reader;
mod writer;

pub use compressed::{CompressedReader, CompressedWriter, MAX_DECOMPRESSED_SIZE};
pub use reader::WireReader;
pub use writer::WireWriter;

/// Maximum encoded length of a `u32` var-int.
pub const MAX_VAR_INT_LEN: usize = 5;
