//! Growable little-endian writer.

use bytemuck::{bytes_of, Pod};
use uuid::Uuid;

use crate::error::{CodecError, CodecResult};

/// Initial capacity of a fresh writer.
const DEFAULT_CAPACITY: usize = 256;

/// Writes wire data into an owned, growable buffer.
///
/// The buffer is kept across [`WireWriter::reset`] calls so a long-lived
/// writer stops allocating once it has seen its largest message. Growth
/// doubles capacity.
pub struct WireWriter {
    buffer: Vec<u8>,
    position: usize,
}

impl WireWriter {
    /// Creates a writer with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a writer with at least `capacity` bytes of room.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity.max(1)],
            position: 0,
        }
    }

    /// Rewinds to position 0. The buffer is kept.
    #[inline]
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.position
    }

    /// Returns true if nothing has been written since the last reset.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Returns the current buffer capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Returns exactly the written prefix.
    #[inline]
    #[must_use]
    pub fn current_bytes(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    fn reserve(&mut self, additional: usize) {
        let needed = self.position + additional;
        if needed <= self.buffer.len() {
            return;
        }
        let mut capacity = self.buffer.len().max(1);
        while capacity < needed {
            capacity *= 2;
        }
        self.buffer.resize(capacity, 0);
    }

    /// Appends bytes without a length prefix.
    #[inline]
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.reserve(bytes.len());
        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.write_raw(&[value]);
    }

    /// Writes a signed byte.
    #[inline]
    pub fn write_i8(&mut self, value: i8) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Writes a bool as one byte.
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Writes a u16.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Writes an i16.
    #[inline]
    pub fn write_i16(&mut self, value: i16) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Writes a u32.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Writes an i32.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Writes a u64.
    #[inline]
    pub fn write_u64(&mut self, value: u64) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Writes an i64.
    #[inline]
    pub fn write_i64(&mut self, value: i64) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Writes an f32.
    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Writes an f64.
    #[inline]
    pub fn write_f64(&mut self, value: f64) {
        self.write_raw(&value.to_le_bytes());
    }

    /// Writes a LEB128 var-int.
    pub fn write_var_u32(&mut self, mut value: u32) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.write_u8(byte);
                return;
            }
            self.write_u8(byte | 0x80);
        }
    }

    /// Writes a GUID as 16 raw bytes.
    #[inline]
    pub fn write_guid(&mut self, value: &Uuid) {
        self.write_raw(value.as_bytes());
    }

    /// Writes three f32s.
    #[inline]
    pub fn write_vec3(&mut self, value: [f32; 3]) {
        for component in value {
            self.write_f32(component);
        }
    }

    /// Writes three i32s.
    #[inline]
    pub fn write_ivec3(&mut self, value: [i32; 3]) {
        for component in value {
            self.write_i32(component);
        }
    }

    /// Writes every element of a u32 slice, no length prefix.
    pub fn write_u32_slice(&mut self, values: &[u32]) {
        self.reserve(values.len() * 4);
        for value in values {
            self.buffer[self.position..self.position + 4].copy_from_slice(&value.to_le_bytes());
            self.position += 4;
        }
    }

    /// Writes a Pod value in native layout.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) {
        self.write_raw(bytes_of(value));
    }

    fn write_len(&mut self, len: usize) -> CodecResult<()> {
        let len = i32::try_from(len).map_err(|_| CodecError::LengthOutOfRange(len as i64))?;
        self.write_i32(len);
        Ok(())
    }

    /// Writes a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Empty strings are rejected with [`CodecError::EmptyString`]; an empty
    /// string on the wire is treated as corruption by the reader.
    pub fn write_string(&mut self, value: &str) -> CodecResult<()> {
        if value.is_empty() {
            return Err(CodecError::EmptyString);
        }
        self.write_len(value.len())?;
        self.write_raw(value.as_bytes());
        Ok(())
    }

    /// Writes a length-prefixed byte blob. Empty blobs are allowed.
    ///
    /// # Errors
    ///
    /// Fails if `value` does not fit the wire's `i32` length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) -> CodecResult<()> {
        self.write_len(value.len())?;
        self.write_raw(value);
        Ok(())
    }
}

impl Default for WireWriter {
    fn default() -> Self {
        Self::new()
    }
}
