//! Bounds-checked forward reader.

use bytemuck::Pod;
use uuid::Uuid;

use super::MAX_VAR_INT_LEN;
use crate::error::{CodecError, CodecResult};

/// Reads wire data from an internally owned buffer.
///
/// [`WireReader::load_data`] copies the caller's bytes in, so the source
/// (a transport receive buffer, usually) can be reused immediately. The
/// internal buffer keeps its capacity across loads.
///
/// Reads are strictly forward. Any read past the loaded length fails with
/// [`CodecError::Underrun`] and leaves the position untouched.
pub struct WireReader {
    buffer: Vec<u8>,
    position: usize,
}

impl WireReader {
    /// Creates an empty reader.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            position: 0,
        }
    }

    /// Replaces the reader's contents with a copy of `data`.
    pub fn load_data(&mut self, data: &[u8]) {
        self.buffer.clear();
        self.buffer.extend_from_slice(data);
        self.position = 0;
    }

    /// Returns the number of unread bytes.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Returns the current read position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Returns the unread bytes without consuming them.
    #[inline]
    #[must_use]
    pub fn unread(&self) -> &[u8] {
        &self.buffer[self.position..]
    }

    /// Consumes `len` bytes.
    ///
    /// # Errors
    ///
    /// Fails on truncated or malformed input.
    pub fn read_raw(&mut self, len: usize) -> CodecResult<&[u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(CodecError::Underrun {
                needed: len,
                remaining,
            });
        }
        let start = self.position;
        self.position += len;
        Ok(&self.buffer[start..self.position])
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is empty.
    #[inline]
    pub fn read_u8(&mut self) -> CodecResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a signed byte.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is empty.
    #[inline]
    pub fn read_i8(&mut self) -> CodecResult<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    /// Reads a bool. Any non-zero byte is true.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is empty.
    #[inline]
    pub fn read_bool(&mut self) -> CodecResult<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a u16.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 2 bytes remain.
    #[inline]
    pub fn read_u16(&mut self) -> CodecResult<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Reads an i16.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 2 bytes remain.
    #[inline]
    pub fn read_i16(&mut self) -> CodecResult<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    /// Reads a u32.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 4 bytes remain.
    #[inline]
    pub fn read_u32(&mut self) -> CodecResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Reads an i32.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 4 bytes remain.
    #[inline]
    pub fn read_i32(&mut self) -> CodecResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Reads a u64.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 8 bytes remain.
    #[inline]
    pub fn read_u64(&mut self) -> CodecResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Reads an i64.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 8 bytes remain.
    #[inline]
    pub fn read_i64(&mut self) -> CodecResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Reads an f32.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 4 bytes remain.
    #[inline]
    pub fn read_f32(&mut self) -> CodecResult<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Reads an f64.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 8 bytes remain.
    #[inline]
    pub fn read_f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Reads a LEB128 var-int.
    ///
    /// # Errors
    ///
    /// Fails on truncated or malformed input.
    pub fn read_var_u32(&mut self) -> CodecResult<u32> {
        let mut value = 0u32;
        for i in 0..MAX_VAR_INT_LEN {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::VarIntTooLong)
    }

    /// Reads a 16-byte GUID.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 16 bytes remain.
    #[inline]
    pub fn read_guid(&mut self) -> CodecResult<Uuid> {
        Ok(Uuid::from_bytes(self.read_array()?))
    }

    /// Reads three f32s.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 12 bytes remain.
    pub fn read_vec3(&mut self) -> CodecResult<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    /// Reads three i32s.
    ///
    /// # Errors
    ///
    /// Fails if fewer than 12 bytes remain.
    pub fn read_ivec3(&mut self) -> CodecResult<[i32; 3]> {
        Ok([self.read_i32()?, self.read_i32()?, self.read_i32()?])
    }

    /// Fills `out` with u32s. Either all are read or none are.
    ///
    /// # Errors
    ///
    /// Fails on truncated or malformed input.
    pub fn read_u32_into(&mut self, out: &mut [u32]) -> CodecResult<()> {
        let bytes = self.read_raw(out.len() * 4)?;
        for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
            *slot = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }

    /// Reads a Pod value written by `WireWriter::write_pod`.
    ///
    /// # Errors
    ///
    /// Fails on truncated or malformed input.
    pub fn read_pod<T: Pod>(&mut self) -> CodecResult<T> {
        let bytes = self.read_raw(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Reads an `i32` length prefix and checks it against the remaining data.
    ///
    /// # Errors
    ///
    /// Fails on truncated or malformed input.
    pub fn read_len(&mut self) -> CodecResult<usize> {
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::LengthOutOfRange(i64::from(len)))?;
        if len > self.remaining() {
            return Err(CodecError::Underrun {
                needed: len,
                remaining: self.remaining(),
            });
        }
        Ok(len)
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Fails on truncated or malformed input.
    pub fn read_string(&mut self) -> CodecResult<String> {
        let len = self.read_len()?;
        if len == 0 {
            return Err(CodecError::EmptyString);
        }
        let bytes = self.read_raw(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Reads a length-prefixed byte blob.
    ///
    /// # Errors
    ///
    /// Fails on truncated or malformed input.
    pub fn read_bytes(&mut self) -> CodecResult<&[u8]> {
        let len = self.read_len()?;
        self.read_raw(len)
    }
}

impl Default for WireReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireWriter;

    fn reader_for(writer: &WireWriter) -> WireReader {
        let mut reader = WireReader::new();
        reader.load_data(writer.current_bytes());
        reader
    }

    #[test]
    fn test_primitives() {
        let mut writer = WireWriter::new();
        writer.write_u8(200);
        writer.write_i8(-5);
        writer.write_bool(true);
        writer.write_u16(65_000);
        writer.write_i32(-123_456);
        writer.write_u64(u64::MAX - 1);
        writer.write_f32(1.5);
        writer.write_f64(-2.25);
        writer.write_vec3([1.0, 2.0, 3.0]);
        writer.write_ivec3([-1, 0, 1]);

        let mut reader = reader_for(&writer);
        assert_eq!(reader.read_u8().unwrap(), 200);
        assert_eq!(reader.read_i8().unwrap(), -5);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_u16().unwrap(), 65_000);
        assert_eq!(reader.read_i32().unwrap(), -123_456);
        assert_eq!(reader.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.read_f64().unwrap(), -2.25);
        assert_eq!(reader.read_vec3().unwrap(), [1.0, 2.0, 3.0]);
        assert_eq!(reader.read_ivec3().unwrap(), [-1, 0, 1]);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_underrun_is_reported() {
        let mut reader = WireReader::new();
        reader.load_data(&[1, 2, 3]);
        assert_eq!(
            reader.read_u32(),
            Err(CodecError::Underrun { needed: 4, remaining: 3 })
        );
        // A failed read does not move the cursor.
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
    }

    #[test]
    fn test_load_copies_source() {
        let mut source = vec![7u8, 0, 0, 0];
        let mut reader = WireReader::new();
        reader.load_data(&source);
        source[0] = 9;
        assert_eq!(reader.read_u32().unwrap(), 7);
    }

    #[test]
    fn test_string_and_guid() {
        let id = Uuid::from_u128(0x0123_4567_89AB_CDEF_0123_4567_89AB_CDEF);
        let mut writer = WireWriter::new();
        writer.write_string("héllo").unwrap();
        writer.write_guid(&id);

        let mut reader = reader_for(&writer);
        assert_eq!(reader.read_string().unwrap(), "héllo");
        assert_eq!(reader.read_guid().unwrap(), id);
    }

    #[test]
    fn test_zero_length_string_is_corrupt() {
        let mut reader = WireReader::new();
        reader.load_data(&0i32.to_le_bytes());
        assert_eq!(reader.read_string(), Err(CodecError::EmptyString));
    }

    #[test]
    fn test_length_prefix_past_end() {
        let mut writer = WireWriter::new();
        writer.write_i32(100);
        writer.write_raw(b"short");
        let mut reader = reader_for(&writer);
        assert!(matches!(reader.read_bytes(), Err(CodecError::Underrun { .. })));

        let mut writer = WireWriter::new();
        writer.write_i32(-1);
        let mut reader = reader_for(&writer);
        assert_eq!(reader.read_bytes(), Err(CodecError::LengthOutOfRange(-1)));
    }

    #[test]
    fn test_var_int_bounds() {
        let mut writer = WireWriter::new();
        writer.write_var_u32(u32::MAX);
        writer.write_var_u32(16_384);
        let mut reader = reader_for(&writer);
        assert_eq!(reader.read_var_u32().unwrap(), u32::MAX);
        assert_eq!(reader.read_var_u32().unwrap(), 16_384);

        reader.load_data(&[0xFF; 6]);
        assert_eq!(reader.read_var_u32(), Err(CodecError::VarIntTooLong));
    }

    #[test]
    fn test_u32_slice() {
        let values: Vec<u32> = (0..100).map(|i| i * 3).collect();
        let mut writer = WireWriter::new();
        writer.write_u32_slice(&values);

        let mut reader = reader_for(&writer);
        let mut out = vec![0u32; 100];
        reader.read_u32_into(&mut out).unwrap();
        assert_eq!(out, values);
    }
}
