//! LZ4-compressed codec variant.
//!
//! Frame: `[len: i32][lz4 block]`, where the block itself starts with the
//! little-endian `u32` uncompressed size (`lz4_flex` size-prepended format).

use std::ops::{Deref, DerefMut};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use super::{WireReader, WireWriter};
use crate::error::{CodecError, CodecResult};

/// Largest uncompressed block a reader will expand.
///
/// A full dense chunk is 128 KiB; this leaves headroom for paletted
/// payloads and entity batches without letting a hostile size prefix
/// force a huge allocation.
pub const MAX_DECOMPRESSED_SIZE: usize = 4 * 1024 * 1024;

/// Writer whose output is compressed as one block on [`CompressedWriter::finish_into`].
///
/// Derefs to a plain [`WireWriter`], so payload code is identical for both
/// variants.
#[derive(Default)]
pub struct CompressedWriter {
    raw: WireWriter,
}

impl CompressedWriter {
    /// Creates an empty compressed writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compresses everything written so far and appends the frame to `out`.
    ///
    /// The raw buffer is reset afterwards.
    ///
    /// # Errors
    ///
    /// Fails if the compressed block does not fit the wire's length prefix.
    pub fn finish_into(&mut self, out: &mut WireWriter) -> CodecResult<()> {
        let block = compress_prepend_size(self.raw.current_bytes());
        tracing::trace!(
            raw = self.raw.len(),
            compressed = block.len(),
            "compressed block"
        );
        out.write_bytes(&block)?;
        self.raw.reset();
        Ok(())
    }
}

impl Deref for CompressedWriter {
    type Target = WireWriter;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl DerefMut for CompressedWriter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.raw
    }
}

/// Reader that expands a compressed frame before delegating to [`WireReader`].
#[derive(Default)]
pub struct CompressedReader {
    inner: WireReader,
}

impl CompressedReader {
    /// Creates an empty compressed reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads one compressed frame from `source` and loads its contents.
    ///
    /// # Errors
    ///
    /// Fails on a truncated block or corrupt LZ4 data.
    pub fn load_from(&mut self, source: &mut WireReader) -> CodecResult<()> {
        let block = source.read_bytes()?;
        self.load_block(block)
    }

    /// Expands a size-prepended LZ4 block and loads its contents.
    ///
    /// # Errors
    ///
    /// Fails on corrupt LZ4 data.
    pub fn load_block(&mut self, block: &[u8]) -> CodecResult<()> {
        if block.len() < 4 {
            return Err(CodecError::Underrun {
                needed: 4,
                remaining: block.len(),
            });
        }
        let declared = u32::from_le_bytes([block[0], block[1], block[2], block[3]]) as usize;
        if declared > MAX_DECOMPRESSED_SIZE {
            return Err(CodecError::LengthOutOfRange(declared as i64));
        }
        let data =
            decompress_size_prepended(block).map_err(|e| CodecError::Decompress(e.to_string()))?;
        self.inner.load_data(&data);
        Ok(())
    }
}

impl Deref for CompressedReader {
    type Target = WireReader;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for CompressedReader {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_frame_roundtrip() {
        let mut compressed = CompressedWriter::new();
        compressed.write_u32(0xDEAD_BEEF);
        compressed.write_u32_slice(&[1u32; 4096]);
        compressed.write_string("tail").unwrap();

        let mut out = WireWriter::new();
        out.write_u8(42);
        compressed.finish_into(&mut out).unwrap();
        assert!(compressed.is_empty());
        // Uniform data shrinks well below its 16 KiB raw size.
        assert!(out.len() < 1024, "frame is {} bytes", out.len());

        let mut source = WireReader::new();
        source.load_data(out.current_bytes());
        assert_eq!(source.read_u8().unwrap(), 42);

        let mut reader = CompressedReader::new();
        reader.load_from(&mut source).unwrap();
        assert_eq!(source.remaining(), 0);
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        let mut values = vec![0u32; 4096];
        reader.read_u32_into(&mut values).unwrap();
        assert!(values.iter().all(|&v| v == 1));
        assert_eq!(reader.read_string().unwrap(), "tail");
    }

    #[test]
    fn test_rejects_oversized_declaration() {
        let mut block = (u32::MAX).to_le_bytes().to_vec();
        block.extend_from_slice(&[0u8; 8]);
        let mut reader = CompressedReader::new();
        assert!(matches!(
            reader.load_block(&block),
            Err(CodecError::LengthOutOfRange(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        let mut block = 64u32.to_le_bytes().to_vec();
        block.extend_from_slice(&[0xFF; 3]);
        let mut reader = CompressedReader::new();
        assert!(matches!(reader.load_block(&block), Err(CodecError::Decompress(_))));
    }
}
