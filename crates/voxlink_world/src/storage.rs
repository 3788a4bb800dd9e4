//! # Chunk Storage
//!
//! The block data of one chunk, in one of four encodings:
//!
//! | Variant    | Holds                                | Read cost        |
//! |------------|--------------------------------------|------------------|
//! | `Void`     | nothing, every cell is air           | constant         |
//! | `Single`   | one raw ID for the whole chunk       | constant         |
//! | `Simple`   | dense pooled `u32` array             | one index        |
//! | `Paletted` | distinct raw IDs + packed indices    | shift and mask   |
//!
//! Callers only go through [`ChunkStorage::get_block`] and
//! [`ChunkStorage::set_block`]. A write that the current encoding cannot
//! represent promotes the storage in place:
//!
//! ```text
//! Void ──write non-air──▶ Simple (filled with air)
//! Single(b) ──write ≠ b──▶ Simple (filled with b)
//! ```
//!
//! ## Wire Format
//!
//! ```text
//! [tag: i32] [payload]
//!   0 Single   : [raw: u32]
//!   1 Simple   : [raw: u32] x 32768
//!   2 Void     : nothing
//!   3 Paletted : [paletteLen: i32] [raw: u32]* [bits: u8] [byteLen: i32] [packed]
//! ```
//!
//! Raw IDs on the wire belong to the sender's registry. Decoding translates
//! each one through a [`RawIdRemap`] and fails on any ID with no local block.

use std::sync::Arc;

use voxlink_core::{ArrayPool, CodecError, CoreError, PooledArray, RawId, RawIdRemap, WireReader, WireWriter, AIR_RAW};

use crate::chunk::CHUNK_VOLUME;
use crate::error::{WorldError, WorldResult};
use crate::palette::PalettedArray;

/// Palettes with at most this many entries are worth sending paletted.
pub const PALETTE_THRESHOLD: usize = 256;

/// Wire tag of each storage variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StorageKind {
    /// One value for the whole chunk.
    Single = 0,
    /// Dense array.
    Simple = 1,
    /// No data.
    Void = 2,
    /// Palette plus packed indices.
    Paletted = 3,
}

impl StorageKind {
    /// Parses a wire tag.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownStorageTag`] for anything else.
    pub const fn from_tag(tag: i32) -> WorldResult<Self> {
        match tag {
            0 => Ok(Self::Single),
            1 => Ok(Self::Simple),
            2 => Ok(Self::Void),
            3 => Ok(Self::Paletted),
            other => Err(WorldError::UnknownStorageTag(other)),
        }
    }
}

/// Dense storage over a pooled array. The array returns to the pool on drop.
#[derive(Clone, Debug)]
pub struct SimpleStorage {
    blocks: PooledArray,
}

impl SimpleStorage {
    /// Every cell set to `raw`.
    #[must_use]
    pub fn filled(pool: &Arc<ArrayPool>, raw: RawId) -> Self {
        Self {
            blocks: pool.rent_filled(CHUNK_VOLUME, raw),
        }
    }

    /// Wraps a written pooled array.
    ///
    /// # Panics
    ///
    /// If the array is not exactly one chunk long.
    #[must_use]
    pub fn from_array(blocks: PooledArray) -> Self {
        assert_eq!(blocks.len(), CHUNK_VOLUME, "simple storage needs a full chunk");
        Self { blocks }
    }

    /// The dense cells.
    #[inline]
    #[must_use]
    pub fn blocks(&self) -> &[RawId] {
        &self.blocks
    }
}

/// The block data of one chunk.
#[derive(Clone, Debug, Default)]
pub enum ChunkStorage {
    /// Outside simulation range; every cell reads as air.
    #[default]
    Void,
    /// The whole chunk holds one block.
    Single(RawId),
    /// One raw ID per cell.
    Simple(SimpleStorage),
    /// A palette of raw IDs with packed per-cell indices.
    Paletted(PalettedArray<RawId>),
}

impl ChunkStorage {
    /// Which variant this is.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> StorageKind {
        match self {
            Self::Void => StorageKind::Void,
            Self::Single(_) => StorageKind::Single,
            Self::Simple(_) => StorageKind::Simple,
            Self::Paletted(_) => StorageKind::Paletted,
        }
    }

    /// Block at a cell index.
    ///
    /// # Panics
    ///
    /// If `index >= CHUNK_VOLUME` on an array-backed variant.
    #[inline]
    #[must_use]
    pub fn get_block(&self, index: usize) -> RawId {
        match self {
            Self::Void => AIR_RAW,
            Self::Single(raw) => *raw,
            Self::Simple(simple) => simple.blocks[index],
            Self::Paletted(palette) => *palette.get_value(index),
        }
    }

    /// Writes a block, promoting `Void`/`Single` to `Simple` when the write
    /// differs from the uniform value.
    ///
    /// Returns true if the cell changed.
    pub fn set_block(&mut self, index: usize, raw: RawId, pool: &Arc<ArrayPool>) -> bool {
        assert!(index < CHUNK_VOLUME, "cell {index} out of range");
        match self {
            Self::Void | Self::Single(_) => {
                let uniform = self.get_block(index);
                if uniform == raw {
                    return false;
                }
                let mut simple = SimpleStorage::filled(pool, uniform);
                simple.blocks[index] = raw;
                tracing::trace!(from = ?self.kind(), "chunk storage promoted to simple");
                *self = Self::Simple(simple);
                true
            }
            Self::Simple(simple) => {
                let changed = simple.blocks[index] != raw;
                simple.blocks[index] = raw;
                changed
            }
            Self::Paletted(palette) => {
                let changed = *palette.get_value(index) != raw;
                if changed {
                    palette.set_value(index, raw);
                }
                changed
            }
        }
    }

    /// An independent copy. Array-backed variants rent a fresh array.
    #[must_use]
    pub fn generate_copy(&self) -> Self {
        self.clone()
    }

    /// The block every cell holds, if the chunk is uniform.
    #[must_use]
    pub fn uniform_value(&self) -> Option<RawId> {
        match self {
            Self::Void => Some(AIR_RAW),
            Self::Single(raw) => Some(*raw),
            Self::Simple(simple) => {
                let first = simple.blocks[0];
                simple.blocks.iter().all(|&b| b == first).then_some(first)
            }
            Self::Paletted(palette) => palette.uniform_value().copied(),
        }
    }

    /// Re-encodes into the smallest fitting variant.
    ///
    /// Uniform storage becomes `Single`; a `Simple` with at most
    /// [`PALETTE_THRESHOLD`] distinct blocks becomes `Paletted`. `Void`
    /// stays `Void`.
    #[must_use]
    pub fn compact(&self) -> Self {
        if matches!(self, Self::Void) {
            return Self::Void;
        }
        if let Some(raw) = self.uniform_value() {
            return Self::Single(raw);
        }
        match self {
            Self::Simple(simple) => {
                let mut palette = PalettedArray::new(CHUNK_VOLUME, simple.blocks[0]);
                for (index, &raw) in simple.blocks.iter().enumerate() {
                    palette.set_value(index, raw);
                    if palette.palette().len() > PALETTE_THRESHOLD {
                        return self.clone();
                    }
                }
                Self::Paletted(palette)
            }
            other => other.clone(),
        }
    }

    /// Writes the tagged storage frame.
    ///
    /// # Errors
    ///
    /// Only if a length does not fit the wire's `i32` prefix.
    pub fn write(&self, writer: &mut WireWriter) -> WorldResult<()> {
        writer.write_i32(self.kind() as i32);
        match self {
            Self::Void => {}
            Self::Single(raw) => writer.write_u32(*raw),
            Self::Simple(simple) => writer.write_u32_slice(&simple.blocks),
            Self::Paletted(palette) => {
                let entries = palette.palette();
                writer.write_i32(wire_len(entries.len())?);
                for &raw in entries {
                    writer.write_u32(raw);
                }
                // bits never exceeds 32
                writer.write_u8(palette.bits() as u8);
                writer.write_bytes(palette.packed())?;
            }
        }
        Ok(())
    }

    /// Reads a tagged storage frame, translating raw IDs through `remap`.
    ///
    /// # Errors
    ///
    /// - [`WorldError::UnknownStorageTag`] for an unknown tag
    /// - [`WorldError::InvalidRawId`] for a raw ID with no local block
    /// - [`WorldError::InvalidPalette`] for an inconsistent paletted payload
    /// - [`WorldError::Codec`] on truncated data
    pub fn read(reader: &mut WireReader, remap: &RawIdRemap, pool: &Arc<ArrayPool>) -> WorldResult<Self> {
        let kind = StorageKind::from_tag(reader.read_i32()?)?;
        let storage = match kind {
            StorageKind::Void => Self::Void,
            StorageKind::Single => Self::Single(translate(remap, reader.read_u32()?)?),
            StorageKind::Simple => {
                let mut blocks = pool.rent(CHUNK_VOLUME).read_from(reader)?;
                for raw in blocks.iter_mut() {
                    *raw = translate(remap, *raw)?;
                }
                Self::Simple(SimpleStorage { blocks })
            }
            StorageKind::Paletted => {
                let count = reader.read_len()?;
                if count > reader.remaining() / 4 {
                    return Err(CodecError::LengthOutOfRange(count as i64).into());
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push(translate(remap, reader.read_u32()?)?);
                }
                let bits = u32::from(reader.read_u8()?);
                let packed = reader.read_bytes()?.to_vec();
                Self::Paletted(PalettedArray::from_parts(CHUNK_VOLUME, entries, bits, packed)?)
            }
        };
        Ok(storage)
    }
}

fn translate(remap: &RawIdRemap, raw: RawId) -> WorldResult<RawId> {
    remap.translate(raw).map_err(|err| match err {
        CoreError::UnknownRawId { raw, .. } => WorldError::InvalidRawId(raw),
        other => WorldError::Core(other),
    })
}

fn wire_len(len: usize) -> WorldResult<i32> {
    i32::try_from(len).map_err(|_| CodecError::LengthOutOfRange(len as i64).into())
}
