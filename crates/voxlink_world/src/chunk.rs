//! # Chunk System
//!
//! The world is cut into cubic chunks of 32x32x32 blocks.
//!
//! ## Cell Layout
//!
//! ```text
//! index = x + z * 32 + y * 32 * 32
//! ```
//!
//! X varies fastest, then Z, then Y, so a horizontal layer is one contiguous
//! 1024-cell run.
//!
//! ## Threading
//!
//! A [`Chunk`] is mutated only by the thread that owns its [`World`]. Other
//! threads read a [`Chunk::snapshot`], never a live reference held across a
//! tick.
//!
//! [`World`]: crate::World

use std::sync::Arc;

use voxlink_core::{ArrayPool, CodecResult, RawId, WireReader, WireWriter};

use crate::storage::{ChunkStorage, StorageKind};

/// Chunk edge length in blocks.
pub const CHUNK_SIZE: usize = 32;

/// Cells per chunk.
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Chunk coordinate in the world grid (in chunks, not blocks).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl ChunkPos {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk containing a world block position.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block: [i32; 3]) -> Self {
        Self {
            x: block[0].div_euclid(CHUNK_SIZE as i32),
            y: block[1].div_euclid(CHUNK_SIZE as i32),
            z: block[2].div_euclid(CHUNK_SIZE as i32),
        }
    }

    /// World position of the chunk's minimum corner.
    #[inline]
    #[must_use]
    pub const fn origin(self) -> [i32; 3] {
        [
            self.x * CHUNK_SIZE as i32,
            self.y * CHUNK_SIZE as i32,
            self.z * CHUNK_SIZE as i32,
        ]
    }

    /// Chebyshev distance in chunks.
    #[inline]
    #[must_use]
    pub const fn distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        let dz = self.z.abs_diff(other.z);
        let xy = if dx > dy { dx } else { dy };
        if xy > dz {
            xy
        } else {
            dz
        }
    }

    /// Writes the position as three `i32`s.
    pub fn write(self, writer: &mut WireWriter) {
        writer.write_ivec3([self.x, self.y, self.z]);
    }

    /// Reads a position written by [`ChunkPos::write`].
    ///
    /// # Errors
    ///
    /// Fails on truncated input.
    pub fn read(reader: &mut WireReader) -> CodecResult<Self> {
        let [x, y, z] = reader.read_ivec3()?;
        Ok(Self { x, y, z })
    }
}

impl std::fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A block position inside one chunk, each axis in `0..32`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalPos {
    x: u8,
    y: u8,
    z: u8,
}

impl LocalPos {
    /// Creates a local position.
    ///
    /// # Panics
    ///
    /// If any axis is outside `0..32`.
    #[inline]
    #[must_use]
    pub const fn new(x: u8, y: u8, z: u8) -> Self {
        assert!(
            (x as usize) < CHUNK_SIZE && (y as usize) < CHUNK_SIZE && (z as usize) < CHUNK_SIZE,
            "local position out of range"
        );
        Self { x, y, z }
    }

    /// The local position of a world block inside its chunk.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block: [i32; 3]) -> Self {
        Self {
            x: block[0].rem_euclid(CHUNK_SIZE as i32) as u8,
            y: block[1].rem_euclid(CHUNK_SIZE as i32) as u8,
            z: block[2].rem_euclid(CHUNK_SIZE as i32) as u8,
        }
    }

    /// Inverse of [`LocalPos::index`].
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self {
            x: (index % CHUNK_SIZE) as u8,
            z: ((index / CHUNK_SIZE) % CHUNK_SIZE) as u8,
            y: (index / (CHUNK_SIZE * CHUNK_SIZE)) as u8,
        }
    }

    /// Cell index into chunk storage.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.x as usize + self.z as usize * CHUNK_SIZE + self.y as usize * CHUNK_SIZE * CHUNK_SIZE
    }

    /// X axis.
    #[inline]
    #[must_use]
    pub const fn x(self) -> u8 {
        self.x
    }

    /// Y axis.
    #[inline]
    #[must_use]
    pub const fn y(self) -> u8 {
        self.y
    }

    /// Z axis.
    #[inline]
    #[must_use]
    pub const fn z(self) -> u8 {
        self.z
    }

    /// Iterates every position in index order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..CHUNK_VOLUME).map(Self::from_index)
    }
}

/// A loaded chunk: its position, its active storage and a dirty flag.
#[derive(Debug)]
pub struct Chunk {
    pos: ChunkPos,
    storage: ChunkStorage,
    dirty: bool,
    pool: Arc<ArrayPool>,
}

impl Chunk {
    /// Creates a chunk with [`ChunkStorage::Void`].
    #[must_use]
    pub fn new(pos: ChunkPos, pool: Arc<ArrayPool>) -> Self {
        Self::with_storage(pos, ChunkStorage::Void, pool)
    }

    /// Creates a chunk around existing storage.
    #[must_use]
    pub fn with_storage(pos: ChunkPos, storage: ChunkStorage, pool: Arc<ArrayPool>) -> Self {
        Self {
            pos,
            storage,
            dirty: false,
            pool,
        }
    }

    /// Position in the chunk grid.
    #[inline]
    #[must_use]
    pub const fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Block at a local position.
    #[inline]
    #[must_use]
    pub fn get_block(&self, local: LocalPos) -> RawId {
        self.storage.get_block(local.index())
    }

    /// Sets a block. Promotes the storage when needed.
    ///
    /// Returns true if the cell changed.
    pub fn set_block(&mut self, local: LocalPos, raw: RawId) -> bool {
        let changed = self.storage.set_block(local.index(), raw, &self.pool);
        self.dirty |= changed;
        changed
    }

    /// The active storage.
    #[inline]
    #[must_use]
    pub const fn storage(&self) -> &ChunkStorage {
        &self.storage
    }

    /// Which storage variant is active.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> StorageKind {
        self.storage.kind()
    }

    /// Replaces the active storage. The old storage is released.
    pub fn set_storage(&mut self, storage: ChunkStorage) {
        self.storage = storage;
        self.dirty = true;
    }

    /// Independent copy of the storage, safe to move to another thread.
    #[must_use]
    pub fn snapshot(&self) -> ChunkStorage {
        self.storage.generate_copy()
    }

    /// Returns and clears the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// True if changed since the last [`Chunk::take_dirty`].
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        for index in [0, 1, 31, 32, 1023, 1024, CHUNK_VOLUME - 1] {
            assert_eq!(LocalPos::from_index(index).index(), index);
        }
        assert_eq!(LocalPos::new(1, 0, 0).index(), 1);
        assert_eq!(LocalPos::new(0, 0, 1).index(), 32);
        assert_eq!(LocalPos::new(0, 1, 0).index(), 1024);
        assert_eq!(LocalPos::all().count(), CHUNK_VOLUME);
    }

    #[test]
    fn test_negative_block_positions() {
        let block = [-1, 33, -32];
        assert_eq!(ChunkPos::from_block_pos(block), ChunkPos::new(-1, 1, -1));
        let local = LocalPos::from_block_pos(block);
        assert_eq!((local.x(), local.y(), local.z()), (31, 1, 0));
    }

    #[test]
    fn test_distance() {
        let a = ChunkPos::new(0, 0, 0);
        assert_eq!(a.distance(ChunkPos::new(2, -1, 1)), 2);
        assert_eq!(a.distance(a), 0);
    }

    #[test]
    fn test_set_block_promotes_and_marks_dirty() {
        let pool = ArrayPool::shared();
        let mut chunk = Chunk::with_storage(ChunkPos::default(), ChunkStorage::Single(2), pool);
        assert!(!chunk.set_block(LocalPos::new(3, 3, 3), 2));
        assert!(!chunk.take_dirty());

        assert!(chunk.set_block(LocalPos::new(3, 3, 3), 1));
        assert_eq!(chunk.kind(), StorageKind::Simple);
        assert!(chunk.take_dirty());
        assert!(!chunk.is_dirty());
        assert_eq!(chunk.get_block(LocalPos::new(3, 3, 3)), 1);
        assert_eq!(chunk.get_block(LocalPos::new(0, 0, 0)), 2);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let pool = ArrayPool::shared();
        let mut chunk = Chunk::new(ChunkPos::default(), pool);
        chunk.set_block(LocalPos::new(0, 0, 0), 3);
        let snapshot = chunk.snapshot();
        chunk.set_block(LocalPos::new(0, 0, 0), 1);
        assert_eq!(snapshot.get_block(0), 3);
        assert_eq!(chunk.get_block(LocalPos::new(0, 0, 0)), 1);
    }
}
