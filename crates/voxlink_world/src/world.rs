//! # World
//!
//! The loaded chunk map. Both the server and each client own one; the server
//! fills it from a [`ChunkGenerator`], the client from chunk packets.
//!
//! [`ChunkGenerator`]: crate::ChunkGenerator

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use voxlink_core::{ArrayPool, RawId, AIR_RAW};

use crate::chunk::{Chunk, ChunkPos, LocalPos};
use crate::storage::ChunkStorage;

/// Loaded chunks keyed by position.
#[derive(Debug)]
pub struct World {
    chunks: HashMap<ChunkPos, Chunk>,
    pool: Arc<ArrayPool>,
}

impl World {
    /// Creates an empty world whose dense storages rent from `pool`.
    #[must_use]
    pub fn new(pool: Arc<ArrayPool>) -> Self {
        Self {
            chunks: HashMap::new(),
            pool,
        }
    }

    /// The array pool shared by this world's chunks.
    #[must_use]
    pub fn pool(&self) -> &Arc<ArrayPool> {
        &self.pool
    }

    /// Returns the chunk at `pos`, creating a `Void` one if absent.
    pub fn get_or_create_chunk(&mut self, pos: ChunkPos) -> &mut Chunk {
        let pool = &self.pool;
        self.chunks
            .entry(pos)
            .or_insert_with(|| Chunk::new(pos, Arc::clone(pool)))
    }

    /// The chunk at `pos`, if loaded.
    #[must_use]
    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    /// Replaces a chunk's storage, loading the chunk if needed.
    pub fn set_storage(&mut self, pos: ChunkPos, storage: ChunkStorage) {
        self.get_or_create_chunk(pos).set_storage(storage);
    }

    /// Loads freshly generated storage. Unlike [`World::set_storage`] the
    /// chunk is not marked dirty.
    pub fn load_chunk(&mut self, pos: ChunkPos, storage: ChunkStorage) -> &mut Chunk {
        let chunk = Chunk::with_storage(pos, storage, Arc::clone(&self.pool));
        match self.chunks.entry(pos) {
            Entry::Occupied(mut slot) => {
                slot.insert(chunk);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(chunk),
        }
    }

    /// Unloads a chunk. Returns true if it was loaded.
    pub fn unload_chunk(&mut self, pos: ChunkPos) -> bool {
        let removed = self.chunks.remove(&pos).is_some();
        if removed {
            tracing::trace!(%pos, "chunk unloaded");
        }
        removed
    }

    /// Block at a world position. Unloaded chunks read as air.
    #[must_use]
    pub fn get_block(&self, block: [i32; 3]) -> RawId {
        self.chunks
            .get(&ChunkPos::from_block_pos(block))
            .map_or(AIR_RAW, |chunk| chunk.get_block(LocalPos::from_block_pos(block)))
    }

    /// Sets a block at a world position, loading its chunk if needed.
    ///
    /// Returns true if the block changed.
    pub fn set_block(&mut self, block: [i32; 3], raw: RawId) -> bool {
        self.get_or_create_chunk(ChunkPos::from_block_pos(block))
            .set_block(LocalPos::from_block_pos(block), raw)
    }

    /// Number of loaded chunks.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    /// Positions of every loaded chunk.
    pub fn positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.keys().copied()
    }

    /// Positions of chunks changed since the last drain. Clears their flags.
    pub fn drain_dirty(&mut self) -> Vec<ChunkPos> {
        let mut dirty: Vec<ChunkPos> = self
            .chunks
            .values_mut()
            .filter_map(|chunk| chunk.take_dirty().then_some(chunk.pos()))
            .collect();
        dirty.sort_unstable();
        dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageKind;

    #[test]
    fn test_unloaded_reads_air() {
        let world = World::new(ArrayPool::shared());
        assert_eq!(world.get_block([100, -5, 3]), AIR_RAW);
        assert_eq!(world.loaded_count(), 0);
    }

    #[test]
    fn test_set_block_across_chunks() {
        let mut world = World::new(ArrayPool::shared());
        assert!(world.set_block([-1, 0, 0], 2));
        assert!(world.set_block([32, 0, 0], 3));
        assert_eq!(world.loaded_count(), 2);
        assert_eq!(world.get_block([-1, 0, 0]), 2);
        assert_eq!(world.get_block([32, 0, 0]), 3);
        assert_eq!(world.get_block([0, 0, 0]), AIR_RAW);
        assert_eq!(
            world.drain_dirty(),
            vec![ChunkPos::new(-1, 0, 0), ChunkPos::new(1, 0, 0)]
        );
        assert!(world.drain_dirty().is_empty());
    }

    #[test]
    fn test_set_storage_and_unload() {
        let mut world = World::new(ArrayPool::shared());
        let pos = ChunkPos::new(0, 1, 0);
        world.set_storage(pos, ChunkStorage::Single(1));
        assert_eq!(world.chunk(pos).map(Chunk::kind), Some(StorageKind::Single));
        assert_eq!(world.get_block([5, 40, 5]), 1);
        assert!(world.drain_dirty().contains(&pos));
        assert!(world.unload_chunk(pos));
        assert!(!world.unload_chunk(pos));
        assert_eq!(world.get_block([5, 40, 5]), AIR_RAW);

        world.load_chunk(pos, ChunkStorage::Single(2));
        assert_eq!(world.get_block([5, 40, 5]), 2);
        assert!(world.drain_dirty().is_empty());
    }
}
