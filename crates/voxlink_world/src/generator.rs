//! # Chunk Generation
//!
//! Terrain heuristics live outside this crate; a generator only has to turn
//! a chunk position into storage. [`FlatGenerator`] is the built-in layered
//! world used by the server when nothing else is configured.

use std::sync::Arc;

use voxlink_core::{ArrayPool, RawId, AIR_RAW};

use crate::chunk::{ChunkPos, LocalPos, CHUNK_SIZE, CHUNK_VOLUME};
use crate::storage::{ChunkStorage, SimpleStorage};

/// Produces the initial storage of a chunk.
pub trait ChunkGenerator: Send + Sync {
    /// Generates the chunk at `pos`.
    fn generate(&self, pos: ChunkPos, pool: &Arc<ArrayPool>) -> ChunkStorage;
}

/// Horizontal layers: `base` below the surface, `filler` for the few
/// blocks under it, `top` at the surface and air above.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatGenerator {
    surface: i32,
    base: RawId,
    filler: RawId,
    top: RawId,
    filler_depth: i32,
}

impl FlatGenerator {
    /// Surface height used by [`FlatGenerator::new`].
    pub const DEFAULT_SURFACE: i32 = 15;

    /// Creates a generator with the given layer blocks.
    #[must_use]
    pub const fn new(base: RawId, filler: RawId, top: RawId) -> Self {
        Self {
            surface: Self::DEFAULT_SURFACE,
            base,
            filler,
            top,
            filler_depth: 3,
        }
    }

    /// Sets the world Y of the top layer.
    #[must_use]
    pub const fn with_surface(mut self, surface: i32) -> Self {
        self.surface = surface;
        self
    }

    /// Block at a world height.
    #[must_use]
    pub const fn block_at(&self, y: i32) -> RawId {
        if y > self.surface {
            AIR_RAW
        } else if y == self.surface {
            self.top
        } else if y >= self.surface - self.filler_depth {
            self.filler
        } else {
            self.base
        }
    }
}

impl ChunkGenerator for FlatGenerator {
    fn generate(&self, pos: ChunkPos, pool: &Arc<ArrayPool>) -> ChunkStorage {
        let min_y = pos.origin()[1];
        let max_y = min_y + CHUNK_SIZE as i32 - 1;
        if min_y > self.surface {
            return ChunkStorage::Void;
        }
        if self.block_at(min_y) == self.block_at(max_y) && max_y < self.surface - self.filler_depth {
            return ChunkStorage::Single(self.base);
        }
        let blocks = pool
            .rent(CHUNK_VOLUME)
            .fill_with(|index| self.block_at(min_y + i32::from(LocalPos::from_index(index).y())));
        ChunkStorage::Simple(SimpleStorage::from_array(blocks))
    }
}
