//! # VOXLINK World
//!
//! Chunk storage for a voxel world of 32x32x32-block chunks.
//!
//! ## Core Components
//!
//! - [`ChunkStorage`]: Void / Single / Simple / Paletted block encodings,
//!   promoted transparently on write and (de)serialized with raw-ID remapping
//! - [`PalettedArray`]: generic palette + bit-packed index array
//! - [`Chunk`] and [`World`]: the loaded chunk map
//! - [`ChunkGenerator`]: the hook that fills newly loaded chunks
//!
//! ## Example
//!
//! ```rust
//! use voxlink_core::ArrayPool;
//! use voxlink_world::{ChunkStorage, StorageKind, CHUNK_VOLUME};
//!
//! let pool = ArrayPool::shared();
//! let mut storage = ChunkStorage::Single(1);
//! storage.set_block(0, 2, &pool);
//! assert_eq!(storage.kind(), StorageKind::Simple);
//! assert_eq!(storage.get_block(0), 2);
//! assert_eq!(storage.get_block(CHUNK_VOLUME - 1), 1);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod error;
pub mod generator;
pub mod palette;
pub mod storage;
pub mod world;

pub use chunk::{Chunk, ChunkPos, LocalPos, CHUNK_SIZE, CHUNK_VOLUME};
pub use error::{WorldError, WorldResult};
pub use generator::{ChunkGenerator, FlatGenerator};
pub use palette::PalettedArray;
pub use storage::{ChunkStorage, SimpleStorage, StorageKind, PALETTE_THRESHOLD};
pub use world::World;
