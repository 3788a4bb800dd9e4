//! # VOXLINK Core
//!
//! Leaf types shared by the world and networking crates:
//!
//! - [`ResourceKey`]: stable `namespace:name` content identifiers
//! - [`Registry`]: key <-> raw ID <-> entry tables with generation semantics
//! - [`ContentDatabase`]: content-pack loading and registry sync
//! - [`codec`]: little-endian wire reader/writer plus an LZ4 variant
//! - [`memory`]: the shared array pool behind dense chunk storage
//!
//! ## Example
//!
//! ```rust
//! use voxlink_core::{ContentDatabase, ResourceKey};
//!
//! let content = ContentDatabase::with_core().unwrap();
//! let stone = content.blocks().key_to_raw(&ResourceKey::core("stone"));
//! assert_eq!(stone, Some(1));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod content;
pub mod error;
pub mod key;
pub mod memory;
pub mod registry;
pub mod sync;

pub use codec::{CompressedReader, CompressedWriter, WireReader, WireWriter};
pub use content::{Block, ContentDatabase, ContentPack, CorePack, EntityKind, AIR_RAW};
pub use error::{CodecError, CodecResult, CoreError, CoreResult};
pub use key::ResourceKey;
pub use memory::{ArrayPool, DirtyArray, PoolStats, PooledArray};
pub use registry::{RawId, Registry};
pub use sync::{ContentRemap, RawIdRemap};
