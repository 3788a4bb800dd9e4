//! # Content Database
//!
//! Blocks and entity kinds declared by content packs.
//!
//! ## Load Order
//!
//! 1. `clear()` (between sessions or on reload)
//! 2. `load_pack(..)` for each pack, in any order the host chooses
//! 3. `finish()` mints raw IDs for every registry
//!
//! `finish()` always gives `core:air` raw 0, whatever order the packs
//! registered it in, and fails if no pack registered it. Chunk storage relies
//! on that: a `Void` chunk and an unloaded position both read as raw 0 on
//! every peer.

use crate::error::{CoreError, CoreResult};
use crate::key::ResourceKey;
use crate::registry::{RawId, Registry};

/// Raw ID of `core:air` in every finished database.
pub const AIR_RAW: RawId = 0;

/// Registry name for blocks.
pub const BLOCKS_REGISTRY: &str = "blocks";

/// Registry name for entity kinds.
pub const ENTITIES_REGISTRY: &str = "entities";

/// A block type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    /// Stable identifier.
    pub key: ResourceKey,
    /// Whether the block occupies its cell for collision and meshing.
    pub solid: bool,
}

impl Block {
    /// Creates a solid block.
    #[must_use]
    pub fn solid(key: ResourceKey) -> Self {
        Self { key, solid: true }
    }

    /// Creates a non-solid block.
    #[must_use]
    pub fn passable(key: ResourceKey) -> Self {
        Self { key, solid: false }
    }
}

/// An entity type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityKind {
    /// Stable identifier.
    pub key: ResourceKey,
    /// Health a fresh entity spawns with.
    pub max_health: u16,
}

/// A unit of content that registers blocks and entity kinds.
pub trait ContentPack {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Registers this pack's content.
    fn load(&self, content: &mut ContentDatabase) -> CoreResult<()>;
}

/// Built-in content: air, stone, dirt, grass and the player entity.
pub struct CorePack;

impl ContentPack for CorePack {
    fn name(&self) -> &str {
        "core"
    }

    fn load(&self, content: &mut ContentDatabase) -> CoreResult<()> {
        content.register_block(Block::passable(ResourceKey::core("air")))?;
        content.register_block(Block::solid(ResourceKey::core("stone")))?;
        content.register_block(Block::solid(ResourceKey::core("dirt")))?;
        content.register_block(Block::solid(ResourceKey::core("grass")))?;
        content.register_entity(EntityKind {
            key: ResourceKey::core("player"),
            max_health: 20,
        })?;
        Ok(())
    }
}

/// Every content registry of one session.
pub struct ContentDatabase {
    blocks: Registry<Block>,
    entities: Registry<EntityKind>,
    packs: Vec<String>,
}

impl ContentDatabase {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: Registry::new(BLOCKS_REGISTRY),
            entities: Registry::new(ENTITIES_REGISTRY),
            packs: Vec::new(),
        }
    }

    /// Creates a database with the core pack loaded and finished.
    ///
    /// # Errors
    ///
    /// Propagates registration failures from the core pack.
    pub fn with_core() -> CoreResult<Self> {
        let mut content = Self::new();
        content.load_pack(&CorePack)?;
        content.finish()?;
        Ok(content)
    }

    /// Runs a pack's registrations.
    ///
    /// # Errors
    ///
    /// Fails if the database is already finished or the pack registers a
    /// duplicate key.
    pub fn load_pack(&mut self, pack: &dyn ContentPack) -> CoreResult<()> {
        if self.is_finished() {
            return Err(CoreError::RegistryFrozen(BLOCKS_REGISTRY.to_owned()));
        }
        pack.load(self)?;
        tracing::info!(pack = pack.name(), "loaded content pack");
        self.packs.push(pack.name().to_owned());
        Ok(())
    }

    /// Mints raw IDs for every registry, with `core:air` at [`AIR_RAW`].
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::MissingAir`] if no pack registered `core:air`.
    pub fn finish(&mut self) -> CoreResult<()> {
        if !self.blocks.move_to_front(&ResourceKey::core("air")) {
            return Err(CoreError::MissingAir(BLOCKS_REGISTRY.to_owned()));
        }
        self.blocks.generate_ids();
        self.entities.generate_ids();
        tracing::info!(
            blocks = self.blocks.len(),
            entities = self.entities.len(),
            packs = self.packs.len(),
            "content finished"
        );
        Ok(())
    }

    /// Drops all content. Raw IDs from before this call are invalid.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.entities.clear();
        self.packs.clear();
    }

    /// Returns true once `finish` has run.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.blocks.is_frozen()
    }

    /// Names of the loaded packs, in load order.
    #[must_use]
    pub fn packs(&self) -> &[String] {
        &self.packs
    }

    /// Registers a block under its own key.
    ///
    /// # Errors
    ///
    /// Fails if the key is already registered or the database is finished.
    pub fn register_block(&mut self, block: Block) -> CoreResult<()> {
        self.blocks.register(block.key.clone(), block)
    }

    /// Registers an entity kind under its own key.
    ///
    /// # Errors
    ///
    /// Fails if the key is already registered or the database is finished.
    pub fn register_entity(&mut self, kind: EntityKind) -> CoreResult<()> {
        self.entities.register(kind.key.clone(), kind)
    }

    /// Block registry.
    #[must_use]
    pub const fn blocks(&self) -> &Registry<Block> {
        &self.blocks
    }

    /// Entity registry.
    #[must_use]
    pub const fn entities(&self) -> &Registry<EntityKind> {
        &self.entities
    }
}

impl Default for ContentDatabase {
    fn default() -> Self {
        Self::new()
    }
}
