//! # Packet Catalogs
//!
//! The ordered list of packet types one side knows for one direction.
//! Registration order is the enumeration order a [`PacketMap`] assigns raw
//! IDs from, so it is explicit and stable.
//!
//! [`PacketMap`]: crate::PacketMap

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use super::packet::{Clientbound, Direction, Packet, Serverbound};
use super::packets::{
    ChunkData, ClientDisconnect, ClientHandshakeDone, ClientHello, CompressedChunkData,
    EntityRemove, EntitySpawn,
    EntityUpdate, HandshakeDone, PlaceBlock, PlayerMove, RegistrySync, ServerDisconnect,
    UnloadChunk,
};
use crate::pool::{PacketPool, PooledPacket};

/// One known packet type.
#[derive(Clone, Copy)]
pub struct CatalogEntry {
    name: &'static str,
    type_id: TypeId,
    acquire: fn(&Arc<PacketPool>) -> PooledPacket,
}

impl CatalogEntry {
    fn of<T: Packet>() -> Self {
        Self {
            name: T::NAME,
            type_id: TypeId::of::<T>(),
            acquire: PacketPool::acquire::<T>,
        }
    }

    /// Map name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Runtime type.
    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Takes a fresh instance of this type from `pool`.
    #[must_use]
    pub fn acquire(&self, pool: &Arc<PacketPool>) -> PooledPacket {
        (self.acquire)(pool)
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

/// Ordered packet types for direction `D`.
pub struct PacketCatalog<D: Direction> {
    entries: Vec<CatalogEntry>,
    _direction: PhantomData<D>,
}

impl<D: Direction> PacketCatalog<D> {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            _direction: PhantomData,
        }
    }

    /// Appends `T`. Registering a type twice is a no-op.
    #[must_use]
    pub fn with<T: Packet<Direction = D>>(mut self) -> Self {
        if self.entries.iter().all(|e| e.type_id != TypeId::of::<T>()) {
            self.entries.push(CatalogEntry::of::<T>());
        }
        self
    }

    /// Freezes the catalog for sharing between connections.
    #[must_use]
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Entries in enumeration order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Looks a type up by map name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Number of packet types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true for an empty catalog.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<D: Direction> Default for PacketCatalog<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketCatalog<Serverbound> {
    /// Every packet a client sends.
    #[must_use]
    pub fn serverbound() -> Self {
        Self::new()
            .with::<ClientHello>()
            .with::<ClientHandshakeDone>()
            .with::<PlayerMove>()
            .with::<PlaceBlock>()
            .with::<ClientDisconnect>()
    }
}

impl PacketCatalog<Clientbound> {
    /// Every packet the server sends.
    #[must_use]
    pub fn clientbound() -> Self {
        Self::new()
            .with::<RegistrySync>()
            .with::<HandshakeDone>()
            .with::<ChunkData>()
            .with::<CompressedChunkData>()
            .with::<UnloadChunk>()
            .with::<EntitySpawn>()
            .with::<EntityUpdate>()
            .with::<EntityRemove>()
            .with::<ServerDisconnect>()
    }
}
