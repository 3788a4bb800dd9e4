//! # Network Protocol
//!
//! Packet types, their direction markers and the ordered catalogs that
//! packet maps are built from.
//!
//! ## Frame Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ rawPacketId (var-int, resolved through the PacketMap)        │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Payload (packet-specific, little-endian)                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The very first frame in each direction is the sender's packet map and
//! carries no raw packet ID.

mod catalog;
mod packet;
mod packets;

pub use catalog::{CatalogEntry, PacketCatalog};
pub use packet::{
    AnyPacket, C2SPacket, Clientbound, DecodeContext, Direction, Packet, S2CPacket, Serverbound,
};
pub use packets::{
    ChunkData, ClientDisconnect, ClientHandshakeDone, ClientHello, CompressedChunkData,
    EntityRemove, EntitySpawn, EntityUpdate, HandshakeDone, PlaceBlock, PlayerMove, RegistrySync, ServerDisconnect,
    UnloadChunk,
};

/// Protocol version both peers must agree on.
pub const PROTOCOL_VERSION: u32 = 1;
