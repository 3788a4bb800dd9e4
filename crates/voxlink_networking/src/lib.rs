//! # VOXLINK Networking
//!
//! Client/server session protocol for a voxel world over a reliable, ordered
//! channel.
//!
//! ## Architecture
//!
//! - **Packets**: typed, pooled messages ([`Packet`], [`PacketPool`])
//! - **Packet maps**: per-connection raw packet IDs negotiated by name as the
//!   first frame ([`PacketMap`])
//! - **Phases**: `Handshake -> Gameplay -> Closing`, each with its own
//!   [`PacketHandler`]
//! - **Registry sync**: the server's block and entity raw IDs are remapped
//!   onto the client's content while chunks are decoded
//! - **Transports**: in-process channel pairs and framed TCP
//!
//! ## Session
//!
//! ```text
//! CLIENT                                   SERVER
//!   |<========= packet maps (both ways) ====>|
//!   |--- ClientHello ------------------------>|
//!   |<-------------- RegistrySync, HandshakeDone
//!   |--- ClientHandshakeDone ---------------->|
//!   |<----------------- ChunkData, Entity* ---|
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use voxlink_core::{ContentDatabase, ResourceKey};
//! use voxlink_networking::{ClientConfig, GameClient, LocalTransport, NetworkServer, ServerConfig};
//! use voxlink_world::FlatGenerator;
//!
//! let content = Arc::new(ContentDatabase::with_core().unwrap());
//! let mut server = NetworkServer::new(
//!     ServerConfig { view_radius: 0, ..ServerConfig::default() },
//!     Arc::clone(&content),
//!     Box::new(FlatGenerator::new(1, 2, 3)),
//! )
//! .unwrap();
//!
//! let (client_end, server_end) = LocalTransport::pair();
//! server.connect(Box::new(server_end)).unwrap();
//! let mut client =
//!     GameClient::connect(Box::new(client_end), ClientConfig::named("ada"), content).unwrap();
//!
//! for _ in 0..4 {
//!     server.tick();
//!     client.poll();
//! }
//! assert!(client.player_id().is_some());
//! assert_eq!(client.block_key_at([0, 0, 0]), Some(&ResourceKey::core("stone")));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod packet_map;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{ClientConnection, ClientState, GameClient, RemoteEntity};
pub use config::{ClientConfig, ServerConfig, DEFAULT_PORT, DEFAULT_TICK_RATE};
pub use connection::{
    CloseEvent, CloseReason, Connection, ConnectionBase, ConnectionId, DropCounts, DropStats,
    ProtocolState,
};
pub use error::{NetError, NetResult};
pub use handler::{PacketHandler, Phase, PhaseHandlers};
pub use packet_map::PacketMap;
pub use pool::{PacketPool, PacketPoolStats, Pooled, PooledPacket};
pub use protocol::{Packet, PacketCatalog, PROTOCOL_VERSION};
pub use server::{
    NetworkServer, Player, PlayerEvent, PlayerManager, ServerConnection, ServerState, TickLoop,
    TickStats, SPAWN_POSITION,
};
pub use transport::{
    Listener, LocalConnector, LocalListener, LocalTransport, TcpServerListener, TcpTransport,
    Transport,
};
