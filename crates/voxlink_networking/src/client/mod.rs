//! # Game Client
//!
//! The client side of a session: handshake, registry remapping and a local
//! copy of the chunks and entities the server streams.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      GAME CLIENT                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Handshake    │  │ Remap        │  │ Transport    │       │
//! │  │ (phases)     │──│ (server raw) │──│ (polled)     │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │         │                 │                 │               │
//! │         └─────────────────┼─────────────────┘               │
//! │                           │                                 │
//! │              ┌────────────▼───────────┐                     │
//! │              │  Local World View      │                     │
//! │              │  (local raw IDs)       │                     │
//! │              └────────────────────────┘                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Chunks are translated into local raw IDs while they are decoded, so the
//! client world never holds a server raw ID.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;
use voxlink_core::{
    ArrayPool, ContentDatabase, ContentRemap, CoreError, RawId, RawIdRemap, ResourceKey,
};
use voxlink_world::{ChunkPos, ChunkStorage, World};

use crate::config::ClientConfig;
use crate::connection::{
    CloseReason, Connection, ConnectionBase, ConnectionId, DropStats, ProtocolState,
};
use crate::error::{NetError, NetResult};
use crate::handler::{PacketHandler, Phase, PhaseHandlers};
use crate::pool::PacketPool;
use crate::protocol::{
    ChunkData, ClientDisconnect, ClientHandshakeDone, ClientHello, Clientbound, CompressedChunkData,
    DecodeContext, EntityRemove, EntitySpawn, EntityUpdate, HandshakeDone, PacketCatalog, PlaceBlock, PlayerMove,
    RegistrySync, ServerDisconnect, Serverbound, UnloadChunk,
};
use crate::transport::Transport;

/// A client-side connection.
pub type ClientConnection = Connection<Serverbound, Clientbound, ClientState>;

/// An entity the server told us about.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteEntity {
    /// Entity kind, as a local raw ID.
    pub kind: RawId,
    /// Display name.
    pub name: String,
    /// Last known position.
    pub position: [f32; 3],
}

/// Everything client handlers can touch.
pub struct ClientState {
    content: Arc<ContentDatabase>,
    remap: Option<ContentRemap>,
    unsynced: ContentRemap,
    world: World,
    entities: HashMap<Uuid, RemoteEntity>,
    player_id: Option<Uuid>,
}

impl ClientState {
    fn new(content: Arc<ContentDatabase>) -> Self {
        // Before registry sync every raw ID is unknown.
        let unsynced = ContentRemap {
            blocks: RawIdRemap::identity(content.blocks().name(), 0),
            entities: RawIdRemap::identity(content.entities().name(), 0),
        };
        Self {
            content,
            remap: None,
            unsynced,
            world: World::new(ArrayPool::shared()),
            entities: HashMap::new(),
            player_id: None,
        }
    }

    fn active_remap(&self) -> &ContentRemap {
        self.remap.as_ref().unwrap_or(&self.unsynced)
    }
}

impl ProtocolState for ClientState {
    fn decode_context(&self) -> DecodeContext<'_> {
        let remap = self.active_remap();
        DecodeContext {
            blocks: &remap.blocks,
            entities: &remap.entities,
            arrays: self.world.pool(),
        }
    }
}

impl ClientConnection {
    /// Sends a disconnect packet and closes on the next poll.
    pub fn disconnect(&mut self, reason: &str) {
        let reason = if reason.is_empty() { "disconnected" } else { reason };
        let mut packet = self.base().packets().get::<ClientDisconnect>();
        packet.reason.push_str(reason);
        if let Err(err) = self.send(&*packet) {
            tracing::debug!(%err, "disconnect packet not sent");
        }
        self.begin_close(CloseReason::Local(reason.to_owned()));
    }
}

fn on_registry_sync(_: &mut ClientConnection, state: &mut ClientState, sync: &mut RegistrySync) -> NetResult<()> {
    let remap = sync.apply(&state.content)?;
    tracing::debug!(
        blocks = state.content.blocks().len(),
        entities = state.content.entities().len(),
        "registry remaps built"
    );
    state.remap = Some(remap);
    Ok(())
}

fn on_handshake_done(
    conn: &mut ClientConnection,
    state: &mut ClientState,
    done: &mut HandshakeDone,
) -> NetResult<()> {
    if state.remap.is_none() {
        return Err(NetError::Handshake("handshake done before registry sync".into()));
    }
    state.player_id = Some(done.player_id);
    conn.set_phase(Phase::Gameplay);
    conn.send(&ClientHandshakeDone)
}

fn on_server_disconnect(
    conn: &mut ClientConnection,
    _: &mut ClientState,
    packet: &mut ServerDisconnect,
) -> NetResult<()> {
    conn.begin_close(CloseReason::Remote(std::mem::take(&mut packet.reason)));
    Ok(())
}

fn store_chunk(state: &mut ClientState, pos: ChunkPos, storage: ChunkStorage) {
    tracing::trace!(%pos, kind = ?storage.kind(), "chunk received");
    state.world.set_storage(pos, storage);
}

fn on_chunk(_: &mut ClientConnection, state: &mut ClientState, packet: &mut ChunkData) -> NetResult<()> {
    store_chunk(state, packet.pos, std::mem::take(&mut packet.storage));
    Ok(())
}

fn on_compressed_chunk(
    _: &mut ClientConnection,
    state: &mut ClientState,
    packet: &mut CompressedChunkData,
) -> NetResult<()> {
    store_chunk(state, packet.pos, std::mem::take(&mut packet.storage));
    Ok(())
}

fn on_unload(_: &mut ClientConnection, state: &mut ClientState, packet: &mut UnloadChunk) -> NetResult<()> {
    state.world.unload_chunk(packet.pos);
    Ok(())
}

fn on_spawn(_: &mut ClientConnection, state: &mut ClientState, packet: &mut EntitySpawn) -> NetResult<()> {
    state.entities.insert(
        packet.entity,
        RemoteEntity {
            kind: packet.kind,
            name: std::mem::take(&mut packet.name),
            position: packet.position,
        },
    );
    Ok(())
}

fn on_update(_: &mut ClientConnection, state: &mut ClientState, packet: &mut EntityUpdate) -> NetResult<()> {
    if let Some(entity) = state.entities.get_mut(&packet.entity) {
        entity.position = packet.position;
    }
    Ok(())
}

fn on_remove(_: &mut ClientConnection, state: &mut ClientState, packet: &mut EntityRemove) -> NetResult<()> {
    state.entities.remove(&packet.entity);
    Ok(())
}

fn client_handlers() -> Arc<PhaseHandlers<ClientConnection, ClientState>> {
    PhaseHandlers::new(
        PacketHandler::new("client-handshake")
            .on::<RegistrySync, _>(on_registry_sync)
            .on::<HandshakeDone, _>(on_handshake_done)
            .on::<ServerDisconnect, _>(on_server_disconnect),
        PacketHandler::new("client-gameplay")
            .on::<ChunkData, _>(on_chunk)
            .on::<CompressedChunkData, _>(on_compressed_chunk)
            .on::<UnloadChunk, _>(on_unload)
            .on::<EntitySpawn, _>(on_spawn)
            .on::<EntityUpdate, _>(on_update)
            .on::<EntityRemove, _>(on_remove)
            .on::<ServerDisconnect, _>(on_server_disconnect),
    )
}

/// A connected game client.
pub struct GameClient {
    connection: ClientConnection,
    state: ClientState,
    config: ClientConfig,
}

impl GameClient {
    /// Opens the session over `transport` and sends the hello.
    ///
    /// `content` must be finished; the server's registries are mapped onto
    /// it during the handshake.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] for an empty player name, or transport
    /// errors while sending the first frames.
    pub fn connect(
        transport: Box<dyn Transport>,
        config: ClientConfig,
        content: Arc<ContentDatabase>,
    ) -> NetResult<Self> {
        if config.player_name.is_empty() {
            return Err(NetError::InvalidConfig("player_name must not be empty".into()));
        }
        let base = ConnectionBase::open(
            ConnectionId(0),
            transport,
            PacketCatalog::serverbound().build(),
            PacketCatalog::clientbound().build(),
            PacketPool::shared(),
        )?;
        let mut connection = Connection::new(base, client_handlers());
        let mut hello = connection.base().packets().get::<ClientHello>();
        hello.protocol_version = config.protocol_version;
        hello.player_name.push_str(&config.player_name);
        connection.send(&*hello)?;
        drop(hello);
        Ok(Self {
            connection,
            state: ClientState::new(content),
            config,
        })
    }

    /// Processes everything received. Returns the number of handled packets.
    pub fn poll(&mut self) -> usize {
        self.connection.pump(&mut self.state)
    }

    fn require_gameplay(&self) -> NetResult<()> {
        if !self.connection.is_alive() {
            return Err(NetError::ConnectionClosed);
        }
        if self.connection.phase() == Phase::Gameplay {
            Ok(())
        } else {
            Err(NetError::Handshake(format!(
                "not in gameplay (phase {:?})",
                self.connection.phase()
            )))
        }
    }

    /// Asks the server to set a block.
    ///
    /// # Errors
    ///
    /// [`NetError::Handshake`] before gameplay, [`CoreError::UnknownKey`]
    /// if `block` is unknown locally or to the server, or send errors.
    pub fn place_block(&mut self, pos: [i32; 3], block: &ResourceKey) -> NetResult<()> {
        self.require_gameplay()?;
        let blocks = self.state.content.blocks();
        let unknown = || CoreError::UnknownKey {
            registry: blocks.name().to_owned(),
            key: block.clone(),
        };
        let local = blocks.key_to_raw(block).ok_or_else(unknown)?;
        let raw = self
            .state
            .active_remap()
            .blocks
            .to_remote(local)
            .ok_or_else(unknown)?;
        self.connection.send(&PlaceBlock { block: pos, raw })
    }

    /// Reports the player's position.
    ///
    /// # Errors
    ///
    /// [`NetError::Handshake`] before gameplay, or send errors.
    pub fn send_move(&mut self, position: [f32; 3]) -> NetResult<()> {
        self.require_gameplay()?;
        self.connection.send(&PlayerMove { position })
    }

    /// Says goodbye; the next [`GameClient::poll`] closes the connection.
    pub fn disconnect(&mut self, reason: &str) {
        if self.connection.is_alive() {
            self.connection.disconnect(reason);
        }
    }

    /// Key of the block at a world position, in local terms.
    #[must_use]
    pub fn block_key_at(&self, pos: [i32; 3]) -> Option<&ResourceKey> {
        self.state.content.blocks().raw_to_key(self.state.world.get_block(pos))
    }

    /// Local copy of the streamed world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.state.world
    }

    /// Entities currently visible.
    #[must_use]
    pub const fn entities(&self) -> &HashMap<Uuid, RemoteEntity> {
        &self.state.entities
    }

    /// Identity the server assigned, after the handshake.
    #[must_use]
    pub const fn player_id(&self) -> Option<Uuid> {
        self.state.player_id
    }

    /// Registry remaps, after registry sync.
    #[must_use]
    pub const fn remap(&self) -> Option<&ContentRemap> {
        self.state.remap.as_ref()
    }

    /// Current protocol phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.connection.phase()
    }

    /// Returns true until the connection closes.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.connection.is_alive()
    }

    /// Why the connection closed, once it has.
    #[must_use]
    pub const fn close_reason(&self) -> Option<&CloseReason> {
        self.connection.base().close_reason()
    }

    /// Drop counters of the connection.
    #[must_use]
    pub fn drop_stats(&self) -> &DropStats {
        self.connection.base().drop_stats()
    }

    /// Settings the client connected with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}
