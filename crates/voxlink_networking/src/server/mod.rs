//! # Network Server
//!
//! The authoritative side of a session.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      NETWORK SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐       │
//! │  │ Listeners    │  │ Connections  │  │ Broadcast    │       │
//! │  │ (accept)     │──│ (pump/phase) │──│ (dirty/ents) │       │
//! │  └──────────────┘  └──────────────┘  └──────────────┘       │
//! │         │                 │                 │               │
//! │         └─────────────────┼─────────────────┘               │
//! │                           │                                 │
//! │              ┌────────────▼───────────┐                     │
//! │              │ ServerState            │                     │
//! │              │ - content + identity   │                     │
//! │              │ - world + generator    │                     │
//! │              │ - players              │                     │
//! │              └────────────────────────┘                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tick
//!
//! 1. Accept pending transports from every listener
//! 2. Pump every connection (handlers run here)
//! 3. Drop closed connections and their players
//! 4. Resend every dirty chunk to gameplay connections
//! 5. Broadcast player joins, moves and leaves as entity packets

mod players;
mod tick;

pub use players::{Player, PlayerEvent, PlayerManager};
pub use tick::{TickLoop, TickStats};

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use uuid::Uuid;
use voxlink_core::{ArrayPool, ContentDatabase, ContentRemap, CoreError, RawId, ResourceKey};
use voxlink_world::{ChunkGenerator, ChunkPos, World};

use crate::config::ServerConfig;
use crate::connection::{CloseEvent, CloseReason, Connection, ConnectionBase, ConnectionId, ProtocolState};
use crate::error::{NetError, NetResult};
use crate::handler::{PacketHandler, Phase, PhaseHandlers};
use crate::pool::PacketPool;
use crate::protocol::{
    ChunkData, ClientDisconnect, ClientHandshakeDone, ClientHello, Clientbound, CompressedChunkData,
    DecodeContext, EntityRemove, EntitySpawn, EntityUpdate, HandshakeDone, PacketCatalog, PlaceBlock, PlayerMove,
    RegistrySync, ServerDisconnect, Serverbound,
};
use crate::transport::{Listener, Transport};

/// Where new players appear.
pub const SPAWN_POSITION: [f32; 3] = [0.5, 17.0, 0.5];

/// A server-side connection.
pub type ServerConnection = Connection<Clientbound, Serverbound, ServerState>;

/// How far past the view radius, in chunks, a player may place blocks.
const PLACE_REACH_SLACK: u32 = 1;

/// A chunk ready to send, compressed or not per [`ServerConfig::compress_chunks`].
enum OutgoingChunk {
    Plain(ChunkData),
    Compressed(CompressedChunkData),
}

impl OutgoingChunk {
    fn send_to(&self, conn: &mut ServerConnection) -> NetResult<()> {
        match self {
            Self::Plain(packet) => conn.send(packet),
            Self::Compressed(packet) => conn.send(packet),
        }
    }
}

/// A client that sent its hello but not its handshake-done yet.
struct PendingPlayer {
    id: Uuid,
    name: String,
}

/// Everything server handlers can touch.
pub struct ServerState {
    config: ServerConfig,
    content: Arc<ContentDatabase>,
    identity: ContentRemap,
    player_kind: RawId,
    world: World,
    generator: Box<dyn ChunkGenerator>,
    players: PlayerManager,
    pending: HashMap<ConnectionId, PendingPlayer>,
}

impl ServerState {
    /// Settings.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Content shared with clients through registry sync.
    #[must_use]
    pub fn content(&self) -> &ContentDatabase {
        &self.content
    }

    /// The authoritative world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world. Changed chunks are resent on the next tick.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Connected players.
    #[must_use]
    pub const fn players(&self) -> &PlayerManager {
        &self.players
    }

    /// Generates `pos` unless it is already loaded.
    fn ensure_chunk(&mut self, pos: ChunkPos) {
        if self.world.chunk(pos).is_none() {
            let storage = self.generator.generate(pos, self.world.pool());
            self.world.load_chunk(pos, storage);
        }
    }

    fn chunk_packet(&self, pos: ChunkPos) -> Option<OutgoingChunk> {
        let storage = self.world.chunk(pos)?.storage().compact();
        Some(if self.config.compress_chunks {
            OutgoingChunk::Compressed(CompressedChunkData { pos, storage })
        } else {
            OutgoingChunk::Plain(ChunkData { pos, storage })
        })
    }
}

impl ProtocolState for ServerState {
    fn decode_context(&self) -> DecodeContext<'_> {
        DecodeContext {
            blocks: &self.identity.blocks,
            entities: &self.identity.entities,
            arrays: self.world.pool(),
        }
    }
}

impl ServerConnection {
    /// Sends a disconnect packet and closes on the next poll.
    pub fn disconnect(&mut self, reason: &str) {
        let reason = if reason.is_empty() { "disconnected" } else { reason };
        let mut packet = self.base().packets().get::<ServerDisconnect>();
        packet.reason.push_str(reason);
        if let Err(err) = self.send(&*packet) {
            tracing::debug!(connection = %self.id(), %err, "disconnect packet not sent");
        }
        self.begin_close(CloseReason::Local(reason.to_owned()));
    }
}

fn on_hello(conn: &mut ServerConnection, state: &mut ServerState, hello: &mut ClientHello) -> NetResult<()> {
    if hello.protocol_version != state.config.protocol_version {
        let err = NetError::ProtocolMismatch {
            local: state.config.protocol_version,
            remote: hello.protocol_version,
        };
        tracing::warn!(connection = %conn.id(), %err, "rejecting client");
        conn.disconnect(&err.to_string());
        return Ok(());
    }
    if hello.player_name.is_empty() {
        return Err(NetError::Handshake("empty player name".into()));
    }
    if state.pending.contains_key(&conn.id()) {
        return Err(NetError::Handshake("duplicate hello".into()));
    }
    if state.players.len() + state.pending.len() >= state.players.max_players() {
        conn.disconnect(&NetError::ServerFull(state.players.max_players()).to_string());
        return Ok(());
    }

    let id = Uuid::new_v4();
    state.pending.insert(
        conn.id(),
        PendingPlayer {
            id,
            name: std::mem::take(&mut hello.player_name),
        },
    );

    let packets = Arc::clone(conn.base().packets());
    let mut sync = packets.get::<RegistrySync>();
    sync.fill(&state.content)?;
    conn.send(&*sync)?;
    let mut done = packets.get::<HandshakeDone>();
    done.player_id = id;
    conn.send(&*done)
}

fn on_handshake_done(
    conn: &mut ServerConnection,
    state: &mut ServerState,
    _: &mut ClientHandshakeDone,
) -> NetResult<()> {
    let pending = state
        .pending
        .remove(&conn.id())
        .ok_or_else(|| NetError::Handshake("handshake done before hello".into()))?;
    state.players.add(conn.id(), pending.id, pending.name, SPAWN_POSITION)?;
    conn.set_phase(Phase::Gameplay);

    // Everyone already here.
    let packets = Arc::clone(conn.base().packets());
    let conn_id = conn.id();
    for player in state.players.iter().filter(|p| p.connection != conn_id) {
        let mut spawn = packets.get::<EntitySpawn>();
        spawn.entity = player.id;
        spawn.kind = state.player_kind;
        spawn.name.push_str(&player.name);
        spawn.position = player.position;
        conn.send(&*spawn)?;
    }

    let center = ChunkPos::from_block_pos(SPAWN_POSITION.map(|v| v.floor() as i32));
    let radius = i32::try_from(state.config.view_radius).unwrap_or(i32::MAX);
    let mut sent = 0usize;
    for dy in -radius..=radius {
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let pos = ChunkPos::new(center.x + dx, center.y + dy, center.z + dz);
                state.ensure_chunk(pos);
                if let Some(packet) = state.chunk_packet(pos) {
                    packet.send_to(conn)?;
                    sent += 1;
                }
            }
        }
    }
    tracing::debug!(connection = %conn.id(), chunks = sent, "initial chunks sent");
    Ok(())
}

fn on_move(conn: &mut ServerConnection, state: &mut ServerState, packet: &mut PlayerMove) -> NetResult<()> {
    state.players.move_player(conn.id(), packet.position);
    Ok(())
}

fn on_place(conn: &mut ServerConnection, state: &mut ServerState, packet: &mut PlaceBlock) -> NetResult<()> {
    if !state.content.blocks().contains_raw(packet.raw) {
        return Err(CoreError::UnknownRawId {
            registry: state.content.blocks().name().to_owned(),
            raw: packet.raw,
        }
        .into());
    }
    let target = ChunkPos::from_block_pos(packet.block);
    let Some(player) = state.players.get(conn.id()) else {
        return Err(NetError::Handshake("placement before joining".into()));
    };
    let here = ChunkPos::from_block_pos(player.position.map(|v| v.floor() as i32));
    let reach = state.config.view_radius.saturating_add(PLACE_REACH_SLACK);
    if here.distance(target) > reach {
        tracing::warn!(connection = %conn.id(), block = ?packet.block, %here, "placement out of reach ignored");
        return Ok(());
    }
    // Terrain first, so the edit lands on generated blocks.
    state.ensure_chunk(target);
    if state.world.set_block(packet.block, packet.raw) {
        tracing::trace!(connection = %conn.id(), block = ?packet.block, raw = packet.raw, "block placed");
    }
    Ok(())
}

fn on_disconnect(
    conn: &mut ServerConnection,
    _: &mut ServerState,
    packet: &mut ClientDisconnect,
) -> NetResult<()> {
    conn.begin_close(CloseReason::Remote(std::mem::take(&mut packet.reason)));
    Ok(())
}

fn server_handlers() -> Arc<PhaseHandlers<ServerConnection, ServerState>> {
    PhaseHandlers::new(
        PacketHandler::new("server-handshake")
            .on::<ClientHello, _>(on_hello)
            .on::<ClientHandshakeDone, _>(on_handshake_done)
            .on::<ClientDisconnect, _>(on_disconnect),
        PacketHandler::new("server-gameplay")
            .on::<PlayerMove, _>(on_move)
            .on::<PlaceBlock, _>(on_place)
            .on::<ClientDisconnect, _>(on_disconnect),
    )
}

/// The authoritative server: listeners, connections and world.
pub struct NetworkServer {
    state: ServerState,
    connections: BTreeMap<ConnectionId, ServerConnection>,
    listeners: Vec<Box<dyn Listener>>,
    handlers: Arc<PhaseHandlers<ServerConnection, ServerState>>,
    packets: Arc<PacketPool>,
    outgoing: Arc<PacketCatalog<Clientbound>>,
    incoming: Arc<PacketCatalog<Serverbound>>,
    close_tx: Sender<CloseEvent>,
    close_rx: Receiver<CloseEvent>,
    next_id: u32,
}

impl NetworkServer {
    /// Creates a server over finished `content`.
    ///
    /// # Errors
    ///
    /// [`CoreError::RegistryNotFrozen`] if `content` was not finished, or
    /// [`CoreError::UnknownKey`] if it has no `core:player` entity kind.
    pub fn new(
        config: ServerConfig,
        content: Arc<ContentDatabase>,
        generator: Box<dyn ChunkGenerator>,
    ) -> NetResult<Self> {
        if !content.is_finished() {
            return Err(CoreError::RegistryNotFrozen(content.blocks().name().to_owned()).into());
        }
        let player_kind = content.entities().require_raw(&ResourceKey::core("player"))?;
        let (close_tx, close_rx) = crossbeam_channel::unbounded();
        let state = ServerState {
            identity: ContentRemap::identity(&content),
            players: PlayerManager::new(config.max_players),
            config,
            content,
            player_kind,
            world: World::new(ArrayPool::shared()),
            generator,
            pending: HashMap::new(),
        };
        Ok(Self {
            state,
            connections: BTreeMap::new(),
            listeners: Vec::new(),
            handlers: server_handlers(),
            packets: PacketPool::shared(),
            outgoing: PacketCatalog::clientbound().build(),
            incoming: PacketCatalog::serverbound().build(),
            close_tx,
            close_rx,
            next_id: 0,
        })
    }

    /// Accepts transports from `listener` on every tick.
    pub fn add_listener(&mut self, listener: Box<dyn Listener>) {
        self.listeners.push(listener);
    }

    /// Opens a connection over an already established transport.
    ///
    /// # Errors
    ///
    /// Fails if the packet map frame cannot be sent.
    pub fn connect(&mut self, transport: Box<dyn Transport>) -> NetResult<ConnectionId> {
        let id = ConnectionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let base = ConnectionBase::open(
            id,
            transport,
            Arc::clone(&self.outgoing),
            Arc::clone(&self.incoming),
            Arc::clone(&self.packets),
        )?
        .with_close_events(self.close_tx.clone());
        self.connections
            .insert(id, Connection::new(base, Arc::clone(&self.handlers)));
        Ok(id)
    }

    /// Runs one server tick.
    pub fn tick(&mut self) {
        self.accept();
        for connection in self.connections.values_mut() {
            connection.pump(&mut self.state);
        }
        self.reap_closed();
        self.flush_dirty_chunks();
        self.flush_player_events();
    }

    fn accept(&mut self) {
        let mut accepted = Vec::new();
        for listener in &mut self.listeners {
            loop {
                match listener.accept() {
                    Ok(Some(transport)) => accepted.push(transport),
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(%err, "accept failed");
                        break;
                    }
                }
            }
        }
        for transport in accepted {
            let peer = transport.peer();
            if let Err(err) = self.connect(transport) {
                tracing::warn!(%peer, %err, "failed to open connection");
            }
        }
    }

    fn reap_closed(&mut self) {
        while let Ok(event) = self.close_rx.try_recv() {
            self.connections.remove(&event.connection);
            self.state.pending.remove(&event.connection);
            self.state.players.remove_connection(event.connection);
        }
    }

    fn flush_dirty_chunks(&mut self) {
        for pos in self.state.world.drain_dirty() {
            let Some(packet) = self.state.chunk_packet(pos) else {
                continue;
            };
            tracing::debug!(%pos, "resending changed chunk");
            for connection in self.connections.values_mut() {
                if connection.phase() == Phase::Gameplay {
                    if let Err(err) = packet.send_to(connection) {
                        connection.fail(err);
                    }
                }
            }
        }
    }

    fn flush_player_events(&mut self) {
        for event in self.state.players.drain_events() {
            match event {
                PlayerEvent::Joined(player) => {
                    let mut spawn = self.packets.get::<EntitySpawn>();
                    spawn.entity = player.id;
                    spawn.kind = self.state.player_kind;
                    spawn.name.push_str(&player.name);
                    spawn.position = player.position;
                    self.broadcast_except(player.connection, &*spawn);
                }
                PlayerEvent::Moved {
                    id,
                    connection,
                    position,
                } => {
                    let mut update = self.packets.get::<EntityUpdate>();
                    update.entity = id;
                    update.position = position;
                    self.broadcast_except(connection, &*update);
                }
                PlayerEvent::Left { id, connection } => {
                    let mut remove = self.packets.get::<EntityRemove>();
                    remove.entity = id;
                    self.broadcast_except(connection, &*remove);
                }
            }
        }
    }

    fn broadcast_except<T>(&mut self, skip: ConnectionId, packet: &T)
    where
        T: crate::protocol::Packet<Direction = Clientbound>,
    {
        for connection in self.connections.values_mut() {
            if connection.id() != skip && connection.phase() == Phase::Gameplay {
                if let Err(err) = connection.send(packet) {
                    connection.fail(err);
                }
            }
        }
    }

    /// Ticks at the configured rate until `running` is cleared, then
    /// disconnects everyone.
    pub fn run(&mut self, running: &AtomicBool) {
        let mut ticks = TickLoop::new(self.state.config.tick_rate);
        tracing::info!(tick_rate = self.state.config.tick_rate, "server running");
        while running.load(Ordering::Acquire) {
            while ticks.is_due() {
                ticks.run(|| self.tick());
            }
            ticks.sleep_until_due();
        }
        self.shutdown("server stopping");
        let stats = ticks.stats();
        tracing::info!(
            ticks = ticks.ticks(),
            late = stats.late_ticks,
            avg_us = stats.avg_tick_us,
            "server stopped"
        );
    }

    /// Disconnects every connection with `reason`.
    pub fn shutdown(&mut self, reason: &str) {
        for connection in self.connections.values_mut() {
            connection.disconnect(reason);
            connection.pump(&mut self.state);
        }
        self.reap_closed();
        self.state.players.drain_events();
    }

    /// Shared state.
    #[must_use]
    pub const fn state(&self) -> &ServerState {
        &self.state
    }

    /// Mutable world. Changed chunks are resent on the next tick.
    pub fn world_mut(&mut self) -> &mut World {
        self.state.world_mut()
    }

    /// The connection with `id`, while open.
    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&ServerConnection> {
        self.connections.get(&id)
    }

    /// Open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Kicks the connection with `id`. Returns false if it is not open.
    pub fn kick(&mut self, id: ConnectionId, reason: &str) -> bool {
        let Some(connection) = self.connections.get_mut(&id) else {
            return false;
        };
        connection.disconnect(reason);
        true
    }
}
