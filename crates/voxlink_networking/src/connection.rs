//! # Connections
//!
//! [`ConnectionBase`] owns one transport and its negotiated [`PacketMap`]:
//! liveness, framing, map sync and the close event. [`Connection`] adds the
//! phase state machine and dispatches decoded packets to the active
//! [`PacketHandler`](crate::PacketHandler).
//!
//! ## Lifecycle
//!
//! ```text
//! open ──map sent──▶ Handshake ──handshake done──▶ Gameplay
//!   │                    │                             │
//!   └────────────────────┴──── disconnect packet ──────┴──▶ Closing ──next poll──▶ closed
//!                        transport drop / protocol error ──────────────────────────▶ closed
//! ```
//!
//! ## Drops
//!
//! | Condition                               | Effect                       |
//! |-----------------------------------------|------------------------------|
//! | raw ID outside the peer's map           | dropped, `unknown_packet`    |
//! | raw ID of a name unknown locally        | dropped, `unknown_packet`    |
//! | name in the peer's map unknown locally  | disabled, `unresolved_names` |
//! | no callback in the active phase         | dropped, `unhandled`         |
//! | malformed map, undecodable payload      | connection closed            |

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use voxlink_core::{WireReader, WireWriter};

use crate::error::{NetError, NetResult};
use crate::handler::{Phase, PhaseHandlers};
use crate::packet_map::PacketMap;
use crate::pool::{PacketPool, PooledPacket};
use crate::protocol::{DecodeContext, Direction, Packet, PacketCatalog};
use crate::transport::Transport;

/// Unique identifier for a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Invalid/null connection ID.
    pub const NULL: Self = Self(u32::MAX);

    /// Returns true if this is a null/invalid ID.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a connection ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// This side closed without a stated reason.
    Requested,
    /// This side disconnected with a reason.
    Local(String),
    /// The peer disconnected with a reason.
    Remote(String),
    /// The stream could no longer be trusted.
    ProtocolError(String),
    /// The transport went away.
    TransportClosed,
    /// The transport failed.
    TransportError(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => f.write_str("closed"),
            Self::Local(reason) => write!(f, "disconnected: {reason}"),
            Self::Remote(reason) => write!(f, "peer disconnected: {reason}"),
            Self::ProtocolError(reason) => write!(f, "protocol error: {reason}"),
            Self::TransportClosed => f.write_str("transport closed"),
            Self::TransportError(reason) => write!(f, "transport error: {reason}"),
        }
    }
}

impl From<NetError> for CloseReason {
    fn from(err: NetError) -> Self {
        match err {
            NetError::ConnectionClosed => Self::TransportClosed,
            NetError::Io(e) => Self::TransportError(e.to_string()),
            other => Self::ProtocolError(other.to_string()),
        }
    }
}

/// Fired once when a connection closes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseEvent {
    /// The connection that closed.
    pub connection: ConnectionId,
    /// Why.
    pub reason: CloseReason,
}

/// Counters for traffic dropped without closing the connection.
#[derive(Debug, Default)]
pub struct DropStats {
    unknown_packet: AtomicU64,
    unresolved_names: AtomicU64,
    unhandled: AtomicU64,
}

/// Plain copy of [`DropStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DropCounts {
    /// Frames whose raw ID did not resolve.
    pub unknown_packet: u64,
    /// Peer packet names disabled during map sync.
    pub unresolved_names: u64,
    /// Packets with no callback in the active phase.
    pub unhandled: u64,
}

impl DropStats {
    fn record_unknown_packet(&self) {
        self.unknown_packet.fetch_add(1, Ordering::Relaxed);
    }

    fn record_unresolved_names(&self, count: usize) {
        self.unresolved_names.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_unhandled(&self) {
        self.unhandled.fetch_add(1, Ordering::Relaxed);
    }

    /// Current values.
    #[must_use]
    pub fn snapshot(&self) -> DropCounts {
        DropCounts {
            unknown_packet: self.unknown_packet.load(Ordering::Relaxed),
            unresolved_names: self.unresolved_names.load(Ordering::Relaxed),
            unhandled: self.unhandled.load(Ordering::Relaxed),
        }
    }
}

/// Framing, map sync and liveness for one transport.
///
/// `Out` is the direction this side sends, `In` the one it receives.
pub struct ConnectionBase<Out: Direction, In: Direction> {
    id: ConnectionId,
    transport: Box<dyn Transport>,
    peer: String,
    alive: bool,
    close_reason: Option<CloseReason>,
    close_events: Option<Sender<CloseEvent>>,
    drops: Arc<DropStats>,
    map: PacketMap<Out, In>,
    packets: Arc<PacketPool>,
    writer: WireWriter,
    reader: WireReader,
}

impl<Out: Direction, In: Direction> ConnectionBase<Out, In> {
    /// Wraps `transport` and sends this side's packet map as the first
    /// frame.
    ///
    /// # Errors
    ///
    /// Fails if the map frame cannot be sent.
    pub fn open(
        id: ConnectionId,
        mut transport: Box<dyn Transport>,
        outgoing: Arc<PacketCatalog<Out>>,
        incoming: Arc<PacketCatalog<In>>,
        packets: Arc<PacketPool>,
    ) -> NetResult<Self> {
        let map = PacketMap::new(outgoing, incoming);
        let mut writer = WireWriter::new();
        map.write_sync(&mut writer)?;
        transport.send(writer.current_bytes())?;
        let peer = transport.peer();
        tracing::info!(connection = %id, %peer, direction = Out::LABEL, "connection opened");
        Ok(Self {
            id,
            transport,
            peer,
            alive: true,
            close_reason: None,
            close_events: None,
            drops: Arc::new(DropStats::default()),
            map,
            packets,
            writer,
            reader: WireReader::new(),
        })
    }

    /// Sends a [`CloseEvent`] on `events` when this connection closes.
    #[must_use]
    pub fn with_close_events(mut self, events: Sender<CloseEvent>) -> Self {
        self.close_events = Some(events);
        self
    }

    /// Connection ID.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Printable peer address.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Returns true until the connection closes.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Returns true once the peer's packet map has been applied.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.map.is_synced()
    }

    /// Why the connection closed, once it has.
    #[must_use]
    pub const fn close_reason(&self) -> Option<&CloseReason> {
        self.close_reason.as_ref()
    }

    /// Drop counters.
    #[must_use]
    pub fn drop_stats(&self) -> &Arc<DropStats> {
        &self.drops
    }

    /// The packet pool received packets come from.
    #[must_use]
    pub fn packets(&self) -> &Arc<PacketPool> {
        &self.packets
    }

    /// Negotiated packet map.
    #[must_use]
    pub fn packet_map(&self) -> &PacketMap<Out, In> {
        &self.map
    }

    /// Encodes and sends one packet.
    ///
    /// # Errors
    ///
    /// [`NetError::ConnectionClosed`] on a dead connection,
    /// [`NetError::UnregisteredPacket`] if `T` is not in the outgoing
    /// catalog, or encode and transport errors.
    pub fn send<T: Packet<Direction = Out>>(&mut self, packet: &T) -> NetResult<()> {
        if !self.alive {
            return Err(NetError::ConnectionClosed);
        }
        let raw = self
            .map
            .outgoing_raw(std::any::TypeId::of::<T>())
            .ok_or(NetError::UnregisteredPacket(T::NAME))?;
        self.writer.reset();
        self.writer.write_var_u32(raw);
        packet.write(&mut self.writer)?;
        tracing::trace!(
            connection = %self.id,
            packet = T::NAME,
            bytes = self.writer.current_bytes().len(),
            "send"
        );
        self.transport.send(self.writer.current_bytes())
    }

    /// Returns the next decoded packet, if any.
    ///
    /// The first frame is applied as the peer's packet map. Frames whose raw
    /// ID does not resolve are counted and skipped.
    ///
    /// # Errors
    ///
    /// [`NetError::ConnectionClosed`] on a dead connection or a closed
    /// transport; map, codec and content errors on corrupt frames.
    pub fn receive(&mut self, ctx: &DecodeContext<'_>) -> NetResult<Option<PooledPacket>> {
        loop {
            if !self.alive {
                return Err(NetError::ConnectionClosed);
            }
            let Some(frame) = self.transport.try_recv()? else {
                return Ok(None);
            };
            self.reader.load_data(&frame);

            if !self.map.is_synced() {
                let unresolved = self.map.read_sync(&mut self.reader)?;
                self.drops.record_unresolved_names(unresolved);
                continue;
            }

            let raw = self.reader.read_var_u32()?;
            let Some(entry) = self.map.incoming_entry(raw) else {
                self.drops.record_unknown_packet();
                tracing::warn!(connection = %self.id, raw, "dropping packet with unknown raw id");
                continue;
            };
            let mut packet = entry.acquire(&self.packets);
            packet.inner_mut().read_payload(&mut self.reader, ctx)?;
            tracing::trace!(connection = %self.id, packet = packet.name(), "recv");
            return Ok(Some(packet));
        }
    }

    /// Closes the connection and fires the close event. Idempotent.
    pub fn close(&mut self, reason: CloseReason) {
        if !self.alive {
            return;
        }
        self.alive = false;
        self.transport.close();
        tracing::info!(connection = %self.id, peer = %self.peer, %reason, "connection closed");
        if let Some(events) = self.close_events.take() {
            let _ = events.send(CloseEvent {
                connection: self.id,
                reason: reason.clone(),
            });
        }
        self.close_reason = Some(reason);
    }
}

/// Owner-side state a connection decodes against.
pub trait ProtocolState {
    /// Remaps and pools for decoding the next packet.
    fn decode_context(&self) -> DecodeContext<'_>;
}

/// A connection with a protocol phase and per-phase handlers.
///
/// `S` is the owner's state (server or client) handed to every callback.
pub struct Connection<Out: Direction, In: Direction, S> {
    base: ConnectionBase<Out, In>,
    phase: Phase,
    pending_close: Option<CloseReason>,
    handlers: Arc<PhaseHandlers<Connection<Out, In, S>, S>>,
}

impl<Out: Direction, In: Direction, S: ProtocolState> Connection<Out, In, S> {
    /// Starts in [`Phase::Handshake`].
    #[must_use]
    pub fn new(base: ConnectionBase<Out, In>, handlers: Arc<PhaseHandlers<Self, S>>) -> Self {
        Self {
            base,
            phase: Phase::Handshake,
            pending_close: None,
            handlers,
        }
    }

    /// Connection ID.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.base.id()
    }

    /// Framing layer.
    #[must_use]
    pub const fn base(&self) -> &ConnectionBase<Out, In> {
        &self.base
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns true until the connection closes.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.base.is_alive()
    }

    /// Swaps the active handler.
    pub fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            tracing::info!(connection = %self.id(), from = ?self.phase, to = ?phase, "phase change");
            self.phase = phase;
        }
    }

    /// Enters [`Phase::Closing`]; the next poll closes with `reason`.
    pub fn begin_close(&mut self, reason: CloseReason) {
        self.pending_close.get_or_insert(reason);
        self.set_phase(Phase::Closing);
    }

    /// Sends one packet.
    ///
    /// # Errors
    ///
    /// See [`ConnectionBase::send`].
    pub fn send<T: Packet<Direction = Out>>(&mut self, packet: &T) -> NetResult<()> {
        self.base.send(packet)
    }

    /// Closes immediately.
    pub fn close(&mut self, reason: CloseReason) {
        self.base.close(reason);
    }

    /// Closes with the reason matching `err`.
    pub fn fail(&mut self, err: NetError) {
        let reason = CloseReason::from(err);
        if matches!(reason, CloseReason::ProtocolError(_)) {
            tracing::warn!(connection = %self.id(), %reason, "closing after protocol error");
        }
        self.base.close(reason);
    }

    /// Decodes and dispatches every pending packet. Returns how many were
    /// handled.
    ///
    /// Stops early when the phase becomes [`Phase::Closing`]; the close
    /// itself happens on the following poll.
    pub fn pump(&mut self, state: &mut S) -> usize {
        if self.phase == Phase::Closing && self.base.is_alive() {
            let reason = self.pending_close.take().unwrap_or(CloseReason::Requested);
            self.base.close(reason);
        }

        let mut handled = 0;
        while self.base.is_alive() && self.phase != Phase::Closing {
            let received = {
                let ctx = state.decode_context();
                self.base.receive(&ctx)
            };
            let packet = match received {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(err) => {
                    self.fail(err);
                    break;
                }
            };

            let name = packet.name();
            let handlers = Arc::clone(&self.handlers);
            let handler = handlers.for_phase(self.phase);
            match handler.handle(self, state, packet) {
                Ok(true) => handled += 1,
                Ok(false) => {
                    self.base.drops.record_unhandled();
                    tracing::warn!(
                        connection = %self.id(),
                        packet = name,
                        phase = handler.name(),
                        "dropping packet not handled in this phase"
                    );
                }
                Err(err) => {
                    self.fail(err);
                    break;
                }
            }
        }
        handled
    }
}
