//! # Packet Handlers
//!
//! A [`PacketHandler`] is a `type -> callback` table for one protocol
//! phase. A connection holds one handler per phase and swaps the active one
//! when it changes phase.
//!
//! Callbacks receive the connection (`L`), the owner's shared state (`S`)
//! and the packet by `&mut`, so they can move data such as chunk storage
//! out of it. The packet goes back to its pool after the call whether or
//! not a callback matched.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::NetResult;
use crate::pool::PooledPacket;
use crate::protocol::Packet;

type Callback<L, S> = Box<dyn Fn(&mut L, &mut S, &mut PooledPacket) -> NetResult<()> + Send + Sync>;

/// Protocol phase of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Maps and registries are being negotiated.
    Handshake,
    /// World and entity traffic.
    Gameplay,
    /// A disconnect was sent or received; closes on the next poll.
    Closing,
}

/// Dispatch table for one phase.
pub struct PacketHandler<L, S> {
    name: &'static str,
    callbacks: HashMap<TypeId, Callback<L, S>>,
}

impl<L, S> PacketHandler<L, S> {
    /// Creates an empty handler. `name` shows up in logs.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            callbacks: HashMap::new(),
        }
    }

    /// Registers the callback for `T`, replacing any previous one.
    #[must_use]
    pub fn on<T, F>(mut self, callback: F) -> Self
    where
        T: Packet,
        F: Fn(&mut L, &mut S, &mut T) -> NetResult<()> + Send + Sync + 'static,
    {
        self.callbacks.insert(
            TypeId::of::<T>(),
            Box::new(move |line, state, packet| match packet.downcast_mut::<T>() {
                Some(packet) => callback(line, state, packet),
                None => Ok(()),
            }),
        );
        self
    }

    /// Handler name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if a callback exists for `T`.
    #[must_use]
    pub fn handles<T: Packet>(&self) -> bool {
        self.callbacks.contains_key(&TypeId::of::<T>())
    }

    /// Runs the callback for the packet's type, then releases the packet.
    ///
    /// Returns `Ok(false)` when no callback matched.
    ///
    /// # Errors
    ///
    /// Propagates the callback's error.
    pub fn handle(&self, line: &mut L, state: &mut S, mut packet: PooledPacket) -> NetResult<bool> {
        match self.callbacks.get(&packet.packet_type()) {
            Some(callback) => {
                callback(line, state, &mut packet)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// The handler of every phase. `Closing` never has callbacks.
pub struct PhaseHandlers<L, S> {
    handshake: PacketHandler<L, S>,
    gameplay: PacketHandler<L, S>,
    closing: PacketHandler<L, S>,
}

impl<L, S> PhaseHandlers<L, S> {
    /// Bundles the handshake and gameplay tables.
    #[must_use]
    pub fn new(handshake: PacketHandler<L, S>, gameplay: PacketHandler<L, S>) -> Arc<Self> {
        Arc::new(Self {
            handshake,
            gameplay,
            closing: PacketHandler::new("closing"),
        })
    }

    /// The table active in `phase`.
    #[must_use]
    pub const fn for_phase(&self, phase: Phase) -> &PacketHandler<L, S> {
        match phase {
            Phase::Handshake => &self.handshake,
            Phase::Gameplay => &self.gameplay,
            Phase::Closing => &self.closing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PacketPool;
    use crate::protocol::{PlayerMove, UnloadChunk};

    #[derive(Default)]
    struct Moves(Vec<[f32; 3]>);

    #[test]
    fn test_dispatch_by_type() {
        let pool = PacketPool::shared();
        let handler = PacketHandler::<(), Moves>::new("test").on::<PlayerMove, _>(|_, moves, packet| {
            moves.0.push(packet.position);
            Ok(())
        });
        assert!(handler.handles::<PlayerMove>());
        let mut moves = Moves::default();

        let mut packet = pool.acquire::<PlayerMove>();
        packet.downcast_mut::<PlayerMove>().unwrap().position = [1.0, 2.0, 3.0];
        assert!(handler.handle(&mut (), &mut moves, packet).unwrap());
        assert_eq!(moves.0, vec![[1.0, 2.0, 3.0]]);

        // Unmatched packets are reported and still pooled.
        assert!(!handler.handle(&mut (), &mut moves, pool.acquire::<UnloadChunk>()).unwrap());
        assert_eq!(pool.idle::<UnloadChunk>(), 1);
        assert_eq!(pool.idle::<PlayerMove>(), 1);
    }

    #[test]
    fn test_closing_has_no_callbacks() {
        let handlers = PhaseHandlers::<(), ()>::new(
            PacketHandler::new("handshake").on::<PlayerMove, _>(|_, _, _| Ok(())),
            PacketHandler::new("gameplay").on::<UnloadChunk, _>(|_, _, _| Ok(())),
        );
        assert!(handlers.for_phase(Phase::Handshake).handles::<PlayerMove>());
        assert!(!handlers.for_phase(Phase::Gameplay).handles::<PlayerMove>());
        assert!(!handlers.for_phase(Phase::Closing).handles::<UnloadChunk>());
        assert_eq!(handlers.for_phase(Phase::Closing).name(), "closing");
    }
}
