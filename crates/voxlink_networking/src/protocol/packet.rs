//! # Packet Trait
//!
//! Packets are mutable, reusable objects. A decoded packet is handed to a
//! handler by `&mut`, then reset and returned to its [`PacketPool`] when the
//! owning handle drops.
//!
//! [`PacketPool`]: crate::PacketPool

use std::any::Any;
use std::sync::Arc;

use voxlink_core::{ArrayPool, RawIdRemap, WireReader, WireWriter};

use crate::error::NetResult;

/// Which way a packet travels.
pub trait Direction: Send + Sync + 'static {
    /// Label used in logs.
    const LABEL: &'static str;
}

/// Client to server.
#[derive(Debug)]
pub enum Serverbound {}

impl Direction for Serverbound {
    const LABEL: &'static str = "c2s";
}

/// Server to client.
#[derive(Debug)]
pub enum Clientbound {}

impl Direction for Clientbound {
    const LABEL: &'static str = "s2c";
}

/// What a packet needs to decode content IDs.
///
/// `blocks` and `entities` translate the sender's raw IDs into local ones;
/// `arrays` supplies dense chunk arrays.
#[derive(Clone, Copy)]
pub struct DecodeContext<'a> {
    /// Block raw ID translation.
    pub blocks: &'a RawIdRemap,
    /// Entity kind raw ID translation.
    pub entities: &'a RawIdRemap,
    /// Pool for chunk backing arrays.
    pub arrays: &'a Arc<ArrayPool>,
}

/// A typed message.
pub trait Packet: Any + Send + Default {
    /// Stable name exchanged in packet maps.
    const NAME: &'static str;

    /// Direction this packet travels.
    type Direction: Direction;

    /// Encodes the payload (the raw packet ID is written by the connection).
    fn write(&self, writer: &mut WireWriter) -> NetResult<()>;

    /// Decodes the payload into `self`, overwriting every field.
    fn read(&mut self, reader: &mut WireReader, ctx: &DecodeContext<'_>) -> NetResult<()>;

    /// Resets the packet before it goes back to the pool.
    fn on_return_to_pool(&mut self) {
        *self = Self::default();
    }
}

/// A packet sent by clients.
pub trait C2SPacket: Packet<Direction = Serverbound> {}

impl<T: Packet<Direction = Serverbound>> C2SPacket for T {}

/// A packet sent by the server.
pub trait S2CPacket: Packet<Direction = Clientbound> {}

impl<T: Packet<Direction = Clientbound>> S2CPacket for T {}

/// Object-safe view of any [`Packet`].
pub trait AnyPacket: Any + Send {
    /// The packet's map name.
    fn name(&self) -> &'static str;

    /// Encodes the payload.
    fn write_payload(&self, writer: &mut WireWriter) -> NetResult<()>;

    /// Decodes the payload.
    fn read_payload(&mut self, reader: &mut WireReader, ctx: &DecodeContext<'_>) -> NetResult<()>;

    /// Runs the pool reset hook.
    fn reset(&mut self);

    /// Upcast for downcasting by reference.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for downcasting by mutable reference.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Upcast for downcasting by value.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Packet> AnyPacket for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn write_payload(&self, writer: &mut WireWriter) -> NetResult<()> {
        self.write(writer)
    }

    fn read_payload(&mut self, reader: &mut WireReader, ctx: &DecodeContext<'_>) -> NetResult<()> {
        self.read(reader, ctx)
    }

    fn reset(&mut self) {
        self.on_return_to_pool();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
