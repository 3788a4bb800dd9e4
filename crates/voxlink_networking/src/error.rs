//! # Network Error Types

use thiserror::Error;
use voxlink_core::{CodecError, CoreError};
use voxlink_world::WorldError;

/// Errors raised by connections, transports and packet decoding.
#[derive(Error, Debug)]
pub enum NetError {
    /// Send or receive on a connection that is no longer alive.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The packet type is not in this side's outgoing catalog.
    #[error("packet {0} is not registered for this direction")]
    UnregisteredPacket(&'static str),

    /// The peer's packet map frame could not be parsed.
    #[error("malformed packet map: {0}")]
    MalformedPacketMap(String),

    /// The peers speak different protocol versions.
    #[error("protocol mismatch: local {local}, remote {remote}")]
    ProtocolMismatch {
        /// This side's version.
        local: u32,
        /// The peer's version.
        remote: u32,
    },

    /// The peer broke the handshake sequence.
    #[error("handshake violation: {0}")]
    Handshake(String),

    /// The server has no free player slot.
    #[error("server full ({0} players)")]
    ServerFull(usize),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport-level I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Registry failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Chunk decode failure.
    #[error(transparent)]
    World(#[from] WorldError),

    /// Malformed wire data.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for network operations.
pub type NetResult<T> = Result<T, NetError>;
