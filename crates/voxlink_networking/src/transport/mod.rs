//! # Transport Layer
//!
//! Reliable, ordered frame delivery between two peers.
//!
//! ## Design
//!
//! - A transport moves whole frames; it never looks inside them
//! - Receiving is polled and never blocks
//! - A closed peer surfaces as [`NetError::ConnectionClosed`] from
//!   [`Transport::try_recv`], which the connection turns into a close event
//!
//! | Transport          | Channel                        | Use                     |
//! |--------------------|--------------------------------|-------------------------|
//! | [`LocalTransport`] | crossbeam channel pair         | integrated server, tests |
//! | [`TcpTransport`]   | non-blocking `TcpStream`       | dedicated server        |
//!
//! [`NetError::ConnectionClosed`]: crate::NetError::ConnectionClosed

mod local;
mod tcp;

pub use local::{LocalConnector, LocalListener, LocalTransport};
pub use tcp::{TcpServerListener, TcpTransport, MAX_FRAME_SIZE};

use crate::error::NetResult;

/// A bidirectional frame channel.
pub trait Transport: Send {
    /// Queues one frame for delivery.
    ///
    /// # Errors
    ///
    /// [`NetError::ConnectionClosed`](crate::NetError::ConnectionClosed)
    /// once either side has closed, or an I/O error.
    fn send(&mut self, frame: &[u8]) -> NetResult<()>;

    /// Returns the next complete frame, if one has arrived.
    ///
    /// # Errors
    ///
    /// [`NetError::ConnectionClosed`](crate::NetError::ConnectionClosed)
    /// when the peer is gone and nothing is buffered.
    fn try_recv(&mut self) -> NetResult<Option<Vec<u8>>>;

    /// Closes the channel. Idempotent.
    fn close(&mut self);

    /// Printable peer address.
    fn peer(&self) -> String;
}

/// Source of incoming transports for a server.
pub trait Listener: Send {
    /// Returns the next pending transport without blocking.
    ///
    /// # Errors
    ///
    /// I/O errors from the underlying socket.
    fn accept(&mut self) -> NetResult<Option<Box<dyn Transport>>>;
}
