//! In-process transport over crossbeam channels.

use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use super::{Listener, Transport};
use crate::error::{NetError, NetResult};

static NEXT_LOCAL_PEER: AtomicU32 = AtomicU32::new(0);

/// One end of an in-process connection.
pub struct LocalTransport {
    tx: Option<Sender<Vec<u8>>>,
    rx: Receiver<Vec<u8>>,
    peer: String,
}

impl LocalTransport {
    /// Creates two connected ends: `(client, server)`.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let id = NEXT_LOCAL_PEER.fetch_add(1, Ordering::Relaxed);
        let (to_server, server_rx) = crossbeam_channel::unbounded();
        let (to_client, client_rx) = crossbeam_channel::unbounded();
        (
            Self {
                tx: Some(to_server),
                rx: client_rx,
                peer: format!("local-server#{id}"),
            },
            Self {
                tx: Some(to_client),
                rx: server_rx,
                peer: format!("local-client#{id}"),
            },
        )
    }
}

impl Transport for LocalTransport {
    fn send(&mut self, frame: &[u8]) -> NetResult<()> {
        let tx = self.tx.as_ref().ok_or(NetError::ConnectionClosed)?;
        tx.send(frame.to_vec()).map_err(|_| NetError::ConnectionClosed)
    }

    fn try_recv(&mut self) -> NetResult<Option<Vec<u8>>> {
        if self.tx.is_none() {
            return Err(NetError::ConnectionClosed);
        }
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(NetError::ConnectionClosed),
        }
    }

    fn close(&mut self) {
        // Dropping the sender disconnects the peer's receiver.
        self.tx = None;
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// Server side of in-process connections.
pub struct LocalListener {
    incoming: Receiver<LocalTransport>,
}

/// Client side handle that opens connections to a [`LocalListener`].
#[derive(Clone)]
pub struct LocalConnector {
    outgoing: Sender<LocalTransport>,
}

impl LocalListener {
    /// Creates a listener and the connector that reaches it.
    #[must_use]
    pub fn new() -> (Self, LocalConnector) {
        let (outgoing, incoming) = crossbeam_channel::unbounded();
        (Self { incoming }, LocalConnector { outgoing })
    }
}

impl Listener for LocalListener {
    fn accept(&mut self) -> NetResult<Option<Box<dyn Transport>>> {
        Ok(self
            .incoming
            .try_recv()
            .ok()
            .map(|transport| Box::new(transport) as Box<dyn Transport>))
    }
}

impl LocalConnector {
    /// Opens a connection and returns the client end.
    ///
    /// # Errors
    ///
    /// [`NetError::ConnectionClosed`] if the listener was dropped.
    pub fn connect(&self) -> NetResult<LocalTransport> {
        let (client, server) = LocalTransport::pair();
        self.outgoing
            .send(server)
            .map_err(|_| NetError::ConnectionClosed)?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_arrive_in_order() {
        let (mut client, mut server) = LocalTransport::pair();
        client.send(b"one").unwrap();
        client.send(b"two").unwrap();
        assert_eq!(server.try_recv().unwrap().as_deref(), Some(&b"one"[..]));
        assert_eq!(server.try_recv().unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(server.try_recv().unwrap(), None);
    }

    #[test]
    fn test_close_reaches_peer() {
        let (mut client, mut server) = LocalTransport::pair();
        client.close();
        assert!(matches!(client.send(b"x"), Err(NetError::ConnectionClosed)));
        assert!(matches!(server.try_recv(), Err(NetError::ConnectionClosed)));
    }

    #[test]
    fn test_listener_hands_out_server_end() {
        let (mut listener, connector) = LocalListener::new();
        assert!(listener.accept().unwrap().is_none());
        let mut client = connector.connect().unwrap();
        let mut server = listener.accept().unwrap().unwrap();
        client.send(b"hi").unwrap();
        assert_eq!(server.try_recv().unwrap().as_deref(), Some(&b"hi"[..]));
    }
}
