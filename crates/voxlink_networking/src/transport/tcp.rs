//! TCP transport with `u32` little-endian length-prefixed frames.
//!
//! ```text
//! [len: u32 LE][frame: len bytes]
//! ```
//!
//! Sockets are non-blocking. Partial writes stay in a pending buffer and are
//! flushed on the next send or receive. Received frames are sliced off a read
//! offset; consumed bytes are dropped once per socket read.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{Listener, Transport};
use crate::error::{NetError, NetResult};

/// Largest accepted frame. A full simple chunk is 128 KiB.
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

const READ_CHUNK: usize = 16 * 1024;

const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// A framed, non-blocking TCP stream.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    inbound: Vec<u8>,
    /// Start of the first unconsumed byte in `inbound`.
    read_pos: usize,
    outbound: Vec<u8>,
    eof: bool,
}

impl TcpTransport {
    /// Connects to `addr` and switches the socket to non-blocking mode.
    ///
    /// # Errors
    ///
    /// Connection or socket option failures.
    pub fn connect(addr: impl ToSocketAddrs) -> NetResult<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream)
    }

    /// Wraps an accepted stream.
    ///
    /// # Errors
    ///
    /// Socket option failures.
    pub fn from_stream(stream: TcpStream) -> NetResult<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream: Some(stream),
            peer,
            inbound: Vec::new(),
            read_pos: 0,
            outbound: Vec::new(),
            eof: false,
        })
    }

    fn flush_pending(&mut self) -> NetResult<()> {
        let stream = self.stream.as_mut().ok_or(NetError::ConnectionClosed)?;
        while !self.outbound.is_empty() {
            match stream.write(&self.outbound) {
                Ok(0) => return Err(NetError::ConnectionClosed),
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn fill_inbound(&mut self) -> NetResult<()> {
        self.inbound.drain(..self.read_pos);
        self.read_pos = 0;
        let stream = self.stream.as_mut().ok_or(NetError::ConnectionClosed)?;
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => self.inbound.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn take_frame(&mut self) -> NetResult<Option<Vec<u8>>> {
        let pending = &self.inbound[self.read_pos..];
        let Some(header) = pending.get(..4) else {
            return Ok(None);
        };
        let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(NetError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {len} bytes exceeds {MAX_FRAME_SIZE}"),
            )));
        }
        let Some(body) = pending.get(4..4 + len) else {
            return Ok(None);
        };
        let frame = body.to_vec();
        self.read_pos += 4 + len;
        Ok(Some(frame))
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, frame: &[u8]) -> NetResult<()> {
        if self.stream.is_none() || self.eof {
            return Err(NetError::ConnectionClosed);
        }
        let len = u32::try_from(frame.len())
            .ok()
            .filter(|&len| len as usize <= MAX_FRAME_SIZE)
            .ok_or_else(|| {
                NetError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("frame of {} bytes exceeds {MAX_FRAME_SIZE}", frame.len()),
                ))
            })?;
        self.outbound.extend_from_slice(&len.to_le_bytes());
        self.outbound.extend_from_slice(frame);
        self.flush_pending()
    }

    fn try_recv(&mut self) -> NetResult<Option<Vec<u8>>> {
        if self.stream.is_none() {
            return Err(NetError::ConnectionClosed);
        }
        self.flush_pending()?;
        if let Some(frame) = self.take_frame()? {
            return Ok(Some(frame));
        }
        if !self.eof {
            self.fill_inbound()?;
        }
        match self.take_frame()? {
            Some(frame) => Ok(Some(frame)),
            None if self.eof => Err(NetError::ConnectionClosed),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // Best effort: whatever is still pending goes out before shutdown.
            let _ = stream.set_nonblocking(false);
            let _ = stream.set_write_timeout(Some(CLOSE_FLUSH_TIMEOUT));
            let _ = stream.write_all(&self.outbound);
            let _ = stream.shutdown(std::net::Shutdown::Both);
            self.outbound.clear();
        }
    }

    fn peer(&self) -> String {
        self.peer.to_string()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Accepts TCP connections without blocking.
pub struct TcpServerListener {
    listener: TcpListener,
}

impl TcpServerListener {
    /// Binds `addr`.
    ///
    /// # Errors
    ///
    /// Bind or socket option failures.
    pub fn bind(addr: impl ToSocketAddrs) -> NetResult<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        Ok(Self { listener })
    }

    /// Bound address, useful after binding port 0.
    ///
    /// # Errors
    ///
    /// Socket query failures.
    pub fn local_addr(&self) -> NetResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

impl Listener for TcpServerListener {
    fn accept(&mut self) -> NetResult<Option<Box<dyn Transport>>> {
        match self.listener.accept() {
            Ok((stream, _)) => Ok(Some(Box::new(TcpTransport::from_stream(stream)?))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Waits for a frame on `receiver`, flushing `sender` meanwhile.
    fn recv_blocking(receiver: &mut dyn Transport, sender: &mut dyn Transport) -> Vec<u8> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(frame) = receiver.try_recv().unwrap() {
                return frame;
            }
            let _ = sender.try_recv().unwrap();
            assert!(Instant::now() < deadline, "timed out waiting for frame");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn accept_blocking(listener: &mut TcpServerListener) -> Box<dyn Transport> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(transport) = listener.accept().unwrap() {
                return transport;
            }
            assert!(Instant::now() < deadline, "timed out waiting for connection");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_frames_survive_the_stream() {
        let mut listener = TcpServerListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpTransport::connect(listener.local_addr().unwrap()).unwrap();
        let mut server = accept_blocking(&mut listener);

        let big = vec![7u8; 200_000];
        client.send(b"small").unwrap();
        client.send(&big).unwrap();
        assert_eq!(recv_blocking(server.as_mut(), &mut client), b"small");
        assert_eq!(recv_blocking(server.as_mut(), &mut client), big);

        server.send(b"back").unwrap();
        assert_eq!(recv_blocking(&mut client, server.as_mut()), b"back");
    }

    #[test]
    fn test_peer_close_is_reported() {
        let mut listener = TcpServerListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpTransport::connect(listener.local_addr().unwrap()).unwrap();
        let mut server = accept_blocking(&mut listener);

        client.close();
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match server.try_recv() {
                Err(NetError::ConnectionClosed) => break,
                Ok(None) => {}
                other => panic!("unexpected {other:?}"),
            }
            assert!(Instant::now() < deadline, "close never observed");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_many_small_frames_in_one_read() {
        let mut listener = TcpServerListener::bind("127.0.0.1:0").unwrap();
        let mut client = TcpTransport::connect(listener.local_addr().unwrap()).unwrap();
        let mut server = accept_blocking(&mut listener);

        for i in 0u32..5_000 {
            server.send(&i.to_le_bytes()).unwrap();
        }
        for i in 0u32..5_000 {
            let frame = recv_blocking(&mut client, server.as_mut());
            assert_eq!(frame, i.to_le_bytes());
        }
        assert!(client.read_pos <= client.inbound.len());

        // The next poll finds nothing and drops the consumed bytes.
        assert!(client.try_recv().unwrap().is_none());
        assert_eq!(client.read_pos, 0);
        assert!(client.inbound.is_empty());
    }
}
