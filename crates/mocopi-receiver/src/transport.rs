//! Datagram transports the receiver pulls from.
//!
//! The receiver only needs three things: bind to a port, ask how many bytes
//! the next queued datagram holds without blocking, and receive it.

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

/// Scratch size for peeking. Larger than any IPv4 UDP payload.
const PEEK_BUFFER: usize = 65536;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to create UDP socket: {0}")]
    Create(#[source] io::Error),

    #[error("failed to configure UDP socket: {0}")]
    Configure(#[source] io::Error),

    #[error("failed to bind UDP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
}

pub trait Transport: Sized {
    /// Create a transport listening on `port`. 0 asks the OS for a port.
    fn bind(port: u16) -> Result<Self, TransportError>;

    /// The port actually bound.
    fn local_port(&self) -> u16;

    /// Size of the next queued datagram, or 0 if nothing is queued.
    /// Never blocks.
    fn available(&mut self) -> io::Result<usize>;

    /// Receive the next queued datagram into `buf`. Returns the number of
    /// bytes written.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

// ── UDP ───────────────────────────────────────────────────────────────────────

/// Non-blocking IPv4 UDP socket bound to `0.0.0.0:port`.
pub struct UdpTransport {
    socket: UdpSocket,
    port: u16,
    scratch: Vec<u8>,
}

impl UdpTransport {
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl Transport for UdpTransport {
    fn bind(port: u16) -> Result<Self, TransportError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(TransportError::Create)?;
        socket
            .set_nonblocking(true)
            .map_err(TransportError::Configure)?;
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket
            .bind(&addr.into())
            .map_err(|source| TransportError::Bind { port, source })?;

        let socket: UdpSocket = socket.into();
        let port = socket
            .local_addr()
            .map_err(TransportError::Configure)?
            .port();

        Ok(Self {
            socket,
            port,
            scratch: vec![0u8; PEEK_BUFFER],
        })
    }

    fn local_port(&self) -> u16 {
        self.port
    }

    fn available(&mut self) -> io::Result<usize> {
        loop {
            match self.socket.peek_from(&mut self.scratch) {
                Ok((0, from)) => {
                    // an empty datagram would otherwise sit at the head of the queue
                    self.socket.recv_from(&mut self.scratch)?;
                    tracing::warn!(%from, "empty datagram, discarding");
                }
                Ok((len, _)) => return Ok(len),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(0),
                Err(e) => return Err(e),
            }
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.socket.recv_from(buf) {
            Ok((len, _)) => Ok(len),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }
}

// ── In-memory ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Queued {
    announced: usize,
    data: Vec<u8>,
}

/// Queue of datagrams, for tests and replay.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    port: u16,
    queue: VecDeque<Queued>,
}

impl MemoryTransport {
    pub fn push(&mut self, datagram: impl Into<Vec<u8>>) {
        let data = datagram.into();
        self.queue.push_back(Queued {
            announced: data.len(),
            data,
        });
    }

    /// Queue a datagram whose announced size differs from what a receive
    /// delivers, as when a datagram is cut short on the way in.
    pub fn push_announced(&mut self, datagram: impl Into<Vec<u8>>, announced: usize) {
        self.queue.push_back(Queued {
            announced,
            data: datagram.into(),
        });
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Transport for MemoryTransport {
    fn bind(port: u16) -> Result<Self, TransportError> {
        Ok(Self {
            port,
            queue: VecDeque::new(),
        })
    }

    fn local_port(&self) -> u16 {
        self.port
    }

    fn available(&mut self) -> io::Result<usize> {
        while let Some(front) = self.queue.front() {
            if front.announced > 0 {
                return Ok(front.announced);
            }
            self.queue.pop_front();
            tracing::warn!("empty datagram, discarding");
        }
        Ok(0)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(next) = self.queue.pop_front() else {
            return Ok(0);
        };
        let len = next.data.len().min(buf.len());
        buf[..len].copy_from_slice(&next.data[..len]);
        Ok(len)
    }
}
