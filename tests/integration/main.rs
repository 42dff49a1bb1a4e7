//! mocopi integration test harness.
//!
//! Every test binds a real receiver to an OS-assigned loopback port and
//! sends datagrams at it from a plain UDP socket, so tests can run in
//! parallel without sharing ports.
//!
//!   cargo test --test integration

use std::net::UdpSocket;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use mocopi_receiver::{Receiver, TickStats, UdpTransport};

mod faults;
mod rebind;
mod stream;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const SCENE_SCALE: f32 = 1000.0;

/// A receiver bound to a fresh port, plus a socket to send to it from.
pub struct Loopback {
    pub receiver: Receiver<UdpTransport>,
    pub sender: UdpSocket,
    pub port: u16,
}

impl Loopback {
    pub fn new() -> Result<Self> {
        let mut receiver = Receiver::<UdpTransport>::new(SCENE_SCALE)?;
        receiver.setup(0).context("failed to bind receiver")?;
        let port = receiver.port().context("receiver reports no port")?;
        let sender = UdpSocket::bind("127.0.0.1:0").context("failed to bind sender")?;
        Ok(Self {
            receiver,
            sender,
            port,
        })
    }

    pub fn send(&self, datagram: &[u8]) -> Result<()> {
        self.sender
            .send_to(datagram, ("127.0.0.1", self.port))
            .context("send failed")?;
        Ok(())
    }

    /// Tick until `expected` datagrams have been accepted or rejected in
    /// total, or fail after `timeout`.
    pub fn drain(&mut self, expected: usize, timeout: Duration) -> Result<TickStats> {
        let deadline = Instant::now() + timeout;
        let mut total = TickStats::default();
        loop {
            let tick = self.receiver.update();
            total.accepted += tick.accepted;
            total.rejected += tick.rejected;
            total.bytes += tick.bytes;
            if total.accepted + total.rejected >= expected {
                return Ok(total);
            }
            if Instant::now() >= deadline {
                bail!("only {} of {expected} datagrams arrived", total.accepted + total.rejected);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

pub const TIMEOUT: Duration = Duration::from_secs(2);

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_idle_receiver_returns_immediately() {
    let mut lb = Loopback::new().expect("loopback");
    let start = Instant::now();
    let tick = lb.receiver.update();
    assert_eq!(tick, TickStats::default());
    assert!(start.elapsed() < Duration::from_millis(100), "update blocked");
}
