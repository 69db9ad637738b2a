//! Test fixtures for reproducible discovery scenarios.
//!
//! Everything here binds to `127.0.0.1` so tests never depend on a real
//! broadcast-capable interface.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use lanbeacon_discover::{codec, HandshakeId, JsonCodec, MAX_DATAGRAM_SIZE};

/// The loopback address as an [`IpAddr`].
pub fn loopback_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// A raw UDP socket on loopback that speaks the envelope format by hand.
///
/// Used to play the other side of a conversation: a foreign application,
/// a misbehaving peer, or a stand-in advertiser.
///
/// # Example
///
/// ```rust
/// use lanbeacon_discover::HandshakeId;
/// use lanbeacon_test_utils::fixtures::LoopbackPeer;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let a = LoopbackPeer::bind().await;
/// let b = LoopbackPeer::bind().await;
///
/// a.send_envelope(HandshakeId::new(1), &"hi", b.addr()).await;
/// let (handshake, text, from) = b
///     .recv_envelope::<String>(Duration::from_secs(1))
///     .await
///     .unwrap();
///
/// assert_eq!(handshake, HandshakeId::new(1));
/// assert_eq!(text, "hi");
/// assert_eq!(from, a.addr());
/// # }
/// ```
pub struct LoopbackPeer {
    socket: UdpSocket,
    addr: SocketAddr,
}

impl LoopbackPeer {
    /// Bind a peer on an ephemeral loopback port.
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind(SocketAddr::new(loopback_ip(), 0))
            .await
            .expect("Failed to bind loopback peer");
        let addr = socket.local_addr().expect("Failed to read peer address");
        Self { socket, addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send arbitrary bytes.
    pub async fn send_raw(&self, bytes: &[u8], to: SocketAddr) {
        self.socket
            .send_to(bytes, to)
            .await
            .expect("Failed to send raw datagram");
    }

    /// Send a JSON payload behind `handshake`.
    pub async fn send_envelope<T: Serialize>(&self, handshake: HandshakeId, payload: &T, to: SocketAddr) {
        let bytes = codec::encode(&JsonCodec, handshake, payload).expect("Failed to encode envelope");
        self.send_raw(&bytes, to).await;
    }

    /// Receive one datagram, or `None` if nothing arrives in time.
    pub async fn recv_raw(&self, timeout: Duration) -> Option<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                buf.truncate(len);
                Some((buf, from))
            }
            _ => None,
        }
    }

    /// Receive and decode one JSON envelope.
    pub async fn recv_envelope<T: DeserializeOwned>(
        &self,
        timeout: Duration,
    ) -> Option<(HandshakeId, T, SocketAddr)> {
        let (bytes, from) = self.recv_raw(timeout).await?;
        let (handshake, payload) = codec::decode(&JsonCodec, &bytes).ok()?;
        Some((handshake, payload, from))
    }

    /// Collect every datagram that arrives during `window`.
    pub async fn collect_for(&self, window: Duration) -> Vec<(Vec<u8>, SocketAddr)> {
        let deadline = Instant::now() + window;
        let mut received = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return received;
            }
            match self.recv_raw(remaining).await {
                Some(datagram) => received.push(datagram),
                None => return received,
            }
        }
    }
}

/// A temporary directory holding a discovery config file.
pub struct TestConfig {
    temp_dir: TempDir,
    path: PathBuf,
}

impl TestConfig {
    /// Write `contents` to `config.json` in a fresh temporary directory.
    pub fn with_contents(contents: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, contents).expect("Failed to write config file");
        Self { temp_dir, path }
    }

    /// Path of the config file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the temporary directory.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }
}
