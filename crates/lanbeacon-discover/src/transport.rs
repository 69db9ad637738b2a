//! Broadcast-enabled UDP endpoint.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::DiscoverError;

/// A UDP socket configured for broadcast sends.
///
/// Clones share the same socket. [`close`](Self::close) is observed by every
/// clone: pending and future receives fail with
/// [`DiscoverError::SocketDisposed`], and the descriptor is released once the
/// last clone is dropped.
#[derive(Clone)]
pub struct BroadcastTransport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    socket: UdpSocket,
    local_addr: SocketAddr,
    closed: CancellationToken,
}

impl BroadcastTransport {
    /// Bind on all IPv4 interfaces. `port = 0` picks an ephemeral port.
    pub async fn open(port: u16) -> Result<Self, DiscoverError> {
        Self::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port)).await
    }

    /// Bind on a specific local address.
    pub async fn bind(addr: SocketAddr) -> Result<Self, DiscoverError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| DiscoverError::Bind { addr, source })?;
        socket.set_broadcast(true)?;
        if addr.is_ipv4() {
            if let Err(e) = socket.set_multicast_loop_v4(false) {
                debug!(error = %e, "Could not disable multicast loopback");
            }
        }
        let local_addr = socket.local_addr()?;

        debug!(%local_addr, "Opened broadcast transport");

        Ok(Self {
            inner: Arc::new(TransportInner {
                socket,
                local_addr,
                closed: CancellationToken::new(),
            }),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Best-effort send.
    ///
    /// Failures are logged here and returned so callers can report them, but
    /// they are never meant to abort the caller's loop.
    pub async fn send_to(&self, bytes: &[u8], target: SocketAddr) -> Result<(), DiscoverError> {
        if self.is_closed() {
            return Err(DiscoverError::SocketDisposed);
        }
        match self.inner.socket.send_to(bytes, target).await {
            Ok(sent) => {
                trace!(to = %target, bytes = sent, "Datagram sent");
                Ok(())
            }
            Err(e) => {
                warn!(to = %target, error = %e, "Failed to send discovery datagram");
                Err(e.into())
            }
        }
    }

    /// Wait for the next datagram.
    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), DiscoverError> {
        if self.is_closed() {
            return Err(DiscoverError::SocketDisposed);
        }
        tokio::select! {
            biased;
            _ = self.inner.closed.cancelled() => Err(DiscoverError::SocketDisposed),
            result = self.inner.socket.recv_from(buf) => result.map_err(DiscoverError::from),
        }
    }

    /// Close the transport. Closing twice is a no-op.
    pub fn close(&self) {
        if !self.inner.closed.is_cancelled() {
            debug!(local_addr = %self.inner.local_addr, "Closing broadcast transport");
            self.inner.closed.cancel();
        }
    }
}

impl std::fmt::Debug for BroadcastTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastTransport")
            .field("local_addr", &self.inner.local_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loopback(port: u16) -> SocketAddr {
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port)
    }

    #[tokio::test]
    async fn test_open_ephemeral_port() {
        let transport = BroadcastTransport::open(0).await.unwrap();
        assert_ne!(transport.local_addr().port(), 0);
        assert!(!transport.is_closed());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let first = BroadcastTransport::bind(loopback(0)).await.unwrap();
        let err = BroadcastTransport::bind(first.local_addr()).await.unwrap_err();
        assert!(matches!(err, DiscoverError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let a = BroadcastTransport::bind(loopback(0)).await.unwrap();
        let b = BroadcastTransport::bind(loopback(0)).await.unwrap();

        a.send_to(b"hello", b.local_addr()).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = tokio::time::timeout(Duration::from_secs(2), b.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"hello");
        assert_eq!(from, a.local_addr());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let transport = BroadcastTransport::open(0).await.unwrap();
        transport.close();
        transport.close();
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_operations_after_close_report_disposed() {
        let transport = BroadcastTransport::bind(loopback(0)).await.unwrap();
        transport.close();

        let mut buf = [0u8; 4];
        assert!(matches!(
            transport.recv_from(&mut buf).await,
            Err(DiscoverError::SocketDisposed)
        ));
        assert!(matches!(
            transport.send_to(b"x", loopback(9)).await,
            Err(DiscoverError::SocketDisposed)
        ));
    }

    #[tokio::test]
    async fn test_close_wakes_pending_receive() {
        let transport = BroadcastTransport::bind(loopback(0)).await.unwrap();
        let receiver = transport.clone();

        let pending = tokio::spawn(async move {
            let mut buf = [0u8; 4];
            receiver.recv_from(&mut buf).await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        transport.close();

        let result = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(DiscoverError::SocketDisposed)));
    }
}
