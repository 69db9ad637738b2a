//! Session ownership and teardown shared by both roles.

use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{self, MAX_DATAGRAM_SIZE};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::DiscoverError;
use crate::identity::HandshakeId;
use crate::platform::PermissionGuard;
use crate::transport::BroadcastTransport;

/// Resources held by one active advertise or probe session.
///
/// Teardown order is fixed: cancel the loops, release the permission guard,
/// then close the transport. Every step tolerates having already run.
pub(crate) struct Session {
    transport: BroadcastTransport,
    guard: Arc<dyn PermissionGuard>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    guard_held: bool,
}

impl Session {
    /// Take ownership of an open transport and acquire the guard.
    pub(crate) fn begin(transport: BroadcastTransport, guard: Arc<dyn PermissionGuard>) -> Self {
        guard.acquire();
        Self {
            transport,
            guard,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            guard_held: true,
        }
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// False once any loop has exited and cancelled the session, even if
    /// the owner has not stopped it yet.
    pub(crate) fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &BroadcastTransport {
        &self.transport
    }

    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(task));
    }

    fn quiesce(&mut self) {
        self.cancel.cancel();
        if self.guard_held {
            self.guard.release();
            self.guard_held = false;
        }
        self.transport.close();
    }

    /// Tear down and wait for the loops to exit, so the socket is released
    /// by the time this returns.
    pub(crate) async fn shutdown(mut self) {
        self.quiesce();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(error = %e, "Discovery task panicked");
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.quiesce();
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// A handshake-valid datagram with the handshake stripped.
pub(crate) struct Datagram {
    pub from: SocketAddr,
    pub payload: Vec<u8>,
}

/// Receive side shared by both roles: yields only datagrams carrying the
/// expected handshake and drops everything else.
pub(crate) struct Inbox {
    role: &'static str,
    transport: BroadcastTransport,
    handshake: HandshakeId,
    diagnostics: Diagnostics,
    buf: Vec<u8>,
}

impl Inbox {
    pub(crate) fn new(
        role: &'static str,
        transport: BroadcastTransport,
        handshake: HandshakeId,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            role,
            transport,
            handshake,
            diagnostics,
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    pub(crate) fn role(&self) -> &'static str {
        self.role
    }

    pub(crate) fn transport(&self) -> &BroadcastTransport {
        &self.transport
    }

    pub(crate) fn handshake(&self) -> HandshakeId {
        self.handshake
    }

    pub(crate) fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Next matching datagram, or `None` once the transport is gone.
    pub(crate) async fn next(&mut self) -> Option<Datagram> {
        loop {
            let (len, from) = match self.transport.recv_from(&mut self.buf).await {
                Ok(received) => received,
                Err(DiscoverError::SocketDisposed) => {
                    debug!(role = self.role, "Receive loop stopped");
                    return None;
                }
                // ICMP port-unreachable from an earlier send on some platforms.
                Err(DiscoverError::Io(e)) if e.kind() == ErrorKind::ConnectionReset => {
                    trace!(role = self.role, "Ignoring connection reset");
                    continue;
                }
                Err(e) => {
                    self.diagnostics.emit(
                        self.role,
                        DiagnosticEvent::ReceiveFailed {
                            reason: e.to_string(),
                        },
                    );
                    return None;
                }
            };

            match codec::split(&self.buf[..len]) {
                Err(_) => {
                    self.diagnostics
                        .emit(self.role, DiagnosticEvent::Truncated { from, len });
                }
                Ok((received, _)) if received != self.handshake => {
                    self.diagnostics
                        .emit(self.role, DiagnosticEvent::HandshakeMismatch { from, received });
                }
                Ok((_, payload)) => {
                    return Some(Datagram {
                        from,
                        payload: payload.to_vec(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingGuard {
        acquired: AtomicUsize,
        released: AtomicUsize,
    }

    impl PermissionGuard for CountingGuard {
        fn acquire(&self) {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }

        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn loopback_transport() -> BroadcastTransport {
        BroadcastTransport::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_shutdown_releases_everything_once() {
        let guard = Arc::new(CountingGuard::default());
        let transport = loopback_transport().await;
        let mut session = Session::begin(transport.clone(), guard.clone());

        let cancel = session.cancel_token();
        session.spawn(async move { cancel.cancelled().await });

        session.shutdown().await;

        assert_eq!(guard.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(guard.released.load(Ordering::SeqCst), 1);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn test_drop_quiesces_session() {
        let guard = Arc::new(CountingGuard::default());
        let transport = loopback_transport().await;
        let session = Session::begin(transport.clone(), guard.clone());
        let cancel = session.cancel_token();

        drop(session);

        assert!(cancel.is_cancelled());
        assert!(transport.is_closed());
        assert_eq!(guard.released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inbox_filters_by_handshake() {
        let transport = loopback_transport().await;
        let target = transport.local_addr();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let diagnostics = Diagnostics::new(move |e| sink.lock().unwrap().push(e.clone()));
        let mut inbox = Inbox::new("test", transport, HandshakeId::new(7), diagnostics);

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"abc", target).await.unwrap();
        let mut foreign = HandshakeId::new(8).to_be_bytes().to_vec();
        foreign.extend_from_slice(b"{}");
        sender.send_to(&foreign, target).await.unwrap();
        let mut valid = HandshakeId::new(7).to_be_bytes().to_vec();
        valid.extend_from_slice(b"ok");
        sender.send_to(&valid, target).await.unwrap();

        let datagram = tokio::time::timeout(Duration::from_secs(2), inbox.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(datagram.payload, b"ok");
        assert_eq!(datagram.from, sender.local_addr().unwrap());

        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], DiagnosticEvent::Truncated { len: 3, .. }));
        assert!(matches!(
            events[1],
            DiagnosticEvent::HandshakeMismatch { received, .. } if received == HandshakeId::new(8)
        ));
    }

    #[tokio::test]
    async fn test_inbox_ends_when_transport_closes() {
        let transport = loopback_transport().await;
        let mut inbox = Inbox::new("test", transport.clone(), HandshakeId::new(1), Diagnostics::default());
        transport.close();
        assert!(inbox.next().await.is_none());
    }
}
