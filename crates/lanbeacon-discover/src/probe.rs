//! Client-side role: broadcast probes and collect answers.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::codec::{self, JsonCodec, PayloadCodec};
use crate::config::DiscoveryConfig;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::DiscoverError;
use crate::identity::HandshakeId;
use crate::lifecycle::{Inbox, Session};
use crate::platform::{discovery_supported, NoopGuard, PermissionGuard, PlatformCheck};
use crate::service::{clamp_interval, DiscoveredServer};
use crate::transport::BroadcastTransport;

const ROLE: &str = "prober";

/// Lifecycle state of a [`Prober`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProberState {
    Idle,
    Probing,
}

/// Periodically broadcasts requests and reports every valid response.
///
/// The prober binds an ephemeral port; advertisers reply to it directly.
/// Responses are not de-duplicated.
pub struct Prober<Req, Resp, C = JsonCodec> {
    codec: Arc<C>,
    guard: Arc<dyn PermissionGuard>,
    platform_check: PlatformCheck,
    bind_addr: IpAddr,
    broadcast_addr: IpAddr,
    diagnostics: Diagnostics,
    session: Option<Session>,
    _payloads: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> Prober<Req, Resp, JsonCodec> {
    /// Create an idle prober using the JSON codec.
    pub fn new() -> Self {
        Self {
            codec: Arc::new(JsonCodec),
            guard: Arc::new(NoopGuard),
            platform_check: discovery_supported,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            broadcast_addr: IpAddr::V4(Ipv4Addr::BROADCAST),
            diagnostics: Diagnostics::default(),
            session: None,
            _payloads: PhantomData,
        }
    }

    /// Create an idle prober with addresses taken from `config`.
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new()
            .with_bind_addr(config.bind_addr().into())
            .with_broadcast_addr(config.broadcast_addr().into())
    }
}

impl<Req, Resp> Default for Prober<Req, Resp, JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp, C> Prober<Req, Resp, C>
where
    C: PayloadCodec,
{
    /// Use a different payload codec.
    pub fn with_codec<C2: PayloadCodec>(self, codec: C2) -> Prober<Req, Resp, C2> {
        Prober {
            codec: Arc::new(codec),
            guard: self.guard,
            platform_check: self.platform_check,
            bind_addr: self.bind_addr,
            broadcast_addr: self.broadcast_addr,
            diagnostics: self.diagnostics,
            session: self.session,
            _payloads: PhantomData,
        }
    }

    /// Set the permission guard held while probing.
    pub fn with_guard(mut self, guard: impl PermissionGuard) -> Self {
        self.guard = Arc::new(guard);
        self
    }

    /// Set the predicate deciding whether discovery is allowed.
    pub fn with_platform_check(mut self, check: PlatformCheck) -> Self {
        self.platform_check = check;
        self
    }

    /// Set the local address to bind on.
    pub fn with_bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set where probes are broadcast to (the limited broadcast address by
    /// default).
    pub fn with_broadcast_addr(mut self, addr: IpAddr) -> Self {
        self.broadcast_addr = addr;
        self
    }

    /// Observe dropped datagrams and send failures.
    pub fn with_diagnostics<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DiagnosticEvent) + Send + Sync + 'static,
    {
        self.diagnostics = Diagnostics::new(hook);
        self
    }

    /// Reports idle once the receive loop has died, even before the session
    /// is stopped.
    pub fn state(&self) -> ProberState {
        if self.session.as_ref().is_some_and(Session::is_active) {
            ProberState::Probing
        } else {
            ProberState::Idle
        }
    }

    pub fn is_probing(&self) -> bool {
        self.state() == ProberState::Probing
    }

    /// Address of the probing socket, if probing.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.session.as_ref().map(Session::local_addr)
    }

    /// Start probing advertisers listening on `port`.
    ///
    /// A request built by `request_factory` is broadcast immediately and then
    /// every `interval` (never more often than
    /// [`MIN_BROADCAST_INTERVAL`](crate::MIN_BROADCAST_INTERVAL)).
    /// `on_found` is called once per valid response.
    pub async fn start_discovery<F, H>(
        &mut self,
        port: u16,
        handshake: HandshakeId,
        request_factory: F,
        on_found: H,
        interval: Duration,
    ) -> Result<SocketAddr, DiscoverError>
    where
        Req: Serialize + Send + 'static,
        Resp: DeserializeOwned + Send + 'static,
        F: FnMut() -> Req + Send + 'static,
        H: FnMut(DiscoveredServer<Resp>) + Send + 'static,
    {
        if !(self.platform_check)() {
            return Err(DiscoverError::PlatformUnsupported);
        }

        self.stop_discovery().await;

        let transport = BroadcastTransport::bind(SocketAddr::new(self.bind_addr, 0)).await?;
        let mut session = Session::begin(transport.clone(), self.guard.clone());
        let local_addr = session.local_addr();
        let period = clamp_interval(interval);

        let beacon = Beacon {
            transport: transport.clone(),
            codec: self.codec.clone(),
            handshake,
            request_factory,
            target: SocketAddr::new(self.broadcast_addr, port),
            period,
            diagnostics: self.diagnostics.clone(),
            _request: PhantomData,
        };
        session.spawn(beacon.run(session.cancel_token()));

        let inbox = Inbox::new(ROLE, transport, handshake, self.diagnostics.clone());
        session.spawn(collect(
            inbox,
            self.codec.clone(),
            on_found,
            session.cancel_token(),
        ));
        self.session = Some(session);

        info!(
            %local_addr,
            %handshake,
            port,
            interval_ms = period.as_millis() as u64,
            "Probing for advertisers"
        );
        Ok(local_addr)
    }

    /// Stop probing. Safe to call when idle.
    pub async fn stop_discovery(&mut self) {
        if let Some(session) = self.session.take() {
            let local_addr = session.local_addr();
            session.shutdown().await;
            info!(%local_addr, "Stopped probing");
        }
    }
}

/// Periodic request broadcaster.
struct Beacon<Req, C, F> {
    transport: BroadcastTransport,
    codec: Arc<C>,
    handshake: HandshakeId,
    request_factory: F,
    target: SocketAddr,
    period: Duration,
    diagnostics: Diagnostics,
    _request: PhantomData<fn() -> Req>,
}

impl<Req, C, F> Beacon<Req, C, F>
where
    C: PayloadCodec,
    Req: Serialize,
    F: FnMut() -> Req,
{
    async fn run(mut self, cancel: CancellationToken) {
        // The first tick completes immediately.
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let request = (self.request_factory)();
            let bytes = match codec::encode(self.codec.as_ref(), self.handshake, &request) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.diagnostics.emit(
                        ROLE,
                        DiagnosticEvent::EncodeFailed {
                            to: self.target,
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            match self.transport.send_to(&bytes, self.target).await {
                Ok(()) => trace!(to = %self.target, "Broadcast discovery request"),
                Err(DiscoverError::SocketDisposed) => break,
                Err(e) => self.diagnostics.emit(
                    ROLE,
                    DiagnosticEvent::SendFailed {
                        to: self.target,
                        reason: e.to_string(),
                    },
                ),
            }
        }
        cancel.cancel();
    }
}

async fn collect<Resp, C, H>(
    mut inbox: Inbox,
    codec: Arc<C>,
    mut on_found: H,
    cancel: CancellationToken,
) where
    C: PayloadCodec,
    Resp: DeserializeOwned,
    H: FnMut(DiscoveredServer<Resp>),
{
    loop {
        let datagram = tokio::select! {
            _ = cancel.cancelled() => break,
            next = inbox.next() => match next {
                Some(datagram) => datagram,
                None => break,
            },
        };

        match codec.decode::<Resp>(&datagram.payload) {
            Ok(response) => {
                debug!(from = %datagram.from, "Discovery response received");
                on_found(DiscoveredServer::new(response, datagram.from));
            }
            Err(e) => inbox.diagnostics().emit(
                inbox.role(),
                DiagnosticEvent::MalformedPayload {
                    from: datagram.from,
                    reason: e.to_string(),
                },
            ),
        }
    }
    // Answers can no longer arrive, so stop broadcasting too.
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> Prober<String, String> {
        Prober::new()
            .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_broadcast_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[test]
    fn test_prober_initial_state() {
        let prober = loopback();
        assert!(!prober.is_probing());
        assert_eq!(prober.state(), ProberState::Idle);
        assert!(prober.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let mut prober = loopback();
        prober.stop_discovery().await;
        assert!(!prober.is_probing());
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port() {
        let mut prober = loopback();
        let addr = prober
            .start_discovery(
                47999,
                HandshakeId::new(1),
                || "probe".to_string(),
                |_| {},
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_ne!(addr.port(), 0);
        assert_ne!(addr.port(), 47999);
        assert_eq!(prober.state(), ProberState::Probing);

        prober.stop_discovery().await;
        prober.stop_discovery().await;
        assert_eq!(prober.state(), ProberState::Idle);
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let mut prober = loopback().with_platform_check(|| false);
        let err = prober
            .start_discovery(
                47999,
                HandshakeId::new(1),
                || "probe".to_string(),
                |_| {},
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoverError::PlatformUnsupported));
        assert!(!prober.is_probing());
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn test_receive_loop_exit_stops_beacon() {
        let listener = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let any_port = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let outgoing = BroadcastTransport::bind(any_port).await.unwrap();
        let incoming = BroadcastTransport::bind(any_port).await.unwrap();
        let cancel = CancellationToken::new();

        let beacon = Beacon {
            transport: outgoing,
            codec: Arc::new(JsonCodec),
            handshake: HandshakeId::new(1),
            request_factory: || "ping".to_string(),
            target: listener.local_addr().unwrap(),
            period: Duration::from_millis(20),
            diagnostics: Diagnostics::default(),
            _request: PhantomData,
        };
        let beacon_task = tokio::spawn(beacon.run(cancel.clone()));
        let inbox = Inbox::new(
            ROLE,
            incoming.clone(),
            HandshakeId::new(1),
            Diagnostics::default(),
        );
        let collect_task = tokio::spawn(collect(
            inbox,
            Arc::new(JsonCodec),
            |_: DiscoveredServer<String>| {},
            cancel.clone(),
        ));

        let mut buf = [0u8; 64];
        listener.recv_from(&mut buf).await.unwrap();

        incoming.close();
        tokio::time::timeout(Duration::from_secs(2), collect_task)
            .await
            .unwrap()
            .unwrap();
        assert!(cancel.is_cancelled());
        tokio::time::timeout(Duration::from_secs(2), beacon_task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_dead_socket_reports_idle() {
        let mut prober = loopback();
        prober
            .start_discovery(
                47999,
                HandshakeId::new(1),
                || "probe".to_string(),
                |_| {},
                Duration::from_millis(100),
            )
            .await
            .unwrap();
        assert!(prober.is_probing());

        if let Some(session) = &prober.session {
            session.transport().close();
        }

        assert!(wait_until(|| !prober.is_probing()).await);
        assert_eq!(prober.state(), ProberState::Idle);
        prober.stop_discovery().await;
        assert!(prober.session.is_none());
    }

    #[tokio::test]
    async fn test_encode_failure_is_reported_and_beacon_continues() {
        let listener = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut round = 0;
        let transport = BroadcastTransport::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .unwrap();

        let beacon = Beacon {
            transport,
            codec: Arc::new(JsonCodec),
            handshake: HandshakeId::new(1),
            request_factory: move || {
                round += 1;
                if round == 1 {
                    "x".repeat(crate::codec::MAX_DATAGRAM_SIZE)
                } else {
                    "ping".to_string()
                }
            },
            target,
            period: Duration::from_millis(20),
            diagnostics: Diagnostics::new(move |event| sink.lock().unwrap().push(event.clone())),
            _request: PhantomData,
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(beacon.run(cancel.clone()));

        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), listener.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[HandshakeId::LEN..len], b"\"ping\"");

        cancel.cancel();
        task.await.unwrap();
        let events = seen.lock().unwrap();
        assert!(matches!(
            events.first(),
            Some(DiagnosticEvent::EncodeFailed { to, .. }) if *to == target
        ));
    }
}
