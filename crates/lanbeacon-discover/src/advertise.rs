//! Server-side role: answer discovery probes.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::codec::{self, JsonCodec, PayloadCodec};
use crate::config::DiscoveryConfig;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::DiscoverError;
use crate::identity::HandshakeId;
use crate::lifecycle::{Datagram, Inbox, Session};
use crate::platform::{discovery_supported, NoopGuard, PermissionGuard, PlatformCheck};
use crate::transport::BroadcastTransport;

const ROLE: &str = "advertiser";

/// Lifecycle state of an [`Advertiser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiserState {
    Idle,
    Listening,
}

/// Listens on the discovery port and answers probes carrying a matching
/// handshake.
///
/// Replies are unicast to the prober's observed source address. Starting
/// while already listening stops the previous session first.
pub struct Advertiser<Req, Resp, C = JsonCodec> {
    codec: Arc<C>,
    guard: Arc<dyn PermissionGuard>,
    platform_check: PlatformCheck,
    bind_addr: IpAddr,
    diagnostics: Diagnostics,
    session: Option<Session>,
    _payloads: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> Advertiser<Req, Resp, JsonCodec> {
    /// Create an idle advertiser using the JSON codec.
    pub fn new() -> Self {
        Self {
            codec: Arc::new(JsonCodec),
            guard: Arc::new(NoopGuard),
            platform_check: discovery_supported,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            diagnostics: Diagnostics::default(),
            session: None,
            _payloads: PhantomData,
        }
    }

    /// Create an idle advertiser bound according to `config`.
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self::new().with_bind_addr(config.bind_addr().into())
    }
}

impl<Req, Resp> Default for Advertiser<Req, Resp, JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Resp, C> Advertiser<Req, Resp, C>
where
    C: PayloadCodec,
{
    /// Use a different payload codec.
    pub fn with_codec<C2: PayloadCodec>(self, codec: C2) -> Advertiser<Req, Resp, C2> {
        Advertiser {
            codec: Arc::new(codec),
            guard: self.guard,
            platform_check: self.platform_check,
            bind_addr: self.bind_addr,
            diagnostics: self.diagnostics,
            session: self.session,
            _payloads: PhantomData,
        }
    }

    /// Set the permission guard held while listening.
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
    pub fn state(&self) -> AdvertiserState {
        if self.session.as_ref().is_some_and(Session::is_active) {
            AdvertiserState::Listening
        } else {
            AdvertiserState::Idle
        }
    }

    pub fn is_advertising(&self) -> bool {
        self.state() == AdvertiserState::Listening
    }

    /// Address of the listening socket, if advertising.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.session.as_ref().map(Session::local_addr)
    }

    /// Start answering probes on `port`.
    ///
    /// `responder` is called once per valid request with the prober's
    /// address; returning `None` sends nothing. Returns the bound address.
    pub async fn start_advertising<R>(
        &mut self,
        port: u16,
        handshake: HandshakeId,
        responder: R,
    ) -> Result<SocketAddr, DiscoverError>
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
        R: FnMut(Req, SocketAddr) -> Option<Resp> + Send + 'static,
    {
        if !(self.platform_check)() {
            return Err(DiscoverError::PlatformUnsupported);
        }

        self.stop_advertising().await;

        let transport = BroadcastTransport::bind(SocketAddr::new(self.bind_addr, port)).await?;
        let mut session = Session::begin(transport.clone(), self.guard.clone());
        let local_addr = session.local_addr();

        let inbox = Inbox::new(ROLE, transport, handshake, self.diagnostics.clone());
        session.spawn(serve(
            inbox,
            self.codec.clone(),
            responder,
            session.cancel_token(),
        ));
        self.session = Some(session);

        info!(%local_addr, %handshake, "Advertising via UDP broadcast discovery");
        Ok(local_addr)
    }

    /// Stop answering probes. Safe to call when idle.
    pub async fn stop_advertising(&mut self) {
        if let Some(session) = self.session.take() {
            let local_addr = session.local_addr();
            session.shutdown().await;
            info!(%local_addr, "Stopped advertising");
        }
    }
}

async fn serve<Req, Resp, C, R>(
    mut inbox: Inbox,
    codec: Arc<C>,
    mut responder: R,
    cancel: CancellationToken,
) where
    C: PayloadCodec,
    Req: DeserializeOwned,
    Resp: Serialize + Send,
    R: FnMut(Req, SocketAddr) -> Option<Resp> + Send,
{
    loop {
        let datagram = tokio::select! {
            _ = cancel.cancelled() => break,
            next = inbox.next() => match next {
                Some(datagram) => datagram,
                None => break,
            },
        };
        if answer(&inbox, codec.as_ref(), &mut responder, datagram)
            .await
            .is_break()
        {
            break;
        }
    }
    // Nobody is listening any more; make the session report it.
    cancel.cancel();
}

/// Decode one request and send the reply. Breaks only when the socket is gone.
async fn answer<Req, Resp, C, R>(
    inbox: &Inbox,
    codec: &C,
    responder: &mut R,
    datagram: Datagram,
) -> ControlFlow<()>
where
    C: PayloadCodec,
    Req: DeserializeOwned,
    Resp: Serialize + Send,
    R: FnMut(Req, SocketAddr) -> Option<Resp> + Send,
{
    let from = datagram.from;

    let request: Req = match codec.decode(&datagram.payload) {
        Ok(request) => request,
        Err(e) => {
            inbox.diagnostics().emit(
                inbox.role(),
                DiagnosticEvent::MalformedPayload {
                    from,
                    reason: e.to_string(),
                },
            );
            return ControlFlow::Continue(());
        }
    };

    let Some(response) = responder(request, from) else {
        inbox
            .diagnostics()
            .emit(inbox.role(), DiagnosticEvent::NoResponse { from });
        return ControlFlow::Continue(());
    };

    let reply = match codec::encode(codec, inbox.handshake(), &response) {
        Ok(reply) => reply,
        Err(e) => {
            inbox.diagnostics().emit(
                inbox.role(),
                DiagnosticEvent::EncodeFailed {
                    to: from,
                    reason: e.to_string(),
                },
            );
            return ControlFlow::Continue(());
        }
    };

    match inbox.transport().send_to(&reply, from).await {
        Ok(()) => debug!(%from, bytes = reply.len(), "Answered discovery request"),
        Err(DiscoverError::SocketDisposed) => return ControlFlow::Break(()),
        Err(e) => inbox.diagnostics().emit(
            inbox.role(),
            DiagnosticEvent::SendFailed {
                to: from,
                reason: e.to_string(),
            },
        ),
    }
    ControlFlow::Continue(())
}
