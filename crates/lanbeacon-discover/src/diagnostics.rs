//! Observability for datagrams the receive loops drop.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::identity::HandshakeId;

/// Something a discovery loop noticed but did not treat as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// A datagram from another application or protocol version.
    HandshakeMismatch {
        from: SocketAddr,
        received: HandshakeId,
    },
    /// A datagram shorter than the handshake.
    Truncated { from: SocketAddr, len: usize },
    /// The handshake matched but the payload did not decode.
    MalformedPayload { from: SocketAddr, reason: String },
    /// A reply or broadcast did not fit in a datagram or failed to serialize.
    EncodeFailed { to: SocketAddr, reason: String },
    /// A reply or broadcast could not be sent.
    SendFailed { to: SocketAddr, reason: String },
    /// The responder chose not to answer a request.
    NoResponse { from: SocketAddr },
    /// The socket failed and the receive loop ended.
    ReceiveFailed { reason: String },
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandshakeMismatch { from, received } => {
                write!(f, "handshake mismatch from {from} ({received})")
            }
            Self::Truncated { from, len } => write!(f, "truncated datagram from {from} ({len} bytes)"),
            Self::MalformedPayload { from, reason } => {
                write!(f, "malformed payload from {from}: {reason}")
            }
            Self::EncodeFailed { to, reason } => write!(f, "could not encode for {to}: {reason}"),
            Self::SendFailed { to, reason } => write!(f, "send to {to} failed: {reason}"),
            Self::NoResponse { from } => write!(f, "no response for {from}"),
            Self::ReceiveFailed { reason } => write!(f, "receive failed: {reason}"),
        }
    }
}

type Hook = Arc<dyn Fn(&DiagnosticEvent) + Send + Sync>;

/// Fire-and-forget sink for [`DiagnosticEvent`]s.
///
/// Every event is logged; an installed hook additionally sees it.
#[derive(Clone, Default)]
pub struct Diagnostics {
    hook: Option<Hook>,
}

impl Diagnostics {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&DiagnosticEvent) + Send + Sync + 'static,
    {
        Self {
            hook: Some(Arc::new(hook)),
        }
    }

    pub fn emit(&self, role: &'static str, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::HandshakeMismatch { .. } | DiagnosticEvent::Truncated { .. } => {
                trace!(role, event = %event, "Dropped foreign datagram");
            }
            DiagnosticEvent::MalformedPayload { .. } | DiagnosticEvent::NoResponse { .. } => {
                debug!(role, event = %event, "Dropped datagram");
            }
            DiagnosticEvent::EncodeFailed { .. } => {
                warn!(role, event = %event, "Dropped outgoing datagram");
            }
            DiagnosticEvent::SendFailed { .. } | DiagnosticEvent::ReceiveFailed { .. } => {
                warn!(role, event = %event, "Discovery socket problem");
            }
        }
        if let Some(hook) = &self.hook {
            hook(&event);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
