//! Shared discovery types and defaults.

use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::time::Duration;

/// Well-known UDP port advertisers listen on.
pub const DEFAULT_DISCOVERY_PORT: u16 = 47777;

/// Default period between probe broadcasts.
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_secs(1);

/// Probe broadcasts are never sent more often than this.
pub const MIN_BROADCAST_INTERVAL: Duration = Duration::from_millis(100);

/// Clamp a broadcast interval to [`MIN_BROADCAST_INTERVAL`].
pub fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_BROADCAST_INTERVAL)
}

/// A response received by a prober, tagged with where it came from.
///
/// The address is the datagram's source as observed by the prober; the
/// advertiser never reports its own address. A host with several
/// interfaces can answer once per interface, so callers that want one
/// entry per server should de-duplicate on an identifier inside `response`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredServer<T> {
    pub response: T,
    pub address: SocketAddr,
    pub received_at: DateTime<Utc>,
}

impl<T> DiscoveredServer<T> {
    pub fn new(response: T, address: SocketAddr) -> Self {
        Self {
            response,
            address,
            received_at: Utc::now(),
        }
    }

    pub fn into_response(self) -> T {
        self.response
    }
}

impl<T: std::fmt::Display> std::fmt::Display for DiscoveredServer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.response, self.address)
    }
}
