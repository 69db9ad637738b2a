//! UDP broadcast service discovery for lanbeacon.
//!
//! This crate lets a process advertise itself on the local broadcast domain
//! and lets other processes find it without knowing any address up front.
//!
//! - An [`Advertiser`] listens on a well-known port and answers requests.
//! - A [`Prober`] broadcasts requests periodically and reports replies.
//!
//! Every datagram starts with an 8-byte big-endian [`HandshakeId`]. Datagrams
//! whose handshake differs are foreign noise and are dropped silently, as are
//! payloads that fail to decode. Payload types are application-defined and
//! serialized by a [`PayloadCodec`] (JSON by default).
//!
//! # Example: Advertising a Server
//!
//! ```no_run
//! use lanbeacon_discover::{Advertiser, HandshakeId, DEFAULT_DISCOVERY_PORT};
//!
//! # async fn run() -> Result<(), lanbeacon_discover::DiscoverError> {
//! let handshake = HandshakeId::derive("arena", "1.4.0");
//! let mut advertiser: Advertiser<String, String> = Advertiser::new();
//!
//! advertiser
//!     .start_advertising(DEFAULT_DISCOVERY_PORT, handshake, |mode, _from| {
//!         (mode == "deathmatch").then(|| "arena-01".to_string())
//!     })
//!     .await?;
//!
//! // ... later
//! advertiser.stop_advertising().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Discovering Servers
//!
//! ```no_run
//! use lanbeacon_discover::{HandshakeId, Prober, DEFAULT_DISCOVERY_PORT};
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), lanbeacon_discover::DiscoverError> {
//! let handshake = HandshakeId::derive("arena", "1.4.0");
//! let mut prober: Prober<String, String> = Prober::new();
//!
//! prober
//!     .start_discovery(
//!         DEFAULT_DISCOVERY_PORT,
//!         handshake,
//!         || "deathmatch".to_string(),
//!         |found| println!("Found: {}", found),
//!         Duration::from_secs(1),
//!     )
//!     .await?;
//!
//! tokio::time::sleep(Duration::from_secs(3)).await;
//! prober.stop_discovery().await;
//! # Ok(())
//! # }
//! ```

mod advertise;
pub mod codec;
mod config;
mod diagnostics;
mod error;
mod identity;
mod lifecycle;
mod platform;
mod probe;
mod service;
mod transport;

pub use advertise::{Advertiser, AdvertiserState};
pub use codec::{JsonCodec, PayloadCodec, MAX_DATAGRAM_SIZE};
pub use config::DiscoveryConfig;
pub use diagnostics::DiagnosticEvent;
pub use error::{ConfigError, DiscoverError};
pub use identity::{AppIdentity, FixedIdentity, HandshakeId, IdentityProvider, DEFAULT_APP_ID};
pub use platform::{discovery_supported, NoopGuard, PermissionGuard, PlatformCheck};
pub use probe::{Prober, ProberState};
pub use service::{
    clamp_interval, DiscoveredServer, DEFAULT_BROADCAST_INTERVAL, DEFAULT_DISCOVERY_PORT,
    MIN_BROADCAST_INTERVAL,
};
pub use transport::BroadcastTransport;
