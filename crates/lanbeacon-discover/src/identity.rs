//! Handshake identifiers and the providers that supply them.
//!
//! Two endpoints only talk to each other when their [`HandshakeId`]s are
//! bit-identical. The value is either configured explicitly or derived
//! from application identity metadata:
//!
//! ```text
//! handshake = u64::from_be_bytes(SHA-256(app_id || 0x00 || app_version)[..8])
//! ```
//!
//! The derivation is deterministic, so every instance of the same build
//! agrees on the value without coordination.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::DiscoverError;

/// Application identity used when nothing else is configured.
pub const DEFAULT_APP_ID: &str = "lanbeacon";

/// 64-bit identifier of a compatible application/protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandshakeId(u64);

impl HandshakeId {
    /// Width of a handshake on the wire.
    pub const LEN: usize = 8;

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn to_be_bytes(self) -> [u8; Self::LEN] {
        self.0.to_be_bytes()
    }

    pub const fn from_be_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Derive a handshake from application identity metadata.
    pub fn derive(app_id: &str, app_version: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(app_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(app_version.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&digest[..Self::LEN]);
        Self::from_be_bytes(bytes)
    }
}

impl From<u64> for HandshakeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for HandshakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl FromStr for HandshakeId {
    type Err = DiscoverError;

    /// Parses `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        };
        parsed
            .map(Self)
            .map_err(|e| DiscoverError::InvalidIdentity(format!("bad handshake {s:?}: {e}")))
    }
}

impl Serialize for HandshakeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HandshakeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(Self(value)),
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Supplies the handshake a role should use.
pub trait IdentityProvider {
    fn handshake(&self) -> HandshakeId;
}

/// A handshake fixed at author time.
#[derive(Debug, Clone, Copy)]
pub struct FixedIdentity(pub HandshakeId);

impl IdentityProvider for FixedIdentity {
    fn handshake(&self) -> HandshakeId {
        self.0
    }
}

/// A handshake derived from an application id and version.
#[derive(Debug, Clone)]
pub struct AppIdentity {
    app_id: String,
    app_version: String,
}

impl AppIdentity {
    pub fn new(
        app_id: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Result<Self, DiscoverError> {
        let app_id = app_id.into();
        if app_id.trim().is_empty() {
            return Err(DiscoverError::InvalidIdentity(
                "application id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            app_id,
            app_version: app_version.into(),
        })
    }

    /// Identity of this crate's own build.
    pub fn builtin() -> Self {
        Self {
            app_id: DEFAULT_APP_ID.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }
}

impl IdentityProvider for AppIdentity {
    fn handshake(&self) -> HandshakeId {
        HandshakeId::derive(&self.app_id, &self.app_version)
    }
}
