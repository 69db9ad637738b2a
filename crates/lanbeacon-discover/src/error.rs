//! Error types for the discover crate.

use std::net::SocketAddr;
use thiserror::Error;

/// Errors that can occur while starting or running discovery.
///
/// Only `PlatformUnsupported`, `Bind` and `Config` are ever returned from
/// `start_*`. Foreign, truncated or undecodable datagrams are dropped inside
/// the receive loops and never surface as errors.
#[derive(Debug, Error)]
pub enum DiscoverError {
    /// Discovery is not allowed on this platform (e.g. a sandboxed web target).
    #[error("UDP broadcast discovery is not supported on this platform")]
    PlatformUnsupported,

    /// The discovery socket could not be bound.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A payload could not be serialized into an envelope.
    #[error("failed to encode envelope: {0}")]
    Encoding(String),

    /// A datagram was too short or its payload could not be decoded.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The transport was closed while an operation was pending.
    #[error("socket disposed")]
    SocketDisposed,

    /// Identity metadata could not produce a handshake.
    #[error("invalid application identity: {0}")]
    InvalidIdentity(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON syntax or schema.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Config file not found.
    #[error("config file not found: {path}")]
    NotFound { path: String },

    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {message}")]
    InvalidEnv { name: String, message: String },
}
