//! ULID-based identifier generation with prefixes.
//!
//! Identifiers in lanbeacon follow the pattern: `prefix_ulid`
//! For example: `srv_01hqxyz...` for an advertised server instance.

use ulid::Ulid;

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    /// An advertised server instance.
    Server,
    /// A probing client.
    Prober,
}

impl IdPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Server => "srv",
            IdPrefix::Prober => "prb",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "srv" => Some(IdPrefix::Server),
            "prb" => Some(IdPrefix::Prober),
            _ => None,
        }
    }
}

/// Identifier generation and parsing utilities.
pub struct Identifier;

impl Identifier {
    /// Generate a new identifier; later ids sort after earlier ones.
    pub fn ascending(prefix: IdPrefix) -> String {
        Self::with_ulid(prefix, Ulid::new())
    }

    /// Generate an identifier with a specific ULID.
    pub fn with_ulid(prefix: IdPrefix, ulid: Ulid) -> String {
        format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
    }

    /// Parse an identifier into its prefix and ULID parts.
    pub fn parse(id: &str) -> Option<(IdPrefix, Ulid)> {
        let (prefix, ulid) = id.split_once('_')?;
        Some((IdPrefix::parse(prefix)?, Ulid::from_string(ulid).ok()?))
    }

    /// Check if an identifier has the expected prefix.
    pub fn has_prefix(id: &str, prefix: IdPrefix) -> bool {
        id.strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }

    /// Generate a server instance ID.
    pub fn server() -> String {
        Self::ascending(IdPrefix::Server)
    }

    /// Generate a prober ID.
    pub fn prober() -> String {
        Self::ascending(IdPrefix::Prober)
    }
}
