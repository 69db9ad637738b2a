//! Payloads the CLI exchanges over discovery.

use lanbeacon_util::Identifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an advertiser tells probers about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerAnnouncement {
    /// Stable per-process id; probers deduplicate on it.
    pub server_id: String,
    pub name: String,
    pub hostname: String,
    /// Port of the announced service, not the discovery port.
    pub service_port: u16,
    pub version: String,
}

impl ServerAnnouncement {
    pub fn new(name: impl Into<String>, hostname: impl Into<String>, service_port: u16) -> Self {
        Self {
            server_id: Identifier::server(),
            name: name.into(),
            hostname: hostname.into(),
            service_port,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl fmt::Display for ServerAnnouncement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {}:{} (v{})",
            self.name, self.hostname, self.service_port, self.version
        )
    }
}

/// What a prober broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub client_id: String,
    pub client_name: String,
    /// Case-insensitive substring the server name must contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl ProbeRequest {
    pub fn new(client_name: impl Into<String>, filter: Option<String>) -> Self {
        Self {
            client_id: Identifier::prober(),
            client_name: client_name.into(),
            filter: filter.filter(|f| !f.trim().is_empty()),
        }
    }

    /// Whether a server called `server_name` should answer.
    pub fn matches(&self, server_name: &str) -> bool {
        match &self.filter {
            Some(filter) => server_name
                .to_lowercase()
                .contains(&filter.trim().to_lowercase()),
            None => true,
        }
    }
}

/// Name of this machine, or `localhost` if it cannot be read.
pub fn local_hostname() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to read hostname");
            "localhost".to_string()
        })
}
