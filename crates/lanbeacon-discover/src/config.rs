//! Discovery configuration.
//!
//! Configuration is loaded from multiple sources and merged, later sources
//! winning:
//! 1. Built-in defaults
//! 2. Global config: `~/.config/lanbeacon/config.json`
//! 3. An explicit config file
//! 4. Environment overrides: `LANBEACON_*` variables

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{ConfigError, DiscoverError};
use crate::identity::{AppIdentity, HandshakeId, IdentityProvider};
use crate::service::{clamp_interval, DEFAULT_BROADCAST_INTERVAL, DEFAULT_DISCOVERY_PORT};

const ENV_PREFIX: &str = "LANBEACON_";

/// Discovery settings. Unset fields fall back to defaults in the accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// UDP port advertisers listen on and probers broadcast to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Milliseconds between probe broadcasts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_interval_ms: Option<u64>,

    /// Local address to bind sockets on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<Ipv4Addr>,

    /// Destination of probe broadcasts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_addr: Option<Ipv4Addr>,

    /// Explicit handshake; takes precedence over `app_id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handshake: Option<HandshakeId>,

    /// Application id the handshake is derived from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Application version the handshake is derived from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    /// Log level name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl DiscoveryConfig {
    /// Load and merge every configuration source.
    ///
    /// Returns the merged config and the files that contributed to it.
    /// A missing global file is skipped; a missing explicit file is an error.
    pub async fn load(explicit: Option<&Path>) -> Result<(Self, Vec<PathBuf>), DiscoverError> {
        let mut config = Self::default();
        let mut sources = Vec::new();

        if let Some(global) = Self::global_path() {
            if global.exists() {
                config = config.merge(Self::load_file(&global).await?);
                sources.push(global);
            }
        }

        if let Some(path) = explicit {
            config = config.merge(Self::load_file(path).await?);
            sources.push(path.to_path_buf());
        }

        let config = config.with_env_overrides()?;
        config.validate()?;

        debug!(sources = sources.len(), "Loaded discovery config");
        Ok((config, sources))
    }

    /// Load a single JSON config file.
    pub async fn load_file(path: &Path) -> Result<Self, DiscoverError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DiscoverError::from(ConfigError::NotFound {
                    path: path.display().to_string(),
                })
            } else {
                DiscoverError::Io(e)
            }
        })?;

        serde_json::from_str(&content).map_err(|e| {
            ConfigError::InvalidJson {
                path: path.display().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Path of the global config file.
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("lanbeacon").join("config.json"))
    }

    /// Overlay `other` on top of `self`.
    pub fn merge(self, other: Self) -> Self {
        Self {
            port: other.port.or(self.port),
            broadcast_interval_ms: other.broadcast_interval_ms.or(self.broadcast_interval_ms),
            bind_addr: other.bind_addr.or(self.bind_addr),
            broadcast_addr: other.broadcast_addr.or(self.broadcast_addr),
            handshake: other.handshake.or(self.handshake),
            app_id: other.app_id.or(self.app_id),
            app_version: other.app_version.or(self.app_version),
            log_level: other.log_level.or(self.log_level),
        }
    }

    /// Apply `LANBEACON_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, DiscoverError> {
        self.with_overrides_from(std::env::vars())
    }

    /// Apply `LANBEACON_*` overrides from an arbitrary variable list.
    pub fn with_overrides_from<I>(mut self, vars: I) -> Result<Self, DiscoverError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "PORT" => self.port = Some(parse_env(&name, &value)?),
                "BROADCAST_INTERVAL_MS" => {
                    self.broadcast_interval_ms = Some(parse_env(&name, &value)?)
                }
                "BIND_ADDR" => self.bind_addr = Some(parse_env(&name, &value)?),
                "BROADCAST_ADDR" => self.broadcast_addr = Some(parse_env(&name, &value)?),
                "HANDSHAKE" => {
                    self.handshake = Some(value.parse().map_err(|e: DiscoverError| {
                        ConfigError::InvalidEnv {
                            name: name.clone(),
                            message: e.to_string(),
                        }
                    })?)
                }
                "APP_ID" => self.app_id = Some(value),
                "APP_VERSION" => self.app_version = Some(value),
                "LOG_LEVEL" => self.log_level = Some(value),
                _ => {}
            }
        }
        Ok(self)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == Some(0) {
            return Err(ConfigError::Validation {
                message: "port must be non-zero".to_string(),
            });
        }
        if self.broadcast_interval_ms == Some(0) {
            return Err(ConfigError::Validation {
                message: "broadcast_interval_ms must be non-zero".to_string(),
            });
        }
        if self.handshake.is_some_and(|h| h.value() == 0) {
            return Err(ConfigError::Validation {
                message: "handshake must be non-zero".to_string(),
            });
        }
        if self.app_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ConfigError::Validation {
                message: "app_id must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_DISCOVERY_PORT)
    }

    /// Broadcast interval, clamped to the minimum.
    pub fn broadcast_interval(&self) -> Duration {
        clamp_interval(
            self.broadcast_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_BROADCAST_INTERVAL),
        )
    }

    pub fn bind_addr(&self) -> Ipv4Addr {
        self.bind_addr.unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    pub fn broadcast_addr(&self) -> Ipv4Addr {
        self.broadcast_addr.unwrap_or(Ipv4Addr::BROADCAST)
    }

    /// Resolve the handshake: explicit value, then `app_id`/`app_version`,
    /// then this crate's own identity.
    pub fn handshake_id(&self) -> Result<HandshakeId, DiscoverError> {
        if let Some(handshake) = self.handshake {
            return Ok(handshake);
        }
        let identity = match &self.app_id {
            Some(app_id) => AppIdentity::new(app_id, self.app_version.clone().unwrap_or_default())?,
            None => AppIdentity::builtin(),
        };
        Ok(identity.handshake())
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        name: name.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.port(), 47777);
        assert_eq!(config.broadcast_interval(), Duration::from_secs(1));
        assert_eq!(config.bind_addr(), Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.broadcast_addr(), Ipv4Addr::BROADCAST);
        assert_eq!(
            config.handshake_id().unwrap(),
            AppIdentity::builtin().handshake()
        );
    }

    #[test]
    fn test_interval_is_clamped() {
        let config = DiscoveryConfig {
            broadcast_interval_ms: Some(5),
            ..Default::default()
        };
        assert_eq!(config.broadcast_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_merge_prefers_other() {
        let base = DiscoveryConfig {
            port: Some(1000),
            app_id: Some("base".to_string()),
            ..Default::default()
        };
        let overlay = DiscoveryConfig {
            port: Some(2000),
            ..Default::default()
        };
        let merged = base.merge(overlay);
        assert_eq!(merged.port, Some(2000));
        assert_eq!(merged.app_id.as_deref(), Some("base"));
    }

    #[test]
    fn test_env_overrides() {
        let config = DiscoveryConfig::default()
            .with_overrides_from(vars(&[
                ("LANBEACON_PORT", "5000"),
                ("LANBEACON_BROADCAST_INTERVAL_MS", "250"),
                ("LANBEACON_BROADCAST_ADDR", "192.168.1.255"),
                ("LANBEACON_HANDSHAKE", "0xff"),
                ("UNRELATED", "ignored"),
            ]))
            .unwrap();
        assert_eq!(config.port(), 5000);
        assert_eq!(config.broadcast_interval(), Duration::from_millis(250));
        assert_eq!(config.broadcast_addr(), Ipv4Addr::new(192, 168, 1, 255));
        assert_eq!(config.handshake_id().unwrap(), HandshakeId::new(255));
    }

    #[test]
    fn test_bad_env_override() {
        let err = DiscoveryConfig::default()
            .with_overrides_from(vars(&[("LANBEACON_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(
            err,
            DiscoverError::Config(ConfigError::InvalidEnv { ref name, .. }) if name == "LANBEACON_PORT"
        ));
    }

    #[test]
    fn test_validation() {
        let zero_port = DiscoveryConfig {
            port: Some(0),
            ..Default::default()
        };
        assert!(zero_port.validate().is_err());

        let zero_handshake = DiscoveryConfig {
            handshake: Some(HandshakeId::new(0)),
            ..Default::default()
        };
        assert!(zero_handshake.validate().is_err());

        let zero_interval = DiscoveryConfig {
            broadcast_interval_ms: Some(0),
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        assert!(DiscoveryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_handshake_resolution_order() {
        let derived = DiscoveryConfig {
            app_id: Some("arena".to_string()),
            app_version: Some("2.0".to_string()),
            ..Default::default()
        };
        assert_eq!(
            derived.handshake_id().unwrap(),
            HandshakeId::derive("arena", "2.0")
        );

        let explicit = DiscoveryConfig {
            handshake: Some(HandshakeId::new(9)),
            ..derived
        };
        assert_eq!(explicit.handshake_id().unwrap(), HandshakeId::new(9));
    }

    #[tokio::test]
    async fn test_load_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "port": 48000, "handshake": "0x10", "broadcast_addr": "10.0.0.255" }"#,
        )
        .unwrap();

        let config = DiscoveryConfig::load_file(&path).await.unwrap();
        assert_eq!(config.port(), 48000);
        assert_eq!(config.handshake, Some(HandshakeId::new(16)));
        assert_eq!(config.broadcast_addr(), Ipv4Addr::new(10, 0, 0, 255));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = DiscoveryConfig::load_file(&temp.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoverError::Config(ConfigError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_load_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ port: ").unwrap();

        let err = DiscoveryConfig::load_file(&path).await.unwrap_err();
        assert!(matches!(err, DiscoverError::Config(ConfigError::InvalidJson { .. })));
    }

    #[test]
    fn test_serialize_skips_unset() {
        let config = DiscoveryConfig {
            port: Some(47777),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&config).unwrap(), r#"{"port":47777}"#);
    }
}
