//! The `handshake` command.

use lanbeacon_discover::{AppIdentity, DiscoveryConfig, HandshakeId, IdentityProvider};

/// Resolve the handshake from explicit arguments or the configuration.
pub fn resolve_handshake(
    config: &DiscoveryConfig,
    app_id: Option<String>,
    app_version: Option<String>,
) -> anyhow::Result<HandshakeId> {
    match app_id {
        Some(app_id) => {
            let version = app_version
                .or_else(|| config.app_version.clone())
                .unwrap_or_default();
            Ok(AppIdentity::new(app_id, version)?.handshake())
        }
        None => Ok(config.handshake_id()?),
    }
}

pub fn run_handshake(
    config: &DiscoveryConfig,
    app_id: Option<String>,
    app_version: Option<String>,
) -> anyhow::Result<()> {
    println!("{}", resolve_handshake(config, app_id, app_version)?);
    Ok(())
}
