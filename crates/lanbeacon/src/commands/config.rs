//! The `config` command.

use lanbeacon_discover::DiscoveryConfig;
use serde_json::json;
use std::path::PathBuf;

/// Configured values plus the values the engine will actually use.
pub fn effective_config(
    config: &DiscoveryConfig,
    sources: &[PathBuf],
) -> anyhow::Result<serde_json::Value> {
    Ok(json!({
        "sources": sources,
        "configured": config,
        "effective": {
            "port": config.port(),
            "broadcast_interval_ms": config.broadcast_interval().as_millis() as u64,
            "bind_addr": config.bind_addr(),
            "broadcast_addr": config.broadcast_addr(),
            "handshake": config.handshake_id()?,
        },
    }))
}

pub fn show_config(config: &DiscoveryConfig, sources: &[PathBuf]) -> anyhow::Result<()> {
    let value = effective_config(config, sources)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
