//! The `advertise` command.

use anyhow::Context;
use lanbeacon_discover::{Advertiser, DiscoveryConfig, HandshakeId};
use std::net::SocketAddr;
use tracing::{debug, info, Instrument};

use crate::payload::{local_hostname, ProbeRequest, ServerAnnouncement};

/// Build the responder that answers matching probes with `announcement`.
pub fn announcer(
    announcement: ServerAnnouncement,
) -> impl FnMut(ProbeRequest, SocketAddr) -> Option<ServerAnnouncement> + Send + 'static {
    move |request, from| {
        if !request.matches(&announcement.name) {
            debug!(
                %from,
                client = %request.client_name,
                filter = ?request.filter,
                "Probe filter does not match"
            );
            return None;
        }
        info!(%from, client = %request.client_name, "Answering probe");
        Some(announcement.clone())
    }
}

/// Advertise until Ctrl-C.
pub async fn run_advertise(
    config: &DiscoveryConfig,
    name: Option<String>,
    service_port: u16,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let handshake = config.handshake_id()?;
    let port = port.unwrap_or_else(|| config.port());
    let hostname = local_hostname();
    let announcement = ServerAnnouncement::new(
        name.unwrap_or_else(|| hostname.clone()),
        hostname,
        service_port,
    );
    let span = lanbeacon_util::service_span!("advertiser", announcement.server_id);

    advertise_until_interrupted(config, port, handshake, announcement)
        .instrument(span)
        .await
}

async fn advertise_until_interrupted(
    config: &DiscoveryConfig,
    port: u16,
    handshake: HandshakeId,
    announcement: ServerAnnouncement,
) -> anyhow::Result<()> {
    let mut advertiser: Advertiser<ProbeRequest, ServerAnnouncement> =
        Advertiser::from_config(config);
    let addr = advertiser
        .start_advertising(port, handshake, announcer(announcement.clone()))
        .await
        .with_context(|| format!("Failed to advertise on port {}", port))?;

    println!("Advertising {}", announcement);
    println!("  Server ID: {}", announcement.server_id);
    println!("  Listening: {}", addr);
    println!("  Handshake: {}", handshake);
    println!("\nPress Ctrl-C to stop.");

    let interrupted = tokio::signal::ctrl_c().await;
    advertiser.stop_advertising().await;
    interrupted.context("Failed to wait for Ctrl-C")?;

    println!("Stopped.");
    Ok(())
}
