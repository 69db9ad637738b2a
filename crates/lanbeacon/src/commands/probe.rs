//! The `probe` command.

use chrono::{DateTime, Utc};
use lanbeacon_discover::{
    DiscoverError, DiscoveredServer, DiscoveryConfig, HandshakeId, Prober,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, Instrument};

use crate::payload::{local_hostname, ProbeRequest, ServerAnnouncement};

/// How and where to probe.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// How long to collect responses.
    pub window: Duration,
    pub interval: Duration,
    /// Discovery port advertisers listen on.
    pub port: u16,
    pub filter: Option<String>,
}

/// A server seen during a probe window, merged across responses.
#[derive(Debug, Clone, Serialize)]
pub struct FoundServer {
    #[serde(flatten)]
    pub announcement: ServerAnnouncement,
    /// Every source address the server answered from.
    pub addresses: Vec<SocketAddr>,
    pub first_seen: DateTime<Utc>,
}

/// Merge responses that carry the same `server_id`.
///
/// Repeated probes and multi-homed hosts produce several responses per
/// server; order of first appearance is kept.
pub fn dedupe<I>(hits: I) -> Vec<FoundServer>
where
    I: IntoIterator<Item = DiscoveredServer<ServerAnnouncement>>,
{
    let mut found: Vec<FoundServer> = Vec::new();
    for hit in hits {
        match found
            .iter_mut()
            .find(|f| f.announcement.server_id == hit.response.server_id)
        {
            Some(existing) => {
                if !existing.addresses.contains(&hit.address) {
                    existing.addresses.push(hit.address);
                }
            }
            None => found.push(FoundServer {
                announcement: hit.response,
                addresses: vec![hit.address],
                first_seen: hit.received_at,
            }),
        }
    }
    found
}

/// Probe for `options.window` and return the distinct servers that answered.
pub async fn discover(
    prober: &mut Prober<ProbeRequest, ServerAnnouncement>,
    handshake: HandshakeId,
    request: ProbeRequest,
    options: &ProbeOptions,
) -> Result<Vec<FoundServer>, DiscoverError> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    prober
        .start_discovery(
            options.port,
            handshake,
            move || request.clone(),
            move |hit| {
                let _ = tx.send(hit);
            },
            options.interval,
        )
        .await?;

    tokio::time::sleep(options.window).await;
    prober.stop_discovery().await;

    // The sender lives in the stopped session, so the channel is closed now.
    let mut hits = Vec::new();
    while let Some(hit) = rx.recv().await {
        hits.push(hit);
    }
    debug!(responses = hits.len(), "Probe window closed");

    Ok(dedupe(hits))
}

pub async fn run_probe(
    config: &DiscoveryConfig,
    options: ProbeOptions,
    json: bool,
) -> anyhow::Result<()> {
    let handshake = config.handshake_id()?;
    let request = ProbeRequest::new(local_hostname(), options.filter.clone());
    let span = lanbeacon_util::service_span!("prober", request.client_id);

    let mut prober = Prober::from_config(config);
    let servers = discover(&mut prober, handshake, request, &options)
        .instrument(span)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&servers)?);
    } else {
        print_table(&servers);
    }
    Ok(())
}

fn print_table(servers: &[FoundServer]) {
    if servers.is_empty() {
        println!("No servers found.");
        return;
    }

    println!(
        "{:<24} {:<24} {:>6} {:<10} {}",
        "NAME", "HOST", "PORT", "VERSION", "ADDRESSES"
    );
    for server in servers {
        let addresses: Vec<String> = server.addresses.iter().map(|a| a.to_string()).collect();
        println!(
            "{:<24} {:<24} {:>6} {:<10} {}",
            server.announcement.name,
            server.announcement.hostname,
            server.announcement.service_port,
            server.announcement.version,
            addresses.join(", ")
        );
    }
    println!("\n{} server(s) found.", servers.len());
}
