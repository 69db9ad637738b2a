//! Probe for advertisers (for testing with advertise_only)

use lanbeacon_discover::{
    AppIdentity, DiscoveredServer, IdentityProvider, Prober, DEFAULT_BROADCAST_INTERVAL,
    DEFAULT_DISCOVERY_PORT,
};
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    println!("=== Probe Only ===\n");

    let identity = match AppIdentity::new("lanbeacon-demo", "0.1.0") {
        Ok(identity) => identity,
        Err(e) => {
            eprintln!("Invalid identity: {}", e);
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<DiscoveredServer<String>>();
    let mut prober: Prober<String, String> = Prober::new();

    println!("Probing for 10 seconds...");
    if let Err(e) = prober
        .start_discovery(
            DEFAULT_DISCOVERY_PORT,
            identity.handshake(),
            || "who is there?".to_string(),
            move |server| {
                let _ = tx.send(server);
            },
            DEFAULT_BROADCAST_INTERVAL,
        )
        .await
    {
        eprintln!("Failed to probe: {}", e);
        return;
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
    prober.stop_discovery().await;

    let mut servers = Vec::new();
    while let Ok(server) = rx.try_recv() {
        servers.push(server);
    }

    println!("\n=== Results ===");
    if servers.is_empty() {
        println!("No servers found!");
    } else {
        for server in &servers {
            println!("Found: {}", server);
            println!("  At: {}", server.received_at.to_rfc3339());
        }
    }

    println!("\nDone!");
}
