//! Answer discovery probes (for testing with probe_only)

use lanbeacon_discover::{Advertiser, AppIdentity, IdentityProvider, DEFAULT_DISCOVERY_PORT};
use std::net::SocketAddr;
use std::time::Duration;

#[tokio::main]
async fn main() {
    println!("=== Advertise Only ===\n");

    let identity = match AppIdentity::new("lanbeacon-demo", "0.1.0") {
        Ok(identity) => identity,
        Err(e) => {
            eprintln!("Invalid identity: {}", e);
            return;
        }
    };
    let handshake = identity.handshake();
    println!("Handshake: {}", handshake);

    let mut advertiser: Advertiser<String, String> = Advertiser::new();
    let responder = |request: String, from: SocketAddr| {
        println!("Probe from {}: {}", from, request);
        Some(format!("demo-server answering {:?}", request))
    };

    match advertiser
        .start_advertising(DEFAULT_DISCOVERY_PORT, handshake, responder)
        .await
    {
        Ok(addr) => println!("Listening on {}", addr),
        Err(e) => {
            eprintln!("Failed to advertise: {}", e);
            return;
        }
    }

    println!("\nAdvertising for 30 seconds...");
    println!("Run probe_only in another terminal to find it.\n");
    tokio::time::sleep(Duration::from_secs(30)).await;

    println!("Stopping advertiser...");
    advertiser.stop_advertising().await;

    println!("Done!");
}
