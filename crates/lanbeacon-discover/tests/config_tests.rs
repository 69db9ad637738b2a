//! Config file loading wired through to running roles.

use lanbeacon_discover::{
    Advertiser, ConfigError, DiscoverError, DiscoveryConfig, HandshakeId, Prober,
};
use lanbeacon_test_utils::{assert_eventually, CallRecorder, LoopbackPeer, TestConfig};
use std::net::Ipv4Addr;
use std::time::Duration;

#[tokio::test]
async fn test_explicit_file_is_loaded() {
    let file = TestConfig::with_contents(
        r#"{
            "port": 40001,
            "broadcast_interval_ms": 250,
            "bind_addr": "127.0.0.1",
            "broadcast_addr": "127.0.0.1",
            "handshake": "0x00000000000000ff"
        }"#,
    );

    let (config, sources) = DiscoveryConfig::load(Some(file.path())).await.unwrap();

    assert_eq!(sources.last().map(|p| p.as_path()), Some(file.path()));
    assert_eq!(config.port(), 40001);
    assert_eq!(config.broadcast_interval(), Duration::from_millis(250));
    assert_eq!(config.bind_addr(), Ipv4Addr::LOCALHOST);
    assert_eq!(config.handshake_id().unwrap(), HandshakeId::new(0xff));
}

#[tokio::test]
async fn test_missing_explicit_file_is_an_error() {
    let file = TestConfig::with_contents("{}");
    let missing = file.dir().join("absent.json");

    let err = DiscoveryConfig::load(Some(&missing)).await.unwrap_err();
    assert!(matches!(
        err,
        DiscoverError::Config(ConfigError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_invalid_json_reports_path() {
    let file = TestConfig::with_contents("{ port: ");

    let err = DiscoveryConfig::load_file(file.path()).await.unwrap_err();
    match err {
        DiscoverError::Config(ConfigError::InvalidJson { path, .. }) => {
            assert_eq!(path, file.path().display().to_string());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_zero_handshake_is_rejected() {
    let file = TestConfig::with_contents(r#"{"handshake": 0}"#);

    let err = DiscoveryConfig::load(Some(file.path())).await.unwrap_err();
    assert!(matches!(
        err,
        DiscoverError::Config(ConfigError::Validation { .. })
    ));
}

#[tokio::test]
async fn test_roles_built_from_config_find_each_other() {
    let file = TestConfig::with_contents(
        r#"{
            "bind_addr": "127.0.0.1",
            "broadcast_addr": "127.0.0.1",
            "app_id": "config-test",
            "app_version": "2.0.0"
        }"#,
    );
    let config = DiscoveryConfig::load_file(file.path()).await.unwrap();
    let handshake = config.handshake_id().unwrap();
    assert_eq!(handshake, HandshakeId::derive("config-test", "2.0.0"));

    let mut advertiser: Advertiser<String, String> = Advertiser::from_config(&config);
    let server = advertiser
        .start_advertising(0, handshake, |request: String, _| {
            Some(format!("pong:{request}"))
        })
        .await
        .unwrap();
    assert_eq!(server.ip(), Ipv4Addr::LOCALHOST);

    let found = CallRecorder::new();
    let sink = found.clone();
    let mut prober: Prober<String, String> = Prober::from_config(&config);
    prober
        .start_discovery(
            server.port(),
            handshake,
            || "ping".to_string(),
            move |hit| sink.record(hit.into_response()),
            config.broadcast_interval(),
        )
        .await
        .unwrap();

    assert_eventually(Duration::from_secs(2), "config-built roles talk", || {
        !found.is_empty()
    })
    .await;
    assert_eq!(found.calls()[0], "pong:ping");

    // A peer with the default identity is not answered.
    let outsider = LoopbackPeer::bind().await;
    outsider
        .send_envelope(DiscoveryConfig::default().handshake_id().unwrap(), &"ping", server)
        .await;
    assert!(outsider.recv_raw(Duration::from_millis(200)).await.is_none());

    prober.stop_discovery().await;
    advertiser.stop_advertising().await;
}
