use super::support::{build_harness, fast_retry, wait_for_state, ScriptedRequests};
use futures::StreamExt;
use std::time::Duration;
use tether_core::{
    ClientConfig, ConnectionState, Settings, SettingsStore, TransportPreference,
};
const WAIT: Duration = Duration::from_secs(5);

/// Server that holds connections open without speaking.
async fn spawn_idle_server() -> String {
    super::support::spawn_ws_server(|mut socket| async move {
        while let Some(Ok(_)) = socket.next().await {}
    })
    .await
}

#[tokio::test]
async fn updated_settings_are_visible_and_persisted() {
    let harness = build_harness(&ClientConfig::default(), ScriptedRequests::new(vec![])).await;

    let updated = Settings {
        temperature: 1.4,
        max_length: 64,
        transport_preference: TransportPreference::RequestOnly,
    };
    harness.router.update_settings(updated.clone()).await;

    assert_eq!(harness.settings.current(), updated);
    assert_eq!(harness.notices.active().len(), 1);

    // A fresh store reading the same file observes the saved value.
    let reloaded = SettingsStore::load(harness._dir.path().join("settings.json")).await;
    assert_eq!(reloaded.current(), updated);
}

#[tokio::test]
async fn switching_to_request_only_closes_the_channel() {
    let url = spawn_idle_server().await;
    let config = ClientConfig {
        ws_url: url,
        retry: fast_retry(),
        ..ClientConfig::default()
    };
    let harness = build_harness(&config, ScriptedRequests::new(vec![])).await;

    harness.transport.connect();
    let mut state = harness.transport.subscribe_state();
    assert!(wait_for_state(&mut state, ConnectionState::Connected, WAIT).await);

    let mut settings = harness.settings.current();
    settings.transport_preference = TransportPreference::RequestOnly;
    harness.router.update_settings(settings).await;

    assert!(wait_for_state(&mut state, ConnectionState::Disconnected, WAIT).await);

    // No reconnect attempt follows.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.transport.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn switching_back_to_persistent_reopens_the_channel() {
    let url = spawn_idle_server().await;
    let config = ClientConfig {
        ws_url: url,
        retry: fast_retry(),
        ..ClientConfig::default()
    };
    let harness = build_harness(&config, ScriptedRequests::new(vec![])).await;

    let mut settings = harness.settings.current();
    settings.transport_preference = TransportPreference::RequestOnly;
    harness.router.update_settings(settings.clone()).await;
    assert_eq!(harness.transport.state(), ConnectionState::Disconnected);

    settings.transport_preference = TransportPreference::Persistent;
    harness.router.update_settings(settings).await;

    let mut state = harness.transport.subscribe_state();
    assert!(wait_for_state(&mut state, ConnectionState::Connected, WAIT).await);
}

#[tokio::test]
async fn generation_parameters_reach_the_fallback_body() {
    let requests = ScriptedRequests::new(vec![Ok("reply".to_string())]);
    let harness = build_harness(&ClientConfig::default(), requests).await;

    let tuned = Settings {
        temperature: 0.2,
        max_length: 42,
        transport_preference: TransportPreference::RequestOnly,
    };
    harness.router.update_settings(tuned.clone()).await;

    harness.router.send("hi").await.expect("send");
    assert_eq!(harness.requests.calls(), 1);
    let seen = harness.requests.last_settings().expect("recorded settings");
    assert!((seen.temperature - 0.2).abs() < 1e-6);
    assert_eq!(seen.max_length, 42);
}
