use super::support::{
    build_harness, fast_retry, spawn_ws_server, wait_for_state, wait_until, ScriptedRequests,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tether_core::{ClientConfig, ConnectionState, Role};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

fn channel_config(ws_url: String) -> ClientConfig {
    ClientConfig {
        ws_url,
        retry: fast_retry(),
        ..ClientConfig::default()
    }
}

/// Echo server: brackets every reply in typing on/off frames and mirrors the
/// raw inbound payload back as the response text, so the client side can
/// assert exactly what went over the wire.
async fn spawn_echo_server() -> String {
    spawn_ws_server(|mut socket| async move {
        while let Some(Ok(frame)) = socket.next().await {
            let Message::Text(raw) = frame else { continue };
            let typing = serde_json::json!({"type": "typing", "isTyping": true}).to_string();
            let reply = serde_json::json!({
                "type": "message",
                "response": raw,
                "timestamp": "2024-01-01T00:00:00",
                "isTyping": false,
            })
            .to_string();
            let done = serde_json::json!({"type": "typing", "isTyping": false}).to_string();
            for payload in [typing, reply, done] {
                if socket.send(Message::Text(payload)).await.is_err() {
                    return;
                }
            }
        }
    })
    .await
}

#[tokio::test]
async fn exchange_over_persistent_channel_carries_settings() {
    let url = spawn_echo_server().await;
    let harness = build_harness(&channel_config(url), ScriptedRequests::new(vec![])).await;

    harness.transport.connect();
    let mut state = harness.transport.subscribe_state();
    assert!(wait_for_state(&mut state, ConnectionState::Connected, WAIT).await);

    harness.router.send("hi there").await.expect("send");
    let conversation = harness.conversation.clone();
    assert!(wait_until(|| conversation.len() == 2, WAIT).await);

    let messages = harness.conversation.messages();
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);

    // The assistant entry holds the frame the server received.
    let sent: serde_json::Value =
        serde_json::from_str(&messages[1].content).expect("outbound frame");
    assert_eq!(sent["message"], "hi there");
    assert_eq!(sent["maxLength"], 1000);
    assert!((sent["temperature"].as_f64().expect("temperature") - 0.7).abs() < 1e-6);

    // The fallback never fired.
    assert_eq!(harness.requests.calls(), 0);
    assert!(wait_until(|| !harness.router.is_busy(), WAIT).await);
}

#[tokio::test]
async fn typing_frames_drive_the_indicator() {
    let url = spawn_echo_server().await;
    let harness = build_harness(&channel_config(url), ScriptedRequests::new(vec![])).await;
    let mut typing = harness.router.subscribe_typing();

    harness.transport.connect();
    let mut state = harness.transport.subscribe_state();
    assert!(wait_for_state(&mut state, ConnectionState::Connected, WAIT).await);

    harness.router.send("hi").await.expect("send");

    // Observe the indicator flip on, then off again once the reply lands.
    let saw_typing = tokio::time::timeout(WAIT, async {
        loop {
            if typing.changed().await.is_err() {
                return false;
            }
            if *typing.borrow() {
                return true;
            }
        }
    })
    .await
    .unwrap_or(false);
    assert!(saw_typing);
    assert!(wait_until(|| !*typing.borrow(), WAIT).await);
}

#[tokio::test]
async fn malformed_inbound_payload_becomes_one_notice() {
    let url = spawn_ws_server(|mut socket| async move {
        let _ = socket.send(Message::Text("{not json".to_string())).await;
        // Hold the connection open so the close is not what the test sees.
        while let Some(Ok(_)) = socket.next().await {}
    })
    .await;
    let harness = build_harness(&channel_config(url), ScriptedRequests::new(vec![])).await;

    harness.transport.connect();
    let notices = harness.notices.clone();
    assert!(wait_until(|| notices.active().len() == 1, WAIT).await);

    // The garbled payload never reaches the conversation log.
    assert_eq!(harness.conversation.len(), 0);
    assert_eq!(notices.active().len(), 1);
}

/// Accepts the handshake, holds the socket long enough for state observers
/// to see `Connected`, then hangs up.
async fn spawn_dropping_server() -> String {
    spawn_ws_server(|socket| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(socket);
    })
    .await
}

#[tokio::test]
async fn dropped_connection_schedules_a_retry() {
    let url = spawn_dropping_server().await;
    let harness = build_harness(&channel_config(url), ScriptedRequests::new(vec![])).await;

    harness.transport.connect();
    let mut state = harness.transport.subscribe_state();
    assert!(wait_for_state(&mut state, ConnectionState::Connected, WAIT).await);
    assert!(wait_for_state(&mut state, ConnectionState::ClosedPendingRetry, WAIT).await);
    assert!(wait_for_state(&mut state, ConnectionState::Connected, WAIT).await);
}

#[tokio::test]
async fn disconnect_cancels_a_pending_retry() {
    let url = spawn_dropping_server().await;
    let harness = build_harness(&channel_config(url), ScriptedRequests::new(vec![])).await;

    harness.transport.connect();
    let mut state = harness.transport.subscribe_state();
    assert!(wait_for_state(&mut state, ConnectionState::ClosedPendingRetry, WAIT).await);

    harness.transport.disconnect();
    assert_eq!(harness.transport.state(), ConnectionState::Disconnected);

    // No retry fires after an explicit disconnect.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(harness.transport.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn close_without_auto_reconnect_goes_disconnected() {
    let url = spawn_dropping_server().await;
    let harness = build_harness(&channel_config(url), ScriptedRequests::new(vec![])).await;

    harness.transport.set_auto_reconnect(false);
    harness.transport.connect();
    let mut state = harness.transport.subscribe_state();
    assert!(wait_for_state(&mut state, ConnectionState::Connected, WAIT).await);
    assert!(wait_for_state(&mut state, ConnectionState::Disconnected, WAIT).await);
    assert_ne!(
        harness.transport.state(),
        ConnectionState::ClosedPendingRetry
    );
}

#[tokio::test]
async fn exhausted_schedule_parks_disconnected() {
    // A port with nothing listening: bind, record the address, release it.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let mut config = channel_config(format!("ws://{addr}"));
    config.retry.base_delay = Duration::from_millis(20);
    config.retry.max_attempts = 2;
    let harness = build_harness(&config, ScriptedRequests::new(vec![])).await;

    harness.transport.connect();
    let mut state = harness.transport.subscribe_state();
    assert!(wait_for_state(&mut state, ConnectionState::Disconnected, WAIT).await);
}

#[tokio::test]
async fn connection_loss_mid_exchange_releases_the_router() {
    // Accepts the frame, then hangs up without replying.
    let url = spawn_ws_server(|mut socket| async move {
        let _ = socket.next().await;
        drop(socket);
    })
    .await;
    let mut config = channel_config(url);
    config.retry.max_attempts = 0;
    let harness = build_harness(&config, ScriptedRequests::new(vec![])).await;

    harness.transport.connect();
    let mut state = harness.transport.subscribe_state();
    assert!(wait_for_state(&mut state, ConnectionState::Connected, WAIT).await);

    harness.router.send("hi").await.expect("send");
    let notices = harness.notices.clone();
    assert!(wait_until(|| notices.active().len() == 1, WAIT).await);

    // Only the user's line made it into the log, and the router is free.
    assert_eq!(harness.conversation.len(), 1);
    assert!(wait_until(|| !harness.router.is_busy(), WAIT).await);
}
