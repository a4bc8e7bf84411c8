// Integration tests for `TransportClient` against a local WebSocket server.
#![allow(clippy::unwrap_used)]

use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use url::Url;

use medsync_api::events::{ConnectionStatus, LinkStatus};
use medsync_api::{
    ConnectionState, RealtimeEvent, ReconnectConfig, Router, Subscription, TransportClient,
    TransportConfig,
};

type ServerSide = WebSocketStream<TcpStream>;

const WAIT: Duration = Duration::from_secs(2);

// ── Helpers ─────────────────────────────────────────────────────────

/// Accept WebSocket upgrades forever, handing each accepted socket to the test.
async fn spawn_server() -> (Url, mpsc::UnboundedReceiver<ServerSide>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(ws) = accept_async(stream).await {
                if tx.send(ws).is_err() {
                    break;
                }
            }
        }
    });

    (Url::parse(&format!("ws://{addr}")).unwrap(), rx)
}

/// Drop the first `refuse` TCP connections before the upgrade, then accept
/// upgrades. Every attempt is reported with the time it arrived.
async fn spawn_flaky_server(
    refuse: usize,
) -> (Url, mpsc::UnboundedReceiver<(Instant, Option<ServerSide>)>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut seen = 0;
        while let Ok((stream, _)) = listener.accept().await {
            let at = Instant::now();
            seen += 1;
            let ws = if seen <= refuse {
                drop(stream);
                None
            } else {
                accept_async(stream).await.ok()
            };
            if tx.send((at, ws)).is_err() {
                break;
            }
        }
    });

    (Url::parse(&format!("ws://{addr}")).unwrap(), rx)
}

fn fast_reconnect() -> ReconnectConfig {
    ReconnectConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        factor: 1.5,
        heartbeat_interval: Duration::from_secs(60),
        connect_timeout: Duration::from_secs(2),
    }
}

fn client_for(url: Url, reconnect: ReconnectConfig) -> TransportClient {
    TransportClient::new(url, &TransportConfig::default(), reconnect, Router::new()).unwrap()
}

fn event_sink(client: &TransportClient) -> (Subscription, mpsc::UnboundedReceiver<RealtimeEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = client.router().subscribe(move |event| {
        let _ = tx.send(event.clone());
    });
    (sub, rx)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<RealtimeEvent>) -> RealtimeEvent {
    timeout(WAIT, rx.recv()).await.unwrap().unwrap()
}

async fn wait_state(client: &TransportClient, target: ConnectionState) {
    let mut rx = client.subscribe_state();
    timeout(WAIT, rx.wait_for(|s| *s == target))
        .await
        .unwrap()
        .unwrap();
}

async fn next_text(ws: &mut ServerSide) -> String {
    loop {
        match timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap() {
            Message::Text(text) => return text.as_str().to_owned(),
            _ => continue,
        }
    }
}

fn is_link(event: &RealtimeEvent, status: LinkStatus) -> bool {
    matches!(event, RealtimeEvent::ConnectionStatus(ConnectionStatus { status: s, .. }) if *s == status)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_dispatches_frames_and_sends_control_messages() {
    let (url, mut accepted) = spawn_server().await;
    let client = client_for(url, fast_reconnect());
    let (_sub, mut events) = event_sink(&client);

    client.connect();
    let mut ws = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    wait_state(&client, ConnectionState::Connected).await;

    assert!(is_link(&next_event(&mut events).await, LinkStatus::Connected));

    ws.send(Message::text(
        r#"{"type":"rfid_scan","label":"Jane","cardUid":"04A3FF21","rfidUid":"04A3FF21"}"#,
    ))
    .await
    .unwrap();

    match next_event(&mut events).await {
        RealtimeEvent::ScanDetected(scan) => assert_eq!(scan.uid(), Some("04A3FF21")),
        other => panic!("expected scan, got {other:?}"),
    }

    assert!(client.request_status());
    assert_eq!(next_text(&mut ws).await, r#"{"type":"get_status"}"#);

    client.disconnect();
}

#[tokio::test]
async fn test_connect_is_idempotent() {
    let (url, mut accepted) = spawn_server().await;
    let client = client_for(url, fast_reconnect());

    client.connect();
    client.connect();
    client.connect();

    let _ws = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    wait_state(&client, ConnectionState::Connected).await;
    client.connect();

    assert!(
        timeout(Duration::from_millis(300), accepted.recv())
            .await
            .is_err(),
        "a second connection was opened"
    );

    client.disconnect();
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let (url, mut accepted) = spawn_server().await;
    let client = client_for(url, fast_reconnect());
    let (_sub, mut events) = event_sink(&client);

    client.connect();
    let mut first = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    wait_state(&client, ConnectionState::Connected).await;
    assert!(is_link(&next_event(&mut events).await, LinkStatus::Connected));

    first.close(None).await.unwrap();

    assert!(is_link(&next_event(&mut events).await, LinkStatus::Disconnected));

    let _second = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    wait_state(&client, ConnectionState::Connected).await;
    assert!(is_link(&next_event(&mut events).await, LinkStatus::Connected));

    client.disconnect();
}

#[tokio::test]
async fn test_disconnect_cancels_reconnect_until_connect_again() {
    let (url, mut accepted) = spawn_server().await;
    let client = client_for(url, fast_reconnect());

    client.connect();
    let _ws = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    wait_state(&client, ConnectionState::Connected).await;

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.start_reader());

    assert!(
        timeout(Duration::from_millis(400), accepted.recv())
            .await
            .is_err(),
        "client reconnected after disconnect()"
    );

    client.connect();
    let _again = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    wait_state(&client, ConnectionState::Connected).await;

    client.disconnect();
}

#[tokio::test]
async fn test_heartbeat_sends_ping() {
    let (url, mut accepted) = spawn_server().await;
    let client = client_for(
        url,
        ReconnectConfig {
            heartbeat_interval: Duration::from_millis(50),
            ..fast_reconnect()
        },
    );

    client.connect();
    let mut ws = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();

    assert_eq!(next_text(&mut ws).await, r#"{"type":"ping"}"#);

    client.disconnect();
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let (url, mut accepted) = spawn_server().await;
    let client = client_for(url, fast_reconnect());
    let (_sub, mut events) = event_sink(&client);

    client.connect();
    let mut ws = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    assert!(is_link(&next_event(&mut events).await, LinkStatus::Connected));

    ws.send(Message::text("definitely not json")).await.unwrap();
    ws.send(Message::text(r#"{"type":"from_the_future"}"#)).await.unwrap();
    ws.send(Message::text(r#"{"type":"pong"}"#)).await.unwrap();

    assert_eq!(next_event(&mut events).await, RealtimeEvent::HeartbeatAck);
    assert_eq!(client.state(), ConnectionState::Connected);

    client.disconnect();
}

#[tokio::test]
async fn test_unreachable_server_never_reports_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(Url::parse(&format!("ws://{addr}")).unwrap(), fast_reconnect());
    let (_sub, mut events) = event_sink(&client);

    client.connect();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_ne!(client.state(), ConnectionState::Connected);
    assert!(!client.ping());

    // Every failed open is reported as a disconnect; none as a connect.
    let mut disconnects = 0;
    while let Ok(event) = events.try_recv() {
        assert!(is_link(&event, LinkStatus::Disconnected), "got {event:?}");
        disconnects += 1;
    }
    assert!(disconnects >= 1);

    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_backoff_resets_after_successful_connection() {
    const LONG_WAIT: Duration = Duration::from_secs(5);

    // Delays run 100ms, 400ms, 1600ms across the refused attempts.
    let (url, mut attempts) = spawn_flaky_server(3).await;
    let client = client_for(
        url,
        ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1600),
            factor: 4.0,
            heartbeat_interval: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(2),
        },
    );

    client.connect();

    let mut last_refused = None;
    for _ in 0..3 {
        let (at, ws) = timeout(LONG_WAIT, attempts.recv()).await.unwrap().unwrap();
        assert!(ws.is_none());
        last_refused = Some(at);
    }

    let (opened_at, ws) = timeout(LONG_WAIT, attempts.recv()).await.unwrap().unwrap();
    let mut ws = ws.expect("fourth attempt should be upgraded");
    let grown = opened_at - last_refused.unwrap();
    assert!(grown >= Duration::from_millis(1500), "delay never grew: {grown:?}");
    wait_state(&client, ConnectionState::Connected).await;

    let closed_at = Instant::now();
    ws.close(None).await.unwrap();

    let (reopened_at, again) = timeout(LONG_WAIT, attempts.recv()).await.unwrap().unwrap();
    assert!(again.is_some());
    let gap = reopened_at - closed_at;
    assert!(
        gap < Duration::from_millis(800),
        "reconnect after a good session took {gap:?}, expected about 100ms"
    );
    wait_state(&client, ConnectionState::Connected).await;

    client.disconnect();
}

#[tokio::test]
async fn test_oversized_heartbeat_interval_still_connects() {
    let (url, mut accepted) = spawn_server().await;
    let client = client_for(
        url,
        ReconnectConfig {
            heartbeat_interval: Duration::MAX,
            ..fast_reconnect()
        },
    );

    client.connect();
    let _ws = timeout(WAIT, accepted.recv()).await.unwrap().unwrap();
    wait_state(&client, ConnectionState::Connected).await;

    client.disconnect();
}
