//! End-to-end tests: bus message in, WebSocket frame out.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use axum_test::TestServer;
use event_notify_core::bus::{BusMessage, MessageBus};
use event_notify_runtime::subscriber::{MessageHandler, Subscriber};
use event_notify_testing::helpers::eventually;
use event_notify_testing::{InMemoryDelayStore, InMemoryMessageBus};
use event_notify_web::{AppState, ConnectionRegistry, LiveBridge, router};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(2);

async fn serve(registry: ConnectionRegistry) -> SocketAddr {
    let state = AppState::new(registry, Arc::new(InMemoryDelayStore::new()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

async fn wait_for_connections(registry: &ConnectionRegistry, n: usize) {
    assert!(
        eventually(WAIT, || async move { registry.len().await == n }).await,
        "expected {n} open connections"
    );
}

#[tokio::test]
async fn every_open_client_receives_the_payload_verbatim() {
    let registry = ConnectionRegistry::new();
    let addr = serve(registry.clone()).await;

    let (mut a, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
        .await
        .unwrap();
    let (mut b, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    wait_for_connections(&registry, 2).await;

    let bus = Arc::new(InMemoryMessageBus::new());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let subscriber = Subscriber::new(
        "live-bridge",
        vec!["event_updates".to_string()],
        bus.clone(),
        Arc::new(LiveBridge::new(registry.clone())),
        shutdown_rx,
    )
    .spawn();
    let memory_bus = &*bus;
    assert!(
        eventually(WAIT, || async move {
            memory_bus.subscriber_count("event_updates").await == 1
        })
        .await
    );

    let payload = r#"{"eventId":5,"seatsLeft":12}"#;
    bus.publish("event_updates", payload).await.unwrap();

    for client in [&mut a, &mut b] {
        let frame = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("no frame")
            .unwrap()
            .unwrap();
        assert_eq!(frame, Message::Text(payload.to_string()));
    }

    let _ = shutdown_tx.send(());
    let _ = subscriber.await;
}

#[tokio::test]
async fn closed_client_is_removed_and_others_still_receive() {
    let registry = ConnectionRegistry::new();
    let addr = serve(registry.clone()).await;
    let bridge = LiveBridge::new(registry.clone());

    let (mut stays, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    let (mut leaves, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    wait_for_connections(&registry, 2).await;

    leaves.close(None).await.unwrap();
    wait_for_connections(&registry, 1).await;

    bridge
        .handle(&BusMessage::new("event_updates", "after-close"))
        .await
        .unwrap();

    let frame = tokio::time::timeout(WAIT, stays.next())
        .await
        .expect("no frame")
        .unwrap()
        .unwrap();
    assert_eq!(frame, Message::Text("after-close".to_string()));
}

#[tokio::test]
async fn client_messages_are_ignored() {
    let registry = ConnectionRegistry::new();
    let addr = serve(registry.clone()).await;

    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    wait_for_connections(&registry, 1).await;

    client
        .send(Message::Text(r#"{"type":"subscribe"}"#.to_string()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(registry.len().await, 1);
    assert!(
        tokio::time::timeout(Duration::from_millis(100), client.next())
            .await
            .is_err(),
        "server must not answer client frames"
    );
}

#[tokio::test]
async fn health_endpoints_respond() {
    let state = AppState::new(ConnectionRegistry::new(), Arc::new(InMemoryDelayStore::new()));
    let server = TestServer::new(router(state)).unwrap();

    server.get("/health").await.assert_text("ok");

    let ready = server.get("/health/ready").await;
    ready.assert_status_ok();
    let body: serde_json::Value = ready.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"][0]["component"], "live_bridge");
    assert_eq!(body["checks"][1]["component"], "delay_store");
}
