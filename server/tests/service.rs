//! Whole-service tests on the in-memory backend.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use chrono::Utc;
use event_notify_core::ChannelNames;
use event_notify_core::message::{Categories, NotificationMessage};
use event_notify_runtime::{Announcer, Scheduler};
use event_notify_server::{Application, Backends, Config};
use event_notify_testing::helpers::eventually;
use event_notify_testing::{
    InMemoryDelayStore, InMemoryMessageBus, InMemoryUserDirectory, RecordingDelivery,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(3);

struct Running {
    bus: Arc<InMemoryMessageBus>,
    delivery: RecordingDelivery,
    announcer: Announcer,
    registry: event_notify_web::ConnectionRegistry,
    addr: std::net::SocketAddr,
    stop: oneshot::Sender<()>,
    server: tokio::task::JoinHandle<anyhow::Result<()>>,
}

async fn start() -> Running {
    let bus = Arc::new(InMemoryMessageBus::new());
    let store = Arc::new(InMemoryDelayStore::new());
    let directory = InMemoryUserDirectory::default();
    directory.add_user("a@x.com", ["Music"]);
    directory.add_user("b@x.com", ["Art"]);
    let delivery = RecordingDelivery::new();

    let backends = Backends {
        bus: bus.clone(),
        delay_store: store.clone(),
        directory: Arc::new(directory),
        delivery: Arc::new(delivery.clone()),
    };

    let mut config = Config::default();
    config.worker.poll_interval = Duration::from_millis(50);
    config.server.shutdown_timeout = Duration::from_secs(2);

    let app = Application::new(config, backends);
    let registry = app.registry().clone();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel();
    let server = tokio::spawn(app.serve(listener, async {
        let _ = stopped.await;
    }));

    let channels = ChannelNames::default();
    let memory_bus = &*bus;
    for channel in [&channels.notifications, &channels.live_updates] {
        assert!(
            eventually(WAIT, || async move {
                memory_bus.subscriber_count(channel).await == 1
            })
            .await
        );
    }

    let announcer = Announcer::new(bus.clone(), Scheduler::new(store), channels);
    Running {
        bus,
        delivery,
        announcer,
        registry,
        addr,
        stop,
        server,
    }
}

impl Running {
    async fn shutdown(self) {
        self.stop.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(10), self.server)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}

#[tokio::test]
async fn immediate_notification_reaches_interested_users_only() {
    let running = start().await;

    running
        .announcer
        .announce(&NotificationMessage::new(1, "Test Event", Categories::single("Music")))
        .await;

    let delivery = &running.delivery;
    assert!(eventually(WAIT, || async move { delivery.deliveries().len() == 1 }).await);
    assert_eq!(running.delivery.recipients(), vec!["a@x.com"]);

    running.shutdown().await;
}

#[tokio::test]
async fn scheduled_reminder_is_delivered_once_when_due() {
    let running = start().await;

    let due_at = Utc::now() + chrono::Duration::milliseconds(200);
    running
        .announcer
        .schedule_reminder(
            NotificationMessage::new(2, "Delayed Event", Categories::single("Art")),
            due_at,
        )
        .await;

    let delivery = &running.delivery;
    assert!(eventually(WAIT, || async move { delivery.deliveries().len() == 1 }).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let deliveries = running.delivery.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "b@x.com");
    assert_eq!(deliveries[0].1.event_id, Some(2));
    assert_eq!(running.bus.published_on("event_notifications").len(), 1);

    running.shutdown().await;
}

#[tokio::test]
async fn live_update_reaches_websocket_client_and_shutdown_closes_it() {
    let running = start().await;

    let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{}/", running.addr))
        .await
        .unwrap();
    let registry = &running.registry;
    assert!(eventually(WAIT, || async move { registry.len().await == 1 }).await);

    running
        .announcer
        .broadcast_update(&serde_json::json!({"eventId": 3, "seatsLeft": 0}))
        .await;

    let frame = tokio::time::timeout(WAIT, client.next())
        .await
        .expect("no frame")
        .unwrap()
        .unwrap();
    assert_eq!(frame, Message::Text(r#"{"eventId":3,"seatsLeft":0}"#.to_string()));

    running.shutdown().await;
}
