//! End-to-end pipeline tests over the in-memory bus and store.
//!
//! These wire the scheduler, delay worker, dispatcher and subscriber loop
//! together the way the server does, with a manual clock standing in for
//! wall time.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code

use chrono::Duration as ChronoDuration;
use event_notify_core::bus::MessageBus;
use event_notify_core::delay_store::DelayStore;
use event_notify_core::environment::Clock;
use event_notify_core::message::{Categories, NotificationBody, NotificationMessage};
use event_notify_core::{ChannelNames, DEFAULT_NOTIFICATION_CHANNEL};
use event_notify_runtime::{Announcer, DelayWorker, Dispatcher, Scheduler, Subscriber};
use event_notify_testing::helpers::{eventually, init_tracing};
use event_notify_testing::{
    InMemoryDelayStore, InMemoryMessageBus, InMemoryUserDirectory, ManualClock,
    RecordingDelivery, test_clock,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

struct Pipeline {
    bus: InMemoryMessageBus,
    store: Arc<InMemoryDelayStore>,
    clock: ManualClock,
    directory: InMemoryUserDirectory,
    delivery: RecordingDelivery,
    worker: DelayWorker,
    announcer: Announcer,
    shutdown: broadcast::Sender<()>,
    dispatcher_task: tokio::task::JoinHandle<()>,
}

impl Pipeline {
    async fn start() -> Self {
        init_tracing();

        let bus = InMemoryMessageBus::new();
        let store = Arc::new(InMemoryDelayStore::new());
        let clock = ManualClock::new(test_clock().now());
        let directory = InMemoryUserDirectory::default();
        let delivery = RecordingDelivery::new();
        let (shutdown, _) = broadcast::channel(1);

        let shared_bus: Arc<dyn MessageBus> = Arc::new(bus.clone());
        let worker = DelayWorker::new(
            store.clone(),
            shared_bus.clone(),
            Arc::new(clock.clone()),
            DEFAULT_NOTIFICATION_CHANNEL,
        );
        let announcer = Announcer::new(
            shared_bus.clone(),
            Scheduler::new(store.clone()),
            ChannelNames::default(),
        );

        let dispatcher = Dispatcher::new(Arc::new(directory.clone()), Arc::new(delivery.clone()));
        let dispatcher_task = Subscriber::new(
            "dispatcher",
            vec![DEFAULT_NOTIFICATION_CHANNEL.to_string()],
            shared_bus,
            Arc::new(dispatcher),
            shutdown.subscribe(),
        )
        .with_retry_delay(Duration::from_millis(10))
        .spawn();

        let watched = bus.clone();
        assert!(
            eventually(Duration::from_secs(1), || {
                let watched = watched.clone();
                async move { watched.subscriber_count(DEFAULT_NOTIFICATION_CHANNEL).await == 1 }
            })
            .await
        );

        Self {
            bus,
            store,
            clock,
            directory,
            delivery,
            worker,
            announcer,
            shutdown,
            dispatcher_task,
        }
    }

    async fn deliveries_reach(&self, count: usize) -> bool {
        let delivery = self.delivery.clone();
        eventually(Duration::from_secs(1), move || {
            let delivery = delivery.clone();
            async move { delivery.deliveries().len() >= count }
        })
        .await
    }

    async fn stop(self) {
        self.shutdown.send(()).unwrap();
        self.dispatcher_task.await.unwrap();
    }
}

#[tokio::test]
async fn scheduled_notification_reaches_interested_user_after_due_tick() {
    let pipeline = Pipeline::start().await;
    pipeline.directory.add_user("a@x.com", ["Music"]);
    pipeline.directory.add_user("b@x.com", ["Art"]);

    let due_at = pipeline.clock.now() + ChronoDuration::seconds(1);
    pipeline
        .announcer
        .schedule_reminder(
            NotificationMessage::new(5, "Reminder", Categories::single("Music")),
            due_at,
        )
        .await;

    // Not yet due
    let early = pipeline.worker.run_once().await.unwrap();
    assert_eq!(early.promoted, 0);

    pipeline.clock.advance(ChronoDuration::seconds(1));
    let tick = pipeline.worker.run_once().await.unwrap();
    assert_eq!(tick.promoted, 1);

    assert!(pipeline.deliveries_reach(1).await);
    // Give a duplicate the chance to show up
    tokio::time::sleep(Duration::from_millis(20)).await;

    let deliveries = pipeline.delivery.deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "a@x.com");
    assert_eq!(deliveries[0].1.event_id, Some(5));
    assert_eq!(pipeline.store.len().await.unwrap(), 0);

    pipeline.stop().await;
}

#[tokio::test]
async fn direct_publish_without_interested_users_delivers_nothing() {
    let pipeline = Pipeline::start().await;
    pipeline.directory.add_user("a@x.com", ["Music"]);

    pipeline
        .announcer
        .announce(&NotificationMessage::new(9, "Derby", Categories::single("Sports")))
        .await;

    let directory = pipeline.directory.clone();
    assert!(
        eventually(Duration::from_secs(1), move || {
            let directory = directory.clone();
            async move { directory.query_count() == 1 }
        })
        .await
    );
    assert!(pipeline.delivery.deliveries().is_empty());

    pipeline.stop().await;
}

#[tokio::test]
async fn payloads_with_only_categories_are_delivered() {
    let pipeline = Pipeline::start().await;
    pipeline.directory.add_user("s@x.com", ["Sports"]);

    pipeline
        .bus
        .publish(DEFAULT_NOTIFICATION_CHANNEL, r#"{"eventId":9,"categories":"Sports"}"#)
        .await
        .unwrap();
    pipeline
        .bus
        .publish(
            DEFAULT_NOTIFICATION_CHANNEL,
            r#"{"title":"Scheduled Event","categories":"Sports"}"#,
        )
        .await
        .unwrap();

    assert!(pipeline.deliveries_reach(2).await);
    assert_eq!(pipeline.delivery.recipients(), vec!["s@x.com", "s@x.com"]);

    pipeline.stop().await;
}

#[tokio::test]
async fn malformed_payload_does_not_stop_later_notifications() {
    let pipeline = Pipeline::start().await;
    pipeline.directory.add_user("a@x.com", ["Music"]);

    pipeline
        .bus
        .publish(DEFAULT_NOTIFICATION_CHANNEL, "definitely not json")
        .await
        .unwrap();
    pipeline
        .bus
        .publish(
            DEFAULT_NOTIFICATION_CHANNEL,
            r#"{"eventId":1,"title":"Test Event","categories":"Music"}"#,
        )
        .await
        .unwrap();

    assert!(pipeline.deliveries_reach(1).await);
    assert_eq!(pipeline.delivery.recipients(), vec!["a@x.com"]);

    pipeline.stop().await;
}

#[tokio::test]
async fn directory_outage_is_isolated_to_one_message() {
    let pipeline = Pipeline::start().await;
    pipeline.directory.add_user("a@x.com", ["Music"]);

    pipeline.directory.set_failure(true);
    pipeline
        .announcer
        .announce(&NotificationMessage::new(1, "Lost", Categories::single("Music")))
        .await;

    let directory = pipeline.directory.clone();
    assert!(
        eventually(Duration::from_secs(1), move || {
            let directory = directory.clone();
            async move { directory.query_count() == 1 }
        })
        .await
    );

    pipeline.directory.set_failure(false);
    pipeline
        .announcer
        .announce(&NotificationMessage::new(2, "Found", Categories::single("Music")))
        .await;

    assert!(pipeline.deliveries_reach(1).await);
    assert_eq!(pipeline.delivery.deliveries()[0].1.event_id, Some(2));

    pipeline.stop().await;
}

#[tokio::test]
async fn entries_are_promoted_in_due_order() {
    let pipeline = Pipeline::start().await;
    let now = pipeline.clock.now();
    let scheduler = Scheduler::new(pipeline.store.clone());

    for (event_id, offset) in [(3, 300), (1, 100), (2, 200)] {
        scheduler
            .try_schedule(
                event_id,
                NotificationBody::new("Ordered", Categories::single("Music")),
                now + ChronoDuration::milliseconds(offset),
            )
            .await
            .unwrap();
    }

    pipeline.clock.advance(ChronoDuration::seconds(1));
    pipeline.worker.run_once().await.unwrap();

    let ids: Vec<i64> = pipeline
        .bus
        .published_on(DEFAULT_NOTIFICATION_CHANNEL)
        .iter()
        .filter_map(|payload| NotificationMessage::from_json(payload).unwrap().event_id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);

    pipeline.stop().await;
}
