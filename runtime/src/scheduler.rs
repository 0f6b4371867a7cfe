//! Scheduling of deferred notifications.

use crate::metrics::SchedulerMetrics;
use chrono::{DateTime, Utc};
use event_notify_core::delay_store::{DelayStore, DelayStoreError};
use event_notify_core::message::{CodecError, NotificationBody, ScheduledEntry};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Errors that can occur while scheduling a notification.
#[derive(Error, Debug, Clone)]
pub enum ScheduleError {
    /// The entry could not be encoded
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The delay store rejected the insert
    #[error(transparent)]
    Store(#[from] DelayStoreError),
}

/// Writes notifications into the delay store, scored by their due instant.
///
/// Scheduling does not deduplicate: scheduling the same event twice with
/// different content produces two entries. Byte-identical entries collapse
/// into one because the store has set semantics.
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn DelayStore>,
}

impl Scheduler {
    /// Create a scheduler over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DelayStore>) -> Self {
        Self { store }
    }

    /// Schedule `notification` for `event_id` at `due_at`.
    ///
    /// Failures are logged and swallowed; use [`Scheduler::try_schedule`] to
    /// observe them.
    pub async fn schedule(&self, event_id: i64, notification: NotificationBody, due_at: DateTime<Utc>) {
        if let Err(e) = self.try_schedule(event_id, notification, due_at).await {
            error!(event_id, due_at = %due_at, error = %e, "Error scheduling notification");
        }
    }

    /// Schedule `notification`, returning any failure to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError`] if the entry cannot be encoded or stored.
    pub async fn try_schedule(
        &self,
        event_id: i64,
        notification: NotificationBody,
        due_at: DateTime<Utc>,
    ) -> Result<ScheduledEntry, ScheduleError> {
        let entry = ScheduledEntry::new(event_id, notification, due_at);
        let member = entry.member()?;

        match self.store.insert(&member, entry.score()).await {
            Ok(()) => {
                SchedulerMetrics::record_scheduled();
                debug!(event_id, due_at = %due_at, "Notification scheduled");
                Ok(entry)
            }
            Err(e) => {
                SchedulerMetrics::record_error();
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use chrono::Duration;
    use event_notify_core::message::Categories;
    use event_notify_testing::{InMemoryDelayStore, test_clock};
    use event_notify_core::environment::Clock;

    fn delayed_event() -> NotificationBody {
        NotificationBody::new("Delayed Event", Categories::single("Art"))
    }

    #[tokio::test]
    async fn schedule_inserts_exactly_one_entry_due_at_its_instant() {
        let store = Arc::new(InMemoryDelayStore::new());
        let scheduler = Scheduler::new(store.clone());
        let now = test_clock().now();
        let due_at = now + Duration::milliseconds(60_000);

        scheduler.schedule(2, delayed_event(), due_at).await;

        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.due(now.timestamp_millis()).await.unwrap().is_empty());
        assert!(
            store
                .due(due_at.timestamp_millis() - 1)
                .await
                .unwrap()
                .is_empty()
        );

        let due = store.due(due_at.timestamp_millis()).await.unwrap();
        assert_eq!(due.len(), 1);
        let entry = ScheduledEntry::from_member(&due[0].member, due[0].score).unwrap();
        assert_eq!(entry.event_id, 2);
        assert_eq!(entry.due_at, due_at);
        assert_eq!(entry.notification, delayed_event());
    }

    #[tokio::test]
    async fn distinct_schedules_for_one_event_are_not_deduplicated() {
        let store = Arc::new(InMemoryDelayStore::new());
        let scheduler = Scheduler::new(store.clone());
        let now = test_clock().now();

        scheduler
            .schedule(7, NotificationBody::new("Doors open", Categories::single("Music")), now)
            .await;
        scheduler
            .schedule(7, NotificationBody::new("Starting soon", Categories::single("Music")), now)
            .await;

        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn store_failure_is_swallowed_by_schedule_and_returned_by_try_schedule() {
        let store = Arc::new(InMemoryDelayStore::new());
        store.set_failure(true);
        let scheduler = Scheduler::new(store.clone());
        let now = test_clock().now();

        // Must not panic or propagate
        scheduler.schedule(2, delayed_event(), now).await;

        let err = scheduler.try_schedule(2, delayed_event(), now).await.unwrap_err();
        assert!(matches!(err, ScheduleError::Store(_)));
    }
}
