//! Entry point for the events API.
//!
//! When an event is created or changed, the API announces it through this
//! facade. Every call is fire-and-forget: failures are logged and never
//! reach the caller, so announcing can not break event creation.

use crate::scheduler::Scheduler;
use chrono::{DateTime, Utc};
use event_notify_core::ChannelNames;
use event_notify_core::bus::{MessageBus, publish_json};
use event_notify_core::message::NotificationMessage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Publishes notifications and live updates, and schedules reminders.
#[derive(Clone)]
pub struct Announcer {
    bus: Arc<dyn MessageBus>,
    scheduler: Scheduler,
    channels: ChannelNames,
}

impl Announcer {
    /// Create an announcer.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, scheduler: Scheduler, channels: ChannelNames) -> Self {
        Self {
            bus,
            scheduler,
            channels,
        }
    }

    /// Publish `message` for immediate dispatch.
    pub async fn announce(&self, message: &NotificationMessage) {
        match publish_json(self.bus.as_ref(), &self.channels.notifications, message).await {
            Ok(()) => debug!(event_id = message.event_id, "Notification published"),
            Err(e) => error!(event_id = message.event_id, error = %e, "Error publishing notification"),
        }
    }

    /// Publish `update` to connected live clients.
    ///
    /// The JSON encoding of `update` is relayed to clients byte for byte.
    pub async fn broadcast_update<T: Serialize + Sync + ?Sized>(&self, update: &T) {
        if let Err(e) = publish_json(self.bus.as_ref(), &self.channels.live_updates, update).await {
            error!(error = %e, "Error publishing live update");
        }
    }

    /// Schedule `message` to be announced at `due_at`.
    ///
    /// Scheduled entries are keyed by event, so a message without an
    /// `event_id` is logged and dropped.
    pub async fn schedule_reminder(&self, message: NotificationMessage, due_at: DateTime<Utc>) {
        let Some(event_id) = message.event_id else {
            error!(title = %message.title, "Cannot schedule a notification without an event id");
            return;
        };
        self.scheduler.schedule(event_id, message.body(), due_at).await;
    }
}
