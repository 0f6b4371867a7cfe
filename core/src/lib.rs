//! # Event Notify Core
//!
//! Core traits and types for the event notification pipeline.
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace: the notification payloads, the message bus abstraction, the
//! delay store used for deferred notifications, and the collaborator traits
//! (user directory, delivery channel) the dispatcher depends on.
//!
//! ## Pipeline
//!
//! ```text
//!  Announcer ──schedule──► Delay Store ◄──due/remove── Delay Worker
//!      │                                                   │
//!      │ publish                                   promote │
//!      ▼                                                   ▼
//!  ┌───────────────────── Message Bus ─────────────────────────┐
//!  │  event_notifications                    event_updates     │
//!  └──────────┬─────────────────────────────────────┬──────────┘
//!             ▼                                     ▼
//!        Dispatcher                         Live Broadcast Bridge
//!   (UserDirectory → DeliveryChannel)        (open WebSocket set)
//! ```
//!
//! ## Architecture Principles
//!
//! - Every external dependency sits behind a trait so it can be swapped for an
//!   in-memory fake in tests
//! - Failures are isolated per message and per entry; nothing here panics
//! - Categories are an explicit set of tags and matching is set intersection

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod bus;
pub mod delay_store;
pub mod delivery;
pub mod directory;
pub mod message;

pub use bus::{BusError, BusMessage, MessageBus, MessageStream};
pub use delay_store::{DelayStore, DelayStoreError, DueEntry};
pub use delivery::{DeliveryChannel, DeliveryError};
pub use directory::{DirectoryError, UserDirectory};
pub use message::{
    Categories, CodecError, NotificationBody, NotificationMessage, ScheduledEntry,
    UserPreferenceRecord,
};

/// Channel carrying notifications that are ready to dispatch.
pub const DEFAULT_NOTIFICATION_CHANNEL: &str = "event_notifications";

/// Channel relayed verbatim to connected real-time clients.
pub const DEFAULT_LIVE_UPDATE_CHANNEL: &str = "event_updates";

/// Key of the sorted structure holding scheduled notifications.
pub const DEFAULT_SCHEDULE_KEY: &str = "scheduled_notifications";

/// Environment module - injected dependencies that are not I/O bound.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use event_notify_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

/// Names of the bus channels the pipeline uses.
///
/// Defaults match the names used by the producers already deployed
/// ([`DEFAULT_NOTIFICATION_CHANNEL`], [`DEFAULT_LIVE_UPDATE_CHANNEL`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    /// Immediate notification channel consumed by the dispatcher
    pub notifications: String,
    /// Live-update channel relayed to WebSocket clients
    pub live_updates: String,
}

impl ChannelNames {
    /// Create channel names from explicit values.
    #[must_use]
    pub fn new(notifications: impl Into<String>, live_updates: impl Into<String>) -> Self {
        Self {
            notifications: notifications.into(),
            live_updates: live_updates.into(),
        }
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CHANNEL, DEFAULT_LIVE_UPDATE_CHANNEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_channel_names() {
        let names = ChannelNames::default();
        assert_eq!(names.notifications, "event_notifications");
        assert_eq!(names.live_updates, "event_updates");
    }
}
