//! # Event Notify Runtime
//!
//! The moving parts of the notification pipeline, built on the traits in
//! `event-notify-core`:
//!
//! - [`Scheduler`]: inserts deferred notifications into the delay store
//! - [`DelayWorker`]: periodically promotes due entries onto the bus
//! - [`Dispatcher`]: matches published notifications to interested users
//! - [`Subscriber`]: generic subscribe-process-reconnect loop that feeds bus
//!   messages to a [`MessageHandler`]
//! - [`Announcer`]: fire-and-forget facade for the events API
//! - [`LogDelivery`]: reference delivery channel
//!
//! ## Example
//!
//! ```rust,ignore
//! let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
//!
//! let dispatcher = Arc::new(Dispatcher::new(directory, Arc::new(LogDelivery)));
//! let subscriber = Subscriber::new(
//!     "dispatcher",
//!     vec!["event_notifications".to_string()],
//!     bus.clone(),
//!     dispatcher,
//!     shutdown_tx.subscribe(),
//! );
//! let handle = subscriber.spawn();
//! ```

pub mod announcer;
pub mod delivery;
pub mod dispatcher;
pub mod health;
pub mod metrics;
pub mod scheduler;
pub mod subscriber;
pub mod worker;

pub use announcer::Announcer;
pub use delivery::LogDelivery;
pub use dispatcher::{DispatchError, DispatchReport, Dispatcher};
pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use scheduler::{ScheduleError, Scheduler};
pub use subscriber::{HandlerError, MessageHandler, Subscriber, SubscriberBuilder};
pub use worker::{DelayWorker, TickReport};
