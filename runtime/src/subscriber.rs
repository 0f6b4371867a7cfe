//! Generic bus subscriber with automatic reconnection.
//!
//! `Subscriber` owns the boilerplate of consuming a message bus: subscribing
//! with retry, handing each message to a [`MessageHandler`], isolating handler
//! failures, reconnecting when the stream ends, and stopping on shutdown.
//!
//! # Pattern: Subscribe-Process-Reconnect Loop
//!
//! ```text
//! loop {
//!     try_subscribe:
//!         loop {
//!             process_messages:
//!                 - Handle message (errors and panics are logged)
//!                 - Check shutdown signal
//!         }
//!         if stream ended or subscribe failed:
//!             wait retry_delay and resubscribe
//! }
//! ```
//!
//! Messages are handled one at a time, so a handler sees the messages of a
//! channel in publish order.
//!
//! # Example
//!
//! ```rust,ignore
//! let subscriber = Subscriber::builder()
//!     .name("live-bridge")
//!     .channels(vec!["event_updates".to_string()])
//!     .bus(bus)
//!     .handler(bridge)
//!     .shutdown(shutdown_rx)
//!     .build()?;
//!
//! let handle = subscriber.spawn();
//! ```

use crate::metrics::SubscriberMetrics;
use async_trait::async_trait;
use event_notify_core::bus::{BusMessage, MessageBus, MessageStream};
use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Error type returned by message handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes one bus message.
///
/// Implementations should be idempotent where possible; the bus gives
/// at-most-once delivery but a reconnect may interleave with in-flight work.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle a single message.
    ///
    /// # Errors
    ///
    /// Any error is logged by the subscriber, which then moves on to the next
    /// message.
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError>;
}

/// Generic bus subscriber.
///
/// # Lifecycle
///
/// 1. Created via `builder()` or `new()`
/// 2. Spawned as background task via `spawn()`
/// 3. Runs until the shutdown signal fires
pub struct Subscriber {
    /// Subscriber name (for logging and metrics)
    name: String,

    /// Channels to subscribe to
    channels: Vec<String>,

    /// Bus to consume from
    bus: Arc<dyn MessageBus>,

    /// Handler for each message
    handler: Arc<dyn MessageHandler>,

    /// Shutdown signal receiver
    shutdown: broadcast::Receiver<()>,

    /// Delay before resubscribing (default: 5 seconds)
    retry_delay: Duration,
}

impl Subscriber {
    /// Create a new subscriber with the default retry delay (5 seconds).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        channels: Vec<String>,
        bus: Arc<dyn MessageBus>,
        handler: Arc<dyn MessageHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            channels,
            bus,
            handler,
            shutdown,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Create a builder for configuring a subscriber.
    #[must_use]
    pub fn builder() -> SubscriberBuilder {
        SubscriberBuilder::default()
    }

    /// Set custom retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Spawn the subscriber as a background task.
    ///
    /// The returned handle resolves once the shutdown signal has been seen.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the subscribe-process-reconnect loop until shutdown.
    pub async fn run(&mut self) {
        info!(subscriber = %self.name, "Subscriber started");

        loop {
            let channels: Vec<&str> = self.channels.iter().map(String::as_str).collect();

            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(subscriber = %self.name, "Subscriber received shutdown signal");
                    break;
                }
                subscribe_result = self.bus.subscribe(&channels) => {
                    match subscribe_result {
                        Ok(mut stream) => {
                            info!(subscriber = %self.name, channels = ?self.channels, "Subscribed to message bus");

                            if self.process_stream(&mut stream).await {
                                break;
                            }

                            warn!(subscriber = %self.name, "Message stream ended, resubscribing in {:?}", self.retry_delay);
                        }
                        Err(e) => {
                            error!(
                                subscriber = %self.name,
                                error = %e,
                                "Failed to subscribe to message bus, retrying in {:?}",
                                self.retry_delay
                            );
                        }
                    }

                    if self.wait_retry().await {
                        break;
                    }
                }
            }
        }

        info!(subscriber = %self.name, "Subscriber stopped");
    }

    /// Process messages until the stream ends (`false`) or shutdown (`true`).
    async fn process_stream(&mut self, stream: &mut MessageStream) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(subscriber = %self.name, "Subscriber received shutdown signal during processing");
                    return true;
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(message)) => self.dispatch(&message).await,
                        Some(Err(e)) => {
                            error!(
                                subscriber = %self.name,
                                error = %e,
                                "Error receiving message from bus"
                            );
                        }
                        None => return false,
                    }
                }
            }
        }
    }

    /// Run the handler on one message, containing errors and panics.
    async fn dispatch(&self, message: &BusMessage) {
        debug!(subscriber = %self.name, channel = %message.channel, "Handling message");

        let outcome = AssertUnwindSafe(self.handler.handle(message))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                SubscriberMetrics::record_handler_failure(&self.name);
                error!(
                    subscriber = %self.name,
                    channel = %message.channel,
                    error = %e,
                    "Failed to handle message"
                );
            }
            Err(_) => {
                SubscriberMetrics::record_handler_failure(&self.name);
                error!(
                    subscriber = %self.name,
                    channel = %message.channel,
                    "Message handler panicked"
                );
            }
        }
    }

    /// Sleep for the retry delay; returns `true` if shutdown fired meanwhile.
    async fn wait_retry(&mut self) -> bool {
        tokio::select! {
            _ = self.shutdown.recv() => true,
            () = tokio::time::sleep(self.retry_delay) => false,
        }
    }
}

/// Errors from [`SubscriberBuilder::build`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A required builder field was never set
    #[error("Subscriber field '{0}' is required")]
    MissingField(&'static str),
}

/// Builder for configuring a [`Subscriber`].
#[derive(Default)]
pub struct SubscriberBuilder {
    name: Option<String>,
    channels: Option<Vec<String>>,
    bus: Option<Arc<dyn MessageBus>>,
    handler: Option<Arc<dyn MessageHandler>>,
    shutdown: Option<broadcast::Receiver<()>>,
    retry_delay: Option<Duration>,
}

impl SubscriberBuilder {
    /// Set subscriber name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set channels to subscribe to.
    #[must_use]
    pub fn channels(mut self, channels: Vec<String>) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Set the message bus.
    #[must_use]
    pub fn bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Set the message handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set shutdown signal receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Set custom retry delay (default: 5 seconds).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Build the [`Subscriber`].
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingField`] if name, channels, bus, handler
    /// or shutdown is not set.
    pub fn build(self) -> Result<Subscriber, BuildError> {
        Ok(Subscriber {
            name: self.name.ok_or(BuildError::MissingField("name"))?,
            channels: self.channels.ok_or(BuildError::MissingField("channels"))?,
            bus: self.bus.ok_or(BuildError::MissingField("bus"))?,
            handler: self.handler.ok_or(BuildError::MissingField("handler"))?,
            shutdown: self.shutdown.ok_or(BuildError::MissingField("shutdown"))?,
            retry_delay: self.retry_delay.unwrap_or_else(|| Duration::from_secs(5)),
        })
    }
}
