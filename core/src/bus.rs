//! Message bus abstraction for decoupling producers from consumers.
//!
//! This module provides the [`MessageBus`] trait for publishing raw payloads
//! to named channels and subscribing to them. The bus is deliberately thin:
//!
//! - **No persistence**: a message published with no subscribers is gone
//! - **No replay**: subscribers only see messages published after they subscribed
//! - **No acknowledgment**: delivery is best effort
//! - **Ordered per channel**: a subscriber sees one channel's messages in publish order
//!
//! Payloads are carried as text so that relays (the live broadcast bridge)
//! can forward them byte-for-byte without a decode/encode round trip.
//! Typed producers go through [`publish_json`].
//!
//! # Implementations
//!
//! - `InMemoryMessageBus` (testing crate) - tokio broadcast channel per channel name
//! - `RedisMessageBus` (redis crate) - Redis `PUBLISH`/`SUBSCRIBE`
//!
//! # Example
//!
//! ```rust,ignore
//! use event_notify_core::bus::MessageBus;
//! use futures::StreamExt;
//!
//! async fn example(bus: &dyn MessageBus) -> Result<(), BusError> {
//!     let mut stream = bus.subscribe(&["event_updates"]).await?;
//!     bus.publish("event_updates", r#"{"type":"update","eventId":1}"#).await?;
//!
//!     while let Some(result) = stream.next().await {
//!         match result {
//!             Ok(message) => println!("{}: {}", message.channel, message.payload),
//!             Err(e) => eprintln!("Error: {e}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use futures::Stream;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during message bus operations.
#[derive(Error, Debug, Clone)]
pub enum BusError {
    /// Failed to connect to the bus backend
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish a message to a channel
    #[error("Publish failed for channel '{channel}': {reason}")]
    PublishFailed {
        /// The channel that failed
        channel: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to channels
    #[error("Subscription failed for channels {channels:?}: {reason}")]
    SubscriptionFailed {
        /// The channels that failed to subscribe
        channels: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// A received message could not be decoded as text
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    /// A slow subscriber fell behind and messages were dropped
    #[error("Subscriber lagged on channel '{channel}', skipped {skipped} messages")]
    Lagged {
        /// Channel on which messages were dropped
        channel: String,
        /// Number of dropped messages
        skipped: u64,
    },

    /// Failed to encode an outgoing payload
    #[error("Encode failed: {0}")]
    EncodeFailed(String),
}

/// A message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Channel the message was published on
    pub channel: String,
    /// Raw payload, exactly as published
    pub payload: String,
}

impl BusMessage {
    /// Create a new bus message.
    #[must_use]
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// Stream of messages from a subscription.
///
/// Each item is a `Result`: transport-level problems (lag, undecodable
/// payloads) surface as `Err` items without ending the stream.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<BusMessage, BusError>> + Send>>;

/// Trait for message bus implementations.
///
/// # Delivery Contract
///
/// - `publish` reaches every subscriber registered on the channel at the
///   moment of the call; later subscribers never see it
/// - `subscribe` registers before its future resolves, so anything published
///   after `subscribe(..).await` returns is delivered to the stream
/// - Publishing never waits for subscribers to process a message
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be shared as `Arc<dyn MessageBus>` between the announcer, the
/// delay worker, and the subscriber loops.
pub trait MessageBus: Send + Sync {
    /// Publish a raw payload to a channel.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::PublishFailed`] if the backend rejects the publish.
    fn publish(
        &self,
        channel: &str,
        payload: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>>;

    /// Subscribe to one or more channels and receive a stream of messages.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::SubscriptionFailed`] if the subscription cannot be
    /// established.
    fn subscribe(
        &self,
        channels: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, BusError>> + Send + '_>>;
}

/// Serialize `value` as JSON and publish it.
///
/// # Errors
///
/// Returns [`BusError::EncodeFailed`] if serialization fails, or whatever the
/// underlying [`MessageBus::publish`] returns.
pub async fn publish_json<B, T>(bus: &B, channel: &str, value: &T) -> Result<(), BusError>
where
    B: MessageBus + ?Sized,
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string(value).map_err(|e| BusError::EncodeFailed(e.to_string()))?;
    bus.publish(channel, &payload).await
}
