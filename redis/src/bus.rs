//! Redis pub/sub message bus.

use event_notify_core::bus::{BusError, BusMessage, MessageBus, MessageStream};
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::future::Future;
use std::pin::Pin;

/// Message bus over Redis `PUBLISH`/`SUBSCRIBE`.
///
/// Publishing goes through a shared [`ConnectionManager`], which reconnects
/// on its own. Every `subscribe` call opens a dedicated pub/sub connection,
/// owned by a forwarding task that feeds a bounded buffer; the returned
/// stream ends when that connection drops, and the caller resubscribes.
///
/// # Example
///
/// ```no_run
/// use event_notify_redis::RedisMessageBus;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = RedisMessageBus::builder()
///     .url("redis://127.0.0.1:6379")
///     .buffer_size(5000)
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisMessageBus {
    /// Client used to open pub/sub connections
    client: Client,
    /// Shared connection for `PUBLISH`
    publisher: ConnectionManager,
    /// Per-subscription message buffer
    buffer_size: usize,
}

impl RedisMessageBus {
    /// Connect with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if the URL is invalid or Redis
    /// is unreachable.
    pub async fn new(url: &str) -> Result<Self, BusError> {
        Self::builder().url(url).build().await
    }

    /// Create a new builder for configuring the bus.
    #[must_use]
    pub fn builder() -> RedisMessageBusBuilder {
        RedisMessageBusBuilder::default()
    }
}

/// Builder for configuring a [`RedisMessageBus`].
#[derive(Default)]
pub struct RedisMessageBusBuilder {
    url: Option<String>,
    buffer_size: Option<usize>,
}

impl RedisMessageBusBuilder {
    /// Set the Redis URL (e.g. `redis://127.0.0.1:6379`).
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the per-subscription buffer size (default: 1000).
    ///
    /// # Panics
    ///
    /// Panics if `buffer_size` is 0.
    #[must_use]
    #[allow(clippy::panic)]
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        assert!(buffer_size > 0, "buffer_size must be greater than 0");
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Build the bus and open the publishing connection.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ConnectionFailed`] if the URL is missing or invalid,
    /// or Redis is unreachable.
    pub async fn build(self) -> Result<RedisMessageBus, BusError> {
        let url = self
            .url
            .ok_or_else(|| BusError::ConnectionFailed("Redis URL not set".to_string()))?;

        let client = Client::open(url.as_str())
            .map_err(|e| BusError::ConnectionFailed(format!("Failed to create Redis client: {e}")))?;

        let publisher = ConnectionManager::new(client.clone()).await.map_err(|e| {
            BusError::ConnectionFailed(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!(url = %url, "Connected message bus to Redis");

        Ok(RedisMessageBus {
            client,
            publisher,
            buffer_size: self.buffer_size.unwrap_or(1000),
        })
    }
}

impl MessageBus for RedisMessageBus {
    fn publish(
        &self,
        channel: &str,
        payload: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>> {
        let channel = channel.to_string();
        let payload = payload.to_string();
        let mut conn = self.publisher.clone();

        Box::pin(async move {
            let receivers: i64 = conn.publish(&channel, &payload).await.map_err(|e| {
                BusError::PublishFailed {
                    channel: channel.clone(),
                    reason: e.to_string(),
                }
            })?;

            tracing::trace!(channel = %channel, receivers, "Message published");
            Ok(())
        })
    }

    fn subscribe(
        &self,
        channels: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, BusError>> + Send + '_>> {
        let channels: Vec<String> = channels.iter().map(|s| (*s).to_string()).collect();
        let client = self.client.clone();
        let buffer_size = self.buffer_size;

        Box::pin(async move {
            let mut pubsub = client.get_async_pubsub().await.map_err(|e| {
                BusError::SubscriptionFailed {
                    channels: channels.clone(),
                    reason: format!("Failed to open pub/sub connection: {e}"),
                }
            })?;

            for channel in &channels {
                pubsub.subscribe(channel).await.map_err(|e| BusError::SubscriptionFailed {
                    channels: channels.clone(),
                    reason: format!("Failed to subscribe to {channel}: {e}"),
                })?;
            }

            tracing::info!(channels = ?channels, buffer_size, "Subscribed to Redis channels");

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // The task owns the pub/sub connection and exits when either side
            // goes away.
            tokio::spawn(async move {
                let mut messages = Box::pin(pubsub.into_on_message());

                loop {
                    let message = tokio::select! {
                        () = tx.closed() => break,
                        next = messages.next() => match next {
                            Some(message) => message,
                            None => {
                                tracing::warn!("Redis pub/sub connection closed");
                                break;
                            }
                        },
                    };

                    let result = message
                        .get_payload::<String>()
                        .map(|payload| BusMessage::new(message.get_channel_name(), payload))
                        .map_err(|e| BusError::DecodeFailed(format!("Non-UTF-8 payload: {e}")));

                    if tx.send(result).await.is_err() {
                        break;
                    }
                }

                tracing::debug!("Redis subscription task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as MessageStream)
        })
    }
}
