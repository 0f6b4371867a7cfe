//! In-memory message bus backed by tokio broadcast channels.

use event_notify_core::bus::{BusError, BusMessage, MessageBus, MessageStream};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{RwLock, broadcast};

/// Type alias for the channels map to reduce complexity.
type ChannelsMap = Arc<RwLock<HashMap<String, broadcast::Sender<BusMessage>>>>;

/// In-memory message bus.
///
/// Each channel name gets its own broadcast channel, created on first use by
/// either side. Every published message is also appended to a history so
/// tests can assert on what was published without racing a subscriber.
///
/// # Example
///
/// ```
/// use event_notify_core::bus::MessageBus;
/// use event_notify_testing::InMemoryMessageBus;
/// use futures::StreamExt;
///
/// # tokio_test::block_on(async {
/// let bus = InMemoryMessageBus::new();
/// let mut stream = bus.subscribe(&["event_updates"]).await.unwrap();
///
/// bus.publish("event_updates", "hello").await.unwrap();
///
/// let message = stream.next().await.unwrap().unwrap();
/// assert_eq!(message.payload, "hello");
/// # });
/// ```
#[derive(Clone)]
pub struct InMemoryMessageBus {
    /// Map of channel name → broadcast channel
    channels: ChannelsMap,
    /// Every message published, in order
    history: Arc<Mutex<Vec<BusMessage>>>,
    /// Simulated outage: publishes fail while set
    failing: Arc<AtomicBool>,
    /// Per-subscriber buffer before lagging
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Create a bus with the default per-channel capacity (1000).
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    /// Create a bus with a custom per-channel capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    #[allow(clippy::panic)]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
            capacity,
        }
    }

    /// Make subsequent publishes fail (or succeed again).
    pub fn set_publish_failure(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of live subscribers on `channel`.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Every message published so far, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<BusMessage> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payloads published on `channel`, in publish order.
    #[must_use]
    pub fn published_on(&self, channel: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|message| message.channel == channel)
            .map(|message| message.payload)
            .collect()
    }

    async fn sender(&self, channel: &str) -> broadcast::Sender<BusMessage> {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for InMemoryMessageBus {
    fn publish(
        &self,
        channel: &str,
        payload: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>> {
        let message = BusMessage::new(channel, payload);

        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(BusError::PublishFailed {
                    channel: message.channel,
                    reason: "simulated outage".to_string(),
                });
            }

            let sender = self.sender(&message.channel).await;
            self.history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message.clone());

            // No receivers is not an error: the message is simply dropped
            let receivers = sender.send(message).unwrap_or(0);
            tracing::trace!(receivers, "In-memory publish");
            Ok(())
        })
    }

    fn subscribe(
        &self,
        channels: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<MessageStream, BusError>> + Send + '_>> {
        let channels: Vec<String> = channels.iter().map(|s| (*s).to_string()).collect();

        Box::pin(async move {
            if channels.is_empty() {
                return Err(BusError::SubscriptionFailed {
                    channels,
                    reason: "no channels given".to_string(),
                });
            }

            // Receivers are created here, before the future resolves, so the
            // subscription is live as soon as the caller gets the stream.
            let mut streams = Vec::with_capacity(channels.len());
            for channel in channels {
                let mut rx = self.sender(&channel).await.subscribe();
                let stream = async_stream::stream! {
                    loop {
                        match rx.recv().await {
                            Ok(message) => yield Ok(message),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                yield Err(BusError::Lagged { channel: channel.clone(), skipped });
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                };
                streams.push(Box::pin(stream) as MessageStream);
            }

            Ok(Box::pin(futures::stream::select_all(streams)) as MessageStream)
        })
    }
}
