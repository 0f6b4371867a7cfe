//! Redis backends for the event notification pipeline.
//!
//! This crate provides the production implementations of two core traits:
//!
//! - [`RedisMessageBus`]: [`MessageBus`](event_notify_core::bus::MessageBus)
//!   over Redis `PUBLISH`/`SUBSCRIBE`
//! - [`RedisDelayStore`]: [`DelayStore`](event_notify_core::delay_store::DelayStore)
//!   over a Redis sorted set
//!
//! # Delivery Semantics
//!
//! Redis pub/sub is **at-most-once**: a message published while no subscriber
//! is connected is gone, and a subscriber that reconnects does not see what it
//! missed. Scheduled notifications survive restarts because they live in the
//! sorted set until the delay worker claims them.
//!
//! # Example
//!
//! ```no_run
//! use event_notify_core::bus::MessageBus;
//! use event_notify_redis::{RedisDelayStore, RedisMessageBus};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = RedisMessageBus::new("redis://127.0.0.1:6379").await?;
//! let store = RedisDelayStore::new("redis://127.0.0.1:6379", "scheduled_notifications").await?;
//!
//! let mut stream = bus.subscribe(&["event_updates"]).await?;
//! bus.publish("event_updates", r#"{"type":"update","eventId":1}"#).await?;
//!
//! if let Some(Ok(message)) = stream.next().await {
//!     println!("{}: {}", message.channel, message.payload);
//! }
//! # Ok(())
//! # }
//! ```

mod bus;
mod delay_store;

pub use bus::{RedisMessageBus, RedisMessageBusBuilder};
pub use delay_store::RedisDelayStore;
