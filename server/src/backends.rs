//! Infrastructure the pipeline runs on.

use crate::config::{Backend, Config};
use anyhow::Context;
use event_notify_core::bus::MessageBus;
use event_notify_core::delay_store::DelayStore;
use event_notify_core::delivery::DeliveryChannel;
use event_notify_core::directory::UserDirectory;
use event_notify_postgres::PostgresUserDirectory;
use event_notify_redis::{RedisDelayStore, RedisMessageBus};
use event_notify_runtime::LogDelivery;
use event_notify_testing::{InMemoryDelayStore, InMemoryMessageBus, InMemoryUserDirectory};
use std::sync::Arc;
use tracing::info;

/// Connected collaborators of the pipeline.
#[derive(Clone)]
pub struct Backends {
    /// Pub/sub transport
    pub bus: Arc<dyn MessageBus>,
    /// Scheduled notification store
    pub delay_store: Arc<dyn DelayStore>,
    /// Interested-user lookup
    pub directory: Arc<dyn UserDirectory>,
    /// Per-user delivery
    pub delivery: Arc<dyn DeliveryChannel>,
}

impl Backends {
    /// Connect to the backend selected in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if Redis or `PostgreSQL` is unreachable, or the
    /// users table name is invalid.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        match config.backend {
            Backend::Redis => Self::connect_redis(config).await,
            Backend::Memory => {
                info!("Using in-memory backend; state is lost on exit");
                Ok(Self::in_memory())
            }
        }
    }

    async fn connect_redis(config: &Config) -> anyhow::Result<Self> {
        let bus = RedisMessageBus::new(&config.redis.url)
            .await
            .context("connecting message bus")?;
        let delay_store = RedisDelayStore::new(&config.redis.url, config.redis.schedule_key.clone())
            .await
            .context("connecting delay store")?;
        let directory = PostgresUserDirectory::new(&config.database.url)
            .await
            .context("connecting user directory")?
            .with_table(&config.database.users_table)?;

        info!(
            redis = %config.redis.url,
            schedule_key = %config.redis.schedule_key,
            users_table = %config.database.users_table,
            "Connected to Redis and PostgreSQL"
        );

        Ok(Self {
            bus: Arc::new(bus),
            delay_store: Arc::new(delay_store),
            directory: Arc::new(directory),
            delivery: Arc::new(LogDelivery),
        })
    }

    /// In-process fakes with no users registered.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            bus: Arc::new(InMemoryMessageBus::new()),
            delay_store: Arc::new(InMemoryDelayStore::new()),
            directory: Arc::new(InMemoryUserDirectory::default()),
            delivery: Arc::new(LogDelivery),
        }
    }
}
