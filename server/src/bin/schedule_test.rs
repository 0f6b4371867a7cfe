//! Schedule a sample notification one minute ahead.
//!
//! ```bash
//! cargo run --bin schedule-test
//! ```

use chrono::{Duration, Utc};
use event_notify_core::message::{Categories, NotificationBody};
use event_notify_redis::RedisDelayStore;
use event_notify_runtime::Scheduler;
use event_notify_server::{Config, init_tracing};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env();
    let store = RedisDelayStore::new(&config.redis.url, config.redis.schedule_key.clone()).await?;
    let scheduler = Scheduler::new(Arc::new(store));

    let due_at = Utc::now() + Duration::minutes(1);
    let entry = scheduler
        .try_schedule(2, NotificationBody::new("Delayed Event", Categories::single("Art")), due_at)
        .await?;

    tracing::info!(
        key = %config.redis.schedule_key,
        event_id = entry.event_id,
        due_at = %due_at,
        "Test notification scheduled"
    );
    Ok(())
}
