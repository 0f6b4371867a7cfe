//! Notification pipeline server.
//!
//! Runs the delay worker, the dispatcher, the live bridge and the
//! WebSocket / health server in one process.
//!
//! # Usage
//!
//! ```bash
//! # Redis + PostgreSQL
//! REDIS_URL=redis://127.0.0.1:6379 DATABASE_URL=postgres://... cargo run --bin notify-server
//!
//! # No infrastructure
//! NOTIFY_BACKEND=memory cargo run --bin notify-server
//! ```

use event_notify_server::{Application, Backends, Config, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env();
    tracing::info!(
        backend = ?config.backend,
        address = %config.server.bind_address(),
        "Configuration loaded"
    );

    let backends = Backends::connect(&config).await?;
    Application::new(config, backends).run().await
}
