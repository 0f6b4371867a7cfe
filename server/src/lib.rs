//! Event notification service.
//!
//! Wires the pipeline crates into one process:
//!
//! - [`config`]: environment-driven configuration
//! - [`backends`]: Redis / `PostgreSQL` or in-memory collaborators
//! - [`lifecycle`]: startup, HTTP server and graceful shutdown
//!
//! The `notify-server` binary runs it; `publish-test` and `schedule-test`
//! inject sample notifications for manual checks.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]

pub mod backends;
pub mod config;
pub mod lifecycle;

pub use backends::Backends;
pub use config::{Backend, Config};
pub use lifecycle::Application;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset: debug output for every
/// `event_notify_*` crate, info for dependencies.
pub const DEFAULT_LOG_FILTER: &str = "info,event_notify=debug";

/// Install the `fmt` subscriber filtered by `RUST_LOG`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
