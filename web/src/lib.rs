//! Real-time surface of the event notification pipeline.
//!
//! This crate owns the set of open WebSocket connections and relays every
//! message from the live-update channel to all of them, unmodified.
//!
//! # Architecture
//!
//! ```text
//! Message Bus            LiveBridge           ConnectionRegistry        Clients
//!     │                      │                        │                    │
//!     │                      │                        │<── Connect ────────┤
//!     │── event_updates ────>│                        │                    │
//!     │                      ├─ broadcast(payload) ──>│                    │
//!     │                      │                        ├─ payload ─────────>│
//!     │                      │                        │                    │
//! ```
//!
//! There is no replay: a client only sees updates published while it is
//! connected. Clients send nothing; anything they do send is ignored.
//!
//! # Routes
//!
//! - `GET /` and `GET /ws`: WebSocket upgrade
//! - `GET /health`: liveness (`ok`)
//! - `GET /health/ready`: readiness report as JSON

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod handlers;
pub mod registry;
pub mod state;

pub use bridge::LiveBridge;
pub use registry::{BroadcastReport, ConnectionId, ConnectionRegistry, LiveConnection};
pub use state::AppState;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the HTTP router: WebSocket upgrade on `/` and `/ws`, plus health
/// endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::websocket::handle))
        .route("/ws", get(handlers::websocket::handle))
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
