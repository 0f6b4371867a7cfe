//! Application state for Axum handlers.

use crate::registry::ConnectionRegistry;
use event_notify_core::delay_store::DelayStore;
use std::sync::Arc;

/// State shared by the WebSocket and health handlers.
#[derive(Clone)]
pub struct AppState {
    /// Open live-update connections
    pub registry: ConnectionRegistry,
    /// Delay store, checked by the readiness endpoint
    pub delay_store: Arc<dyn DelayStore>,
}

impl AppState {
    /// Create state over an existing registry and delay store.
    #[must_use]
    pub fn new(registry: ConnectionRegistry, delay_store: Arc<dyn DelayStore>) -> Self {
        Self {
            registry,
            delay_store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        // Axum requires Clone state
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
