//! Relay from the live-update channel to open connections.

use crate::registry::ConnectionRegistry;
use async_trait::async_trait;
use event_notify_core::bus::BusMessage;
use event_notify_runtime::metrics::BridgeMetrics;
use event_notify_runtime::subscriber::{HandlerError, MessageHandler};

/// Broadcasts every live-update payload, unmodified, to all open
/// connections.
#[derive(Clone)]
pub struct LiveBridge {
    registry: ConnectionRegistry,
}

impl LiveBridge {
    /// Create a bridge over `registry`.
    #[must_use]
    pub const fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// The registry updates are relayed to.
    #[must_use]
    pub const fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}

#[async_trait]
impl MessageHandler for LiveBridge {
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        let report = self.registry.broadcast(&message.payload).await;
        BridgeMetrics::record_broadcast();

        tracing::debug!(
            channel = %message.channel,
            delivered = report.delivered,
            pruned = report.pruned,
            dropped = report.dropped,
            "Relayed live update"
        );
        Ok(())
    }
}
