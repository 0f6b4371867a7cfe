//! Set of open live-update connections.
//!
//! Each connection gets a bounded outbound queue. Broadcasting never waits
//! on a slow client: a full queue drops that one update for that one
//! client, and a closed queue removes the connection from the set.

use event_notify_runtime::metrics::BridgeMetrics;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Default per-connection outbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

type ConnectionMap = HashMap<ConnectionId, mpsc::Sender<String>>;

/// Identifier of one open connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiving end of a registered connection.
///
/// Dropping it marks the connection closed; the next broadcast removes it.
#[derive(Debug)]
pub struct LiveConnection {
    id: ConnectionId,
    rx: mpsc::Receiver<String>,
}

impl LiveConnection {
    /// This connection's identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Next payload to write to the client, or `None` once unregistered.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the payload was queued for.
    pub delivered: usize,
    /// Closed connections removed during this broadcast.
    pub pruned: usize,
    /// Open connections whose queue was full.
    pub dropped: usize,
}

/// Shared registry of open connections.
#[derive(Clone)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<ConnectionMap>>,
    queue_capacity: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Create an empty registry with the default queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create an empty registry with a custom per-connection queue capacity.
    #[must_use]
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Add a connection. It receives every broadcast from now on.
    pub async fn register(&self) -> LiveConnection {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = ConnectionId::new();

        let open = {
            let mut connections = self.connections.write().await;
            connections.insert(id, tx);
            connections.len()
        };
        BridgeMetrics::record_connections(open);
        tracing::info!(connection_id = %id, open, "Live connection opened");

        LiveConnection { id, rx }
    }

    /// Remove a connection. Unknown ids are ignored.
    pub async fn unregister(&self, id: ConnectionId) {
        let open = {
            let mut connections = self.connections.write().await;
            if connections.remove(&id).is_none() {
                return;
            }
            connections.len()
        };
        BridgeMetrics::record_connections(open);
        tracing::info!(connection_id = %id, open, "Live connection closed");
    }

    /// Drop every connection. Their streams end and the sockets close.
    pub async fn close_all(&self) {
        let closed = {
            let mut connections = self.connections.write().await;
            let closed = connections.len();
            connections.clear();
            closed
        };
        BridgeMetrics::record_connections(0);
        tracing::info!(closed, "Closed all live connections");
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Queue `payload` for every open connection.
    pub async fn broadcast(&self, payload: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        {
            let connections = self.connections.read().await;
            for (id, tx) in connections.iter() {
                match tx.try_send(payload.to_owned()) {
                    Ok(()) => report.delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        report.dropped += 1;
                        tracing::warn!(connection_id = %id, "Live connection lagging, update dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let open = {
                let mut connections = self.connections.write().await;
                for id in &closed {
                    if connections.remove(id).is_some() {
                        report.pruned += 1;
                    }
                }
                connections.len()
            };
            BridgeMetrics::record_connections(open);
            tracing::debug!(pruned = report.pruned, open, "Pruned closed live connections");
        }

        report
    }
}
