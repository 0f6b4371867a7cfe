//! Prometheus metrics for the notification pipeline.
//!
//! This module provides metric collection for every stage:
//! - Scheduling into the delay store
//! - Promotion by the delay worker
//! - Dispatch and per-user delivery
//! - Live broadcast fan-out
//! - Subscriber handler failures
//!
//! Recording is always safe: without an installed recorder the macros are
//! no-ops.
//!
//! # Example
//!
//! ```rust,no_run
//! use event_notify_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Serve this text at http://localhost:9090/metrics
//! let text = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Owns the recorder handle whose rendering is exposed for Prometheus
/// scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the global Prometheus recorder.
    ///
    /// The recorder only collects; the caller exposes [`Self::render`] over
    /// HTTP on [`Self::addr`].
    ///
    /// # Errors
    ///
    /// Returns error if the recorder cannot be installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this
    /// logs a warning and succeeds without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics recorder installed - will be available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Address the metrics endpoint should be served on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "notifications_scheduled_total",
        "Total number of notifications inserted into the delay store"
    );
    describe_counter!(
        "notifications_schedule_errors_total",
        "Total number of failed delay store inserts"
    );
    describe_counter!(
        "notifications_promoted_total",
        "Total number of due notifications published by the delay worker"
    );
    describe_counter!(
        "notifications_promotion_failed_total",
        "Total number of due entries that could not be promoted this tick"
    );
    describe_counter!(
        "notifications_dispatched_total",
        "Total number of notifications processed by the dispatcher"
    );
    describe_counter!(
        "notifications_delivered_total",
        "Total number of successful per-user deliveries"
    );
    describe_counter!(
        "notifications_delivery_failed_total",
        "Total number of failed per-user deliveries"
    );
    describe_counter!(
        "live_broadcasts_total",
        "Total number of live updates relayed to WebSocket clients"
    );
    describe_gauge!(
        "live_connections",
        "Number of open live-update connections"
    );
    describe_counter!(
        "bus_handler_failures_total",
        "Total number of bus messages whose handler failed or panicked"
    );
}

/// Scheduler metrics recorder.
pub struct SchedulerMetrics;

impl SchedulerMetrics {
    /// Record a successful insert.
    pub fn record_scheduled() {
        counter!("notifications_scheduled_total").increment(1);
    }

    /// Record a failed insert.
    pub fn record_error() {
        counter!("notifications_schedule_errors_total").increment(1);
    }
}

/// Delay worker metrics recorder.
pub struct WorkerMetrics;

impl WorkerMetrics {
    /// Record promoted and failed entries for one tick.
    pub fn record_tick(promoted: usize, failed: usize) {
        counter!("notifications_promoted_total").increment(promoted as u64);
        counter!("notifications_promotion_failed_total").increment(failed as u64);
    }
}

/// Dispatcher metrics recorder.
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record one dispatched notification and its delivery outcome.
    pub fn record_dispatch(delivered: usize, failed: usize) {
        counter!("notifications_dispatched_total").increment(1);
        counter!("notifications_delivered_total").increment(delivered as u64);
        counter!("notifications_delivery_failed_total").increment(failed as u64);
    }
}

/// Live bridge metrics recorder.
pub struct BridgeMetrics;

impl BridgeMetrics {
    /// Record one relayed live update.
    pub fn record_broadcast() {
        counter!("live_broadcasts_total").increment(1);
    }

    /// Record the current number of open connections.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_connections(open: usize) {
        gauge!("live_connections").set(open as f64);
    }
}

/// Subscriber metrics recorder.
pub struct SubscriberMetrics;

impl SubscriberMetrics {
    /// Record a handler failure on `subscriber`.
    pub fn record_handler_failure(subscriber: &str) {
        counter!("bus_handler_failures_total", "subscriber" => subscriber.to_string())
            .increment(1);
    }
}
