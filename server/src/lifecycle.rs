//! Application lifecycle and graceful shutdown.
//!
//! # Startup
//!
//! 1. Delay worker: promotes due scheduled notifications
//! 2. Dispatcher subscriber: delivers immediate notifications
//! 3. Live bridge subscriber: relays updates to WebSocket clients
//! 4. HTTP server: WebSocket upgrade and health endpoints
//!
//! # Shutdown
//!
//! On Ctrl+C or SIGTERM (or the future passed to [`Application::serve`]):
//! live connections are closed, the HTTP server stops, the shutdown signal
//! reaches every background task, and each task gets `SHUTDOWN_TIMEOUT` to
//! finish its current message.

use crate::backends::Backends;
use crate::config::Config;
use event_notify_core::environment::SystemClock;
use event_notify_runtime::metrics::MetricsServer;
use event_notify_runtime::{DelayWorker, Dispatcher, Subscriber};
use axum::Router;
use axum::routing::get;
use event_notify_web::{AppState, ConnectionRegistry, LiveBridge, router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

type TaskHandles = Vec<(&'static str, tokio::task::JoinHandle<()>)>;

/// Fully wired notification service.
pub struct Application {
    config: Arc<Config>,
    backends: Backends,
    registry: ConnectionRegistry,
    shutdown_tx: broadcast::Sender<()>,
}

impl Application {
    /// Wire the pipeline over connected backends.
    #[must_use]
    pub fn new(config: Config, backends: Backends) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config: Arc::new(config),
            backends,
            registry: ConnectionRegistry::new(),
            shutdown_tx,
        }
    }

    /// Registry of open live connections.
    #[must_use]
    pub const fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Bind the configured address and run until Ctrl+C or SIGTERM.
    ///
    /// Installs the Prometheus recorder and serves `/metrics` first when
    /// `METRICS_PORT` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a listener can not bind or the server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        if let Some(addr) = self.config.server.metrics_address() {
            let mut metrics = MetricsServer::new(addr);
            metrics.start()?;
            if let Some(handle) = metrics.handle().cloned() {
                let listener = TcpListener::bind(metrics.addr()).await?;
                info!(address = %metrics.addr(), "Metrics endpoint listening");
                tokio::spawn(async move {
                    if let Err(e) = axum::serve(listener, metrics_router(handle)).await {
                        warn!(error = %e, "Metrics endpoint stopped");
                    }
                });
            }
        }

        let address = self.config.server.bind_address();
        let listener = TcpListener::bind(&address).await?;
        info!(address = %address, "Live update server listening");

        self.serve(listener, shutdown_signal()).await
    }

    /// Run every component on `listener` until `shutdown` resolves.
    ///
    /// Background tasks are stopped and awaited even when the HTTP server
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handles = self.spawn_background();

        let state = AppState::new(self.registry.clone(), Arc::clone(&self.backends.delay_store));
        let registry = self.registry.clone();
        let served = axum::serve(listener, router(state))
            .with_graceful_shutdown(async move {
                shutdown.await;
                // Upgraded sockets are not tracked by the server; end them here.
                registry.close_all().await;
            })
            .await;

        match &served {
            Ok(()) => info!("HTTP server stopped, initiating graceful shutdown..."),
            Err(e) => warn!(error = %e, "HTTP server failed, initiating graceful shutdown..."),
        }
        self.stop_background(handles).await;
        info!("Graceful shutdown complete");

        served?;
        Ok(())
    }

    /// Signal shutdown and wait for every task; returns how many stopped
    /// gracefully.
    async fn stop_background(&self, handles: TaskHandles) -> usize {
        let _ = self.shutdown_tx.send(());
        self.await_shutdown(handles).await
    }

    fn spawn_background(&self) -> TaskHandles {
        let Backends {
            bus,
            delay_store,
            directory,
            delivery,
        } = self.backends.clone();
        let channels = &self.config.channels;

        let worker = DelayWorker::new(
            delay_store,
            Arc::clone(&bus),
            Arc::new(SystemClock),
            channels.notifications.clone(),
        )
        .with_poll_interval(self.config.worker.poll_interval);

        let dispatcher = Subscriber::new(
            "dispatcher",
            vec![channels.notifications.clone()],
            Arc::clone(&bus),
            Arc::new(Dispatcher::new(directory, delivery)),
            self.shutdown_tx.subscribe(),
        );

        let bridge = Subscriber::new(
            "live-bridge",
            vec![channels.live_updates.clone()],
            bus,
            Arc::new(LiveBridge::new(self.registry.clone())),
            self.shutdown_tx.subscribe(),
        );

        info!(
            notifications = %channels.notifications,
            live_updates = %channels.live_updates,
            poll_interval_secs = self.config.worker.poll_interval.as_secs(),
            "Starting pipeline tasks"
        );

        vec![
            ("delay-worker", worker.spawn(self.shutdown_tx.subscribe())),
            ("dispatcher", dispatcher.spawn()),
            ("live-bridge", bridge.spawn()),
        ]
    }

    async fn await_shutdown(&self, handles: TaskHandles) -> usize {
        let timeout = self.config.server.shutdown_timeout;
        let mut stopped = 0;

        for (task, handle) in handles {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => {
                    stopped += 1;
                    info!(task, "Task stopped gracefully");
                }
                Ok(Err(e)) => warn!(task, error = %e, "Task failed"),
                Err(_) => warn!(task, "Task shutdown timed out"),
            }
        }
        stopped
    }
}

/// Router exposing the Prometheus text rendering on `GET /metrics`.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
