//! Promotion of due scheduled notifications onto the bus.
//!
//! # Algorithm
//!
//! Every `poll_interval` the worker runs one tick:
//! 1. List entries due at the clock's current instant
//! 2. Claim each one by moving its score to `now + claim_lease`; a `false`
//!    means another worker got it
//! 3. Publish the decoded notification on the notification channel
//! 4. Remove the member, or move it back to its original score if
//!    publishing failed
//!
//! A worker that dies after claiming leaves the member leased, and it is
//! promoted again once the lease runs out. A member that cannot be decoded
//! is dropped from the store and logged. A failure on one entry never stops
//! the remaining entries of the tick.

use crate::metrics::WorkerMetrics;
use event_notify_core::bus::MessageBus;
use event_notify_core::delay_store::{DelayStore, DelayStoreError, DueEntry};
use event_notify_core::environment::Clock;
use event_notify_core::message::ScheduledEntry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// How long a claimed entry stays hidden from other workers by default.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(30);

/// Outcome of one worker tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Entries the due query returned
    pub due: usize,
    /// Entries claimed and published
    pub promoted: usize,
    /// Entries another worker claimed first
    pub skipped: usize,
    /// Entries that failed (malformed, or publish failed and were re-queued)
    pub failed: usize,
}

enum Outcome {
    Promoted,
    Skipped,
    Failed,
}

/// Periodic promoter of due notifications.
pub struct DelayWorker {
    store: Arc<dyn DelayStore>,
    bus: Arc<dyn MessageBus>,
    clock: Arc<dyn Clock>,
    channel: String,
    poll_interval: Duration,
    claim_lease: Duration,
}

impl DelayWorker {
    /// Create a worker publishing due entries on `channel`.
    ///
    /// The poll interval defaults to 60 seconds and the claim lease to
    /// [`DEFAULT_CLAIM_LEASE`].
    #[must_use]
    pub fn new(
        store: Arc<dyn DelayStore>,
        bus: Arc<dyn MessageBus>,
        clock: Arc<dyn Clock>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            channel: channel.into(),
            poll_interval: Duration::from_secs(60),
            claim_lease: DEFAULT_CLAIM_LEASE,
        }
    }

    /// Set the interval between ticks.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how long a claimed entry is hidden before it counts as abandoned.
    ///
    /// Should exceed the time one publish can take, or a slow worker's entry
    /// may be promoted twice.
    #[must_use]
    pub const fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    /// Spawn the worker loop as a background task.
    #[must_use]
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(shutdown).await;
        })
    }

    /// Tick every `poll_interval` until shutdown.
    ///
    /// The first tick runs immediately.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            channel = %self.channel,
            interval = ?self.poll_interval,
            "Delay worker started"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Delay worker received shutdown signal");
                    break;
                }
                _ = interval.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.due > 0 => {
                            info!(
                                due = report.due,
                                promoted = report.promoted,
                                skipped = report.skipped,
                                failed = report.failed,
                                "Delay worker tick"
                            );
                        }
                        Ok(_) => debug!("Delay worker tick: nothing due"),
                        Err(e) => error!(error = %e, "Error processing scheduled notifications"),
                    }
                }
            }
        }

        info!("Delay worker stopped");
    }

    /// Run a single promotion pass at the clock's current instant.
    ///
    /// # Errors
    ///
    /// Returns [`DelayStoreError`] only if the due query itself fails; errors
    /// on individual entries are counted in the report.
    pub async fn run_once(&self) -> Result<TickReport, DelayStoreError> {
        let now_ms = self.clock.now().timestamp_millis();
        let due = self.store.due(now_ms).await?;

        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };

        let lease_ms = i64::try_from(self.claim_lease.as_millis()).unwrap_or(i64::MAX);
        let lease_until = now_ms.saturating_add(lease_ms);

        for entry in due {
            match self.promote(entry, lease_until).await {
                Outcome::Promoted => report.promoted += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Failed => report.failed += 1,
            }
        }

        WorkerMetrics::record_tick(report.promoted, report.failed);
        Ok(report)
    }

    async fn promote(&self, entry: DueEntry, lease_until: i64) -> Outcome {
        match self.store.reschedule(&entry.member, entry.score, lease_until).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(member = %entry.member, "Entry already claimed by another worker");
                return Outcome::Skipped;
            }
            Err(e) => {
                error!(member = %entry.member, error = %e, "Failed to claim scheduled entry");
                return Outcome::Failed;
            }
        }

        let payload = match ScheduledEntry::from_member(&entry.member, entry.score)
            .map(ScheduledEntry::into_message)
            .and_then(|message| message.to_json())
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!(member = %entry.member, error = %e, "Dropping malformed scheduled entry");
                self.release(&entry.member).await;
                return Outcome::Failed;
            }
        };

        match self.bus.publish(&self.channel, &payload).await {
            Ok(()) => {
                debug!(channel = %self.channel, payload = %payload, "Promoted scheduled notification");
                self.release(&entry.member).await;
                Outcome::Promoted
            }
            Err(e) => {
                error!(member = %entry.member, error = %e, "Failed to publish due notification, re-queueing");
                match self.store.reschedule(&entry.member, lease_until, entry.score).await {
                    Ok(true) => {}
                    Ok(false) => warn!(member = %entry.member, "Claim lapsed before re-queueing"),
                    Err(e) => {
                        error!(member = %entry.member, error = %e, "Failed to re-queue scheduled entry; it retries after the lease");
                    }
                }
                Outcome::Failed
            }
        }
    }

    /// Delete a claimed member. On failure the lease still expires, so the
    /// entry is promoted again rather than lost.
    async fn release(&self, member: &str) {
        if let Err(e) = self.store.remove(member).await {
            error!(member = %member, error = %e, "Failed to remove claimed entry; it retries after the lease");
        }
    }
}
