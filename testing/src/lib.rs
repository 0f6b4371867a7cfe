//! # Event Notify Testing
//!
//! In-memory fakes and test helpers for the event notification pipeline.
//!
//! This crate provides:
//! - [`InMemoryMessageBus`]: broadcast-channel bus with a publish history
//! - [`InMemoryDelayStore`]: ordered in-memory sorted set
//! - [`InMemoryUserDirectory`]: preference lookup over a fixed user list
//! - [`RecordingDelivery`]: delivery channel that records every delivery
//! - [`FixedClock`] / [`ManualClock`]: deterministic time
//!
//! The in-memory bus and store are also complete enough to run the server in
//! single-process mode without Redis.
//!
//! ## Example
//!
//! ```ignore
//! use event_notify_testing::{InMemoryDelayStore, ManualClock, test_clock};
//!
//! #[tokio::test]
//! async fn test_promotion() {
//!     let clock = ManualClock::new(test_clock().now());
//!     let store = InMemoryDelayStore::new();
//!     // ... schedule, advance the clock, run a worker tick
//! }
//! ```

use chrono::{DateTime, Utc};
use event_notify_core::environment::Clock;

pub mod bus;
pub mod delay_store;
pub mod delivery;
pub mod directory;

pub use bus::InMemoryMessageBus;
pub use delay_store::InMemoryDelayStore;
pub use delivery::RecordingDelivery;
pub use directory::InMemoryUserDirectory;

/// Deterministic clocks.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use event_notify_testing::mocks::FixedClock;
    /// use event_notify_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same instant, so a test can hold one handle and hand
    /// another to the component under test.
    ///
    /// ```
    /// use event_notify_testing::mocks::ManualClock;
    /// use event_notify_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = ManualClock::new(Utc::now());
    /// let start = clock.now();
    /// clock.advance(Duration::seconds(61));
    /// assert_eq!(clock.now() - start, Duration::seconds(61));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a manual clock starting at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward by `delta`.
        pub fn advance(&self, delta: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += delta;
        }

        /// Jump the clock to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use std::future::Future;
    use std::time::Duration;

    /// Install a `tracing` subscriber for test output.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    }

    /// Poll `condition` until it returns `true` or `timeout` elapses.
    ///
    /// Returns whether the condition was met.
    pub async fn eventually<F, Fut>(timeout: Duration, mut condition: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if condition().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
