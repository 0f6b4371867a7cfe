//! Time-ordered store for deferred notifications.
//!
//! The store behaves like a sorted set: each member is a serialized
//! [`ScheduledEntry`](crate::message::ScheduledEntry) and its score is the due
//! instant in epoch milliseconds.
//!
//! # Algorithm
//!
//! Promotion is a poll-lease-remove loop:
//! 1. `due(now)` lists every member with score ≤ now (ZRANGEBYSCORE)
//! 2. `reschedule(member, score, now + lease)` claims one member by pushing
//!    its score past the lease; only the caller whose compare-and-set
//!    succeeded may publish it
//! 3. After publishing, `remove(member)` deletes it; if publishing fails the
//!    caller moves the score back with `reschedule`
//!
//! A caller that dies between claim and remove leaves the member in the
//! store, so it becomes due again once the lease runs out. Delivery is at
//! least once.
//!
//! Removal is by exact value. Two schedules of byte-identical members collapse
//! into one entry (the later score wins), matching sorted-set semantics.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during delay store operations.
#[derive(Error, Debug, Clone)]
pub enum DelayStoreError {
    /// Failed to reach the backing store
    #[error("Delay store connection failed: {0}")]
    ConnectionFailed(String),

    /// A command against the store failed
    #[error("Delay store command '{command}' failed: {reason}")]
    CommandFailed {
        /// Command that failed (e.g. "ZADD")
        command: &'static str,
        /// The reason for failure
        reason: String,
    },
}

/// A member whose due instant has passed, with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueEntry {
    /// Serialized entry, exactly as stored
    pub member: String,
    /// Due instant in epoch milliseconds
    pub score: i64,
}

impl DueEntry {
    /// Create a due entry.
    #[must_use]
    pub fn new(member: impl Into<String>, score: i64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }
}

/// Sorted store of scheduled notifications.
///
/// Shared by the scheduler (writer) and the delay worker (reader and writer).
///
/// # Example
///
/// ```rust,ignore
/// store.insert(&entry.member()?, entry.score()).await?;
///
/// for due in store.due(now_ms).await? {
///     if store.reschedule(&due.member, due.score, now_ms + lease_ms).await? {
///         // this caller owns the entry until the lease runs out
///         publish(&due).await?;
///         store.remove(&due.member).await?;
///     }
/// }
/// ```
#[async_trait]
pub trait DelayStore: Send + Sync {
    /// Insert `member` with `score`, replacing the score if already present.
    ///
    /// # Errors
    ///
    /// Returns [`DelayStoreError`] if the store is unreachable.
    async fn insert(&self, member: &str, score: i64) -> Result<(), DelayStoreError>;

    /// All members with score ≤ `now_ms`, ascending by score.
    ///
    /// # Errors
    ///
    /// Returns [`DelayStoreError`] if the store is unreachable.
    async fn due(&self, now_ms: i64) -> Result<Vec<DueEntry>, DelayStoreError>;

    /// Atomically move `member` to `new_score` if its score is still
    /// `expected_score`.
    ///
    /// Returns `true` only for the call that changed it, so it serves as a
    /// claim when several workers race on the same entry. Absent members
    /// are never inserted.
    ///
    /// # Errors
    ///
    /// Returns [`DelayStoreError`] if the store is unreachable.
    async fn reschedule(
        &self,
        member: &str,
        expected_score: i64,
        new_score: i64,
    ) -> Result<bool, DelayStoreError>;

    /// Remove exactly `member`.
    ///
    /// Returns `true` only for the call that actually removed it.
    ///
    /// # Errors
    ///
    /// Returns [`DelayStoreError`] if the store is unreachable.
    async fn remove(&self, member: &str) -> Result<bool, DelayStoreError>;

    /// Number of pending entries.
    ///
    /// # Errors
    ///
    /// Returns [`DelayStoreError`] if the store is unreachable.
    async fn len(&self) -> Result<usize, DelayStoreError>;
}
