//! In-memory delay store with sorted-set semantics.

use async_trait::async_trait;
use event_notify_core::delay_store::{DelayStore, DelayStoreError, DueEntry};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct SortedSet {
    /// (score, member), ordered by score then member
    ordered: BTreeSet<(i64, String)>,
    /// member → score
    scores: HashMap<String, i64>,
}

/// In-memory delay store.
///
/// Mirrors Redis sorted-set behavior: members are unique, inserting an
/// existing member replaces its score, and range reads are ordered by score
/// (ties broken by member).
#[derive(Debug, Clone, Default)]
pub struct InMemoryDelayStore {
    set: Arc<Mutex<SortedSet>>,
    failing: Arc<AtomicBool>,
}

impl InMemoryDelayStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail (or succeed again).
    pub fn set_failure(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of every entry, ascending by score.
    pub async fn entries(&self) -> Vec<DueEntry> {
        self.set
            .lock()
            .await
            .ordered
            .iter()
            .map(|(score, member)| DueEntry::new(member.clone(), *score))
            .collect()
    }

    fn check(&self, command: &'static str) -> Result<(), DelayStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DelayStoreError::CommandFailed {
                command,
                reason: "simulated outage".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DelayStore for InMemoryDelayStore {
    async fn insert(&self, member: &str, score: i64) -> Result<(), DelayStoreError> {
        self.check("ZADD")?;
        let mut set = self.set.lock().await;
        if let Some(previous) = set.scores.insert(member.to_string(), score) {
            set.ordered.remove(&(previous, member.to_string()));
        }
        set.ordered.insert((score, member.to_string()));
        Ok(())
    }

    async fn due(&self, now_ms: i64) -> Result<Vec<DueEntry>, DelayStoreError> {
        self.check("ZRANGEBYSCORE")?;
        let set = self.set.lock().await;
        Ok(set
            .ordered
            .iter()
            .take_while(|(score, _)| *score <= now_ms)
            .map(|(score, member)| DueEntry::new(member.clone(), *score))
            .collect())
    }

    async fn reschedule(
        &self,
        member: &str,
        expected_score: i64,
        new_score: i64,
    ) -> Result<bool, DelayStoreError> {
        self.check("EVALSHA")?;
        let mut guard = self.set.lock().await;
        let set = &mut *guard;
        match set.scores.get_mut(member) {
            Some(score) if *score == expected_score => {
                *score = new_score;
                set.ordered.remove(&(expected_score, member.to_string()));
                set.ordered.insert((new_score, member.to_string()));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, member: &str) -> Result<bool, DelayStoreError> {
        self.check("ZREM")?;
        let mut set = self.set.lock().await;
        match set.scores.remove(member) {
            Some(score) => {
                set.ordered.remove(&(score, member.to_string()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn len(&self) -> Result<usize, DelayStoreError> {
        self.check("ZCARD")?;
        Ok(self.set.lock().await.scores.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;

    #[tokio::test]
    async fn due_is_inclusive_and_ordered() {
        let store = InMemoryDelayStore::new();
        store.insert("late", 300).await.unwrap();
        store.insert("early", 100).await.unwrap();
        store.insert("edge", 200).await.unwrap();

        let due = store.due(200).await.unwrap();
        assert_eq!(
            due,
            vec![DueEntry::new("early", 100), DueEntry::new("edge", 200)]
        );
    }

    #[tokio::test]
    async fn reinserting_a_member_replaces_its_score() {
        let store = InMemoryDelayStore::new();
        store.insert("m", 100).await.unwrap();
        store.insert("m", 500).await.unwrap();

        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.due(100).await.unwrap().is_empty());
        assert_eq!(store.due(500).await.unwrap(), vec![DueEntry::new("m", 500)]);
    }

    #[tokio::test]
    async fn remove_claims_exactly_once() {
        let store = InMemoryDelayStore::new();
        store.insert("m", 1).await.unwrap();

        assert!(store.remove("m").await.unwrap());
        assert!(!store.remove("m").await.unwrap());
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reschedule_only_moves_the_expected_score() {
        let store = InMemoryDelayStore::new();
        store.insert("m", 10).await.unwrap();

        assert!(!store.reschedule("m", 11, 99).await.unwrap());
        assert!(store.reschedule("m", 10, 99).await.unwrap());
        assert!(!store.reschedule("m", 10, 99).await.unwrap());
        assert_eq!(store.entries().await, vec![DueEntry::new("m", 99)]);

        assert!(!store.reschedule("absent", 0, 1).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let store = InMemoryDelayStore::new();
        store.insert("m", 1).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.reschedule("m", 1, 1_000).await.unwrap() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn simulated_outage() {
        let store = InMemoryDelayStore::new();
        store.set_failure(true);
        assert!(matches!(
            store.insert("m", 1).await,
            Err(DelayStoreError::CommandFailed { command: "ZADD", .. })
        ));
        store.set_failure(false);
        assert!(store.entries().await.is_empty());
    }
}
