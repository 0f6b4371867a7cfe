//! In-memory user directory.

use async_trait::async_trait;
use event_notify_core::directory::{DirectoryError, UserDirectory};
use event_notify_core::message::{Categories, UserPreferenceRecord};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// User directory over a fixed list of users.
///
/// Users are returned in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<Vec<UserPreferenceRecord>>>,
    failing: Arc<AtomicBool>,
    queries: Arc<AtomicUsize>,
}

impl InMemoryUserDirectory {
    /// Create a directory holding `users`.
    #[must_use]
    pub fn new(users: Vec<UserPreferenceRecord>) -> Self {
        Self {
            users: Arc::new(RwLock::new(users)),
            ..Self::default()
        }
    }

    /// Add a user with the given preference tags.
    pub fn add_user<I, S>(&self, email: &str, preferences: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(UserPreferenceRecord::new(email, preferences.into_iter().collect()));
    }

    /// Make lookups fail (or succeed again).
    pub fn set_failure(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of lookups served so far, including failed ones.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_interested(
        &self,
        categories: &Categories,
    ) -> Result<Vec<UserPreferenceRecord>, DirectoryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("simulated outage".to_string()));
        }

        Ok(self
            .users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|user| user.is_interested_in(categories))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;

    #[tokio::test]
    async fn filters_by_intersection() {
        let directory = InMemoryUserDirectory::default();
        directory.add_user("a@x.com", ["Music", "Art"]);
        directory.add_user("b@x.com", ["Sports"]);
        directory.add_user("c@x.com", Vec::<String>::new());

        let found = directory
            .find_interested(&["Art", "Food"].into_iter().collect())
            .await
            .unwrap();

        let emails: Vec<_> = found.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x.com"]);
        assert_eq!(directory.query_count(), 1);
    }
}
