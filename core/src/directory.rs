//! User directory collaborator.
//!
//! The user records themselves live in the events API database; the
//! dispatcher only needs a read-only projection of email and preferences.

use crate::message::{Categories, UserPreferenceRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while querying the user directory.
#[derive(Error, Debug, Clone)]
pub enum DirectoryError {
    /// Failed to reach the directory backend
    #[error("User directory unavailable: {0}")]
    Unavailable(String),

    /// The query ran but returned data that could not be interpreted
    #[error("User directory query failed: {0}")]
    QueryFailed(String),
}

/// Lookup of users by preference.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Every user whose preference set shares at least one tag with
    /// `categories`.
    ///
    /// An empty result is normal and not an error.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the directory cannot be queried.
    async fn find_interested(
        &self,
        categories: &Categories,
    ) -> Result<Vec<UserPreferenceRecord>, DirectoryError>;
}
