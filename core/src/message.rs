//! Notification payloads and their wire encodings.
//!
//! # Wire Formats
//!
//! **Immediate notification** (bus payload on the notification channel):
//! ```json
//! { "eventId": 1, "title": "Test Event", "categories": ["Music"] }
//! ```
//!
//! **Scheduled entry** (delay store member, scored by the due instant in
//! epoch milliseconds):
//! ```json
//! { "eventId": 2, "notification": { "title": "Delayed Event", "categories": ["Art"] } }
//! ```
//!
//! Producers that predate the set representation send `"categories": "Music"`;
//! a single string is accepted everywhere and normalized to a one-tag set.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Errors raised while encoding or decoding notification payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The payload is not valid JSON for the expected shape
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// The payload could not be serialized
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// A score does not map to a representable instant
    #[error("Invalid due instant: {0}")]
    InvalidInstant(i64),
}

/// Explicit set of category tags.
///
/// Tags are trimmed and empty tags dropped. The set is ordered so that two
/// equal sets always serialize to the same bytes, which matters for the delay
/// store where removal is by exact member value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CategoriesRepr")]
pub struct Categories(BTreeSet<String>);

/// Accepted input shapes for [`Categories`].
#[derive(Deserialize)]
#[serde(untagged)]
enum CategoriesRepr {
    One(String),
    Many(Vec<String>),
}

impl TryFrom<CategoriesRepr> for Categories {
    type Error = CodecError;

    fn try_from(repr: CategoriesRepr) -> Result<Self, Self::Error> {
        let categories: Self = match repr {
            CategoriesRepr::One(tag) => std::iter::once(tag).collect(),
            CategoriesRepr::Many(tags) => tags.into_iter().collect(),
        };

        if categories.is_empty() {
            return Err(CodecError::Malformed(
                "at least one category is required".to_string(),
            ));
        }

        Ok(categories)
    }
}

impl Categories {
    /// Singleton set holding one tag.
    #[must_use]
    pub fn single(tag: impl Into<String>) -> Self {
        std::iter::once(tag.into()).collect()
    }

    /// `true` when the two sets share at least one tag.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        // Walk the smaller set
        let (small, large) = if self.0.len() <= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        small.iter().any(|tag| large.contains(tag))
    }

    /// `true` when `tag` is in the set (exact match).
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Number of tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `true` when the set holds no tags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the tags in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Tags as an owned vector, sorted.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Categories {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|tag| tag.into().trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
        )
    }
}

impl fmt::Display for Categories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", tags.join(", "))
    }
}

/// Title and categories of a notification, without the event reference.
///
/// This is the `notification` object nested inside a scheduled entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationBody {
    /// Human-readable title of the event
    pub title: String,
    /// Category tags used to match interested users
    pub categories: Categories,
}

impl NotificationBody {
    /// Create a notification body.
    #[must_use]
    pub fn new(title: impl Into<String>, categories: Categories) -> Self {
        Self {
            title: title.into(),
            categories,
        }
    }

    /// Attach the event reference, producing a dispatchable message.
    #[must_use]
    pub fn into_message(self, event_id: i64) -> NotificationMessage {
        NotificationMessage {
            event_id: Some(event_id),
            title: self.title,
            categories: self.categories,
        }
    }
}

/// A notification ready to be dispatched to interested users.
///
/// Only `categories` is needed for matching. Producers may omit `eventId`
/// (promotions from older schedulers) or `title` (bare direct publishes);
/// both shapes are still dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    /// Identifier of the announced event (owned by the events API)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
    /// Human-readable title of the event
    #[serde(default)]
    pub title: String,
    /// Category tags used to match interested users
    pub categories: Categories,
}

impl NotificationMessage {
    /// Create a notification message.
    #[must_use]
    pub fn new(event_id: i64, title: impl Into<String>, categories: Categories) -> Self {
        Self {
            event_id: Some(event_id),
            title: title.into(),
            categories,
        }
    }

    /// Parse a bus payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] if the payload is not a valid message.
    pub fn from_json(payload: &str) -> Result<Self, CodecError> {
        serde_json::from_str(payload).map_err(|e| CodecError::Malformed(e.to_string()))
    }

    /// Encode as a bus payload.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn to_json(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Split off the body (title and categories).
    #[must_use]
    pub fn body(&self) -> NotificationBody {
        NotificationBody::new(self.title.clone(), self.categories.clone())
    }
}

/// Delay store member encoding (the due instant travels as the score).
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduledMember {
    event_id: i64,
    notification: NotificationBody,
}

/// A notification deferred until `due_at`.
///
/// # Lifecycle
///
/// ```text
/// Scheduled ──(due, leased by worker)──► Promoted + Removed
///     ▲                         │
///     └──(lease runs out)───────┘
/// ```
///
/// A lease left by a dead worker puts the entry back in the due set. There
/// is no cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEntry {
    /// Identifier of the announced event
    pub event_id: i64,
    /// Notification to publish when due
    pub notification: NotificationBody,
    /// Instant at or after which the notification fires
    pub due_at: DateTime<Utc>,
}

impl ScheduledEntry {
    /// Create a scheduled entry.
    #[must_use]
    pub const fn new(event_id: i64, notification: NotificationBody, due_at: DateTime<Utc>) -> Self {
        Self {
            event_id,
            notification,
            due_at,
        }
    }

    /// Sort score: the due instant in epoch milliseconds.
    #[must_use]
    pub fn score(&self) -> i64 {
        self.due_at.timestamp_millis()
    }

    /// Serialized member value stored in the delay store.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn member(&self) -> Result<String, CodecError> {
        let member = ScheduledMember {
            event_id: self.event_id,
            notification: self.notification.clone(),
        };
        serde_json::to_string(&member).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Rebuild an entry from a stored member and its score.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] for an undecodable member and
    /// [`CodecError::InvalidInstant`] for an out-of-range score.
    pub fn from_member(member: &str, score: i64) -> Result<Self, CodecError> {
        let decoded: ScheduledMember =
            serde_json::from_str(member).map_err(|e| CodecError::Malformed(e.to_string()))?;
        let due_at = Utc
            .timestamp_millis_opt(score)
            .single()
            .ok_or(CodecError::InvalidInstant(score))?;

        Ok(Self::new(decoded.event_id, decoded.notification, due_at))
    }

    /// The message to publish on promotion.
    #[must_use]
    pub fn into_message(self) -> NotificationMessage {
        self.notification.into_message(self.event_id)
    }
}

/// Read-only projection of a user, as needed for matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferenceRecord {
    /// Delivery address
    pub email: String,
    /// Category tags the user wants to hear about
    pub preferences: Categories,
}

impl UserPreferenceRecord {
    /// Create a user preference record.
    #[must_use]
    pub fn new(email: impl Into<String>, preferences: Categories) -> Self {
        Self {
            email: email.into(),
            preferences,
        }
    }

    /// `true` when the user prefers at least one of `categories`.
    #[must_use]
    pub fn is_interested_in(&self, categories: &Categories) -> bool {
        self.preferences.intersects(categories)
    }
}
