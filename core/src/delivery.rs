//! Delivery channel extension point.
//!
//! The dispatcher calls [`DeliveryChannel::deliver`] once per matched user.
//! The reference channel only logs; email or SMS integrations plug in here.

use crate::message::{NotificationMessage, UserPreferenceRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while delivering to one user.
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    /// The recipient address was rejected
    #[error("Recipient rejected: {0}")]
    Rejected(String),

    /// The delivery transport failed
    #[error("Delivery transport failed: {0}")]
    TransportFailed(String),
}

/// Delivers one notification to one user.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Deliver `message` to `user`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if this delivery failed. The dispatcher logs
    /// it and moves on to the next user.
    async fn deliver(
        &self,
        user: &UserPreferenceRecord,
        message: &NotificationMessage,
    ) -> Result<(), DeliveryError>;
}
