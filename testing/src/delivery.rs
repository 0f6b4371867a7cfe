//! Delivery channel that records instead of sending.

use async_trait::async_trait;
use event_notify_core::delivery::{DeliveryChannel, DeliveryError};
use event_notify_core::message::{NotificationMessage, UserPreferenceRecord};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Records every delivery as `(email, message)`.
///
/// Addresses registered with [`RecordingDelivery::fail_for`] are rejected, so
/// tests can check that one failed recipient does not stop the others.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelivery {
    delivered: Arc<Mutex<Vec<(String, NotificationMessage)>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingDelivery {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject future deliveries to `email`.
    pub fn fail_for(&self, email: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(email.into());
    }

    /// Every successful delivery, in order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<(String, NotificationMessage)> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Emails delivered to, in order.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        self.deliveries().into_iter().map(|(email, _)| email).collect()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingDelivery {
    async fn deliver(
        &self,
        user: &UserPreferenceRecord,
        message: &NotificationMessage,
    ) -> Result<(), DeliveryError> {
        let rejected = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&user.email);
        if rejected {
            return Err(DeliveryError::Rejected(user.email.clone()));
        }

        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((user.email.clone(), message.clone()));
        Ok(())
    }
}
