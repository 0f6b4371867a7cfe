//! Reference delivery channel.

use async_trait::async_trait;
use event_notify_core::delivery::{DeliveryChannel, DeliveryError};
use event_notify_core::message::{NotificationMessage, UserPreferenceRecord};
use tracing::info;

/// Delivery channel that only writes a log line per recipient.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDelivery;

#[async_trait]
impl DeliveryChannel for LogDelivery {
    async fn deliver(
        &self,
        user: &UserPreferenceRecord,
        message: &NotificationMessage,
    ) -> Result<(), DeliveryError> {
        info!(
            email = %user.email,
            event_id = message.event_id,
            title = %message.title,
            "Sending notification to user: {}",
            user.email
        );
        Ok(())
    }
}
