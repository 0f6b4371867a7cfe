//! Matching of published notifications to interested users.

use crate::metrics::DispatchMetrics;
use crate::subscriber::{HandlerError, MessageHandler};
use async_trait::async_trait;
use event_notify_core::bus::BusMessage;
use event_notify_core::delivery::DeliveryChannel;
use event_notify_core::directory::{DirectoryError, UserDirectory};
use event_notify_core::message::{CodecError, NotificationMessage};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that stop one notification from being dispatched.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    /// The bus payload is not a notification
    #[error(transparent)]
    Malformed(#[from] CodecError),

    /// The user directory could not be queried
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Outcome of dispatching one notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Users whose preferences intersect the categories
    pub matched: usize,
    /// Successful deliveries
    pub delivered: usize,
    /// Failed deliveries
    pub failed: usize,
}

/// Delivers each notification to every user whose preferences share a tag
/// with its categories.
///
/// Zero matches is a normal outcome. A failed delivery is logged and the
/// remaining users are still served.
pub struct Dispatcher {
    directory: Arc<dyn UserDirectory>,
    delivery: Arc<dyn DeliveryChannel>,
}

impl Dispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>, delivery: Arc<dyn DeliveryChannel>) -> Self {
        Self {
            directory,
            delivery,
        }
    }

    /// Parse a bus payload and dispatch it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Malformed`] for an undecodable payload and
    /// [`DispatchError::Directory`] if the user lookup fails.
    pub async fn dispatch_payload(&self, payload: &str) -> Result<DispatchReport, DispatchError> {
        let message = NotificationMessage::from_json(payload)?;
        self.dispatch(&message).await
    }

    /// Dispatch one notification.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Directory`] if the user lookup fails.
    pub async fn dispatch(&self, message: &NotificationMessage) -> Result<DispatchReport, DispatchError> {
        info!(
            event_id = message.event_id,
            title = %message.title,
            categories = %message.categories,
            "Received notification"
        );

        let users = self.directory.find_interested(&message.categories).await?;

        let mut report = DispatchReport::default();
        // The directory query is a coarse filter; matching is decided here
        for user in users.iter().filter(|u| u.is_interested_in(&message.categories)) {
            report.matched += 1;
            match self.delivery.deliver(user, message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        event_id = message.event_id,
                        email = %user.email,
                        error = %e,
                        "Delivery failed"
                    );
                }
            }
        }

        if report.matched == 0 {
            debug!(event_id = message.event_id, "No interested users");
        }

        DispatchMetrics::record_dispatch(report.delivered, report.failed);
        Ok(report)
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn handle(&self, message: &BusMessage) -> Result<(), HandlerError> {
        self.dispatch_payload(&message.payload).await?;
        Ok(())
    }
}
