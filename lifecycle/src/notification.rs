//! Contract with the notification collaborator.
//!
//! Delivery (email, push) and message templating live outside the engine.
//! The engine hands over a [`TicketNotice`] after a confirmation has been
//! persisted and never rolls a registration back because delivery failed.

use crate::types::{TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`Notifier::notify`].
pub type NotifyFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(), NotificationError>> + Send + 'a>>;

/// Confirmation sent to a participant once their ticket exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketNotice {
    /// Participant
    pub recipient: UserId,
    /// Event display name
    pub event_name: String,
    /// Issued ticket
    pub ticket_id: TicketId,
    /// Token to render as QR code
    pub qr_token: String,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
}

/// Delivery failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The collaborator refused or failed the delivery
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    /// No answer within the configured timeout
    #[error("notification timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Sends ticket confirmations.
pub trait Notifier: Send + Sync {
    /// Deliver one notice.
    fn notify(&self, notice: TicketNotice) -> NotifyFuture<'_>;
}

/// Writes each notice to the log. Stands in for a mail service in the demo.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: TicketNotice) -> NotifyFuture<'_> {
        Box::pin(async move {
            tracing::info!(
                recipient = %notice.recipient,
                event = %notice.event_name,
                ticket_id = %notice.ticket_id,
                event_date = %notice.event_date,
                "Ticket confirmation sent"
            );
            Ok(())
        })
    }
}
