//! Venue check-in.
//!
//! The scanner presents a token and its own identity. The token's tag is
//! checked offline first; only a well-formed token costs a storage lookup.
//! The lookup and the check-in run under the registration's lock, so the
//! same ticket is admitted at most once however many scanners race.

use crate::app::LifecycleEngine;
use crate::error::{LifecycleError, Result};
use crate::metrics;
use crate::types::{Actor, EventId, RegistrationId, TicketId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Proof of a successful check-in, shown to the scanning organizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInReceipt {
    /// Ticket scanned
    pub ticket_id: TicketId,
    /// Registration checked in
    pub registration_id: RegistrationId,
    /// Event
    pub event_id: EventId,
    /// Admitted participant
    pub participant_id: UserId,
    /// When
    pub checked_in_at: DateTime<Utc>,
}

/// Verifies presented tickets against the registration lifecycle.
#[derive(Clone, Debug)]
pub struct VerificationService {
    engine: Arc<LifecycleEngine>,
}

impl VerificationService {
    /// Create a service over `engine`.
    #[must_use]
    pub const fn new(engine: Arc<LifecycleEngine>) -> Self {
        Self { engine }
    }

    /// Verify `token` and check its holder in.
    ///
    /// # Errors
    ///
    /// - `MalformedToken` when the token does not decode or its tag is wrong
    /// - `TicketInvalid` for an unknown or voided ticket, or a cancelled or
    ///   unconfirmed registration
    /// - `TicketAlreadyUsed` on a second scan
    /// - `Unauthorized` when `scanner` does not manage the event
    /// - `InvalidStateTransition` once the event is completed or cancelled
    pub async fn verify(&self, token: &str, scanner: Actor) -> Result<CheckInReceipt> {
        let outcome = self.admit(token, scanner).await;
        metrics::record_check_in(outcome_label(&outcome));

        match &outcome {
            Ok(receipt) => tracing::info!(
                ticket_id = %receipt.ticket_id,
                registration_id = %receipt.registration_id,
                scanner = %scanner.user_id,
                "Ticket admitted"
            ),
            Err(error) => tracing::info!(scanner = %scanner.user_id, %error, "Ticket refused"),
        }
        outcome
    }

    async fn admit(&self, token: &str, scanner: Actor) -> Result<CheckInReceipt> {
        let claims = self.engine.codec().decode(token)?;
        let registration = self.engine.check_in(claims, scanner).await?;

        Ok(CheckInReceipt {
            ticket_id: claims.ticket_id,
            registration_id: registration.id,
            event_id: registration.event_id,
            participant_id: registration.participant_id,
            checked_in_at: registration.checked_in_at.unwrap_or(registration.updated_at),
        })
    }
}

fn outcome_label(outcome: &Result<CheckInReceipt>) -> &'static str {
    match outcome {
        Ok(_) => "admitted",
        Err(LifecycleError::TicketAlreadyUsed { .. }) => "already_used",
        Err(LifecycleError::MalformedToken) => "malformed",
        Err(LifecycleError::Unauthorized(_)) => "unauthorized",
        Err(_) => "invalid",
    }
}
