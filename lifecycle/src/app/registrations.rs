//! Registration operations.

use super::LifecycleEngine;
use crate::aggregates::{RegistrationAction, RegistrationState};
use crate::error::{LifecycleError, Result};
use crate::metrics;
use crate::persistence::{RegistrationWrite, RepositoryError, ReservationRequest};
use crate::ticket_codec::TicketClaims;
use crate::types::{Actor, EventId, MerchSelection, Registration, RegistrationId, TicketId};
use campus_core::reducer::Reducer;
use campus_core::version::{Version, Versioned};

pub(super) fn record_confirmation(registration: &Registration) {
    metrics::record_ticket_issued();
    tracing::info!(
        registration_id = %registration.id,
        ticket_id = ?registration.ticket_id,
        "Registration confirmed, ticket issued"
    );
}

impl LifecycleEngine {
    /// Register `actor` for an event.
    ///
    /// The slot is reserved and the registration inserted in one atomic
    /// storage step, which re-checks the window at that moment. A
    /// registration that owes nothing is confirmed straight away and its
    /// ticket issued; otherwise it stays pending until a payment proof is
    /// approved.
    ///
    /// # Errors
    ///
    /// - `WindowClosed` when the event is not published or outside its window
    /// - `CapacityExceeded` when every slot is taken
    /// - `DuplicateRegistration` when the participant already holds one
    /// - `OutOfStock` or `Validation` for the merchandise selection
    /// - `Unauthorized` for organizers and admins
    pub async fn register(
        &self,
        actor: Actor,
        event_id: EventId,
        merchandise: Vec<MerchSelection>,
    ) -> Result<Registration> {
        let event = self.persistence.load_event(event_id).await?.record;
        let mut state = RegistrationState::for_event(event);
        self.registration_reducer.reduce(
            &mut state,
            RegistrationAction::Register {
                registration_id: RegistrationId::new(),
                actor,
                merchandise,
            },
            &self.registration_env,
        );
        let registration = state.outcome()?.clone();

        self.ledger
            .reserve(ReservationRequest {
                registration: registration.clone(),
                now: self.clock.now(),
            })
            .await?;
        metrics::record_registration(registration.status.label());
        tracing::info!(
            registration_id = %registration.id,
            %event_id,
            participant_id = %registration.participant_id,
            payment_required = registration.payment.is_required(),
            "Registration created"
        );

        if registration.payment.is_required() {
            return Ok(registration);
        }

        let _guard = self.registration_locks.lock(registration.id).await;
        self.retrying(|| self.confirm_locked(registration.id, None))
            .await
    }

    /// Confirm a pending registration whose payment gate is open.
    ///
    /// # Errors
    ///
    /// `PaymentNotApproved`, `InvalidStateTransition` unless pending or once
    /// the event is frozen, `Unauthorized` for anyone but the event's
    /// organizer or an admin.
    pub async fn confirm_registration(
        &self,
        actor: Actor,
        registration_id: RegistrationId,
    ) -> Result<Registration> {
        let _guard = self.registration_locks.lock(registration_id).await;
        self.retrying(|| self.confirm_locked(registration_id, Some(actor)))
            .await
    }

    /// Cancel a pending or confirmed registration, void its ticket and
    /// release its slot.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` once checked in or cancelled, or once the
    /// event is completed or cancelled; `Unauthorized` for anyone but the
    /// participant, the event's organizer or an admin.
    pub async fn cancel_registration(
        &self,
        actor: Actor,
        registration_id: RegistrationId,
        reason: impl Into<String>,
    ) -> Result<Registration> {
        let reason = reason.into();
        let _guard = self.registration_locks.lock(registration_id).await;

        let registration = self
            .retrying(|| async {
                let (mut state, version) = self.load_registration_state(registration_id).await?;
                self.registration_reducer.reduce(
                    &mut state,
                    RegistrationAction::Cancel {
                        actor,
                        reason: reason.clone(),
                    },
                    &self.registration_env,
                );
                self.commit_cancellation(&state, version).await
            })
            .await?;

        tracing::info!(%registration_id, %reason, "Registration cancelled");
        Ok(registration)
    }

    /// One confirmation attempt. The caller holds the registration lock.
    async fn confirm_locked(
        &self,
        registration_id: RegistrationId,
        actor: Option<Actor>,
    ) -> Result<Registration> {
        let (mut state, version) = self.load_registration_state(registration_id).await?;
        let effects = self.registration_reducer.reduce(
            &mut state,
            RegistrationAction::Confirm { actor },
            &self.registration_env,
        );
        let registration = self.commit_registration_state(&state, version).await?;
        record_confirmation(&registration);
        self.dispatch(effects);
        Ok(registration)
    }

    /// Check in the holder of a verified ticket.
    ///
    /// Serialized with every other write to the registration, so of two
    /// concurrent scans exactly one succeeds.
    pub(crate) async fn check_in(
        &self,
        claims: TicketClaims,
        scanner: Actor,
    ) -> Result<Registration> {
        let ticket = match self.persistence.load_ticket(claims.ticket_id).await {
            Ok(ticket) => ticket,
            Err(RepositoryError::NotFound { .. }) => {
                return Err(LifecycleError::TicketInvalid(format!(
                    "unknown ticket {}",
                    claims.ticket_id
                )));
            },
            Err(error) => return Err(error.into()),
        };
        if ticket.event_id != claims.event_id {
            return Err(LifecycleError::TicketInvalid(format!(
                "ticket {} was not issued for event {}",
                ticket.id, claims.event_id
            )));
        }

        let _guard = self.registration_locks.lock(ticket.registration_id).await;
        self.retrying(|| self.check_in_locked(ticket.registration_id, ticket.id, scanner))
            .await
    }

    /// One check-in attempt. The caller holds the registration lock.
    async fn check_in_locked(
        &self,
        registration_id: RegistrationId,
        ticket_id: TicketId,
        scanner: Actor,
    ) -> Result<Registration> {
        let (mut state, version) = self.load_registration_state(registration_id).await?;
        if state.ticket.as_ref().map(|ticket| ticket.id) != Some(ticket_id) {
            return Err(LifecycleError::TicketInvalid(format!(
                "ticket {ticket_id} does not belong to registration {registration_id}"
            )));
        }

        self.registration_reducer.reduce(
            &mut state,
            RegistrationAction::CheckIn { actor: scanner },
            &self.registration_env,
        );
        self.commit_registration_state(&state, version).await
    }

    /// Load a registration with everything its reducer needs.
    pub(crate) async fn load_registration_state(
        &self,
        registration_id: RegistrationId,
    ) -> Result<(RegistrationState, Version)> {
        let Versioned {
            record: registration,
            version,
        } = self.persistence.load_registration(registration_id).await?;
        let event = self.persistence.load_event(registration.event_id).await?.record;
        let ticket = match registration.ticket_id {
            Some(ticket_id) => Some(self.persistence.load_ticket(ticket_id).await?),
            None => None,
        };
        let proof = match registration.proof_id {
            Some(proof_id) => Some(self.persistence.load_proof(proof_id).await?),
            None => None,
        };

        Ok((
            RegistrationState::with(event, registration, ticket, proof),
            version,
        ))
    }

    /// Write the reducer's result: the registration with its ticket and proof
    /// in one compare-and-swap.
    pub(crate) async fn commit_registration_state(
        &self,
        state: &RegistrationState,
        expected: Version,
    ) -> Result<Registration> {
        let write = registration_write(state, expected)?;
        self.commit_write(write).await
    }

    /// Same, handing the slot and merchandise back to the ledger within the
    /// write.
    pub(crate) async fn commit_cancellation(
        &self,
        state: &RegistrationState,
        expected: Version,
    ) -> Result<Registration> {
        let write = registration_write(state, expected)?;
        let merchandise = write.registration.merchandise.clone();
        self.commit_write(write.releasing(merchandise)).await
    }

    async fn commit_write(&self, write: RegistrationWrite) -> Result<Registration> {
        let registration = write.registration.clone();
        self.persistence.commit_registration(write).await?;
        metrics::record_registration(registration.status.label());
        Ok(registration)
    }
}

fn registration_write(state: &RegistrationState, expected: Version) -> Result<RegistrationWrite> {
    Ok(RegistrationWrite::new(state.outcome()?.clone(), expected)
        .with_ticket(state.ticket.clone())
        .with_proof(state.proof.clone()))
}
