//! Event lifecycle operations.

use super::LifecycleEngine;
use crate::aggregates::{EventAction, EventState, RegistrationAction};
use crate::error::Result;
use crate::metrics;
use crate::types::{
    Actor, Capacity, Event, EventDraft, EventId, EventStatus, ProofStatus, Registration,
    RegistrationId, RegistrationStatus, RegistrationWindow,
};
use campus_core::reducer::Reducer;
use campus_core::version::Versioned;

/// Swept by an event cancellation.
fn cascades(registration: &Registration) -> bool {
    matches!(
        registration.status,
        RegistrationStatus::Pending | RegistrationStatus::Confirmed
    )
}

impl LifecycleEngine {
    /// Create a draft event owned by `actor`.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for participants, `Validation` for a bad draft.
    pub async fn create_event(&self, actor: Actor, draft: EventDraft) -> Result<Event> {
        let mut state = EventState::default();
        self.event_reducer.reduce(
            &mut state,
            EventAction::CreateEvent {
                event_id: EventId::new(),
                actor,
                draft,
            },
            &self.event_env,
        );
        let event = state.outcome()?.clone();

        self.persistence.insert_event(event.clone()).await?;
        metrics::record_event_status(event.status.label());
        tracing::info!(event_id = %event.id, name = %event.name, "Event created");
        Ok(event)
    }

    /// Open a draft for registration.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` unless draft, `Validation` without capacity
    /// or window, `Unauthorized` for anyone but the owner or an admin.
    pub async fn publish_event(&self, actor: Actor, event_id: EventId) -> Result<Event> {
        self.transition_event(event_id, EventAction::PublishEvent { actor })
            .await
    }

    /// Stop new registrations; check-in stays possible.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` unless published, or `Unauthorized`.
    pub async fn close_registration(&self, actor: Actor, event_id: EventId) -> Result<Event> {
        self.transition_event(event_id, EventAction::CloseRegistration { actor })
            .await
    }

    /// Finish a closed event. Registrations freeze and feedback opens.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` unless closed, or `Unauthorized`.
    pub async fn complete_event(&self, actor: Actor, event_id: EventId) -> Result<Event> {
        self.transition_event(event_id, EventAction::CompleteEvent { actor })
            .await
    }

    /// Call off a draft or published event and cancel every pending and
    /// confirmed registration under it.
    ///
    /// The event is marked cancelled first, so no new reservation can land
    /// while the registrations are swept. Checked-in registrations keep
    /// their record. Each cancelled registration voids its ticket, withdraws
    /// a proof still under review, and releases its slot.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` unless draft or published, `Unauthorized`,
    /// or a storage error from the sweep.
    pub async fn cancel_event(
        &self,
        actor: Actor,
        event_id: EventId,
        reason: impl Into<String>,
    ) -> Result<Event> {
        let reason = reason.into();
        let _event_guard = self.event_locks.lock(event_id).await;

        let event = self
            .retrying(|| {
                self.apply_event_action(
                    event_id,
                    EventAction::CancelEvent {
                        actor,
                        reason: reason.clone(),
                    },
                )
            })
            .await?;
        metrics::record_event_status(event.status.label());

        let registrations = self.persistence.registrations_for_event(event_id).await?;
        let mut cancelled = 0_usize;
        for registration in registrations.iter().filter(|r| cascades(r)) {
            let _guard = self.registration_locks.lock(registration.id).await;
            if self
                .retrying(|| self.force_cancel(registration.id, &reason))
                .await?
            {
                cancelled += 1;
            }
        }

        tracing::info!(%event_id, %reason, cancelled, "Event cancelled");
        Ok(event)
    }

    /// Change the slot limit. Never below the slots already held.
    ///
    /// # Errors
    ///
    /// `CapacityBelowCommitted`, `InvalidStateTransition` once closed, or
    /// `Unauthorized`.
    pub async fn update_capacity(
        &self,
        actor: Actor,
        event_id: EventId,
        capacity: Capacity,
    ) -> Result<Event> {
        self.transition_event(event_id, EventAction::UpdateCapacity { actor, capacity })
            .await
    }

    /// Move the registration window.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` once closed, or `Unauthorized`.
    pub async fn update_window(
        &self,
        actor: Actor,
        event_id: EventId,
        window: RegistrationWindow,
    ) -> Result<Event> {
        self.transition_event(event_id, EventAction::UpdateWindow { actor, window })
            .await
    }

    /// Close every published event whose registration window has passed.
    ///
    /// Returns the events that were closed. Registration operations check the
    /// window themselves, so the sweep only has to keep the status tidy.
    ///
    /// # Errors
    ///
    /// `Transient` when the event list cannot be read.
    pub async fn close_expired_windows(&self) -> Result<Vec<Event>> {
        let now = self.clock.now();
        let expired: Vec<EventId> = self
            .persistence
            .list_events()
            .await?
            .into_iter()
            .filter(|event| {
                event.status == EventStatus::Published
                    && event.window.is_some_and(|window| window.has_closed_at(now))
            })
            .map(|event| event.id)
            .collect();

        let mut closed = Vec::with_capacity(expired.len());
        for event_id in expired {
            match self.transition_event(event_id, EventAction::ExpireWindow).await {
                Ok(event) => closed.push(event),
                // Raced with an organizer edit or transition.
                Err(error) => {
                    tracing::debug!(%event_id, %error, "Skipped window expiry");
                },
            }
        }

        if !closed.is_empty() {
            tracing::info!(count = closed.len(), "Closed expired registration windows");
        }
        Ok(closed)
    }

    async fn transition_event(&self, event_id: EventId, action: EventAction) -> Result<Event> {
        let _guard = self.event_locks.lock(event_id).await;
        let event = self
            .retrying(|| self.apply_event_action(event_id, action.clone()))
            .await?;

        if !matches!(
            action,
            EventAction::UpdateCapacity { .. } | EventAction::UpdateWindow { .. }
        ) {
            metrics::record_event_status(event.status.label());
        }
        tracing::info!(%event_id, status = %event.status, "Event updated");
        Ok(event)
    }

    /// One attempt: load, reduce, write. The caller holds the event lock.
    async fn apply_event_action(&self, event_id: EventId, action: EventAction) -> Result<Event> {
        let Versioned { record, version } = self.persistence.load_event(event_id).await?;
        let mut state = EventState::with(record);
        self.event_reducer.reduce(&mut state, action, &self.event_env);
        let event = state.outcome()?.clone();

        // Resizes the ledger too when the capacity changed.
        self.persistence.update_event(event.clone(), version).await?;
        Ok(event)
    }

    /// Cancel one registration as part of an event cancellation.
    ///
    /// Returns `false` when the registration had already left the pending
    /// and confirmed states. The caller holds the registration lock.
    async fn force_cancel(&self, registration_id: RegistrationId, reason: &str) -> Result<bool> {
        let (mut state, version) = self.load_registration_state(registration_id).await?;
        if !state.registration.as_ref().is_some_and(cascades) {
            return Ok(false);
        }

        self.registration_reducer.reduce(
            &mut state,
            RegistrationAction::ForceCancel {
                reason: reason.to_string(),
            },
            &self.registration_env,
        );
        self.commit_cancellation(&state, version).await?;

        if state
            .proof
            .as_ref()
            .is_some_and(|proof| matches!(proof.status, ProofStatus::Withdrawn { .. }))
        {
            metrics::record_payment_proof("withdrawn");
        }
        Ok(true)
    }
}
