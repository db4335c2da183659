//! Post-event feedback.

use super::LifecycleEngine;
use crate::error::{Entity, LifecycleError, Result};
use crate::types::{Actor, EventId, EventStatus, Feedback, RegistrationStatus};

impl LifecycleEngine {
    /// Record an attendee's rating of a completed event.
    ///
    /// Only participants who checked in may rate, once per event.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` unless the event is completed
    /// - `Unauthorized` when `actor` did not attend
    /// - `Validation` for a rating outside 1..=5 or a second submission
    pub async fn submit_feedback(
        &self,
        actor: Actor,
        event_id: EventId,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Feedback> {
        if !(Feedback::MIN_RATING..=Feedback::MAX_RATING).contains(&rating) {
            return Err(LifecycleError::Validation(format!(
                "rating must be between {} and {}",
                Feedback::MIN_RATING,
                Feedback::MAX_RATING
            )));
        }

        let event = self.persistence.load_event(event_id).await?.record;
        if event.status != EventStatus::Completed {
            return Err(LifecycleError::invalid_transition(
                Entity::Event,
                event.status,
                "collect feedback for",
            ));
        }

        let attended = self
            .persistence
            .registrations_for_event(event_id)
            .await?
            .iter()
            .any(|registration| {
                registration.participant_id == actor.user_id
                    && registration.status == RegistrationStatus::CheckedIn
            });
        if !attended {
            return Err(LifecycleError::Unauthorized(
                "only checked-in participants may leave feedback".to_string(),
            ));
        }

        let feedback = Feedback {
            event_id,
            participant_id: actor.user_id,
            rating,
            comment: comment.filter(|text| !text.trim().is_empty()),
            submitted_at: self.clock.now(),
        };
        self.persistence.insert_feedback(feedback.clone()).await?;

        tracing::info!(%event_id, participant_id = %actor.user_id, rating, "Feedback recorded");
        Ok(feedback)
    }

    /// Feedback for an event, in submission order.
    ///
    /// # Errors
    ///
    /// `Transient`.
    pub async fn feedback_for_event(&self, event_id: EventId) -> Result<Vec<Feedback>> {
        Ok(self.persistence.feedback_for_event(event_id).await?)
    }
}
