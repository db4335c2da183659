//! Payment verification gate.
//!
//! A paid registration stays pending until an organizer approves a proof of
//! payment. Each registration has at most one current proof: a participant
//! may submit again only after a rejection, and the new proof replaces the
//! rejected one. Approval is what opens the gate; the engine follows it with
//! the registration's `Confirm` in the same write.

use super::{ensure_manager, loaded};
use crate::error::{Entity, LifecycleError, Result};
use crate::types::{
    Actor, ArtifactId, Event, PaymentProof, ProofId, ProofStatus, ProofTransition, Registration,
    RegistrationStatus, UserId,
};
use campus_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Actions for the payment gate
#[derive(Clone, Debug, PartialEq)]
pub enum PaymentAction {
    // Commands
    /// Submit evidence of payment
    SubmitProof {
        /// New proof id
        proof_id: ProofId,
        /// Submitting participant
        actor: Actor,
        /// Stored receipt
        artifact: ArtifactId,
    },

    /// Accept the current proof
    ApproveProof {
        /// Reviewing organizer
        actor: Actor,
    },

    /// Refuse the current proof
    RejectProof {
        /// Reviewing organizer
        actor: Actor,
        /// Shown to the participant
        reason: String,
    },

    // Events
    /// A proof is awaiting review
    ProofSubmitted {
        /// The new proof
        proof: PaymentProof,
        /// Rejected proof it replaces
        replaced: Option<ProofId>,
    },

    /// The proof was approved
    ProofApproved {
        /// Proof
        proof_id: ProofId,
        /// Reviewer
        reviewer: UserId,
        /// When
        at: DateTime<Utc>,
    },

    /// The proof was rejected
    ProofRejected {
        /// Proof
        proof_id: ProofId,
        /// Reviewer
        reviewer: UserId,
        /// Why
        reason: String,
        /// When
        at: DateTime<Utc>,
    },

    /// A command was rejected
    ValidationFailed {
        /// Why
        error: LifecycleError,
    },
}

/// The current proof of one registration, with the registration and event
/// as read-only context.
#[derive(Clone, Debug, Default)]
pub struct PaymentState {
    /// Owning event
    pub event: Option<Event>,
    /// Registration being paid for
    pub registration: Option<Registration>,
    /// Current proof
    pub proof: Option<PaymentProof>,
    /// Rejected proof dropped by the last submission
    pub replaced: Option<ProofId>,
    /// Error of the last rejected command
    pub last_error: Option<LifecycleError>,
}

impl PaymentState {
    /// Loaded state for a gate command.
    #[must_use]
    pub const fn with(
        event: Event,
        registration: Registration,
        proof: Option<PaymentProof>,
    ) -> Self {
        Self {
            event: Some(event),
            registration: Some(registration),
            proof,
            replaced: None,
            last_error: None,
        }
    }

    /// The proof after the last command, or the error that rejected it.
    ///
    /// # Errors
    ///
    /// The stored `last_error`, or `NotFound` when there is no proof.
    pub fn outcome(&self) -> Result<&PaymentProof> {
        if let Some(error) = &self.last_error {
            return Err(error.clone());
        }
        loaded(self.proof.as_ref(), Entity::PaymentProof)
    }
}

/// Environment dependencies for the payment gate
#[derive(Clone)]
pub struct PaymentEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
}

impl PaymentEnvironment {
    /// Creates a new `PaymentEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

/// Reducer for the payment gate
#[derive(Clone, Debug, Default)]
pub struct PaymentReducer;

impl PaymentReducer {
    /// Creates a new `PaymentReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn gated(state: &PaymentState) -> Result<(&Event, &Registration)> {
        let event = loaded(state.event.as_ref(), Entity::Event)?;
        let registration = loaded(state.registration.as_ref(), Entity::Registration)?;

        if event.status.is_frozen() {
            return Err(LifecycleError::invalid_transition(
                Entity::PaymentProof,
                format!("event {}", event.status),
                "review",
            ));
        }
        if !registration.payment.is_required() {
            return Err(LifecycleError::Validation(format!(
                "registration {} does not require payment",
                registration.id
            )));
        }
        if registration.status != RegistrationStatus::Pending {
            return Err(LifecycleError::invalid_transition(
                Entity::Registration,
                registration.status,
                "pay for",
            ));
        }
        Ok((event, registration))
    }

    fn handle_submit(
        state: &PaymentState,
        proof_id: ProofId,
        actor: &Actor,
        artifact: ArtifactId,
        now: DateTime<Utc>,
    ) -> Result<PaymentAction> {
        let (event, registration) = Self::gated(state)?;
        if actor.user_id != registration.participant_id {
            return Err(LifecycleError::Unauthorized(
                "only the registered participant may submit payment".to_string(),
            ));
        }

        let replaced = match state.proof.as_ref().map(|proof| (proof.id, &proof.status)) {
            None => None,
            Some((id, ProofStatus::Rejected { .. })) => Some(id),
            Some((_, status)) => {
                return Err(LifecycleError::invalid_transition(
                    Entity::PaymentProof,
                    status,
                    "resubmit",
                ));
            },
        };

        Ok(PaymentAction::ProofSubmitted {
            proof: PaymentProof {
                id: proof_id,
                registration_id: registration.id,
                event_id: event.id,
                participant_id: registration.participant_id,
                artifact,
                status: ProofStatus::Pending,
                submitted_at: now,
            },
            replaced,
        })
    }

    fn handle_review(
        state: &PaymentState,
        actor: &Actor,
        transition: ProofTransition,
    ) -> Result<PaymentAction> {
        let (event, _) = Self::gated(state)?;
        ensure_manager(event, actor, "review payments")?;
        let proof = loaded(state.proof.as_ref(), Entity::PaymentProof)?;

        let status = proof.status.clone().apply(transition)?;
        Ok(match status {
            ProofStatus::Approved {
                reviewer,
                reviewed_at,
            } => PaymentAction::ProofApproved {
                proof_id: proof.id,
                reviewer,
                at: reviewed_at,
            },
            ProofStatus::Rejected {
                reviewer,
                reason,
                reviewed_at,
            } => PaymentAction::ProofRejected {
                proof_id: proof.id,
                reviewer,
                reason,
                at: reviewed_at,
            },
            other => {
                return Err(LifecycleError::invalid_transition(
                    Entity::PaymentProof,
                    other,
                    "review",
                ));
            },
        })
    }

    /// Applies an event to state
    fn apply_event(state: &mut PaymentState, action: PaymentAction) {
        match action {
            PaymentAction::ProofSubmitted { proof, replaced } => {
                if let Some(registration) = state.registration.as_mut() {
                    registration.proof_id = Some(proof.id);
                    registration.updated_at = proof.submitted_at;
                }
                state.proof = Some(proof);
                state.replaced = replaced;
                state.last_error = None;
            },
            PaymentAction::ProofApproved { reviewer, at, .. } => {
                if let Some(proof) = state.proof.as_mut() {
                    proof.status = ProofStatus::Approved {
                        reviewer,
                        reviewed_at: at,
                    };
                }
                state.last_error = None;
            },
            PaymentAction::ProofRejected {
                reviewer,
                reason,
                at,
                ..
            } => {
                if let Some(proof) = state.proof.as_mut() {
                    proof.status = ProofStatus::Rejected {
                        reviewer,
                        reason,
                        reviewed_at: at,
                    };
                }
                state.last_error = None;
            },
            PaymentAction::ValidationFailed { error } => {
                state.last_error = Some(error);
            },
            PaymentAction::SubmitProof { .. }
            | PaymentAction::ApproveProof { .. }
            | PaymentAction::RejectProof { .. } => {},
        }
    }
}

impl Reducer for PaymentReducer {
    type State = PaymentState;
    type Action = PaymentAction;
    type Environment = PaymentEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let now = env.clock.now();

        let outcome = match action {
            PaymentAction::SubmitProof {
                proof_id,
                actor,
                artifact,
            } => Self::handle_submit(state, proof_id, &actor, artifact, now),
            PaymentAction::ApproveProof { actor } => Self::handle_review(
                state,
                &actor,
                ProofTransition::Approve {
                    reviewer: actor.user_id,
                    at: now,
                },
            ),
            PaymentAction::RejectProof { actor, reason } => {
                if reason.trim().is_empty() {
                    Err(LifecycleError::Validation(
                        "a rejection needs a reason".to_string(),
                    ))
                } else {
                    Self::handle_review(
                        state,
                        &actor,
                        ProofTransition::Reject {
                            reviewer: actor.user_id,
                            reason,
                            at: now,
                        },
                    )
                }
            },
            event @ (PaymentAction::ProofSubmitted { .. }
            | PaymentAction::ProofApproved { .. }
            | PaymentAction::ProofRejected { .. }
            | PaymentAction::ValidationFailed { .. }) => Ok(event),
        };

        match outcome {
            Ok(event) => Self::apply_event(state, event),
            Err(error) => Self::apply_event(state, PaymentAction::ValidationFailed { error }),
        }

        SmallVec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Capacity, EventDraft, EventId, EventStatus, Money, PaymentRequirement, RegistrationId,
        RegistrationWindow,
    };
    use campus_testing::{ReducerTest, assertions, test_clock};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        test_clock().now()
    }

    fn env() -> PaymentEnvironment {
        PaymentEnvironment::new(Arc::new(test_clock()))
    }

    struct Fixture {
        organizer: Actor,
        participant: Actor,
        state: PaymentState,
    }

    fn fixture() -> Fixture {
        let organizer = Actor::organizer(UserId::new());
        let participant = Actor::participant(UserId::new());
        let window = RegistrationWindow::new(now() - Duration::hours(1), now() + Duration::hours(1))
            .unwrap_or_else(|_| unreachable!());
        let draft = EventDraft::new("Gala Dinner", now() + Duration::days(5))
            .with_capacity(Capacity::new(80))
            .with_window(window)
            .with_price(Money::from_cents(2_500));
        let mut event = Event::from_draft(EventId::new(), organizer.user_id, draft, now());
        event.status = EventStatus::Published;
        let registration = Registration::new(
            RegistrationId::new(),
            event.id,
            participant.user_id,
            PaymentRequirement::Required {
                amount: Money::from_cents(2_500),
            },
            Vec::new(),
            now(),
        );

        Fixture {
            organizer,
            participant,
            state: PaymentState::with(event, registration, None),
        }
    }

    fn submit(actor: Actor) -> PaymentAction {
        PaymentAction::SubmitProof {
            proof_id: ProofId::new(),
            actor,
            artifact: ArtifactId::new(),
        }
    }

    #[test]
    fn submit_links_proof_to_registration() {
        let Fixture {
            participant, state, ..
        } = fixture();

        ReducerTest::new(PaymentReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(submit(participant))
            .then_state(|state| {
                let proof_id = state.outcome().map(|p| p.id).ok();
                assert!(proof_id.is_some());
                assert_eq!(
                    state.registration.as_ref().and_then(|r| r.proof_id),
                    proof_id
                );
                assert!(state.replaced.is_none());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn only_the_participant_may_submit() {
        let Fixture {
            organizer, state, ..
        } = fixture();

        ReducerTest::new(PaymentReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(submit(organizer))
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::Unauthorized(_))
                ));
            })
            .run();
    }

    #[test]
    fn second_submission_waits_for_review() {
        let Fixture {
            participant, state, ..
        } = fixture();

        ReducerTest::new(PaymentReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(submit(participant))
            .when_action(submit(participant))
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::InvalidStateTransition {
                        entity: Entity::PaymentProof,
                        ..
                    })
                ));
            })
            .run();
    }

    #[test]
    fn reject_then_resubmit_replaces_proof() {
        let Fixture {
            organizer,
            participant,
            state,
        } = fixture();

        ReducerTest::new(PaymentReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(submit(participant))
            .when_action(PaymentAction::RejectProof {
                actor: organizer,
                reason: "blurry image".to_string(),
            })
            .when_action(submit(participant))
            .then_state(|state| {
                assert!(state.last_error.is_none());
                assert!(state.replaced.is_some());
                assert_ne!(state.replaced, state.proof.as_ref().map(|p| p.id));
                assert!(state.outcome().is_ok_and(|p| p.status.is_pending()));
            })
            .run();
    }

    #[test]
    fn rejection_needs_a_reason() {
        let Fixture {
            organizer,
            participant,
            state,
        } = fixture();

        ReducerTest::new(PaymentReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(submit(participant))
            .when_action(PaymentAction::RejectProof {
                actor: organizer,
                reason: "  ".to_string(),
            })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::Validation(_))
                ));
                assert!(state.proof.as_ref().is_some_and(|p| p.status.is_pending()));
            })
            .run();
    }

    #[test]
    fn approval_by_owner() {
        let Fixture {
            organizer,
            participant,
            state,
        } = fixture();

        ReducerTest::new(PaymentReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(submit(participant))
            .when_action(PaymentAction::ApproveProof { actor: organizer })
            .then_state(move |state| {
                assert!(matches!(
                    state.outcome().map(|p| &p.status),
                    Ok(ProofStatus::Approved { reviewer, .. }) if *reviewer == organizer.user_id
                ));
            })
            .run();
    }

    #[test]
    fn decided_proof_cannot_be_reviewed_again() {
        let Fixture {
            organizer,
            participant,
            state,
        } = fixture();

        ReducerTest::new(PaymentReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(submit(participant))
            .when_action(PaymentAction::RejectProof {
                actor: organizer,
                reason: "wrong amount".to_string(),
            })
            .when_action(PaymentAction::ApproveProof { actor: organizer })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::InvalidStateTransition { .. })
                ));
                assert!(matches!(
                    state.proof.as_ref().map(|p| &p.status),
                    Some(ProofStatus::Rejected { .. })
                ));
            })
            .run();
    }

    #[test]
    fn free_registrations_bypass_the_gate() {
        let Fixture {
            participant,
            mut state,
            ..
        } = fixture();
        if let Some(registration) = state.registration.as_mut() {
            registration.payment = PaymentRequirement::NotRequired;
        }

        ReducerTest::new(PaymentReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(submit(participant))
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::Validation(_))
                ));
            })
            .run();
    }
}
