//! Registration aggregate.
//!
//! A registration is created `pending` once its slot is reserved, becomes
//! `confirmed` when the payment gate is open (a ticket is issued as part of
//! the same step), `checked-in` when its ticket is scanned, and `cancelled`
//! on request or when the event is called off. Nothing moves once the event
//! is completed or cancelled.
//!
//! Confirmation returns one effect: the ticket notification. The engine runs
//! it only after the confirmed registration and ticket are stored.

use super::{ensure_manager, loaded};
use crate::error::{Entity, LifecycleError, Result};
use crate::notification::{NotificationError, Notifier, TicketNotice};
use crate::ticket_codec::TicketCodec;
use crate::types::{
    Actor, Cancellation, Event, EventStatus, MerchSelection, PaymentProof, PaymentRequirement,
    ProofTransition, Registration, RegistrationId, RegistrationStatus,
    RegistrationTransition, Role, Ticket, TicketId, TicketStatus, TicketTransition,
};
use campus_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the registration aggregate
#[derive(Clone, Debug, PartialEq)]
pub enum RegistrationAction {
    // Commands
    /// Create a pending registration for the loaded event
    Register {
        /// New registration id
        registration_id: RegistrationId,
        /// Registering participant
        actor: Actor,
        /// Selected merchandise
        merchandise: Vec<MerchSelection>,
    },

    /// Move a pending registration to confirmed and issue its ticket.
    ///
    /// `actor` is `None` when the engine confirms on its own (free events,
    /// approved payment); the authorization already happened upstream.
    Confirm {
        /// Caller
        actor: Option<Actor>,
    },

    /// Admit the ticket holder at the venue
    CheckIn {
        /// Scanning organizer
        actor: Actor,
    },

    /// Cancel on request of the participant or an organizer
    Cancel {
        /// Caller
        actor: Actor,
        /// Reason
        reason: String,
    },

    /// Cancel because the event was cancelled
    ForceCancel {
        /// Reason
        reason: String,
    },

    // Events
    /// A pending registration was created
    Registered {
        /// The registration
        registration: Registration,
    },

    /// The registration was confirmed and a ticket issued
    Confirmed {
        /// Registration
        registration_id: RegistrationId,
        /// The new ticket
        ticket: Ticket,
        /// When
        at: DateTime<Utc>,
    },

    /// The ticket was scanned
    CheckedIn {
        /// Registration
        registration_id: RegistrationId,
        /// Ticket used
        ticket_id: TicketId,
        /// When
        at: DateTime<Utc>,
    },

    /// The registration was cancelled
    Cancelled {
        /// Registration
        registration_id: RegistrationId,
        /// Reason
        reason: String,
        /// When
        at: DateTime<Utc>,
    },

    /// The ticket notification was delivered
    NotificationSent {
        /// Registration
        registration_id: RegistrationId,
    },

    /// The ticket notification failed or timed out
    NotificationFailed {
        /// Registration
        registration_id: RegistrationId,
        /// What went wrong
        error: String,
    },

    /// A command was rejected
    ValidationFailed {
        /// Why
        error: LifecycleError,
    },
}

// ============================================================================
// State
// ============================================================================

/// One registration with its ticket and current payment proof, plus the
/// owning event as read-only context.
#[derive(Clone, Debug, Default)]
pub struct RegistrationState {
    /// Owning event
    pub event: Option<Event>,
    /// The registration (`None` before `Register`)
    pub registration: Option<Registration>,
    /// Issued ticket
    pub ticket: Option<Ticket>,
    /// Current payment proof
    pub proof: Option<PaymentProof>,
    /// Error of the last rejected command
    pub last_error: Option<LifecycleError>,
}

impl RegistrationState {
    /// State for creating a registration under `event`.
    #[must_use]
    pub fn for_event(event: Event) -> Self {
        Self {
            event: Some(event),
            ..Self::default()
        }
    }

    /// State for a command on an existing registration.
    #[must_use]
    pub fn with(
        event: Event,
        registration: Registration,
        ticket: Option<Ticket>,
        proof: Option<PaymentProof>,
    ) -> Self {
        Self {
            event: Some(event),
            registration: Some(registration),
            ticket,
            proof,
            last_error: None,
        }
    }

    /// The registration after the last command, or the error that rejected it.
    ///
    /// # Errors
    ///
    /// The stored `last_error`, or `NotFound` when nothing was loaded.
    pub fn outcome(&self) -> Result<&Registration> {
        if let Some(error) = &self.last_error {
            return Err(error.clone());
        }
        loaded(self.registration.as_ref(), Entity::Registration)
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the registration aggregate
#[derive(Clone)]
pub struct RegistrationEnvironment {
    /// Clock for timestamps and window checks
    pub clock: Arc<dyn Clock>,
    /// Issues ticket ids and tokens
    pub codec: TicketCodec,
    /// Delivers ticket confirmations
    pub notifier: Arc<dyn Notifier>,
    /// Upper bound on one notification
    pub notification_timeout: Duration,
}

impl RegistrationEnvironment {
    /// Creates a new `RegistrationEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        codec: TicketCodec,
        notifier: Arc<dyn Notifier>,
        notification_timeout: Duration,
    ) -> Self {
        Self {
            clock,
            codec,
            notifier,
            notification_timeout,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the registration aggregate
#[derive(Clone, Debug, Default)]
pub struct RegistrationReducer;

impl RegistrationReducer {
    /// Creates a new `RegistrationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn context(state: &RegistrationState) -> Result<(&Event, &Registration)> {
        Ok((
            loaded(state.event.as_ref(), Entity::Event)?,
            loaded(state.registration.as_ref(), Entity::Registration)?,
        ))
    }

    /// No registration moves under a completed or cancelled event.
    fn ensure_not_frozen(
        event: &Event,
        registration: &Registration,
        transition: &'static str,
    ) -> Result<()> {
        if event.status.is_frozen() {
            return Err(LifecycleError::invalid_transition(
                Entity::Registration,
                format!("{} (event {})", registration.status, event.status),
                transition,
            ));
        }
        Ok(())
    }

    fn handle_register(
        state: &RegistrationState,
        registration_id: RegistrationId,
        actor: &Actor,
        merchandise: Vec<MerchSelection>,
        now: DateTime<Utc>,
    ) -> Result<RegistrationAction> {
        let event = loaded(state.event.as_ref(), Entity::Event)?;
        if state.registration.is_some() {
            return Err(LifecycleError::Validation(format!(
                "registration {registration_id} already exists"
            )));
        }
        if actor.role != Role::Participant {
            return Err(LifecycleError::Unauthorized(
                "only participants may register".to_string(),
            ));
        }
        event.check_accepting(now)?;
        let amount = event.amount_due(&merchandise)?;

        Ok(RegistrationAction::Registered {
            registration: Registration::new(
                registration_id,
                event.id,
                actor.user_id,
                PaymentRequirement::for_amount(amount),
                merchandise,
                now,
            ),
        })
    }

    fn handle_confirm(
        state: &RegistrationState,
        actor: Option<&Actor>,
        env: &RegistrationEnvironment,
        now: DateTime<Utc>,
    ) -> Result<RegistrationAction> {
        let (event, registration) = Self::context(state)?;
        if let Some(actor) = actor {
            ensure_manager(event, actor, "confirm registrations")?;
        }
        Self::ensure_not_frozen(event, registration, "confirm")?;
        registration.status.apply(RegistrationTransition::Confirm)?;

        if registration.payment.is_required() {
            let approved = state.proof.as_ref().is_some_and(|proof| {
                registration.proof_id == Some(proof.id) && proof.status.is_approved()
            });
            if !approved {
                return Err(LifecycleError::PaymentNotApproved {
                    registration_id: registration.id,
                });
            }
        }

        let issued = env.codec.issue(event.id);
        Ok(RegistrationAction::Confirmed {
            registration_id: registration.id,
            ticket: Ticket {
                id: issued.ticket_id,
                registration_id: registration.id,
                event_id: event.id,
                participant_id: registration.participant_id,
                token: issued.token,
                status: TicketStatus::Valid,
                issued_at: now,
            },
            at: now,
        })
    }

    fn handle_check_in(
        state: &RegistrationState,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<RegistrationAction> {
        let (event, registration) = Self::context(state)?;
        ensure_manager(event, actor, "scan tickets")?;

        let ticket = state
            .ticket
            .as_ref()
            .ok_or_else(|| LifecycleError::TicketInvalid("no ticket issued".to_string()))?;
        match registration.status {
            RegistrationStatus::Confirmed => {},
            RegistrationStatus::CheckedIn => {
                return Err(LifecycleError::TicketAlreadyUsed {
                    ticket_id: ticket.id,
                });
            },
            RegistrationStatus::Cancelled => {
                return Err(LifecycleError::TicketInvalid(format!(
                    "registration {} was cancelled",
                    registration.id
                )));
            },
            RegistrationStatus::Pending => {
                return Err(LifecycleError::TicketInvalid(format!(
                    "registration {} is not confirmed",
                    registration.id
                )));
            },
        }
        if !event.status.allows_check_in() {
            return Err(LifecycleError::invalid_transition(
                Entity::Registration,
                format!("{} (event {})", registration.status, event.status),
                "check in",
            ));
        }

        let mut used = ticket.clone();
        used.apply(TicketTransition::Use { at: now })?;
        registration.status.apply(RegistrationTransition::CheckIn)?;

        Ok(RegistrationAction::CheckedIn {
            registration_id: registration.id,
            ticket_id: ticket.id,
            at: now,
        })
    }

    fn handle_cancel(
        state: &RegistrationState,
        actor: Option<&Actor>,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<RegistrationAction> {
        let (event, registration) = Self::context(state)?;
        match actor {
            Some(actor) if actor.user_id == registration.participant_id => {},
            Some(actor) => ensure_manager(event, actor, "cancel registrations")?,
            // Cascade from an event cancellation
            None => {
                if event.status != EventStatus::Cancelled {
                    return Err(LifecycleError::Validation(format!(
                        "event {} is not cancelled",
                        event.id
                    )));
                }
            },
        }
        if actor.is_some() {
            Self::ensure_not_frozen(event, registration, "cancel")?;
        }
        registration.status.apply(RegistrationTransition::Cancel)?;

        Ok(RegistrationAction::Cancelled {
            registration_id: registration.id,
            reason,
            at: now,
        })
    }

    fn notification_effect(
        state: &RegistrationState,
        env: &RegistrationEnvironment,
    ) -> Option<Effect<RegistrationAction>> {
        let event = state.event.as_ref()?;
        let ticket = state.ticket.as_ref()?;
        let registration_id = ticket.registration_id;
        let notice = TicketNotice {
            recipient: ticket.participant_id,
            event_name: event.name.clone(),
            ticket_id: ticket.id,
            qr_token: ticket.token.clone(),
            event_date: event.starts_at,
        };
        let notifier = Arc::clone(&env.notifier);
        let timeout = env.notification_timeout;

        Some(Effect::future(async move {
            let delivery = tokio::time::timeout(timeout, notifier.notify(notice))
                .await
                .unwrap_or(Err(NotificationError::Timeout(timeout)));
            Some(match delivery {
                Ok(()) => RegistrationAction::NotificationSent { registration_id },
                Err(error) => RegistrationAction::NotificationFailed {
                    registration_id,
                    error: error.to_string(),
                },
            })
        }))
    }

    /// Applies an event to state
    fn apply_event(state: &mut RegistrationState, action: RegistrationAction) {
        match action {
            RegistrationAction::Registered { registration } => {
                state.registration = Some(registration);
                state.last_error = None;
            },
            RegistrationAction::Confirmed { ticket, at, .. } => {
                if let Some(registration) = state.registration.as_mut() {
                    registration.status = RegistrationStatus::Confirmed;
                    registration.ticket_id = Some(ticket.id);
                    registration.updated_at = at;
                }
                state.ticket = Some(ticket);
                state.last_error = None;
            },
            RegistrationAction::CheckedIn { at, .. } => {
                if let Some(registration) = state.registration.as_mut() {
                    registration.status = RegistrationStatus::CheckedIn;
                    registration.checked_in_at = Some(at);
                    registration.updated_at = at;
                }
                if let Some(ticket) = state.ticket.as_mut() {
                    let _ = ticket.apply(TicketTransition::Use { at });
                }
                state.last_error = None;
            },
            RegistrationAction::Cancelled { reason, at, .. } => {
                if let Some(registration) = state.registration.as_mut() {
                    registration.status = RegistrationStatus::Cancelled;
                    registration.cancellation = Some(Cancellation {
                        reason,
                        cancelled_at: at,
                    });
                    registration.updated_at = at;
                }
                // Used tickets and decided proofs stay as they are for the record.
                if let Some(ticket) = state.ticket.as_mut().filter(|ticket| ticket.is_valid()) {
                    let _ = ticket.apply(TicketTransition::Void { at });
                }
                if let Some(proof) = state.proof.as_mut() {
                    if let Ok(status) =
                        proof.status.clone().apply(ProofTransition::Withdraw { at })
                    {
                        proof.status = status;
                    }
                }
                state.last_error = None;
            },
            RegistrationAction::ValidationFailed { error } => {
                state.last_error = Some(error);
            },
            // Effect feedback and commands don't modify state
            RegistrationAction::NotificationSent { .. }
            | RegistrationAction::NotificationFailed { .. }
            | RegistrationAction::Register { .. }
            | RegistrationAction::Confirm { .. }
            | RegistrationAction::CheckIn { .. }
            | RegistrationAction::Cancel { .. }
            | RegistrationAction::ForceCancel { .. } => {},
        }
    }
}

impl Reducer for RegistrationReducer {
    type State = RegistrationState;
    type Action = RegistrationAction;
    type Environment = RegistrationEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let now = env.clock.now();

        let outcome = match action {
            // ========== Commands ==========
            RegistrationAction::Register {
                registration_id,
                actor,
                merchandise,
            } => Self::handle_register(state, registration_id, &actor, merchandise, now),
            RegistrationAction::Confirm { actor } => {
                Self::handle_confirm(state, actor.as_ref(), env, now)
            },
            RegistrationAction::CheckIn { actor } => Self::handle_check_in(state, &actor, now),
            RegistrationAction::Cancel { actor, reason } => {
                Self::handle_cancel(state, Some(&actor), reason, now)
            },
            RegistrationAction::ForceCancel { reason } => {
                Self::handle_cancel(state, None, reason, now)
            },

            // ========== Events (replay) ==========
            event @ (RegistrationAction::Registered { .. }
            | RegistrationAction::Confirmed { .. }
            | RegistrationAction::CheckedIn { .. }
            | RegistrationAction::Cancelled { .. }
            | RegistrationAction::NotificationSent { .. }
            | RegistrationAction::NotificationFailed { .. }
            | RegistrationAction::ValidationFailed { .. }) => Ok(event),
        };

        match outcome {
            Ok(event) => {
                let confirmed = matches!(event, RegistrationAction::Confirmed { .. });
                Self::apply_event(state, event);
                if confirmed {
                    return Self::notification_effect(state, env)
                        .map_or_else(SmallVec::new, |effect| smallvec![effect]);
                }
            },
            Err(error) => Self::apply_event(state, RegistrationAction::ValidationFailed { error }),
        }

        SmallVec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingNotifier;
    use crate::types::{
        ArtifactId, Capacity, EventDraft, EventId, Money, ProofId, ProofStatus, RegistrationWindow,
        UserId,
    };
    use campus_testing::{ReducerTest, assertions, test_clock};
    use chrono::Duration as ChronoDuration;

    fn now() -> DateTime<Utc> {
        test_clock().now()
    }

    fn env() -> RegistrationEnvironment {
        RegistrationEnvironment::new(
            Arc::new(test_clock()),
            TicketCodec::new(b"registration-tests"),
            Arc::new(RecordingNotifier::new()),
            Duration::from_secs(1),
        )
    }

    fn published(owner: UserId, price: Money) -> Event {
        let window = RegistrationWindow::new(
            now() - ChronoDuration::hours(1),
            now() + ChronoDuration::hours(5),
        )
        .unwrap_or_else(|_| unreachable!());
        let draft = EventDraft::new("Jazz Night", now() + ChronoDuration::days(2))
            .with_capacity(Capacity::new(100))
            .with_window(window)
            .with_price(price);
        let mut event = Event::from_draft(EventId::new(), owner, draft, now());
        event.status = EventStatus::Published;
        event
    }

    fn pending(event: &Event, payment: PaymentRequirement) -> Registration {
        Registration::new(
            RegistrationId::new(),
            event.id,
            UserId::new(),
            payment,
            Vec::new(),
            now(),
        )
    }

    fn confirmed_state(owner: UserId) -> RegistrationState {
        let event = published(owner, Money::ZERO);
        let registration = pending(&event, PaymentRequirement::NotRequired);
        let mut state = RegistrationState::with(event, registration, None, None);
        RegistrationReducer::new().reduce(
            &mut state,
            RegistrationAction::Confirm { actor: None },
            &env(),
        );
        state
    }

    #[test]
    fn register_free_event_needs_no_payment() {
        let event = published(UserId::new(), Money::ZERO);
        let participant = Actor::participant(UserId::new());

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env())
            .given_state(RegistrationState::for_event(event))
            .when_action(RegistrationAction::Register {
                registration_id: RegistrationId::new(),
                actor: participant,
                merchandise: Vec::new(),
            })
            .then_state(move |state| {
                let registration = state.outcome().cloned();
                assert!(matches!(
                    registration,
                    Ok(Registration {
                        status: RegistrationStatus::Pending,
                        payment: PaymentRequirement::NotRequired,
                        ..
                    })
                ));
                assert_eq!(
                    registration.map(|r| r.participant_id),
                    Ok(participant.user_id)
                );
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn register_outside_window_is_rejected() {
        let mut event = published(UserId::new(), Money::ZERO);
        event.window = RegistrationWindow::new(
            now() + ChronoDuration::hours(1),
            now() + ChronoDuration::hours(2),
        )
        .ok();
        let event_id = event.id;

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env())
            .given_state(RegistrationState::for_event(event))
            .when_action(RegistrationAction::Register {
                registration_id: RegistrationId::new(),
                actor: Actor::participant(UserId::new()),
                merchandise: Vec::new(),
            })
            .then_state(move |state| {
                assert_eq!(
                    state.last_error,
                    Some(LifecycleError::WindowClosed { event_id })
                );
                assert!(state.registration.is_none());
            })
            .run();
    }

    #[test]
    fn confirm_issues_ticket_and_notifies() {
        let event = published(UserId::new(), Money::ZERO);
        let registration = pending(&event, PaymentRequirement::NotRequired);

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env())
            .given_state(RegistrationState::with(event, registration, None, None))
            .when_action(RegistrationAction::Confirm { actor: None })
            .then_state(|state| {
                assert_eq!(
                    state.outcome().map(|r| r.status),
                    Ok(RegistrationStatus::Confirmed)
                );
                let ticket_id = state.ticket.as_ref().map(|t| t.id);
                assert!(ticket_id.is_some());
                assert_eq!(
                    state.registration.as_ref().and_then(|r| r.ticket_id),
                    ticket_id
                );
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn confirm_without_approved_proof_is_blocked() {
        let event = published(UserId::new(), Money::from_cents(1_000));
        let mut registration = pending(
            &event,
            PaymentRequirement::Required {
                amount: Money::from_cents(1_000),
            },
        );
        let proof = PaymentProof {
            id: ProofId::new(),
            registration_id: registration.id,
            event_id: event.id,
            participant_id: registration.participant_id,
            artifact: ArtifactId::new(),
            status: ProofStatus::Pending,
            submitted_at: now(),
        };
        registration.proof_id = Some(proof.id);
        let registration_id = registration.id;

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env())
            .given_state(RegistrationState::with(
                event,
                registration,
                None,
                Some(proof),
            ))
            .when_action(RegistrationAction::Confirm { actor: None })
            .then_state(move |state| {
                assert_eq!(
                    state.last_error,
                    Some(LifecycleError::PaymentNotApproved { registration_id })
                );
                assert!(state.ticket.is_none());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn second_check_in_is_rejected() {
        let owner = UserId::new();
        let scanner = Actor::organizer(owner);

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env())
            .given_state(confirmed_state(owner))
            .when_action(RegistrationAction::CheckIn { actor: scanner })
            .when_action(RegistrationAction::CheckIn { actor: scanner })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::TicketAlreadyUsed { .. })
                ));
                assert_eq!(
                    state.registration.as_ref().map(|r| r.status),
                    Some(RegistrationStatus::CheckedIn)
                );
                assert!(matches!(
                    state.ticket.as_ref().map(|t| t.status),
                    Some(TicketStatus::Used { .. })
                ));
            })
            .run();
    }

    #[test]
    fn foreign_organizer_cannot_scan() {
        ReducerTest::new(RegistrationReducer::new())
            .with_env(env())
            .given_state(confirmed_state(UserId::new()))
            .when_action(RegistrationAction::CheckIn {
                actor: Actor::organizer(UserId::new()),
            })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::Unauthorized(_))
                ));
                assert!(state.ticket.as_ref().is_some_and(Ticket::is_valid));
            })
            .run();
    }

    #[test]
    fn participant_cancel_voids_ticket() {
        let state = confirmed_state(UserId::new());
        let participant = Actor::participant(
            state
                .registration
                .as_ref()
                .map(|r| r.participant_id)
                .unwrap_or_default(),
        );

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(RegistrationAction::Cancel {
                actor: participant,
                reason: "schedule clash".to_string(),
            })
            .then_state(|state| {
                assert_eq!(
                    state.outcome().map(|r| r.status),
                    Ok(RegistrationStatus::Cancelled)
                );
                assert!(matches!(
                    state.ticket.as_ref().map(|t| t.status),
                    Some(TicketStatus::Void { .. })
                ));
            })
            .run();
    }

    #[test]
    fn cancel_is_barred_after_completion() {
        let mut state = confirmed_state(UserId::new());
        if let Some(event) = state.event.as_mut() {
            event.status = EventStatus::Completed;
        }
        let participant = Actor::participant(
            state
                .registration
                .as_ref()
                .map(|r| r.participant_id)
                .unwrap_or_default(),
        );

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(RegistrationAction::Cancel {
                actor: participant,
                reason: "too late".to_string(),
            })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::InvalidStateTransition {
                        entity: Entity::Registration,
                        ..
                    })
                ));
                assert_eq!(
                    state.registration.as_ref().map(|r| r.status),
                    Some(RegistrationStatus::Confirmed)
                );
            })
            .run();
    }

    #[test]
    fn force_cancel_withdraws_pending_proof() {
        let mut event = published(UserId::new(), Money::from_cents(500));
        let mut registration = pending(
            &event,
            PaymentRequirement::Required {
                amount: Money::from_cents(500),
            },
        );
        let proof = PaymentProof {
            id: ProofId::new(),
            registration_id: registration.id,
            event_id: event.id,
            participant_id: registration.participant_id,
            artifact: ArtifactId::new(),
            status: ProofStatus::Pending,
            submitted_at: now(),
        };
        registration.proof_id = Some(proof.id);
        event.status = EventStatus::Cancelled;

        ReducerTest::new(RegistrationReducer::new())
            .with_env(env())
            .given_state(RegistrationState::with(
                event,
                registration,
                None,
                Some(proof),
            ))
            .when_action(RegistrationAction::ForceCancel {
                reason: "event cancelled".to_string(),
            })
            .then_state(|state| {
                assert_eq!(
                    state.outcome().map(|r| r.status),
                    Ok(RegistrationStatus::Cancelled)
                );
                assert!(matches!(
                    state.proof.as_ref().map(|p| &p.status),
                    Some(ProofStatus::Withdrawn { .. })
                ));
            })
            .run();
    }

    #[test]
    fn withdrawn_proof_cannot_be_approved() {
        let withdrawn = ProofStatus::Withdrawn { withdrawn_at: now() };
        assert!(withdrawn
            .apply(ProofTransition::Approve {
                reviewer: UserId::new(),
                at: now(),
            })
            .is_err());
    }
}
