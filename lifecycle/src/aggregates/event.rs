//! Event aggregate.
//!
//! Owns the event lifecycle (`draft -> published -> closed -> completed`,
//! `cancelled` from draft or published) and the edits an organizer may make
//! while the event is still open. Cascading a cancellation into the event's
//! registrations is the engine's job; this reducer only moves the event.

use super::{ensure_manager, loaded};
use crate::error::{Entity, LifecycleError, Result};
use crate::types::{
    Actor, Capacity, Event, EventDraft, EventId, EventStatus, EventTransition, RegistrationWindow,
    Role,
};
use campus_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer};
use chrono::{DateTime, Utc};
use std::sync::Arc;

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the event aggregate
#[derive(Clone, Debug, PartialEq)]
pub enum EventAction {
    // Commands
    /// Create a draft event
    CreateEvent {
        /// New event id
        event_id: EventId,
        /// Creating organizer
        actor: Actor,
        /// Organizer input
        draft: EventDraft,
    },

    /// Make a draft visible and registrable
    PublishEvent {
        /// Caller
        actor: Actor,
    },

    /// Stop new registrations
    CloseRegistration {
        /// Caller
        actor: Actor,
    },

    /// Close a published event whose window has passed (system sweep)
    ExpireWindow,

    /// Mark a closed event as finished
    CompleteEvent {
        /// Caller
        actor: Actor,
    },

    /// Call the event off
    CancelEvent {
        /// Caller
        actor: Actor,
        /// Reason passed on to the cancelled registrations
        reason: String,
    },

    /// Change the slot limit
    UpdateCapacity {
        /// Caller
        actor: Actor,
        /// New capacity
        capacity: Capacity,
    },

    /// Change the registration window
    UpdateWindow {
        /// Caller
        actor: Actor,
        /// New window
        window: RegistrationWindow,
    },

    // Events
    /// A draft was created
    EventCreated {
        /// The new event
        event: Event,
    },

    /// The event moved to a new lifecycle state
    StatusChanged {
        /// Event
        event_id: EventId,
        /// New state
        status: EventStatus,
        /// When
        at: DateTime<Utc>,
    },

    /// Capacity was changed
    CapacityUpdated {
        /// Event
        event_id: EventId,
        /// New capacity
        capacity: Capacity,
        /// When
        at: DateTime<Utc>,
    },

    /// Registration window was changed
    WindowUpdated {
        /// Event
        event_id: EventId,
        /// New window
        window: RegistrationWindow,
        /// When
        at: DateTime<Utc>,
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

/// One event, as loaded for a command.
#[derive(Clone, Debug, Default)]
pub struct EventState {
    /// The event (`None` before creation)
    pub event: Option<Event>,
    /// Error of the last rejected command
    pub last_error: Option<LifecycleError>,
}

impl EventState {
    /// State for a command on an existing event.
    #[must_use]
    pub const fn with(event: Event) -> Self {
        Self {
            event: Some(event),
            last_error: None,
        }
    }

    /// The event after the last command, or the error that rejected it.
    ///
    /// # Errors
    ///
    /// The stored `last_error`, or `NotFound` when nothing was loaded.
    pub fn outcome(&self) -> Result<&Event> {
        if let Some(error) = &self.last_error {
            return Err(error.clone());
        }
        loaded(self.event.as_ref(), Entity::Event)
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the event aggregate
#[derive(Clone)]
pub struct EventEnvironment {
    /// Clock for timestamps and window checks
    pub clock: Arc<dyn Clock>,
}

impl EventEnvironment {
    /// Creates a new `EventEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the event aggregate
#[derive(Clone, Debug, Default)]
pub struct EventReducer;

impl EventReducer {
    /// Creates a new `EventReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn handle_create(
        state: &EventState,
        event_id: EventId,
        actor: &Actor,
        draft: EventDraft,
        now: DateTime<Utc>,
    ) -> Result<EventAction> {
        if state.event.is_some() {
            return Err(LifecycleError::Validation(format!(
                "event {event_id} already exists"
            )));
        }
        if actor.role == Role::Participant {
            return Err(LifecycleError::Unauthorized(
                "only organizers may create events".to_string(),
            ));
        }
        draft.validate()?;

        Ok(EventAction::EventCreated {
            event: Event::from_draft(event_id, actor.user_id, draft, now),
        })
    }

    fn handle_transition(
        state: &EventState,
        actor: Option<&Actor>,
        transition: EventTransition,
        now: DateTime<Utc>,
    ) -> Result<EventAction> {
        let event = loaded(state.event.as_ref(), Entity::Event)?;
        if let Some(actor) = actor {
            ensure_manager(event, actor, "change the event status")?;
        }

        let status = event.status.apply(transition)?;
        if transition == EventTransition::Publish
            && (event.capacity.is_none() || event.window.is_none())
        {
            return Err(LifecycleError::Validation(
                "capacity and registration window must be set before publishing".to_string(),
            ));
        }

        Ok(EventAction::StatusChanged {
            event_id: event.id,
            status,
            at: now,
        })
    }

    fn handle_expire(state: &EventState, now: DateTime<Utc>) -> Result<EventAction> {
        let event = loaded(state.event.as_ref(), Entity::Event)?;
        let expired = event.window.is_some_and(|window| window.has_closed_at(now));
        if !expired {
            return Err(LifecycleError::Validation(format!(
                "registration window of event {} is still open",
                event.id
            )));
        }
        Self::handle_transition(state, None, EventTransition::Close, now)
    }

    fn editable<'a>(state: &'a EventState, actor: &Actor) -> Result<&'a Event> {
        let event = loaded(state.event.as_ref(), Entity::Event)?;
        ensure_manager(event, actor, "edit the event")?;
        if !event.status.is_editable() {
            return Err(LifecycleError::invalid_transition(
                Entity::Event,
                event.status,
                "edit",
            ));
        }
        Ok(event)
    }

    /// Applies an event to state
    fn apply_event(state: &mut EventState, action: EventAction) {
        match action {
            EventAction::EventCreated { event } => {
                state.event = Some(event);
                state.last_error = None;
            },
            EventAction::StatusChanged { status, at, .. } => {
                if let Some(event) = state.event.as_mut() {
                    event.status = status;
                    event.updated_at = at;
                }
                state.last_error = None;
            },
            EventAction::CapacityUpdated { capacity, at, .. } => {
                if let Some(event) = state.event.as_mut() {
                    event.capacity = Some(capacity);
                    event.updated_at = at;
                }
                state.last_error = None;
            },
            EventAction::WindowUpdated { window, at, .. } => {
                if let Some(event) = state.event.as_mut() {
                    event.window = Some(window);
                    event.updated_at = at;
                }
                state.last_error = None;
            },
            EventAction::ValidationFailed { error } => {
                state.last_error = Some(error);
            },
            // Commands don't modify state
            EventAction::CreateEvent { .. }
            | EventAction::PublishEvent { .. }
            | EventAction::CloseRegistration { .. }
            | EventAction::ExpireWindow
            | EventAction::CompleteEvent { .. }
            | EventAction::CancelEvent { .. }
            | EventAction::UpdateCapacity { .. }
            | EventAction::UpdateWindow { .. } => {},
        }
    }
}

impl Reducer for EventReducer {
    type State = EventState;
    type Action = EventAction;
    type Environment = EventEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let now = env.clock.now();

        let outcome = match action {
            // ========== Commands ==========
            EventAction::CreateEvent {
                event_id,
                actor,
                draft,
            } => Self::handle_create(state, event_id, &actor, draft, now),
            EventAction::PublishEvent { actor } => {
                Self::handle_transition(state, Some(&actor), EventTransition::Publish, now)
            },
            EventAction::CloseRegistration { actor } => {
                Self::handle_transition(state, Some(&actor), EventTransition::Close, now)
            },
            EventAction::ExpireWindow => Self::handle_expire(state, now),
            EventAction::CompleteEvent { actor } => {
                Self::handle_transition(state, Some(&actor), EventTransition::Complete, now)
            },
            EventAction::CancelEvent { actor, reason } => {
                tracing::debug!(%reason, "Cancel requested");
                Self::handle_transition(state, Some(&actor), EventTransition::Cancel, now)
            },
            EventAction::UpdateCapacity { actor, capacity } => Self::editable(state, &actor)
                .map(|event| EventAction::CapacityUpdated {
                    event_id: event.id,
                    capacity,
                    at: now,
                }),
            EventAction::UpdateWindow { actor, window } => Self::editable(state, &actor)
                .map(|event| EventAction::WindowUpdated {
                    event_id: event.id,
                    window,
                    at: now,
                }),

            // ========== Events (replay) ==========
            event @ (EventAction::EventCreated { .. }
            | EventAction::StatusChanged { .. }
            | EventAction::CapacityUpdated { .. }
            | EventAction::WindowUpdated { .. }
            | EventAction::ValidationFailed { .. }) => Ok(event),
        };

        match outcome {
            Ok(event) => Self::apply_event(state, event),
            Err(error) => Self::apply_event(state, EventAction::ValidationFailed { error }),
        }

        SmallVec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;
    use campus_testing::{ReducerTest, assertions, test_clock};
    use chrono::Duration;

    fn env() -> EventEnvironment {
        EventEnvironment::new(Arc::new(test_clock()))
    }

    fn now() -> DateTime<Utc> {
        test_clock().now()
    }

    fn organizer() -> Actor {
        Actor::organizer(UserId::new())
    }

    fn window() -> RegistrationWindow {
        RegistrationWindow::new(now() - Duration::hours(1), now() + Duration::days(1))
            .unwrap_or_else(|_| unreachable!())
    }

    fn draft_event(owner: &Actor) -> Event {
        let draft = EventDraft::new("Spring Hackathon", now() + Duration::days(7))
            .with_capacity(Capacity::new(50))
            .with_window(window());
        Event::from_draft(EventId::new(), owner.user_id, draft, now())
    }

    fn event_in(owner: &Actor, status: EventStatus) -> Event {
        let mut event = draft_event(owner);
        event.status = status;
        event
    }

    #[test]
    fn create_event_as_organizer() {
        let actor = organizer();
        let event_id = EventId::new();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::default())
            .when_action(EventAction::CreateEvent {
                event_id,
                actor,
                draft: EventDraft::new("Career Fair", now() + Duration::days(10)),
            })
            .then_state(move |state| {
                assert!(state.last_error.is_none());
                let event = state
                    .event
                    .as_ref()
                    .map(|e| (e.id, e.organizer_id, e.status));
                assert_eq!(event, Some((event_id, actor.user_id, EventStatus::Draft)));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn participants_cannot_create_events() {
        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::default())
            .when_action(EventAction::CreateEvent {
                event_id: EventId::new(),
                actor: Actor::participant(UserId::new()),
                draft: EventDraft::new("Career Fair", now()),
            })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::Unauthorized(_))
                ));
                assert!(state.event.is_none());
            })
            .run();
    }

    #[test]
    fn publish_requires_capacity_and_window() {
        let owner = organizer();
        let mut event = draft_event(&owner);
        event.window = None;

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::with(event))
            .when_action(EventAction::PublishEvent { actor: owner })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::Validation(_))
                ));
                assert_eq!(
                    state.event.as_ref().map(|e| e.status),
                    Some(EventStatus::Draft)
                );
            })
            .run();
    }

    #[test]
    fn full_lifecycle_by_owner() {
        let owner = organizer();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::with(draft_event(&owner)))
            .when_action(EventAction::PublishEvent { actor: owner })
            .when_action(EventAction::CloseRegistration { actor: owner })
            .when_action(EventAction::CompleteEvent { actor: owner })
            .then_state(|state| {
                assert!(state.last_error.is_none());
                assert_eq!(
                    state.event.as_ref().map(|e| e.status),
                    Some(EventStatus::Completed)
                );
            })
            .run();
    }

    #[test]
    fn other_organizer_is_unauthorized() {
        let owner = organizer();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::with(draft_event(&owner)))
            .when_action(EventAction::PublishEvent { actor: organizer() })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::Unauthorized(_))
                ));
            })
            .run();
    }

    #[test]
    fn admin_may_cancel_any_event() {
        let owner = organizer();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::with(event_in(&owner, EventStatus::Published)))
            .when_action(EventAction::CancelEvent {
                actor: Actor::admin(UserId::new()),
                reason: "venue flooded".to_string(),
            })
            .then_state(|state| {
                assert_eq!(
                    state.outcome().map(|e| e.status),
                    Ok(EventStatus::Cancelled)
                );
            })
            .run();
    }

    #[test]
    fn closed_event_cannot_be_cancelled() {
        let owner = organizer();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::with(event_in(&owner, EventStatus::Closed)))
            .when_action(EventAction::CancelEvent {
                actor: owner,
                reason: String::new(),
            })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::InvalidStateTransition {
                        entity: Entity::Event,
                        ..
                    })
                ));
                assert_eq!(
                    state.event.as_ref().map(|e| e.status),
                    Some(EventStatus::Closed)
                );
            })
            .run();
    }

    #[test]
    fn edits_are_rejected_once_closed() {
        let owner = organizer();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::with(event_in(&owner, EventStatus::Closed)))
            .when_action(EventAction::UpdateCapacity {
                actor: owner,
                capacity: Capacity::new(10),
            })
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::InvalidStateTransition { .. })
                ));
                assert_eq!(
                    state.event.as_ref().and_then(|e| e.capacity),
                    Some(Capacity::new(50))
                );
            })
            .run();
    }

    #[test]
    fn expire_window_only_after_close_time() {
        let owner = organizer();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::with(event_in(&owner, EventStatus::Published)))
            .when_action(EventAction::ExpireWindow)
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(LifecycleError::Validation(_))
                ));
            })
            .run();

        let mut expired = event_in(&owner, EventStatus::Published);
        expired.window =
            RegistrationWindow::new(now() - Duration::days(2), now() - Duration::days(1)).ok();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::with(expired))
            .when_action(EventAction::ExpireWindow)
            .then_state(|state| {
                assert_eq!(state.outcome().map(|e| e.status), Ok(EventStatus::Closed));
            })
            .run();
    }

    #[test]
    fn a_later_success_clears_the_error() {
        let owner = organizer();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::with(draft_event(&owner)))
            .when_action(EventAction::CompleteEvent { actor: owner })
            .when_action(EventAction::PublishEvent { actor: owner })
            .then_state(|state| {
                assert!(state.last_error.is_none());
            })
            .run();
    }
}
