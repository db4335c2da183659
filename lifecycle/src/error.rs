//! Error types for the lifecycle engine.

use crate::types::{EventId, RegistrationId, TicketId, UserId};
use std::fmt;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;

/// The record kinds that own a lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    /// An event
    Event,
    /// A participant's registration
    Registration,
    /// A payment proof under review
    PaymentProof,
    /// An issued ticket
    Ticket,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Event => "event",
            Self::Registration => "registration",
            Self::PaymentProof => "payment proof",
            Self::Ticket => "ticket",
        };
        f.write_str(name)
    }
}

/// Every failure an engine operation can report.
///
/// All variants are recoverable conditions for the caller. `Clone` and
/// `PartialEq` let reducers keep the last error in state and let tests
/// compare errors directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The requested move is not in the entity's transition table.
    #[error("cannot {transition} {entity} in state {from}")]
    InvalidStateTransition {
        /// Entity kind
        entity: Entity,
        /// State the entity was in
        from: String,
        /// Attempted transition
        transition: &'static str,
    },

    /// No capacity slot left.
    #[error("event {event_id} is full ({capacity} slots)")]
    CapacityExceeded {
        /// Event that is full
        event_id: EventId,
        /// Its capacity
        capacity: u32,
    },

    /// The participant already holds an active registration for this event.
    #[error("participant {participant_id} is already registered for event {event_id}")]
    DuplicateRegistration {
        /// Event
        event_id: EventId,
        /// Participant
        participant_id: UserId,
    },

    /// Confirmation attempted while the payment proof is missing, pending or rejected.
    #[error("payment for registration {registration_id} has not been approved")]
    PaymentNotApproved {
        /// Registration awaiting payment
        registration_id: RegistrationId,
    },

    /// The ticket was already checked in.
    #[error("ticket {ticket_id} has already been used")]
    TicketAlreadyUsed {
        /// Used ticket
        ticket_id: TicketId,
    },

    /// The ticket is unknown, voided, or belongs to a cancelled registration.
    #[error("ticket is not valid: {0}")]
    TicketInvalid(String),

    /// The token failed to decode or its integrity tag did not match.
    #[error("malformed ticket token")]
    MalformedToken,

    /// The actor lacks the role or ownership this operation requires.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Registration attempted while the event is not accepting registrations.
    #[error("registration window for event {event_id} is closed")]
    WindowClosed {
        /// Event
        event_id: EventId,
    },

    /// A capacity edit would drop below the slots already reserved.
    #[error("capacity {requested} is below the {committed} slots already reserved")]
    CapacityBelowCommitted {
        /// Requested capacity
        requested: u32,
        /// Slots currently reserved
        committed: u32,
    },

    /// Not enough merchandise stock for the selection.
    #[error("merchandise item {item} is out of stock")]
    OutOfStock {
        /// Item name
        item: String,
    },

    /// The referenced record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind
        entity: Entity,
        /// Identifier as text
        id: String,
    },

    /// The input was rejected before any state changed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Persistence integrity failure that survived a retry with fresh state.
    #[error("transient storage failure: {0}")]
    Transient(String),
}

impl LifecycleError {
    /// Shorthand for [`LifecycleError::InvalidStateTransition`].
    pub fn invalid_transition(
        entity: Entity,
        from: impl fmt::Display,
        transition: &'static str,
    ) -> Self {
        Self::InvalidStateTransition {
            entity,
            from: from.to_string(),
            transition,
        }
    }

    /// Shorthand for [`LifecycleError::NotFound`].
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
