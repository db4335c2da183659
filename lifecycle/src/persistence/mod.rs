//! Storage contract for the lifecycle engine.
//!
//! Every write that moves a lifecycle forward is a compare-and-swap on the
//! record's [`Version`]. Slot reservation is a single atomic operation that
//! re-checks the event and the ledger at the moment of insertion. Releasing a
//! slot rides on the cancelling registration write, and a capacity edit on the
//! event write, so the ledger never drifts from the records it counts.
//!
//! [`InMemoryPersistence`] implements the contract for tests and the demo. A
//! database backend maps `reserve_slot` onto one conditional
//! `UPDATE ... WHERE reserved < capacity` inside the transaction that inserts
//! the registration.

use crate::capacity::SlotLedger;
use crate::error::{Entity, LifecycleError};
use crate::types::{
    Capacity, Event, EventId, Feedback, MerchSelection, PaymentProof, ProofId, Registration,
    RegistrationId, Ticket, TicketId, UserId,
};
use campus_core::version::{Version, Versioned};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

mod memory;

pub use memory::InMemoryPersistence;

/// Boxed future returned by [`Persistence`] methods.
pub type RepoFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Storage failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No such record
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind
        entity: Entity,
        /// Identifier as text
        id: String,
    },

    /// The record changed since it was loaded
    #[error("{entity} {id} was modified concurrently (expected {expected})")]
    VersionConflict {
        /// Entity kind
        entity: Entity,
        /// Identifier as text
        id: String,
        /// Version the writer loaded
        expected: Version,
    },

    /// Every slot is taken
    #[error("event {event_id} has no free slot")]
    CapacityExhausted {
        /// Event
        event_id: EventId,
        /// Its capacity
        capacity: Capacity,
    },

    /// The backend could not serialize concurrent reservations; safe to retry
    #[error("slot reservation contended")]
    Contended,

    /// The participant already holds an active registration
    #[error("participant {participant_id} already registered for event {event_id}")]
    DuplicateActive {
        /// Event
        event_id: EventId,
        /// Participant
        participant_id: UserId,
    },

    /// Not enough merchandise left
    #[error("merchandise item {item} is out of stock")]
    OutOfStock {
        /// Item name
        item: String,
    },

    /// The event stopped accepting registrations before the slot was taken
    #[error("event {event_id} is not accepting registrations")]
    RegistrationClosed {
        /// Event
        event_id: EventId,
    },

    /// A resize would drop below the slots already reserved
    #[error("capacity {requested} is below {reserved} reserved slots")]
    BelowReserved {
        /// Requested capacity
        requested: u32,
        /// Currently reserved
        reserved: u32,
    },

    /// The participant already left feedback for the event
    #[error("feedback already recorded for participant {participant_id}")]
    DuplicateFeedback {
        /// Participant
        participant_id: UserId,
    },

    /// Backend unavailable
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Shorthand for [`RepositoryError::NotFound`].
    pub fn not_found(entity: Entity, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<RepositoryError> for LifecycleError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { entity, id } => Self::NotFound { entity, id },
            RepositoryError::CapacityExhausted { event_id, capacity } => Self::CapacityExceeded {
                event_id,
                capacity: capacity.value(),
            },
            RepositoryError::DuplicateActive {
                event_id,
                participant_id,
            } => Self::DuplicateRegistration {
                event_id,
                participant_id,
            },
            RepositoryError::OutOfStock { item } => Self::OutOfStock { item },
            RepositoryError::RegistrationClosed { event_id } => Self::WindowClosed { event_id },
            RepositoryError::BelowReserved {
                requested,
                reserved,
            } => Self::CapacityBelowCommitted {
                requested,
                committed: reserved,
            },
            RepositoryError::DuplicateFeedback { .. } => {
                Self::Validation("feedback already submitted for this event".to_string())
            },
            error @ (RepositoryError::VersionConflict { .. }
            | RepositoryError::Contended
            | RepositoryError::Unavailable(_)) => Self::Transient(error.to_string()),
        }
    }
}

/// Everything `reserve_slot` needs to admit one registration.
#[derive(Clone, Debug)]
pub struct ReservationRequest {
    /// The pending registration to insert; its event, participant and
    /// merchandise drive the checks
    pub registration: Registration,
    /// Time at which the window is re-checked
    pub now: DateTime<Utc>,
}

/// One atomic write of a registration together with the ticket and payment
/// proof that change with it.
#[derive(Clone, Debug)]
pub struct RegistrationWrite {
    /// New registration state
    pub registration: Registration,
    /// Version the writer loaded
    pub expected: Version,
    /// Ticket to insert or replace
    pub ticket: Option<Ticket>,
    /// Payment proof to insert or replace
    pub proof: Option<PaymentProof>,
    /// Payment proof to delete
    pub discard_proof: Option<ProofId>,
    /// Slot and merchandise to hand back to the event's ledger
    pub release: Option<Vec<MerchSelection>>,
}

impl RegistrationWrite {
    /// A write of the registration alone.
    #[must_use]
    pub const fn new(registration: Registration, expected: Version) -> Self {
        Self {
            registration,
            expected,
            ticket: None,
            proof: None,
            discard_proof: None,
            release: None,
        }
    }

    /// Also write `ticket`.
    #[must_use]
    pub fn with_ticket(mut self, ticket: Option<Ticket>) -> Self {
        self.ticket = ticket;
        self
    }

    /// Also write `proof`.
    #[must_use]
    pub fn with_proof(mut self, proof: Option<PaymentProof>) -> Self {
        self.proof = proof;
        self
    }

    /// Also delete the proof `id`.
    #[must_use]
    pub const fn discarding(mut self, id: Option<ProofId>) -> Self {
        self.discard_proof = id;
        self
    }

    /// Also return one slot and `merchandise` to the ledger.
    #[must_use]
    pub fn releasing(mut self, merchandise: Vec<MerchSelection>) -> Self {
        self.release = Some(merchandise);
        self
    }
}

/// Storage used by the engine.
///
/// Implementations must make each method atomic. Methods return boxed futures
/// so the trait stays dyn-compatible (`Arc<dyn Persistence>`).
pub trait Persistence: Send + Sync {
    /// Store a new event and open its slot ledger.
    fn insert_event(&self, event: Event) -> RepoFuture<'_, Version>;

    /// Load an event with its version.
    fn load_event(&self, id: EventId) -> RepoFuture<'_, Versioned<Event>>;

    /// Replace an event if it is still at `expected`.
    ///
    /// When the event's capacity changed, the ledger is resized in the same
    /// step; [`RepositoryError::BelowReserved`] leaves both untouched.
    fn update_event(&self, event: Event, expected: Version) -> RepoFuture<'_, Version>;

    /// All events.
    fn list_events(&self) -> RepoFuture<'_, Vec<Event>>;

    /// Current slot ledger of an event.
    fn ledger(&self, event_id: EventId) -> RepoFuture<'_, SlotLedger>;

    /// Atomically admit a registration.
    ///
    /// Re-checks that the event is published with its window open at
    /// `request.now`, that the participant holds no other active registration,
    /// that a slot is free and that the merchandise is in stock. Only then
    /// takes the slot and stock and inserts the registration at
    /// [`Version::INITIAL`].
    fn reserve_slot(&self, request: ReservationRequest) -> RepoFuture<'_, Version>;

    /// Load a registration with its version.
    fn load_registration(&self, id: RegistrationId) -> RepoFuture<'_, Versioned<Registration>>;

    /// Compare-and-swap the registration and apply the attached ticket,
    /// proof and slot release in the same step. A failed write changes
    /// nothing.
    fn commit_registration(&self, write: RegistrationWrite) -> RepoFuture<'_, Version>;

    /// All registrations of an event, in creation order.
    fn registrations_for_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Registration>>;

    /// Load a payment proof.
    fn load_proof(&self, id: ProofId) -> RepoFuture<'_, PaymentProof>;

    /// Load a ticket.
    fn load_ticket(&self, id: TicketId) -> RepoFuture<'_, Ticket>;

    /// Record feedback; one entry per participant and event.
    fn insert_feedback(&self, feedback: Feedback) -> RepoFuture<'_, ()>;

    /// Feedback for an event, in submission order.
    fn feedback_for_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Feedback>>;
}
