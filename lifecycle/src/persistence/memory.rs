//! In-memory storage.

use super::{Persistence, RegistrationWrite, RepoFuture, RepositoryError, ReservationRequest};
use crate::capacity::SlotLedger;
use crate::error::Entity;
use crate::types::{
    Event, EventId, EventStatus, Feedback, PaymentProof, ProofId, Registration, RegistrationId,
    Ticket, TicketId,
};
use campus_core::version::{Version, Versioned};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Tables {
    events: HashMap<EventId, Versioned<Event>>,
    ledgers: HashMap<EventId, SlotLedger>,
    registrations: HashMap<RegistrationId, Versioned<Registration>>,
    // Creation order per event
    by_event: HashMap<EventId, Vec<RegistrationId>>,
    proofs: HashMap<ProofId, PaymentProof>,
    tickets: HashMap<TicketId, Ticket>,
    feedback: HashMap<EventId, Vec<Feedback>>,
}

impl Tables {
    fn ledger_mut(&mut self, event_id: EventId) -> Result<&mut SlotLedger, RepositoryError> {
        self.ledgers
            .get_mut(&event_id)
            .ok_or_else(|| RepositoryError::not_found(Entity::Event, event_id))
    }

    fn reserve(&mut self, request: ReservationRequest) -> Result<Version, RepositoryError> {
        let ReservationRequest { registration, now } = request;
        let event_id = registration.event_id;

        let event = &self
            .events
            .get(&event_id)
            .ok_or_else(|| RepositoryError::not_found(Entity::Event, event_id))?
            .record;
        let accepting = event.status == EventStatus::Published
            && event.window.is_some_and(|window| window.is_open_at(now));
        if !accepting {
            return Err(RepositoryError::RegistrationClosed { event_id });
        }

        let duplicate = self
            .by_event
            .get(&event_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.registrations.get(id))
            .any(|existing| {
                existing.record.participant_id == registration.participant_id
                    && existing.record.is_active()
            });
        if duplicate {
            return Err(RepositoryError::DuplicateActive {
                event_id,
                participant_id: registration.participant_id,
            });
        }

        self.ledger_mut(event_id)?
            .try_reserve(&registration.merchandise)?;

        self.by_event
            .entry(event_id)
            .or_default()
            .push(registration.id);
        self.registrations.insert(
            registration.id,
            Versioned::new(registration, Version::INITIAL),
        );
        Ok(Version::INITIAL)
    }

    fn commit(&mut self, write: RegistrationWrite) -> Result<Version, RepositoryError> {
        let RegistrationWrite {
            registration,
            expected,
            ticket,
            proof,
            discard_proof,
            release,
        } = write;

        let stored = self
            .registrations
            .get(&registration.id)
            .ok_or_else(|| RepositoryError::not_found(Entity::Registration, registration.id))?;
        if stored.version != expected {
            return Err(RepositoryError::VersionConflict {
                entity: Entity::Registration,
                id: registration.id.to_string(),
                expected,
            });
        }

        // Every check above; nothing below can fail.
        if let Some(merchandise) = release {
            self.ledger_mut(registration.event_id)?.release(&merchandise);
        }
        if let Some(id) = discard_proof {
            self.proofs.remove(&id);
        }
        if let Some(proof) = proof {
            self.proofs.insert(proof.id, proof);
        }
        if let Some(ticket) = ticket {
            self.tickets.insert(ticket.id, ticket);
        }

        let version = expected.next();
        self.registrations.insert(registration.id, Versioned::new(registration, version));
        Ok(version)
    }

    fn update_event(
        &mut self,
        event: Event,
        expected: Version,
    ) -> Result<Version, RepositoryError> {
        let stored = self
            .events
            .get(&event.id)
            .ok_or_else(|| RepositoryError::not_found(Entity::Event, event.id))?;
        if stored.version != expected {
            return Err(RepositoryError::VersionConflict {
                entity: Entity::Event,
                id: event.id.to_string(),
                expected,
            });
        }

        let capacity = event.effective_capacity();
        let ledger = self.ledger_mut(event.id)?;
        if ledger.capacity() != capacity {
            ledger.resize(capacity)?;
        }

        let version = expected.next();
        self.events.insert(event.id, Versioned::new(event, version));
        Ok(version)
    }
}

/// [`Persistence`] over hash maps behind one mutex.
///
/// Critical sections are short and never await, so a `std::sync::Mutex` is
/// enough.
#[derive(Default)]
pub struct InMemoryPersistence {
    tables: Mutex<Tables>,
}

impl InMemoryPersistence {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))?;
        f(&mut tables)
    }
}

impl std::fmt::Debug for InMemoryPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("InMemoryPersistence");
        if let Ok(tables) = self.tables.lock() {
            debug
                .field("events", &tables.events.len())
                .field("registrations", &tables.registrations.len());
        }
        debug.finish_non_exhaustive()
    }
}

impl Persistence for InMemoryPersistence {
    fn insert_event(&self, event: Event) -> RepoFuture<'_, Version> {
        let result = self.with_tables(|tables| {
            let ledger = SlotLedger::new(
                event.id,
                event.effective_capacity(),
                event.initial_stock(),
            );
            tables.ledgers.insert(event.id, ledger);
            tables
                .events
                .insert(event.id, Versioned::new(event, Version::INITIAL));
            Ok(Version::INITIAL)
        });
        Box::pin(async move { result })
    }

    fn load_event(&self, id: EventId) -> RepoFuture<'_, Versioned<Event>> {
        let result = self.with_tables(|tables| {
            tables
                .events
                .get(&id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found(Entity::Event, id))
        });
        Box::pin(async move { result })
    }

    fn update_event(&self, event: Event, expected: Version) -> RepoFuture<'_, Version> {
        let result = self.with_tables(|tables| tables.update_event(event, expected));
        Box::pin(async move { result })
    }

    fn list_events(&self) -> RepoFuture<'_, Vec<Event>> {
        let result = self.with_tables(|tables| {
            let mut events: Vec<_> = tables
                .events
                .values()
                .map(|stored| stored.record.clone())
                .collect();
            events.sort_by_key(|event| event.created_at);
            Ok(events)
        });
        Box::pin(async move { result })
    }

    fn ledger(&self, event_id: EventId) -> RepoFuture<'_, SlotLedger> {
        let result =
            self.with_tables(|tables| tables.ledger_mut(event_id).map(|ledger| ledger.clone()));
        Box::pin(async move { result })
    }

    fn reserve_slot(&self, request: ReservationRequest) -> RepoFuture<'_, Version> {
        let result = self.with_tables(|tables| tables.reserve(request));
        Box::pin(async move { result })
    }

    fn load_registration(&self, id: RegistrationId) -> RepoFuture<'_, Versioned<Registration>> {
        let result = self.with_tables(|tables| {
            tables
                .registrations
                .get(&id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found(Entity::Registration, id))
        });
        Box::pin(async move { result })
    }

    fn commit_registration(&self, write: RegistrationWrite) -> RepoFuture<'_, Version> {
        let result = self.with_tables(|tables| tables.commit(write));
        Box::pin(async move { result })
    }

    fn registrations_for_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Registration>> {
        let result = self.with_tables(|tables| {
            Ok(tables
                .by_event
                .get(&event_id)
                .into_iter()
                .flatten()
                .filter_map(|id| tables.registrations.get(id))
                .map(|stored| stored.record.clone())
                .collect())
        });
        Box::pin(async move { result })
    }

    fn load_proof(&self, id: ProofId) -> RepoFuture<'_, PaymentProof> {
        let result = self.with_tables(|tables| {
            tables
                .proofs
                .get(&id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found(Entity::PaymentProof, id))
        });
        Box::pin(async move { result })
    }

    fn load_ticket(&self, id: TicketId) -> RepoFuture<'_, Ticket> {
        let result = self.with_tables(|tables| {
            tables
                .tickets
                .get(&id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found(Entity::Ticket, id))
        });
        Box::pin(async move { result })
    }

    fn insert_feedback(&self, feedback: Feedback) -> RepoFuture<'_, ()> {
        let result = self.with_tables(|tables| {
            let entries = tables.feedback.entry(feedback.event_id).or_default();
            if entries
                .iter()
                .any(|existing| existing.participant_id == feedback.participant_id)
            {
                return Err(RepositoryError::DuplicateFeedback {
                    participant_id: feedback.participant_id,
                });
            }
            entries.push(feedback);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn feedback_for_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Feedback>> {
        let result = self.with_tables(|tables| {
            Ok(tables.feedback.get(&event_id).cloned().unwrap_or_default())
        });
        Box::pin(async move { result })
    }
}
