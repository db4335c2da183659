//! Test doubles for the engine's collaborators.
//!
//! Enabled by the `test-utils` feature (on by default).

use crate::capacity::SlotLedger;
use crate::notification::{NotificationError, Notifier, NotifyFuture, TicketNotice};
use crate::persistence::{
    Persistence, RegistrationWrite, RepoFuture, RepositoryError, ReservationRequest,
};
use crate::types::{
    Event, EventId, Feedback, PaymentProof, ProofId, Registration, RegistrationId, Ticket,
    TicketId,
};
use campus_core::version::{Version, Versioned};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Notifier that records every notice it is handed.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<TicketNotice>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices delivered so far, in order.
    #[must_use]
    pub fn notices(&self) -> Vec<TicketNotice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: TicketNotice) -> NotifyFuture<'_> {
        Box::pin(async move {
            self.notices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(notice);
            Ok(())
        })
    }
}

/// Notifier whose deliveries always fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notice: TicketNotice) -> NotifyFuture<'_> {
        Box::pin(async { Err(NotificationError::Delivery("mail relay unreachable".to_string())) })
    }
}

/// Notifier that never answers, so every dispatch runs into the timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalledNotifier;

impl Notifier for StalledNotifier {
    fn notify(&self, _notice: TicketNotice) -> NotifyFuture<'_> {
        Box::pin(futures::future::pending())
    }
}

/// Wraps a store and reports the first `n` slot reservations as contended.
pub struct ContendedPersistence {
    inner: Arc<dyn Persistence>,
    remaining: AtomicUsize,
    attempts: AtomicUsize,
}

impl ContendedPersistence {
    /// Fail the first `contended` calls to `reserve_slot`.
    #[must_use]
    pub fn new(inner: Arc<dyn Persistence>, contended: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(contended),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Total `reserve_slot` calls seen.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ContendedPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContendedPersistence")
            .field("remaining", &self.remaining)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

impl Persistence for ContendedPersistence {
    fn insert_event(&self, event: Event) -> RepoFuture<'_, Version> {
        self.inner.insert_event(event)
    }

    fn load_event(&self, id: EventId) -> RepoFuture<'_, Versioned<Event>> {
        self.inner.load_event(id)
    }

    fn update_event(&self, event: Event, expected: Version) -> RepoFuture<'_, Version> {
        self.inner.update_event(event, expected)
    }

    fn list_events(&self) -> RepoFuture<'_, Vec<Event>> {
        self.inner.list_events()
    }

    fn ledger(&self, event_id: EventId) -> RepoFuture<'_, SlotLedger> {
        self.inner.ledger(event_id)
    }

    fn reserve_slot(&self, request: ReservationRequest) -> RepoFuture<'_, Version> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let contended = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if contended {
            Box::pin(async { Err(RepositoryError::Contended) })
        } else {
            self.inner.reserve_slot(request)
        }
    }

    fn load_registration(&self, id: RegistrationId) -> RepoFuture<'_, Versioned<Registration>> {
        self.inner.load_registration(id)
    }

    fn commit_registration(&self, write: RegistrationWrite) -> RepoFuture<'_, Version> {
        self.inner.commit_registration(write)
    }

    fn registrations_for_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Registration>> {
        self.inner.registrations_for_event(event_id)
    }

    fn load_proof(&self, id: ProofId) -> RepoFuture<'_, PaymentProof> {
        self.inner.load_proof(id)
    }

    fn load_ticket(&self, id: TicketId) -> RepoFuture<'_, Ticket> {
        self.inner.load_ticket(id)
    }

    fn insert_feedback(&self, feedback: Feedback) -> RepoFuture<'_, ()> {
        self.inner.insert_feedback(feedback)
    }

    fn feedback_for_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Feedback>> {
        self.inner.feedback_for_event(event_id)
    }
}

/// Wraps a store and fails registration commits and event updates with
/// [`RepositoryError::Unavailable`] on demand.
pub struct FlakyPersistence {
    inner: Arc<dyn Persistence>,
    failing: AtomicUsize,
}

impl FlakyPersistence {
    /// Pass everything through until [`FlakyPersistence::fail_next_writes`].
    #[must_use]
    pub fn new(inner: Arc<dyn Persistence>) -> Self {
        Self {
            inner,
            failing: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` writes.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing.store(n, Ordering::SeqCst);
    }

    fn take_failure(&self) -> bool {
        self.failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl std::fmt::Debug for FlakyPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyPersistence")
            .field("failing", &self.failing)
            .finish_non_exhaustive()
    }
}

impl Persistence for FlakyPersistence {
    fn insert_event(&self, event: Event) -> RepoFuture<'_, Version> {
        self.inner.insert_event(event)
    }

    fn load_event(&self, id: EventId) -> RepoFuture<'_, Versioned<Event>> {
        self.inner.load_event(id)
    }

    fn update_event(&self, event: Event, expected: Version) -> RepoFuture<'_, Version> {
        if self.take_failure() {
            return Box::pin(async {
                Err(RepositoryError::Unavailable("write dropped".to_string()))
            });
        }
        self.inner.update_event(event, expected)
    }

    fn list_events(&self) -> RepoFuture<'_, Vec<Event>> {
        self.inner.list_events()
    }

    fn ledger(&self, event_id: EventId) -> RepoFuture<'_, SlotLedger> {
        self.inner.ledger(event_id)
    }

    fn reserve_slot(&self, request: ReservationRequest) -> RepoFuture<'_, Version> {
        self.inner.reserve_slot(request)
    }

    fn load_registration(&self, id: RegistrationId) -> RepoFuture<'_, Versioned<Registration>> {
        self.inner.load_registration(id)
    }

    fn commit_registration(&self, write: RegistrationWrite) -> RepoFuture<'_, Version> {
        if self.take_failure() {
            return Box::pin(async {
                Err(RepositoryError::Unavailable("write dropped".to_string()))
            });
        }
        self.inner.commit_registration(write)
    }

    fn registrations_for_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Registration>> {
        self.inner.registrations_for_event(event_id)
    }

    fn load_proof(&self, id: ProofId) -> RepoFuture<'_, PaymentProof> {
        self.inner.load_proof(id)
    }

    fn load_ticket(&self, id: TicketId) -> RepoFuture<'_, Ticket> {
        self.inner.load_ticket(id)
    }

    fn insert_feedback(&self, feedback: Feedback) -> RepoFuture<'_, ()> {
        self.inner.insert_feedback(feedback)
    }

    fn feedback_for_event(&self, event_id: EventId) -> RepoFuture<'_, Vec<Feedback>> {
        self.inner.feedback_for_event(event_id)
    }
}
