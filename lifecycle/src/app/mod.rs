//! The lifecycle engine: command handlers around the reducers.
//!
//! Each operation follows the same steps:
//! 1. Take the record locks (event before registration)
//! 2. Load the current records with their versions
//! 3. Run the reducer with the command
//! 4. Write the result with a compare-and-swap on the loaded version
//! 5. Hand the reducer's effects to the [`EffectTracker`]
//!
//! A lost compare-and-swap is retried once against fresh state before it
//! surfaces as [`LifecycleError::Transient`].

mod events;
mod feedback;
mod payments;
mod registrations;

use crate::aggregates::{
    EventEnvironment, EventReducer, PaymentEnvironment, PaymentReducer, RegistrationAction,
    RegistrationEnvironment, RegistrationReducer,
};
use crate::capacity::CapacityLedger;
use crate::config::Config;
use crate::error::{LifecycleError, Result};
use crate::metrics;
use crate::notification::{Notifier, TracingNotifier};
use crate::persistence::{InMemoryPersistence, Persistence};
use crate::ticket_codec::TicketCodec;
use crate::types::{
    Event, EventId, EventSummary, Registration, RegistrationId, RegistrationStatus, Ticket,
    TicketId,
};
use campus_core::environment::{Clock, SystemClock};
use campus_runtime::{ActionSink, EffectTracker, RecordLocks, RetryPolicy, retry_with_predicate};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Campus event and registration lifecycle engine.
///
/// Safe to share across tasks (`Arc<LifecycleEngine>`); every operation takes
/// `&self`.
pub struct LifecycleEngine {
    persistence: Arc<dyn Persistence>,
    ledger: CapacityLedger,
    event_locks: RecordLocks<EventId>,
    registration_locks: RecordLocks<RegistrationId>,
    clock: Arc<dyn Clock>,
    codec: TicketCodec,
    event_reducer: EventReducer,
    event_env: EventEnvironment,
    registration_reducer: RegistrationReducer,
    registration_env: RegistrationEnvironment,
    payment_reducer: PaymentReducer,
    payment_env: PaymentEnvironment,
    effects: EffectTracker,
    cas_retry: RetryPolicy,
}

impl LifecycleEngine {
    /// Wire the engine from its collaborators.
    #[must_use]
    pub fn new(
        config: &Config,
        persistence: Arc<dyn Persistence>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let codec = match config.tickets.signing_secret.as_deref() {
            Some(secret) => TicketCodec::new(secret),
            None => {
                tracing::warn!(
                    "TICKET_SIGNING_SECRET not set; tickets will not verify after a restart"
                );
                TicketCodec::with_random_secret()
            },
        };

        let reservation_retry = RetryPolicy::builder()
            .max_retries(config.reservations.max_retries)
            .initial_delay(config.reservations.retry_delay())
            .max_delay(config.reservations.retry_delay() * 8)
            .build();
        let cas_retry = RetryPolicy::builder()
            .max_retries(1)
            .initial_delay(Duration::ZERO)
            .build();

        Self {
            ledger: CapacityLedger::new(Arc::clone(&persistence), reservation_retry),
            persistence,
            event_locks: RecordLocks::new(),
            registration_locks: RecordLocks::new(),
            event_env: EventEnvironment::new(Arc::clone(&clock)),
            registration_env: RegistrationEnvironment::new(
                Arc::clone(&clock),
                codec.clone(),
                notifier,
                config.notifications.timeout(),
            ),
            payment_env: PaymentEnvironment::new(Arc::clone(&clock)),
            clock,
            codec,
            event_reducer: EventReducer::new(),
            registration_reducer: RegistrationReducer::new(),
            payment_reducer: PaymentReducer::new(),
            effects: EffectTracker::new(),
            cas_retry,
        }
    }

    /// An engine over in-memory storage, the system clock and the logging
    /// notifier.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryPersistence::new()),
            Arc::new(TracingNotifier),
            Arc::new(SystemClock),
        )
    }

    /// Codec that signs this engine's tickets.
    #[must_use]
    pub const fn codec(&self) -> &TicketCodec {
        &self.codec
    }

    /// Wait for outstanding ticket notifications.
    pub async fn wait_for_notifications(&self) {
        self.effects.wait_idle().await;
    }

    /// Notification batches still in flight.
    #[must_use]
    pub fn pending_notifications(&self) -> usize {
        self.effects.pending()
    }

    // ========== Queries ==========

    /// Load an event.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Transient`.
    pub async fn event(&self, event_id: EventId) -> Result<Event> {
        Ok(self.persistence.load_event(event_id).await?.record)
    }

    /// All events.
    ///
    /// # Errors
    ///
    /// `Transient`.
    pub async fn events(&self) -> Result<Vec<Event>> {
        Ok(self.persistence.list_events().await?)
    }

    /// Load a registration.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Transient`.
    pub async fn registration(&self, registration_id: RegistrationId) -> Result<Registration> {
        Ok(self.persistence.load_registration(registration_id).await?.record)
    }

    /// Load a ticket.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Transient`.
    pub async fn ticket(&self, ticket_id: TicketId) -> Result<Ticket> {
        Ok(self.persistence.load_ticket(ticket_id).await?)
    }

    /// Every registration of an event, in creation order.
    ///
    /// # Errors
    ///
    /// `Transient`.
    pub async fn registrations_for_event(&self, event_id: EventId) -> Result<Vec<Registration>> {
        Ok(self.persistence.registrations_for_event(event_id).await?)
    }

    /// Registration counts and slot usage of an event.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Transient`.
    pub async fn event_summary(&self, event_id: EventId) -> Result<EventSummary> {
        let ledger = self.ledger.snapshot(event_id).await?;
        let registrations = self.persistence.registrations_for_event(event_id).await?;

        let mut summary = EventSummary {
            capacity: ledger.capacity(),
            reserved: ledger.reserved(),
            remaining: ledger.remaining(),
            ..EventSummary::default()
        };
        for registration in &registrations {
            let count = match registration.status {
                RegistrationStatus::Pending => &mut summary.pending,
                RegistrationStatus::Confirmed => &mut summary.confirmed,
                RegistrationStatus::CheckedIn => &mut summary.checked_in,
                RegistrationStatus::Cancelled => &mut summary.cancelled,
            };
            *count += 1;
        }
        Ok(summary)
    }

    // ========== Shared plumbing ==========

    /// Run `operation` and retry it once with fresh state when a
    /// compare-and-swap was lost.
    pub(crate) async fn retrying<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_with_predicate(self.cas_retry.clone(), operation, |error| {
            matches!(error, LifecycleError::Transient(_))
        })
        .await
    }

    /// Hand confirmation effects to the tracker.
    fn dispatch<I>(&self, effects: I)
    where
        I: IntoIterator<Item = campus_core::effect::Effect<RegistrationAction>>,
    {
        self.effects.spawn(effects, notification_sink());
    }
}

/// Logs and counts the outcome of each notification.
fn notification_sink() -> ActionSink<RegistrationAction> {
    Arc::new(|action| match action {
        RegistrationAction::NotificationSent { registration_id } => {
            metrics::record_notification("sent");
            tracing::debug!(%registration_id, "Ticket notification delivered");
        },
        RegistrationAction::NotificationFailed {
            registration_id,
            error,
        } => {
            metrics::record_notification("failed");
            tracing::warn!(%registration_id, %error, "Ticket notification failed");
        },
        _ => {},
    })
}

impl std::fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("ledger", &self.ledger)
            .field("effects", &self.effects)
            .finish_non_exhaustive()
    }
}
