//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]
#![allow(clippy::expect_used)]

use campus_core::environment::Clock;
use campus_lifecycle::config::Config;
use campus_lifecycle::mocks::RecordingNotifier;
use campus_lifecycle::types::{
    Actor, Capacity, Event, EventDraft, MerchOption, Money, Registration, RegistrationWindow,
    UserId,
};
use campus_lifecycle::{InMemoryPersistence, LifecycleEngine, Notifier, Persistence};
use campus_testing::test_clock;
use chrono::Duration;
use std::sync::Arc;

/// An engine over fresh storage with the given collaborators.
pub struct Harness {
    pub engine: Arc<LifecycleEngine>,
    pub notifier: RecordingNotifier,
    pub organizer: Actor,
}

impl Harness {
    /// Fixed clock, recording notifier, fast reservation retries.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(test_clock()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let notifier = RecordingNotifier::new();
        let engine = engine_with(
            Arc::new(InMemoryPersistence::new()),
            Arc::new(notifier.clone()),
            clock,
            fast_config(),
        );
        Self {
            engine: Arc::new(engine),
            notifier,
            organizer: Actor::organizer(UserId::new()),
        }
    }

    /// Create and publish an event with the window open around the test clock.
    pub async fn published_event(&self, capacity: u32) -> Event {
        self.published(draft(capacity)).await
    }

    /// Same, with a priced hoodie on offer.
    pub async fn event_with_merch(&self, capacity: u32) -> Event {
        self.published(
            draft(capacity).with_merch(MerchOption::new("hoodie", Money::from_cents(2_500), 50)),
        )
        .await
    }

    pub async fn published(&self, draft: EventDraft) -> Event {
        let event = self
            .engine
            .create_event(self.organizer, draft)
            .await
            .expect("create event");
        self.engine
            .publish_event(self.organizer, event.id)
            .await
            .expect("publish event")
    }

    /// Register a fresh participant without merchandise.
    pub async fn register_someone(&self, event: &Event) -> Registration {
        self.engine
            .register(Actor::participant(UserId::new()), event.id, Vec::new())
            .await
            .expect("register")
    }

    /// Token of a confirmed registration's ticket.
    pub async fn token_of(&self, registration: &Registration) -> String {
        let ticket_id = registration.ticket_id.expect("ticket issued");
        self.engine.ticket(ticket_id).await.expect("ticket").token
    }
}

pub fn engine_with(
    persistence: Arc<dyn Persistence>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: Config,
) -> LifecycleEngine {
    LifecycleEngine::new(&config, persistence, notifier, clock)
}

pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.tickets.signing_secret = Some("integration-test-secret".to_string());
    config.reservations.retry_delay_ms = 1;
    config.notifications.timeout_secs = 1;
    config
}

pub fn draft(capacity: u32) -> EventDraft {
    let now = test_clock().now();
    let window = RegistrationWindow::new(now - Duration::hours(1), now + Duration::hours(2))
        .expect("window");
    EventDraft::new("Intro to Rust Workshop", now + Duration::days(2))
        .with_capacity(Capacity::new(capacity))
        .with_window(window)
}
