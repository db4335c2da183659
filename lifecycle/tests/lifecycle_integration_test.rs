//! Event lifecycle integration tests.
//!
//! Event cancellation cascades, window expiry, venue check-in under
//! concurrent scans, and post-event feedback.
//!
//! Run with: `cargo test --test lifecycle_integration_test`

#![allow(clippy::expect_used)]

mod common;

use campus_core::environment::Clock;
use campus_lifecycle::types::{
    Actor, ArtifactId, EventStatus, Money, RegistrationStatus, RegistrationWindow,
    TicketStatus, UserId,
};
use campus_lifecycle::{LifecycleError, TicketCodec, VerificationService};
use campus_testing::{ManualClock, test_clock};
use chrono::Duration;
use common::{Harness, draft};
use futures::future::join_all;
use std::sync::Arc;

/// Cancelling an event cancels its registrations, voids their tickets and
/// frees every slot.
#[tokio::test]
async fn test_event_cancel_cascades() {
    let harness = Harness::new();
    let event = harness.published_event(10).await;
    let scanner = VerificationService::new(Arc::clone(&harness.engine));

    let mut tokens = Vec::new();
    for _ in 0..3 {
        let registration = harness.register_someone(&event).await;
        tokens.push(harness.token_of(&registration).await);
    }

    let cancelled = harness
        .engine
        .cancel_event(harness.organizer, event.id, "venue flooded")
        .await
        .expect("cancel event");
    assert_eq!(cancelled.status, EventStatus::Cancelled);

    let registrations = harness
        .engine
        .registrations_for_event(event.id)
        .await
        .expect("registrations");
    assert_eq!(registrations.len(), 3);
    for registration in &registrations {
        assert_eq!(registration.status, RegistrationStatus::Cancelled);
        let reason = registration
            .cancellation
            .as_ref()
            .map(|cancellation| cancellation.reason.as_str());
        assert_eq!(reason, Some("venue flooded"));

        let ticket_id = registration.ticket_id.expect("ticket kept for audit");
        let ticket = harness.engine.ticket(ticket_id).await.expect("ticket");
        assert!(matches!(ticket.status, TicketStatus::Void { .. }));
    }

    let summary = harness
        .engine
        .event_summary(event.id)
        .await
        .expect("summary");
    assert_eq!(summary.reserved, 0);
    assert_eq!(summary.cancelled, 3);

    for token in &tokens {
        assert!(matches!(
            scanner.verify(token, harness.organizer).await,
            Err(LifecycleError::TicketInvalid(_))
        ));
    }
}

/// Checked-in attendees keep their record; proofs under review are withdrawn.
#[tokio::test]
async fn test_event_cancel_spares_checked_in() {
    let harness = Harness::new();
    let event = harness
        .published(draft(10).with_price(Money::from_cents(800)))
        .await;
    let scanner = VerificationService::new(Arc::clone(&harness.engine));

    let early = Actor::participant(UserId::new());
    let paid = harness
        .engine
        .register(early, event.id, Vec::new())
        .await
        .expect("register");
    let proof = harness
        .engine
        .submit_proof(early, paid.id, ArtifactId::new())
        .await
        .expect("proof");
    let paid = harness
        .engine
        .approve_proof(harness.organizer, proof.id)
        .await
        .expect("approve");
    let token = harness.token_of(&paid).await;
    scanner
        .verify(&token, harness.organizer)
        .await
        .expect("check in");

    let late = Actor::participant(UserId::new());
    let waiting = harness
        .engine
        .register(late, event.id, Vec::new())
        .await
        .expect("register");
    let pending_proof = harness
        .engine
        .submit_proof(late, waiting.id, ArtifactId::new())
        .await
        .expect("proof");

    harness
        .engine
        .cancel_event(harness.organizer, event.id, "speaker ill")
        .await
        .expect("cancel event");

    let attended = harness.engine.registration(paid.id).await.expect("reload");
    assert_eq!(attended.status, RegistrationStatus::CheckedIn);
    let dropped = harness
        .engine
        .registration(waiting.id)
        .await
        .expect("reload");
    assert_eq!(dropped.status, RegistrationStatus::Cancelled);

    let summary = harness
        .engine
        .event_summary(event.id)
        .await
        .expect("summary");
    assert_eq!(summary.reserved, 1);
    assert_eq!(summary.checked_in, 1);

    assert!(matches!(
        harness
            .engine
            .approve_proof(harness.organizer, pending_proof.id)
            .await,
        Err(LifecycleError::InvalidStateTransition { .. })
    ));
}

/// Completed and cancelled events are terminal.
#[tokio::test]
async fn test_terminal_events_reject_transitions() {
    let harness = Harness::new();
    let event = harness.published_event(5).await;
    harness
        .engine
        .close_registration(harness.organizer, event.id)
        .await
        .expect("close");
    harness
        .engine
        .complete_event(harness.organizer, event.id)
        .await
        .expect("complete");

    assert!(matches!(
        harness
            .engine
            .cancel_event(harness.organizer, event.id, "too late")
            .await,
        Err(LifecycleError::InvalidStateTransition { .. })
    ));
    assert!(matches!(
        harness
            .engine
            .publish_event(harness.organizer, event.id)
            .await,
        Err(LifecycleError::InvalidStateTransition { .. })
    ));
    assert_eq!(
        harness.engine.event(event.id).await.expect("reload").status,
        EventStatus::Completed
    );
}

/// Registrations of a completed event are frozen and keep their slot.
#[tokio::test]
async fn test_cancel_after_completion_is_refused() {
    let harness = Harness::new();
    let event = harness.published_event(5).await;
    let student = Actor::participant(UserId::new());
    let registration = harness
        .engine
        .register(student, event.id, Vec::new())
        .await
        .expect("register");
    harness
        .engine
        .close_registration(harness.organizer, event.id)
        .await
        .expect("close");
    harness
        .engine
        .complete_event(harness.organizer, event.id)
        .await
        .expect("complete");

    assert!(matches!(
        harness
            .engine
            .cancel_registration(student, registration.id, "too late")
            .await,
        Err(LifecycleError::InvalidStateTransition { .. })
    ));
    assert!(matches!(
        harness
            .engine
            .cancel_registration(harness.organizer, registration.id, "too late")
            .await,
        Err(LifecycleError::InvalidStateTransition { .. })
    ));

    let reloaded = harness
        .engine
        .registration(registration.id)
        .await
        .expect("reload");
    assert_eq!(reloaded.status, RegistrationStatus::Confirmed);
    let summary = harness
        .engine
        .event_summary(event.id)
        .await
        .expect("summary");
    assert_eq!(summary.reserved, 1);
    assert_eq!(summary.confirmed, 1);
}

/// Only the owning organizer or an admin moves an event.
#[tokio::test]
async fn test_foreign_organizer_cannot_transition() {
    let harness = Harness::new();
    let event = harness.published_event(5).await;

    assert!(matches!(
        harness
            .engine
            .close_registration(Actor::organizer(UserId::new()), event.id)
            .await,
        Err(LifecycleError::Unauthorized(_))
    ));
    let closed = harness
        .engine
        .close_registration(Actor::admin(UserId::new()), event.id)
        .await
        .expect("admin closes");
    assert_eq!(closed.status, EventStatus::Closed);
}

/// Two scanners present the same ticket at once: one admits, one refuses.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_scan() {
    let harness = Harness::new();
    let event = harness.published_event(5).await;
    let registration = harness.register_someone(&event).await;
    let token = harness.token_of(&registration).await;
    let scanner = VerificationService::new(Arc::clone(&harness.engine));

    let scans = (0..2).map(|_| {
        let scanner = scanner.clone();
        let token = token.clone();
        let organizer = harness.organizer;
        tokio::spawn(async move { scanner.verify(&token, organizer).await })
    });
    let results: Vec<_> = join_all(scans)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|result| matches!(result, Err(LifecycleError::TicketAlreadyUsed { .. })))
            .count(),
        1
    );

    let reloaded = harness
        .engine
        .registration(registration.id)
        .await
        .expect("reload");
    assert_eq!(reloaded.status, RegistrationStatus::CheckedIn);
    assert!(reloaded.checked_in_at.is_some());
}

/// A ticket signed with another key never reaches storage.
#[tokio::test]
async fn test_foreign_signature_is_malformed() {
    let harness = Harness::new();
    let event = harness.published_event(5).await;
    let registration = harness.register_someone(&event).await;
    let ticket_id = registration.ticket_id.expect("ticket");

    let other = TicketCodec::new("some other secret");
    let forged = other.encode(ticket_id, event.id);
    let scanner = VerificationService::new(Arc::clone(&harness.engine));

    assert_eq!(
        scanner.verify(&forged, harness.organizer).await,
        Err(LifecycleError::MalformedToken)
    );
    assert_eq!(
        scanner.verify("tkt1.not-a-token", harness.organizer).await,
        Err(LifecycleError::MalformedToken)
    );
}

/// Registration is refused once the window passes, and the sweep closes the
/// event.
#[tokio::test]
async fn test_window_expiry_sweep() {
    let clock = Arc::new(ManualClock::starting_at(test_clock().now()));
    let harness = Harness::with_clock(clock.clone());
    let event = harness.published_event(5).await;
    harness.register_someone(&event).await;

    assert!(
        harness
            .engine
            .close_expired_windows()
            .await
            .expect("sweep")
            .is_empty()
    );

    clock.advance(Duration::hours(3));
    assert_eq!(
        harness
            .engine
            .register(Actor::participant(UserId::new()), event.id, Vec::new())
            .await,
        Err(LifecycleError::WindowClosed { event_id: event.id })
    );

    let closed = harness.engine.close_expired_windows().await.expect("sweep");
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, event.id);
    assert_eq!(closed[0].status, EventStatus::Closed);

    // Nothing left to sweep.
    assert!(
        harness
            .engine
            .close_expired_windows()
            .await
            .expect("sweep")
            .is_empty()
    );
}

/// Moving the window reopens registration before it has closed.
#[tokio::test]
async fn test_update_window_before_opening() {
    let clock = Arc::new(ManualClock::starting_at(test_clock().now()));
    let harness = Harness::with_clock(clock.clone());
    let now = clock.now();
    let later = RegistrationWindow::new(now + Duration::hours(1), now + Duration::hours(4))
        .expect("window");
    let event = harness.published(draft(5).with_window(later)).await;

    assert!(matches!(
        harness
            .engine
            .register(Actor::participant(UserId::new()), event.id, Vec::new())
            .await,
        Err(LifecycleError::WindowClosed { .. })
    ));

    let open_now = RegistrationWindow::new(now - Duration::minutes(1), now + Duration::hours(4))
        .expect("window");
    harness
        .engine
        .update_window(harness.organizer, event.id, open_now)
        .await
        .expect("update window");
    assert!(
        harness
            .engine
            .register(Actor::participant(UserId::new()), event.id, Vec::new())
            .await
            .is_ok()
    );
}

/// Feedback: completed events, checked-in attendees, once each.
#[tokio::test]
async fn test_feedback_rules() {
    let harness = Harness::new();
    let event = harness.published_event(5).await;
    let scanner = VerificationService::new(Arc::clone(&harness.engine));

    let attendee = Actor::participant(UserId::new());
    let registration = harness
        .engine
        .register(attendee, event.id, Vec::new())
        .await
        .expect("register");
    let no_show = Actor::participant(UserId::new());
    harness
        .engine
        .register(no_show, event.id, Vec::new())
        .await
        .expect("register");
    let token = harness.token_of(&registration).await;
    scanner
        .verify(&token, harness.organizer)
        .await
        .expect("check in");

    assert!(matches!(
        harness
            .engine
            .submit_feedback(attendee, event.id, 5, None)
            .await,
        Err(LifecycleError::InvalidStateTransition { .. })
    ));

    harness
        .engine
        .close_registration(harness.organizer, event.id)
        .await
        .expect("close");
    harness
        .engine
        .complete_event(harness.organizer, event.id)
        .await
        .expect("complete");

    assert!(matches!(
        harness
            .engine
            .submit_feedback(attendee, event.id, 6, None)
            .await,
        Err(LifecycleError::Validation(_))
    ));
    assert!(matches!(
        harness
            .engine
            .submit_feedback(no_show, event.id, 4, None)
            .await,
        Err(LifecycleError::Unauthorized(_))
    ));

    let feedback = harness
        .engine
        .submit_feedback(
            attendee,
            event.id,
            4,
            Some("Loved the live coding".to_string()),
        )
        .await
        .expect("feedback");
    assert_eq!(feedback.rating, 4);
    assert!(matches!(
        harness
            .engine
            .submit_feedback(attendee, event.id, 5, None)
            .await,
        Err(LifecycleError::Validation(_))
    ));

    let all = harness
        .engine
        .feedback_for_event(event.id)
        .await
        .expect("feedback");
    assert_eq!(all, vec![feedback]);
}
