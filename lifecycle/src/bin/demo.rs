//! Campus Events Demo
//!
//! Walks one event through its whole lifecycle against in-memory storage:
//! - Event creation and publishing
//! - A free and a paid registration filling the event
//! - Payment proof rejected, resubmitted and approved
//! - Venue check-in, including a second scan of the same ticket
//! - Completion and feedback
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --bin demo
//! ```
//!
//! The Prometheus scrape text is printed at exit.

use campus_lifecycle::metrics::register_lifecycle_metrics;
use campus_lifecycle::types::{
    Actor, ArtifactId, Capacity, EventDraft, MerchOption, MerchSelection, Money,
    RegistrationWindow, UserId,
};
use campus_lifecycle::{Config, LifecycleEngine, VerificationService};
use chrono::{Duration, Utc};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},campus_lifecycle=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prometheus = PrometheusBuilder::new().install_recorder()?;
    register_lifecycle_metrics();

    println!("\n============================================");
    println!("   Campus Events - Lifecycle Demo");
    println!("============================================\n");

    let engine = Arc::new(LifecycleEngine::from_config(&config));
    let scanner = VerificationService::new(Arc::clone(&engine));

    let organizer = Actor::organizer(UserId::new());
    let alice = Actor::participant(UserId::new());
    let bob = Actor::participant(UserId::new());
    let carol = Actor::participant(UserId::new());

    // Step 1: Create and publish the event
    println!("1. Creating \"Autumn Hackathon\" (2 slots, hoodie merch)...");
    let now = Utc::now();
    let draft = EventDraft::new("Autumn Hackathon", now + Duration::days(14))
        .with_capacity(Capacity::new(2))
        .with_window(RegistrationWindow::new(
            now - Duration::minutes(5),
            now + Duration::days(7),
        )?)
        .with_merch(MerchOption::new("hoodie", Money::from_cents(3_500), 10));
    let event = engine.create_event(organizer, draft).await?;
    engine.publish_event(organizer, event.id).await?;
    println!("   ✓ Event {} published\n", event.id);

    // Step 2: Free registration, confirmed straight away
    println!("2. Alice registers without merchandise...");
    let alice_registration = engine.register(alice, event.id, Vec::new()).await?;
    println!("   ✓ Status: {}\n", alice_registration.status);

    // Step 3: Paid registration goes through the payment gate
    println!("3. Bob registers with a hoodie (payment required)...");
    let bob_registration = engine
        .register(bob, event.id, vec![MerchSelection::new("hoodie", 1)])
        .await?;
    println!("   ✓ Status: {}", bob_registration.status);

    let proof = engine
        .submit_proof(bob, bob_registration.id, ArtifactId::new())
        .await?;
    engine.reject_proof(organizer, proof.id, "blurry image").await?;
    println!("   ✗ First proof rejected: blurry image");

    let proof = engine
        .submit_proof(bob, bob_registration.id, ArtifactId::new())
        .await?;
    let bob_registration = engine.approve_proof(organizer, proof.id).await?;
    println!(
        "   ✓ Second proof approved, status: {}\n",
        bob_registration.status
    );

    // Step 4: The event is full
    println!("4. Carol tries to register...");
    match engine.register(carol, event.id, Vec::new()).await {
        Ok(_) => println!("   ? Unexpectedly admitted"),
        Err(error) => println!("   ✗ {error}\n"),
    }

    // Step 5: Check-in at the venue
    println!("5. Scanning Alice's ticket twice...");
    let ticket_id = alice_registration
        .ticket_id
        .ok_or("alice has no ticket")?;
    let token = engine.ticket(ticket_id).await?.token;
    let receipt = scanner.verify(&token, organizer).await?;
    println!("   ✓ Admitted at {}", receipt.checked_in_at);
    if let Err(error) = scanner.verify(&token, organizer).await {
        println!("   ✗ Second scan: {error}\n");
    }

    // Step 6: Wrap up
    println!("6. Closing, completing and collecting feedback...");
    engine.close_registration(organizer, event.id).await?;
    engine.complete_event(organizer, event.id).await?;
    engine
        .submit_feedback(alice, event.id, 5, Some("Great mentors".to_string()))
        .await?;

    let summary = engine.event_summary(event.id).await?;
    println!(
        "   ✓ Capacity {}, reserved {}, confirmed {}, checked in {}",
        summary.capacity, summary.reserved, summary.confirmed, summary.checked_in
    );

    engine.wait_for_notifications().await;

    println!("\n============================================");
    println!("   Metrics");
    println!("============================================\n");
    println!("{}", prometheus.render());

    Ok(())
}
