//! Business metrics for the lifecycle engine.
//!
//! # Exported Metrics
//!
//! - `campus_events_total{status}` - Event lifecycle transitions by resulting status
//! - `campus_registrations_total{status}` - Registration transitions by resulting status
//! - `campus_tickets_issued_total` - Tickets issued on confirmation
//! - `campus_checkins_total{outcome}` - Venue scans by outcome
//! - `campus_payment_proofs_total{status}` - Payment proofs by review outcome
//! - `campus_capacity_rejections_total` - Reservations turned away for lack of slots
//! - `campus_notifications_total{outcome}` - Notification dispatches by outcome
//!
//! Without an installed recorder every call is a no-op.

use metrics::describe_counter;

/// Register descriptions for every metric. Call once at startup.
pub fn register_lifecycle_metrics() {
    describe_counter!(
        "campus_events_total",
        "Event lifecycle transitions by resulting status"
    );
    describe_counter!(
        "campus_registrations_total",
        "Registration transitions by resulting status (pending, confirmed, checked_in, cancelled)"
    );
    describe_counter!(
        "campus_tickets_issued_total",
        "Total number of tickets issued"
    );
    describe_counter!(
        "campus_checkins_total",
        "Ticket scans by outcome (admitted, already_used, invalid, malformed, unauthorized)"
    );
    describe_counter!(
        "campus_payment_proofs_total",
        "Payment proofs by status (submitted, approved, rejected, withdrawn)"
    );
    describe_counter!(
        "campus_capacity_rejections_total",
        "Reservations rejected because the event was full"
    );
    describe_counter!(
        "campus_notifications_total",
        "Notification dispatches by outcome (sent, failed)"
    );

    tracing::info!("Lifecycle metrics registered");
}

/// Record an event reaching `status`.
pub fn record_event_status(status: &'static str) {
    metrics::counter!("campus_events_total", "status" => status).increment(1);
}

/// Record a registration reaching `status`.
pub fn record_registration(status: &'static str) {
    metrics::counter!("campus_registrations_total", "status" => status).increment(1);
}

/// Record a ticket issued.
pub fn record_ticket_issued() {
    metrics::counter!("campus_tickets_issued_total").increment(1);
    tracing::debug!("Recorded ticket_issued metric");
}

/// Record a venue scan.
///
/// # Arguments
///
/// * `outcome` - `admitted`, `already_used`, `invalid`, `malformed` or `unauthorized`
pub fn record_check_in(outcome: &'static str) {
    metrics::counter!("campus_checkins_total", "outcome" => outcome).increment(1);
}

/// Record a payment proof event.
pub fn record_payment_proof(status: &'static str) {
    metrics::counter!("campus_payment_proofs_total", "status" => status).increment(1);
}

/// Record a reservation turned away.
pub fn record_capacity_rejection() {
    metrics::counter!("campus_capacity_rejections_total").increment(1);
}

/// Record a notification dispatch.
pub fn record_notification(outcome: &'static str) {
    metrics::counter!("campus_notifications_total", "outcome" => outcome).increment(1);
}
