//! Campus Events - event and registration lifecycle engine
//!
//! Runs a campus event from draft to completion and every registration under
//! it from the first slot reservation to the venue scan:
//!
//! - **Event lifecycle**: draft, published, closed, completed, or cancelled
//!   with a cascade over its registrations
//! - **Capacity ledger**: atomic slot reservation, no overbooking under
//!   concurrent registrations
//! - **Payment gate**: manual review of payment proofs before a paid
//!   registration is confirmed
//! - **Tickets**: high-entropy ids in tamper-evident tokens, single use at
//!   check-in
//!
//! # Architecture
//!
//! ```text
//!            ┌────────────────────────────────────────────┐
//!  command → │ LifecycleEngine                            │
//!            │  locks → load → reducer → CAS write        │
//!            │                      │                     │
//!            │                      └→ effects (notify)   │
//!            └───────┬──────────────────────┬─────────────┘
//!                    │                      │
//!             ┌──────▼──────┐        ┌──────▼──────┐
//!             │ Persistence │        │  Notifier   │
//!             │ (slot ledger│        │ (external)  │
//!             │  + records) │        └─────────────┘
//!             └─────────────┘
//! ```
//!
//! The reducers in [`aggregates`] hold every transition table and guard; the
//! engine in [`app`] only loads, persists and serializes.
//!
//! # Example
//!
//! ```
//! use campus_lifecycle::{Config, LifecycleEngine};
//! use campus_lifecycle::types::{Actor, Capacity, EventDraft, RegistrationWindow, UserId};
//! use chrono::{Duration, Utc};
//!
//! # tokio_test::block_on(async {
//! let engine = LifecycleEngine::from_config(&Config::default());
//! let organizer = Actor::organizer(UserId::new());
//! let now = Utc::now();
//! let window = RegistrationWindow::new(now - Duration::hours(1), now + Duration::days(1))?;
//!
//! let draft = EventDraft::new("Open Mic", now + Duration::days(3))
//!     .with_capacity(Capacity::new(40))
//!     .with_window(window);
//! let event = engine.create_event(organizer, draft).await?;
//! engine.publish_event(organizer, event.id).await?;
//!
//! let registration = engine
//!     .register(Actor::participant(UserId::new()), event.id, Vec::new())
//!     .await?;
//! assert!(registration.ticket_id.is_some());
//! # Ok::<(), campus_lifecycle::LifecycleError>(())
//! # }).expect("open mic scenario");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod app;
pub mod capacity;
pub mod config;
pub mod error;
pub mod metrics;
pub mod notification;
pub mod persistence;
pub mod ticket_codec;
pub mod types;
pub mod verification;

#[cfg(feature = "test-utils")]
pub mod mocks;

pub use app::LifecycleEngine;
pub use config::Config;
pub use error::{LifecycleError, Result};
pub use notification::{Notifier, TicketNotice, TracingNotifier};
pub use persistence::{InMemoryPersistence, Persistence};
pub use ticket_codec::TicketCodec;
pub use verification::{CheckInReceipt, VerificationService};
