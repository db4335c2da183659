//! # Campus Runtime
//!
//! The imperative shell around the reducers in `campus-core`:
//!
//! - [`effects::EffectTracker`]: runs the effects a reducer returned, after the
//!   caller has persisted the new state
//! - [`locks::RecordLocks`]: one async mutex per record key, so updates to the
//!   same event or registration are serialized while unrelated records proceed
//!   in parallel
//! - [`retry`]: exponential backoff for transient failures

pub mod effects;
pub mod locks;
pub mod retry;

pub use effects::{ActionSink, EffectTracker};
pub use locks::{RecordGuard, RecordLocks};
pub use retry::{RetryPolicy, retry_with_predicate};
