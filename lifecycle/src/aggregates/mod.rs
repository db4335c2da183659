//! Reducers for the lifecycle aggregates.
//!
//! Each aggregate works on one loaded record plus the read-only context it
//! needs (a registration sees its event, a payment proof sees its
//! registration and event). Commands are validated against the record's
//! transition table; a rejected command leaves the record untouched and
//! stores the error in `last_error`.

pub mod event;
pub mod payment;
pub mod registration;

pub use event::{EventAction, EventEnvironment, EventReducer, EventState};
pub use payment::{PaymentAction, PaymentEnvironment, PaymentReducer, PaymentState};
pub use registration::{
    RegistrationAction, RegistrationEnvironment, RegistrationReducer, RegistrationState,
};

use crate::error::{Entity, LifecycleError, Result};
use crate::types::{Actor, Event};

/// Owning organizer or admin, else `Unauthorized`.
pub(crate) fn ensure_manager(event: &Event, actor: &Actor, operation: &str) -> Result<()> {
    if event.is_managed_by(actor) {
        Ok(())
    } else {
        Err(LifecycleError::Unauthorized(format!(
            "user {} may not {operation} for event {}",
            actor.user_id, event.id
        )))
    }
}

/// The context record a command needs, or `NotFound`.
pub(crate) fn loaded<'a, T>(record: Option<&'a T>, entity: Entity) -> Result<&'a T> {
    record.ok_or_else(|| LifecycleError::not_found(entity, "<not loaded>"))
}
