//! Environment traits injected into reducers.

use chrono::{DateTime, Utc};

/// Time source.
///
/// Reducers never call `Utc::now()` directly. Production code injects
/// [`SystemClock`]; tests inject a fixed or manually advanced clock.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
