//! # Campus Testing
//!
//! Helpers for testing reducers and services of the campus events engine:
//!
//! - [`FixedClock`] and [`ManualClock`] for deterministic time
//! - [`ReducerTest`], a Given/When/Then harness for reducers
//! - [`assertions`] over returned effects
//!
//! ```
//! use campus_testing::{ManualClock, test_clock};
//! use campus_core::environment::Clock;
//! use chrono::Duration;
//!
//! let clock = ManualClock::starting_at(test_clock().now());
//! let before = clock.now();
//! clock.advance(Duration::hours(2));
//! assert_eq!(clock.now() - before, Duration::hours(2));
//! ```


pub use reducer_test::{ReducerTest, assertions};

/// Deterministic clocks.
pub mod mocks {
    use campus_core::environment::Clock;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::{Mutex, PoisonError};

    /// A clock frozen at one instant.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a clock that always returns `time`.
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// A clock that only moves when told to.
    ///
    /// Used to step across registration windows inside one test.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Start the clock at `time`.
        #[must_use]
        pub const fn starting_at(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward (or backward, for a negative duration).
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time.
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// 2025-09-01 09:00:00 UTC, the start of a semester.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            Utc.with_ymd_and_hms(2025, 9, 1, 9, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }
}

pub use mocks::{FixedClock, ManualClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::environment::Clock;
    use chrono::Duration;

    #[test]
    fn fixed_clock_does_not_move() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_advances_and_jumps() {
        let start = test_clock().now();
        let clock = ManualClock::starting_at(start);

        clock.advance(Duration::minutes(30));
        assert_eq!(clock.now(), start + Duration::minutes(30));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
