//! Record versions for optimistic concurrency.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of a persisted record.
///
/// Every successful write bumps the version by one. Writers pass the version
/// they read; the store rejects the write if someone else got there first.
///
/// ```
/// use campus_core::version::Version;
///
/// let v = Version::INITIAL;
/// assert_eq!(v.next(), Version::new(1));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a freshly inserted record.
    pub const INITIAL: Self = Self(0);

    /// Create a version from a raw number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version after one more write.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A record together with the version it was read at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The record
    pub record: T,
    /// Version the record was read at
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Pair a record with its version.
    #[must_use]
    pub const fn new(record: T, version: Version) -> Self {
        Self { record, version }
    }

    /// Drop the version.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_order_and_display() {
        let v = Version::new(4);
        assert!(v < v.next());
        assert_eq!(v.to_string(), "v4");
        assert_eq!(Version::INITIAL.value(), 0);
    }
}
