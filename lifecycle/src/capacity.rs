//! Capacity ledger.
//!
//! [`SlotLedger`] is the per-event counter of reserved slots and remaining
//! merchandise stock. The storage layer owns it and mutates it only inside
//! its atomic writes, next to the registration or event that moves it.
//! [`CapacityLedger`] is the engine-side service over reservations. It
//! retries contention and reports metrics.

use crate::error::{LifecycleError, Result};
use crate::metrics;
use crate::persistence::{Persistence, RepositoryError, ReservationRequest};
use crate::types::{Capacity, EventId, MerchSelection};
use campus_core::version::Version;
use campus_runtime::{RetryPolicy, retry_with_predicate};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Slots and stock for one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotLedger {
    event_id: EventId,
    capacity: Capacity,
    reserved: u32,
    stock: BTreeMap<String, u32>,
}

impl SlotLedger {
    /// An empty ledger.
    #[must_use]
    pub fn new(event_id: EventId, capacity: Capacity, stock: BTreeMap<String, u32>) -> Self {
        Self {
            event_id,
            capacity,
            reserved: 0,
            stock,
        }
    }

    /// Event this ledger belongs to
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Capacity in force
    #[must_use]
    pub const fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Slots currently held by active registrations
    #[must_use]
    pub const fn reserved(&self) -> u32 {
        self.reserved
    }

    /// Free slots, or `None` when unlimited
    #[must_use]
    pub const fn remaining(&self) -> Option<u32> {
        if self.capacity.is_unlimited() {
            None
        } else {
            Some(self.capacity.value().saturating_sub(self.reserved))
        }
    }

    /// Units left of a merchandise item
    #[must_use]
    pub fn stock(&self, item: &str) -> Option<u32> {
        self.stock.get(item).copied()
    }

    /// Take one slot plus the selected merchandise, or nothing at all.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::CapacityExhausted`] when no slot is free
    /// - [`RepositoryError::OutOfStock`] when an item is short
    pub fn try_reserve(&mut self, merchandise: &[MerchSelection]) -> Result<(), RepositoryError> {
        if !self.capacity.admits(self.reserved) {
            return Err(RepositoryError::CapacityExhausted {
                event_id: self.event_id,
                capacity: self.capacity,
            });
        }
        for item in merchandise {
            let available = self.stock.get(&item.name).copied().unwrap_or(0);
            if available < item.quantity {
                return Err(RepositoryError::OutOfStock {
                    item: item.name.clone(),
                });
            }
        }

        for item in merchandise {
            if let Some(units) = self.stock.get_mut(&item.name) {
                *units -= item.quantity;
            }
        }
        self.reserved += 1;
        Ok(())
    }

    /// Give back one slot and its merchandise.
    pub fn release(&mut self, merchandise: &[MerchSelection]) {
        self.reserved = self.reserved.saturating_sub(1);
        for item in merchandise {
            if let Some(units) = self.stock.get_mut(&item.name) {
                *units = units.saturating_add(item.quantity);
            }
        }
    }

    /// Change the capacity.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::BelowReserved`] when a finite capacity would drop
    /// below the slots already held.
    pub fn resize(&mut self, capacity: Capacity) -> Result<(), RepositoryError> {
        if !capacity.is_unlimited() && capacity.value() < self.reserved {
            return Err(RepositoryError::BelowReserved {
                requested: capacity.value(),
                reserved: self.reserved,
            });
        }
        self.capacity = capacity;
        Ok(())
    }
}

/// Reservation service over the storage ledger.
#[derive(Clone)]
pub struct CapacityLedger {
    persistence: Arc<dyn Persistence>,
    retry: RetryPolicy,
}

impl CapacityLedger {
    /// Retry contended reservations per `retry`.
    #[must_use]
    pub fn new(persistence: Arc<dyn Persistence>, retry: RetryPolicy) -> Self {
        Self { persistence, retry }
    }

    /// Reserve a slot and insert the registration in one storage step.
    ///
    /// Contention is retried transparently; once the retries run out the
    /// caller sees [`LifecycleError::CapacityExceeded`].
    ///
    /// # Errors
    ///
    /// `CapacityExceeded`, `DuplicateRegistration`, `OutOfStock`,
    /// `WindowClosed`, `NotFound` or `Transient`.
    pub async fn reserve(&self, request: ReservationRequest) -> Result<Version> {
        let event_id = request.registration.event_id;

        let outcome = retry_with_predicate(
            self.retry.clone(),
            || self.persistence.reserve_slot(request.clone()),
            |error| matches!(error, RepositoryError::Contended),
        )
        .await;

        match outcome {
            Ok(version) => {
                tracing::debug!(%event_id, "Slot reserved");
                Ok(version)
            },
            Err(RepositoryError::Contended) => {
                tracing::warn!(%event_id, "Reservation still contended after retries");
                metrics::record_capacity_rejection();
                let capacity = self
                    .persistence
                    .ledger(event_id)
                    .await
                    .map(|ledger| ledger.capacity().value())
                    .unwrap_or_default();
                Err(LifecycleError::CapacityExceeded { event_id, capacity })
            },
            Err(error @ RepositoryError::CapacityExhausted { .. }) => {
                tracing::debug!(%event_id, "Event full");
                metrics::record_capacity_rejection();
                Err(error.into())
            },
            Err(error) => Err(error.into()),
        }
    }

    /// Current ledger.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Transient`.
    pub async fn snapshot(&self, event_id: EventId) -> Result<SlotLedger> {
        Ok(self.persistence.ledger(event_id).await?)
    }
}

impl std::fmt::Debug for CapacityLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapacityLedger")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}
