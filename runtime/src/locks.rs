//! Per-record async locks.
//!
//! Updates to one record (an event's capacity ledger, a registration's
//! lifecycle) must be mutually exclusive, while different records proceed in
//! parallel. `RecordLocks` keeps one `tokio::sync::Mutex` per key and drops the
//! entry again once nobody holds or waits for it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable<K> = Arc<Mutex<HashMap<K, Arc<AsyncMutex<()>>>>>;

/// Keyed async mutexes.
///
/// ```
/// use campus_runtime::RecordLocks;
///
/// # tokio_test::block_on(async {
/// let locks = RecordLocks::new();
/// let guard = locks.lock("event-1").await;
/// assert_eq!(locks.len(), 1);
/// drop(guard);
/// assert!(locks.is_empty());
/// # });
/// ```
pub struct RecordLocks<K> {
    table: LockTable<K>,
}

impl<K> RecordLocks<K>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: K) -> RecordGuard<K> {
        let mutex = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(key.clone()).or_default())
        };

        let guard = mutex.lock_owned().await;

        RecordGuard {
            key,
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of keys currently held or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// `true` when no key is held or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Default for RecordLocks<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for RecordLocks<K> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

/// Exclusive access to one record. Released on drop.
pub struct RecordGuard<K>
where
    K: Eq + Hash,
{
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    table: LockTable<K>,
}

impl<K> RecordGuard<K>
where
    K: Eq + Hash,
{
    /// The key this guard protects.
    pub const fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for RecordGuard<K>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        // Release first so the table holds the only remaining reference when idle.
        self.guard.take();

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            table.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_is_mutually_exclusive() {
        let locks = RecordLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let locks = locks.clone();
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                tokio::spawn(async move {
                    let _guard = locks.lock(1_u32).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            assert!(task.is_ok());
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = RecordLocks::new();
        let first = locks.lock("a").await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;

        assert!(second.is_ok());
        assert_eq!(first.key(), &"a");
        assert_eq!(locks.len(), 2);
    }
}
