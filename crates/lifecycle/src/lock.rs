//! Per-key async mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by string.
///
/// Entries are held weakly and pruned once no guard or waiter refers to
/// them, so the registry only grows with the number of keys in flight.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    entries: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// The lock is released when the returned guard is dropped.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut entries = self.entries.lock().await;
            entries.retain(|_, weak| weak.strong_count() > 0);

            match entries.get(key).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let fresh = Arc::new(Mutex::new(()));
                    entries.insert(key.to_string(), Arc::downgrade(&fresh));
                    fresh
                }
            }
        };
        lock.lock_owned().await
    }

    /// Number of keys currently held or awaited.
    pub async fn active_keys(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

/// Lock key for creation paths on a snapshot.
pub(crate) fn snapshot_key(snapshot_id: &str) -> String {
    format!("snapshot:{snapshot_id}")
}

/// Lock key for transitions on a restoration.
pub(crate) fn restoration_key(restoration_id: &str) -> String {
    format!("restore:{restoration_id}")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.acquire("restore:a").await;

        let contender = Arc::clone(&locks);
        let waiting = tokio::spawn(async move {
            let _guard = contender.acquire("restore:a").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        assert!(waiting.await.is_ok());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire("restore:a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("restore:b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_keys_are_pruned() {
        let locks = KeyedLocks::new();
        drop(locks.acquire("snapshot:s").await);
        assert_eq!(locks.active_keys().await, 0);

        let _held = locks.acquire("snapshot:s").await;
        assert_eq!(locks.active_keys().await, 1);
    }
}
