//! Per-key async locks.
//!
//! Counting and ban upserts for one IP address or username must not
//! interleave with another request for the same key. [`KeyedLocks`] hands out
//! one `tokio::sync::Mutex` per [`BanTarget`] and drops the entry once the
//! last holder or waiter is gone, so the map only holds keys that are
//! currently locked or awaited.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::storage::BanTarget;

#[derive(Default)]
pub(crate) struct KeyedLocks {
    locks: DashMap<BanTarget, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Cancelling the returned future while it waits releases its claim on
    /// the map entry just like dropping the guard does.
    pub(crate) async fn lock(&self, key: &BanTarget) -> KeyGuard<'_> {
        // Cloning under the shard lock keeps this atomic with the removal in LockEntry::drop
        let mutex = Arc::clone(&self.locks.entry(key.clone()).or_default());
        let entry = LockEntry {
            locks: self,
            key: key.clone(),
            mutex,
        };

        let guard = Arc::clone(&entry.mutex).lock_owned().await;

        KeyGuard {
            _guard: guard,
            _entry: entry,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// A claim on one map entry, held by waiters and holders alike.
struct LockEntry<'a> {
    locks: &'a KeyedLocks,
    key: BanTarget,
    mutex: Arc<Mutex<()>>,
}

impl Drop for LockEntry<'_> {
    fn drop(&mut self) {
        // The map and this claim are the only references left
        self.locks.locks.remove_if(&self.key, |_, mutex| {
            Arc::ptr_eq(mutex, &self.mutex) && Arc::strong_count(mutex) == 2
        });
    }
}

/// Exclusive access to one key. Fields drop in order, so the mutex is
/// released before the entry claim.
pub(crate) struct KeyGuard<'a> {
    _guard: OwnedMutexGuard<()>,
    _entry: LockEntry<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::{Future, poll_fn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::Poll;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = KeyedLocks::new();
        let key = BanTarget::Ip("10.0.0.1".to_string());

        {
            let _guard = locks.lock(&key).await;
            assert_eq!(locks.len(), 1);
        }

        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _ip = locks.lock(&BanTarget::Ip("10.0.0.1".to_string())).await;

        let other = tokio::time::timeout(
            Duration::from_secs(1),
            locks.lock(&BanTarget::Username("10.0.0.1".to_string())),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = Arc::clone(&locks);
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&BanTarget::Username("alice".to_string())).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_releases_entry() {
        let locks = KeyedLocks::new();
        let key = BanTarget::Ip("10.0.0.1".to_string());

        let holder = locks.lock(&key).await;

        let mut waiter = Box::pin(locks.lock(&key));
        poll_fn(|cx| {
            assert!(waiter.as_mut().poll(cx).is_pending());
            Poll::Ready(())
        })
        .await;

        // The holder leaves while the waiter is still queued, then the waiter gives up
        drop(holder);
        assert_eq!(locks.len(), 1);
        drop(waiter);

        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_keeps_holder_entry() {
        let locks = KeyedLocks::new();
        let key = BanTarget::Username("alice".to_string());

        let holder = locks.lock(&key).await;
        let waited = tokio::time::timeout(Duration::from_millis(10), locks.lock(&key)).await;
        assert!(waited.is_err());
        assert_eq!(locks.len(), 1);

        drop(holder);
        assert_eq!(locks.len(), 0);
    }
}
