//! Optional coalescing of concurrent builds for the same (id, kind).
//!
//! The first miss for a key takes its lock and builds; later misses wait on
//! the lock and then re-check the cache, finding the fresh artifact instead of
//! converting again. Entries are dropped once nobody holds or awaits them.

use crate::artifact::TargetKind;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Key = (String, TargetKind);

#[derive(Debug, Default)]
pub struct BuildLocks {
    locks: Mutex<HashMap<Key, Weak<AsyncMutex<()>>>>,
}

impl BuildLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until this caller is the only builder for (id, kind).
    pub async fn acquire(&self, id: &str, kind: TargetKind) -> OwnedMutexGuard<()> {
        let lock = self.lock_for(id, kind);
        lock.lock_owned().await
    }

    fn lock_for(&self, id: &str, kind: TargetKind) -> Arc<AsyncMutex<()>> {
        // A poisoned map only means another thread panicked mid-insert;
        // the entries themselves are still usable.
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.retain(|_, weak| weak.strong_count() > 0);

        let key = (id.to_string(), kind);
        if let Some(existing) = locks.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let lock = Arc::new(AsyncMutex::new(()));
        locks.insert(key, Arc::downgrade(&lock));
        lock
    }

    /// Keys with a live lock.
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.values().filter(|w| w.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_serialised() {
        let locks = Arc::new(BuildLocks::new());
        let guard = locks.acquire("doc", TargetKind::RenderedHtml).await;

        let l2 = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _g = l2.acquire("doc", TargetKind::RenderedHtml).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter proceeds")
            .unwrap();
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = BuildLocks::new();
        let _a = locks.acquire("doc", TargetKind::RenderedHtml).await;
        let _b = locks.acquire("doc", TargetKind::RenderedPdf).await;
        let _c = locks.acquire("other", TargetKind::RenderedHtml).await;
        assert_eq!(locks.active(), 3);
    }

    #[tokio::test]
    async fn released_locks_are_forgotten() {
        let locks = BuildLocks::new();
        drop(locks.acquire("doc", TargetKind::RenderedHtml).await);
        assert_eq!(locks.active(), 0);
    }
}
