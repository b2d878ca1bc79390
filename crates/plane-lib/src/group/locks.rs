//! Per-group serialization of mutations

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed async mutex: at most one mutation per canonical name in flight
#[derive(Debug, Clone, Default)]
pub struct GroupLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl GroupLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the group `canonical`
    pub async fn lock(&self, canonical: &str) -> GroupGuard {
        let mutex = self
            .inner
            .entry(canonical.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        GroupGuard {
            guard: Some(guard),
            locks: self.clone(),
            canonical: canonical.to_string(),
        }
    }

    /// Drop the entry for a group nobody is waiting on
    fn release(&self, canonical: &str) {
        self.inner
            .remove_if(canonical, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Exclusive access to one group; the map entry goes with the last holder
#[derive(Debug)]
pub struct GroupGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: GroupLocks,
    canonical: String,
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        // The owned guard holds a reference to the mutex; let it go first
        drop(self.guard.take());
        self.locks.release(&self.canonical);
    }
}
