//! Per-document lock registry.
//!
//! Grants mutual exclusion per string key so that concurrent
//! ingest/activate operations on the same document are strictly
//! serialized while different documents proceed in parallel. Entries are
//! reference counted: they are allocated lazily on first use and removed
//! when the last guard for a key is dropped, so the registry never grows
//! beyond the set of keys currently in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct DocLocks {
    registry: Mutex<HashMap<String, LockEntry>>,
}

struct LockEntry {
    lock: Arc<AsyncMutex<()>>,
    refs: usize,
}

impl DocLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting behind any current holder of
    /// the same key. The returned guard releases the lock and drops the
    /// registry entry (at refcount zero) when it goes out of scope.
    pub async fn lock(self: &Arc<Self>, key: &str) -> DocLockGuard {
        let lock = {
            let mut registry = self.registry.lock().expect("doc lock registry poisoned");
            let entry = registry.entry(key.to_string()).or_insert_with(|| LockEntry {
                lock: Arc::new(AsyncMutex::new(())),
                refs: 0,
            });
            entry.refs += 1;
            entry.lock.clone()
        };

        let guard = lock.lock_owned().await;
        DocLockGuard {
            locks: self.clone(),
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    fn release(&self, key: &str) {
        let mut registry = self.registry.lock().expect("doc lock registry poisoned");
        if let Some(entry) = registry.get_mut(key) {
            entry.refs -= 1;
            if entry.refs == 0 {
                registry.remove(key);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.registry.lock().expect("doc lock registry poisoned").len()
    }
}

/// Release handle for one acquired key.
pub struct DocLockGuard {
    locks: Arc<DocLocks>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for DocLockGuard {
    fn drop(&mut self) {
        // Unlock before shrinking the registry so a waiter never observes
        // a removed entry while the mutex is still held.
        self.guard.take();
        self.locks.release(&self.key);
    }
}
