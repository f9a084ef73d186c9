//! In-process per-key serialisation for mutating requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Hands out one async mutex per key. Entries are dropped once no guard or
/// waiter holds them.
#[derive(Debug, Default)]
pub struct KeyLocks {
    entries: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

/// Guard held for the duration of a keyed operation.
#[derive(Debug)]
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

impl KeyLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> KeyGuard {
        let mutex = self.entry(key);
        KeyGuard {
            _guard: mutex.lock_owned().await,
        }
    }

    /// Number of keys with a live guard or waiter.
    #[must_use]
    pub fn active(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|entry| entry.strong_count() > 0).count()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.strong_count() > 0);
        if let Some(existing) = entries.get(key).and_then(Weak::upgrade) {
            return existing;
        }
        let created = Arc::new(AsyncMutex::new(()));
        entries.insert(key.to_owned(), Arc::downgrade(&created));
        created
    }
}
