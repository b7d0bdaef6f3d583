//! Per-key mutual exclusion for version assignment.
//!
//! Reconciliation and ordinary registration both read the highest version of a
//! key and then insert the next one. Both steps run while holding the key's
//! lock, so two writers in this process can never pick the same version. The
//! index's `Conflict` check still guards against writers in other processes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cairn_core::CatalogKey;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{CatalogError, Result};

/// Registry of per-key async locks.
///
/// Locks for distinct keys never contend. Idle entries are pruned on the next
/// acquisition.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<CatalogKey, Arc<AsyncMutex<()>>>>,
}

/// Holds the lock for one key until dropped.
#[derive(Debug)]
pub struct KeyLockGuard {
    key: CatalogKey,
    _guard: OwnedMutexGuard<()>,
}

impl KeyLockGuard {
    /// Returns the locked key.
    #[must_use]
    pub fn key(&self) -> &CatalogKey {
        &self.key
    }
}

impl KeyLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and acquires the lock for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Internal`] if the registry lock is poisoned.
    pub async fn lock(&self, key: &CatalogKey) -> Result<KeyLockGuard> {
        let mutex = {
            let mut locks = self.locks.lock().map_err(|_| CatalogError::Internal {
                message: "lock poisoned".into(),
            })?;
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        let guard = mutex.lock_owned().await;
        tracing::trace!(key = %key, "Acquired key lock");
        Ok(KeyLockGuard {
            key: key.clone(),
            _guard: guard,
        })
    }

    /// Returns the number of keys with a live lock entry.
    #[must_use]
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.values().filter(|m| Arc::strong_count(m) > 1).count())
            .unwrap_or(0)
    }
}
