//! Storage listing abstraction for object storage (S3, GCS, Azure, memory).
//!
//! Reconciliation only ever *reads* storage, and only through prefix listing.
//! This module defines that contract and two implementations:
//!
//! - [`MemoryBackend`]: in-memory objects grouped by storage root, for tests and
//!   local runs.
//! - [`ObjectStoreBackend`]: any [`object_store::ObjectStore`] (S3, GCS, Azure,
//!   local, in-memory), paging through the listing stream.
//!
//! ## Listing semantics
//!
//! Keys are returned relative to the storage root, in arbitrary order, and
//! unescaped: [`ObjectStoreBackend`] decodes the percent-encoding object stores
//! apply to path segments. Backends
//! may return keys that merely share a string prefix with the requested one;
//! callers apply [`crate::PrefixMatcher`] to enforce directory boundaries.
//! Failures surface as [`Error::StorageUnavailable`] and are never retried here.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::ObjectStore;
use object_store::path::Path;

use crate::error::{Error, Result};
use crate::key_prefix::SEPARATOR;

/// Lists object keys under a prefix of a storage root.
#[async_trait]
pub trait StorageLister: Send + Sync + 'static {
    /// Lists keys under `prefix` within the storage rooted at `root`.
    ///
    /// Returns an empty vec if nothing matches. Returned keys are relative to
    /// `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageUnavailable`] if the backend cannot be listed.
    async fn list(&self, root: &str, prefix: &str) -> Result<Vec<String>>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production. Listing is plain string
/// prefix matching, like the object stores it stands in for.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    roots: Arc<RwLock<HashMap<String, BTreeMap<String, Bytes>>>>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes an object under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn put(&self, root: &str, key: impl Into<String>, data: Bytes) -> Result<()> {
        let mut roots = self.roots.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        roots.entry(root.to_string()).or_default().insert(key.into(), data);
        Ok(())
    }

    /// Reads an object, if present.
    #[must_use]
    pub fn get(&self, root: &str, key: &str) -> Option<Bytes> {
        self.roots
            .read()
            .ok()
            .and_then(|roots| roots.get(root).and_then(|objects| objects.get(key).cloned()))
    }

    /// Removes an object. Succeeds even if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the lock is poisoned.
    pub fn delete(&self, root: &str, key: &str) -> Result<()> {
        let mut roots = self.roots.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;
        if let Some(objects) = roots.get_mut(root) {
            objects.remove(key);
        }
        Ok(())
    }

    /// Returns the number of objects stored under `root`.
    #[must_use]
    pub fn len(&self, root: &str) -> usize {
        self.roots
            .read()
            .map(|roots| roots.get(root).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl StorageLister for MemoryBackend {
    async fn list(&self, root: &str, prefix: &str) -> Result<Vec<String>> {
        let roots = self.roots.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(roots
            .get(root)
            .map(|objects| {
                objects
                    .range(prefix.to_string()..)
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Storage lister backed by an [`ObjectStore`].
///
/// The storage root is treated as a path prefix inside the store (for S3, a
/// prefix inside the bucket the store was built for).
#[derive(Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreBackend")
            .field("store", &self.store.to_string())
            .finish()
    }
}

impl ObjectStoreBackend {
    /// Wraps an object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Creates a backend over a fresh in-memory object store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()))
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }
}

fn join_root(root: &str, key: &str) -> String {
    let root = root.trim_matches(SEPARATOR);
    if root.is_empty() {
        key.to_string()
    } else {
        format!("{root}{SEPARATOR}{key}")
    }
}

/// Reverses the percent-encoding `object_store` applies to path segments.
///
/// Malformed escapes are kept as is. Falls back to the raw location if the
/// decoded bytes are not UTF-8.
fn decode_location(location: &str) -> String {
    let bytes = location.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = (bytes[i] == b'%')
            .then(|| bytes.get(i + 1..i + 3))
            .flatten()
            .and_then(hex_byte);
        if let Some(byte) = escaped {
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).unwrap_or_else(|_| location.to_string())
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    match pair {
        [hi, lo] => {
            let hi = char::from(*hi).to_digit(16)?;
            let lo = char::from(*lo).to_digit(16)?;
            u8::try_from((hi << 4) | lo).ok()
        }
        _ => None,
    }
}

#[async_trait]
impl StorageLister for ObjectStoreBackend {
    async fn list(&self, root: &str, prefix: &str) -> Result<Vec<String>> {
        let location = join_root(root, prefix.trim_end_matches(SEPARATOR));
        let path = Path::from(location.as_str());
        let root_dir = join_root(root, "");

        let mut stream = self.store.list(Some(&path));
        let mut keys = Vec::new();
        while let Some(item) = stream.next().await {
            let meta = item.map_err(|e| {
                Error::storage_unavailable_with_source(format!("failed to list '{location}'"), e)
            })?;
            let full = decode_location(meta.location.as_ref());
            let relative = full.strip_prefix(&root_dir).unwrap_or(&full);
            keys.push(relative.to_string());
        }

        tracing::debug!(root, prefix, objects = keys.len(), "Listed object store prefix");
        Ok(keys)
    }
}
