//! Pre-built test fixtures for reconciliation scenarios.

use std::sync::Arc;

use cairn_catalog::{KeyLocks, ReconciliationEngine, RegistrationService};
use cairn_core::{
    CatalogKey, KeyPrefix, KeyPrefixBuilder, StaticStorageLocations, StorageLocation,
    StoragePlatform,
};

use crate::index::TracingIndex;
use crate::storage::TracingLister;

/// Test context with wired storage, index and locations.
///
/// Every context gets a unique namespace so contexts never share keys.
pub struct TestContext {
    /// Storage lister.
    pub storage: Arc<TracingLister>,
    /// Catalog index.
    pub index: Arc<TracingIndex>,
    /// Storage locations.
    pub locations: Arc<StaticStorageLocations>,
    /// Key locks shared by the engine and registration service.
    pub locks: Arc<KeyLocks>,
    /// Default key for the context, with its format registered.
    pub key: CatalogKey,
}

impl TestContext {
    /// Object-store storage name.
    pub const STORAGE: &'static str = "S3_MANAGED";
    /// Root of [`Self::STORAGE`].
    pub const ROOT: &'static str = "managed-bucket";
    /// Storage name backed by a platform without prefix listing.
    pub const ARCHIVE: &'static str = "GLACIER_ARCHIVE";

    /// Creates a context with an empty catalog and storage.
    #[must_use]
    pub fn new() -> Self {
        Self::with_storage(TracingLister::new())
    }

    /// Creates a context around a prepared lister.
    #[must_use]
    pub fn with_storage(storage: TracingLister) -> Self {
        let namespace = format!("test-ns-{}", uuid::Uuid::new_v4().as_simple());
        let key = CatalogKey::new(namespace, "trades", "PRC", "TXT", 0, "TRADE_DATE", "2024-01-31");

        let index = TracingIndex::new();
        index.register_format(key.format_key());

        let locations = StaticStorageLocations::new()
            .with(StorageLocation::new(Self::STORAGE, StoragePlatform::S3, Self::ROOT))
            .with(StorageLocation::new(Self::ARCHIVE, StoragePlatform::Glacier, "vault"));

        Self {
            storage: Arc::new(storage),
            index: Arc::new(index),
            locations: Arc::new(locations),
            locks: Arc::new(KeyLocks::new()),
            key,
        }
    }

    /// Builds an engine over this context.
    #[must_use]
    pub fn engine(&self) -> ReconciliationEngine {
        ReconciliationEngine::new(
            self.storage.clone(),
            self.locations.clone(),
            self.index.clone(),
        )
        .with_locks(self.locks.clone())
    }

    /// Builds a registration service sharing the engine's locks.
    #[must_use]
    pub fn registration(&self) -> RegistrationService {
        RegistrationService::new(self.index.clone(), self.locations.clone(), self.locks.clone())
    }

    /// Returns the default key with a different primary partition value.
    #[must_use]
    pub fn key_with_value(&self, value: &str) -> CatalogKey {
        let mut key = self.key.clone();
        key.partition_value = value.to_string();
        key
    }

    /// Returns the prefix of `key`.
    #[must_use]
    pub fn prefix_of(key: &CatalogKey) -> KeyPrefix {
        KeyPrefixBuilder::build(key).expect("valid key")
    }

    /// Writes an object at `{prefix of the default key}/{rest}`.
    pub fn put(&self, rest: &str) {
        self.put_for(&self.key, rest);
    }

    /// Writes an object at `{prefix of key}/{rest}`.
    pub fn put_for(&self, key: &CatalogKey, rest: &str) {
        let prefix = Self::prefix_of(key);
        self.storage.put(Self::ROOT, format!("{prefix}/{rest}"));
    }

    /// Writes an object at an arbitrary root-relative path.
    pub fn put_raw(&self, path: &str) {
        self.storage.put(Self::ROOT, path);
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
