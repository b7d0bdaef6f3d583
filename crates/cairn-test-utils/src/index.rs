//! Catalog index wrapper with write tracing and race injection.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cairn_catalog::error::Result;
use cairn_catalog::{CatalogIndex, MemoryCatalogIndex, RegisteredData};
use cairn_core::{CatalogKey, DataStatus, FormatKey};

/// Catalog index that records persisted versions and can simulate a writer
/// in another process taking a version first.
#[derive(Debug, Clone, Default)]
pub struct TracingIndex {
    inner: MemoryCatalogIndex,
    persisted: Arc<Mutex<Vec<(CatalogKey, u32)>>>,
    steal_next: Arc<Mutex<u32>>,
    stolen_versions: Arc<Mutex<BTreeSet<u32>>>,
}

impl TracingIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped index.
    #[must_use]
    pub fn inner(&self) -> &MemoryCatalogIndex {
        &self.inner
    }

    /// Registers an object format.
    pub fn register_format(&self, format: FormatKey) {
        self.inner.register_format(format).expect("register format");
    }

    /// Makes the next `count` persists lose to a concurrent writer that inserts
    /// the same (key, version) just before them.
    pub fn steal_next_persists(&self, count: u32) {
        *self.steal_next.lock().expect("lock") = count;
    }

    /// Makes the next write that includes `version` lose it to a concurrent
    /// writer, whatever its position in a batch.
    pub fn steal_version(&self, version: u32) {
        self.stolen_versions.lock().expect("lock").insert(version);
    }

    /// Returns every (key, version) persisted through this wrapper.
    #[must_use]
    pub fn persisted(&self) -> Vec<(CatalogKey, u32)> {
        self.persisted.lock().expect("lock").clone()
    }

    fn take_steal(&self) -> bool {
        let mut remaining = self.steal_next.lock().expect("lock");
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }

    async fn insert_rivals(&self, batch: &[RegisteredData]) -> Result<()> {
        let steal_first = self.take_steal();
        for (position, data) in batch.iter().enumerate() {
            let stolen = self.stolen_versions.lock().expect("lock").remove(&data.version);
            if stolen || (steal_first && position == 0) {
                let rival = RegisteredData::new(
                    data.key.clone(),
                    data.version,
                    DataStatus::Uploading,
                    data.storage_name.clone(),
                );
                self.inner.persist(rival).await?;
            }
        }
        Ok(())
    }

    fn record(&self, stored: &[RegisteredData]) {
        self.persisted
            .lock()
            .expect("lock")
            .extend(stored.iter().map(|row| (row.key.clone(), row.version)));
    }
}

#[async_trait]
impl CatalogIndex for TracingIndex {
    async fn format_exists(&self, format: &FormatKey) -> Result<bool> {
        self.inner.format_exists(format).await
    }

    async fn registered(&self, key: &CatalogKey) -> Result<Vec<RegisteredData>> {
        self.inner.registered(key).await
    }

    async fn existing_versions(&self, key: &CatalogKey) -> Result<BTreeSet<u32>> {
        self.inner.existing_versions(key).await
    }

    async fn get(&self, key: &CatalogKey, version: u32) -> Result<Option<RegisteredData>> {
        self.inner.get(key, version).await
    }

    async fn persist(&self, data: RegisteredData) -> Result<RegisteredData> {
        self.insert_rivals(std::slice::from_ref(&data)).await?;
        let stored = self.inner.persist(data).await?;
        self.record(std::slice::from_ref(&stored));
        Ok(stored)
    }

    async fn persist_all(&self, batch: Vec<RegisteredData>) -> Result<Vec<RegisteredData>> {
        self.insert_rivals(&batch).await?;
        let stored = self.inner.persist_all(batch).await?;
        self.record(&stored);
        Ok(stored)
    }

    async fn replace(&self, data: RegisteredData) -> Result<RegisteredData> {
        self.inner.replace(data).await
    }
}
