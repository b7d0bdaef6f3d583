//! Catalog index: the relational side of the catalog.
//!
//! The index holds registered object formats and every [`RegisteredData`] row.
//! [`CatalogIndex::persist`] and [`CatalogIndex::persist_all`] are the only ways
//! to add versions; they reject duplicates with [`CatalogError::Conflict`] and
//! move the latest-version marker in the same atomic step as the insert.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use cairn_core::{CatalogKey, FormatKey};

use crate::error::{CatalogError, Result};
use crate::registered::RegisteredData;

/// Access to registered formats and data versions.
#[async_trait]
pub trait CatalogIndex: Send + Sync + 'static {
    /// Returns true if the object format is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    async fn format_exists(&self, format: &FormatKey) -> Result<bool>;

    /// Returns every row for `key`, ordered by version.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    async fn registered(&self, key: &CatalogKey) -> Result<Vec<RegisteredData>>;

    /// Returns every version ever registered for `key`, in any status.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    async fn existing_versions(&self, key: &CatalogKey) -> Result<BTreeSet<u32>> {
        Ok(self
            .registered(key)
            .await?
            .into_iter()
            .map(|row| row.version)
            .collect())
    }

    /// Returns the row for (`key`, `version`), if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    async fn get(&self, key: &CatalogKey, version: u32) -> Result<Option<RegisteredData>>;

    /// Inserts a new row.
    ///
    /// If the row is marked latest it keeps the marker only when its version is
    /// above every other version of the key, and the previous holder loses it in
    /// the same atomic step.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] if the (key, version) already exists.
    async fn persist(&self, data: RegisteredData) -> Result<RegisteredData>;

    /// Inserts a batch of new rows as one unit.
    ///
    /// Either every row is inserted or none is. Latest-marker handling matches
    /// [`CatalogIndex::persist`] applied in batch order.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Conflict`] for the first (key, version) that
    /// already exists or repeats within the batch; nothing is written then.
    async fn persist_all(&self, batch: Vec<RegisteredData>) -> Result<Vec<RegisteredData>>;

    /// Replaces an existing row (status and attribute changes).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DataNotFound`] if the row does not exist.
    async fn replace(&self, data: RegisteredData) -> Result<RegisteredData>;
}

#[derive(Debug, Default)]
struct IndexState {
    formats: HashSet<FormatKey>,
    rows: HashMap<CatalogKey, BTreeMap<u32, RegisteredData>>,
}

impl IndexState {
    fn check_new(&self, batch: &[RegisteredData]) -> Result<()> {
        let mut seen = HashSet::new();
        for data in batch {
            let taken = self
                .rows
                .get(&data.key)
                .is_some_and(|rows| rows.contains_key(&data.version));
            if taken || !seen.insert((&data.key, data.version)) {
                return Err(CatalogError::Conflict {
                    key: data.key.clone(),
                    version: data.version,
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, mut data: RegisteredData) -> RegisteredData {
        let rows = self.rows.entry(data.key.clone()).or_default();

        let highest = rows.keys().next_back().copied();
        if data.latest_version && highest.is_some_and(|h| h > data.version) {
            data.latest_version = false;
        }
        if data.latest_version {
            for row in rows.values_mut().filter(|r| r.latest_version) {
                row.latest_version = false;
                row.updated_at = data.created_at;
            }
        }

        rows.insert(data.version, data.clone());
        data
    }
}

/// In-memory catalog index for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalogIndex {
    state: Arc<RwLock<IndexState>>,
}

impl MemoryCatalogIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an object format.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Internal`] if the lock is poisoned.
    pub fn register_format(&self, format: FormatKey) -> Result<()> {
        self.write()?.formats.insert(format);
        Ok(())
    }

    /// Returns the total number of rows across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .map(|state| state.rows.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    /// Returns true if no rows exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, IndexState>> {
        self.state.read().map_err(|_| CatalogError::Internal {
            message: "lock poisoned".into(),
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, IndexState>> {
        self.state.write().map_err(|_| CatalogError::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl CatalogIndex for MemoryCatalogIndex {
    async fn format_exists(&self, format: &FormatKey) -> Result<bool> {
        Ok(self.read()?.formats.contains(format))
    }

    async fn registered(&self, key: &CatalogKey) -> Result<Vec<RegisteredData>> {
        Ok(self
            .read()?
            .rows
            .get(key)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, key: &CatalogKey, version: u32) -> Result<Option<RegisteredData>> {
        Ok(self
            .read()?
            .rows
            .get(key)
            .and_then(|rows| rows.get(&version))
            .cloned())
    }

    async fn persist(&self, data: RegisteredData) -> Result<RegisteredData> {
        let mut state = self.write()?;
        state.check_new(std::slice::from_ref(&data))?;
        Ok(state.insert(data))
    }

    async fn persist_all(&self, batch: Vec<RegisteredData>) -> Result<Vec<RegisteredData>> {
        let mut state = self.write()?;
        state.check_new(&batch)?;
        Ok(batch.into_iter().map(|data| state.insert(data)).collect())
    }

    async fn replace(&self, data: RegisteredData) -> Result<RegisteredData> {
        let mut state = self.write()?;
        let slot = state
            .rows
            .get_mut(&data.key)
            .and_then(|rows| rows.get_mut(&data.version))
            .ok_or_else(|| CatalogError::DataNotFound {
                key: data.key.clone(),
                version: data.version,
            })?;
        *slot = data.clone();
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::DataStatus;

    fn key() -> CatalogKey {
        CatalogKey::new("ns", "def", "PRC", "TXT", 0, "PK", "A")
    }

    fn row(version: u32) -> RegisteredData {
        RegisteredData::new(key(), version, DataStatus::UNREGISTERED, "S3_MANAGED")
    }

    async fn latest_versions(index: &MemoryCatalogIndex) -> Vec<u32> {
        index
            .registered(&key())
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.latest_version)
            .map(|r| r.version)
            .collect()
    }

    #[tokio::test]
    async fn persist_moves_latest_marker() {
        let index = MemoryCatalogIndex::new();
        index.persist(row(0)).await.unwrap();
        index.persist(row(1)).await.unwrap();

        assert_eq!(latest_versions(&index).await, vec![1]);
        assert_eq!(
            index.existing_versions(&key()).await.unwrap(),
            BTreeSet::from([0, 1])
        );
    }

    #[tokio::test]
    async fn lower_version_never_takes_latest() {
        let index = MemoryCatalogIndex::new();
        index.persist(row(5)).await.unwrap();
        let stored = index.persist(row(2)).await.unwrap();

        assert!(!stored.latest_version);
        assert_eq!(latest_versions(&index).await, vec![5]);
    }

    #[tokio::test]
    async fn duplicate_version_conflicts() {
        let index = MemoryCatalogIndex::new();
        index.persist(row(0)).await.unwrap();
        let err = index.persist(row(0)).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict { version: 0, .. }));
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let index = MemoryCatalogIndex::new();
        index.persist(row(2)).await.unwrap();

        let err = index
            .persist_all(vec![row(1), row(2), row(3)])
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict { version: 2, .. }));
        assert_eq!(
            index.existing_versions(&key()).await.unwrap(),
            BTreeSet::from([2])
        );

        let err = index.persist_all(vec![row(3), row(3)]).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict { version: 3, .. }));
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn batch_moves_latest_marker_to_its_highest_row() {
        let index = MemoryCatalogIndex::new();
        index.persist(row(0)).await.unwrap();

        let stored = index.persist_all(vec![row(1), row(2)]).await.unwrap();
        assert!(!stored[0].latest_version);
        assert!(stored[1].latest_version);
        assert_eq!(latest_versions(&index).await, vec![2]);
    }

    #[tokio::test]
    async fn replace_requires_existing_row() {
        let index = MemoryCatalogIndex::new();
        let err = index.replace(row(0)).await.unwrap_err();
        assert!(matches!(err, CatalogError::DataNotFound { .. }));

        let mut stored = index.persist(row(0)).await.unwrap();
        stored.status = DataStatus::Deleted;
        index.replace(stored).await.unwrap();
        let fetched = index.get(&key(), 0).await.unwrap().unwrap();
        assert_eq!(fetched.status, DataStatus::Deleted);
    }

    #[tokio::test]
    async fn formats_are_tracked() {
        let index = MemoryCatalogIndex::new();
        assert!(!index.format_exists(&key().format_key()).await.unwrap());
        index.register_format(key().format_key()).unwrap();
        assert!(index.format_exists(&key().format_key()).await.unwrap());
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let index = MemoryCatalogIndex::new();
        index.persist(row(0)).await.unwrap();
        let other = key().with_sub_partition_values(["x"]);
        assert!(index.existing_versions(&other).await.unwrap().is_empty());
        assert!(index.get(&other, 0).await.unwrap().is_none());
    }
}
