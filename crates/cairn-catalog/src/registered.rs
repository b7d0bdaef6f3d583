//! Registered data versions.

use std::collections::BTreeMap;

use cairn_core::{CatalogKey, DataId, DataStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One (catalog key, data version) pair tracked by the catalog.
///
/// Rows are never erased. Logical removal is a transition to
/// [`DataStatus::Deleted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredData {
    /// Unique row identifier.
    pub id: DataId,

    /// The dataset this version belongs to.
    pub key: CatalogKey,

    /// Data version within the key.
    pub version: u32,

    /// Lifecycle status.
    pub status: DataStatus,

    /// Name of the storage holding the bytes.
    pub storage_name: String,

    /// Directory (key prefix) holding this version's objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_directory: Option<String>,

    /// Individual object keys, when known.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub storage_files: Vec<String>,

    /// True for the one authoritative version of the key.
    pub latest_version: bool,

    /// Named attributes attached to this version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl RegisteredData {
    /// Creates a new row marked as the latest version.
    #[must_use]
    pub fn new(
        key: CatalogKey,
        version: u32,
        status: DataStatus,
        storage_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DataId::generate(),
            key,
            version,
            status,
            storage_name: storage_name.into(),
            storage_directory: None,
            storage_files: Vec::new(),
            latest_version: true,
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the storage directory.
    #[must_use]
    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.storage_directory = Some(directory.into());
        self
    }

    /// Sets the storage files.
    #[must_use]
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.storage_files = files;
        self
    }

    /// Returns true if `path` is one of this version's recorded files.
    #[must_use]
    pub fn has_file(&self, path: &str) -> bool {
        self.storage_files.iter().any(|f| f == path)
    }
}
