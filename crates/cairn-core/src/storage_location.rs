//! Named storage locations and the platforms backing them.
//!
//! Callers refer to storage by name (e.g. `S3_MANAGED`). A
//! [`StorageLocationResolver`] turns the name into a platform and a root path.
//! Only object-store platforms support the prefix listing reconciliation needs.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Platform backing a storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoragePlatform {
    /// Amazon S3 or an S3-compatible store.
    S3,
    /// Google Cloud Storage.
    Gcs,
    /// Azure Blob Storage.
    Azure,
    /// In-process memory store.
    Memory,
    /// Archival storage without prefix listing.
    Glacier,
    /// Mounted file system.
    Filesystem,
}

impl StoragePlatform {
    /// Returns the lowercase platform name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Gcs => "gcs",
            Self::Azure => "azure",
            Self::Memory => "memory",
            Self::Glacier => "glacier",
            Self::Filesystem => "filesystem",
        }
    }

    /// Returns true for object stores that can list keys by prefix.
    #[must_use]
    pub const fn supports_prefix_listing(&self) -> bool {
        matches!(self, Self::S3 | Self::Gcs | Self::Azure | Self::Memory)
    }
}

impl std::fmt::Display for StoragePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    /// Storage name as known to callers.
    pub name: String,
    /// Backing platform.
    pub platform: StoragePlatform,
    /// Root path inside the platform (bucket prefix, container, directory).
    #[serde(default)]
    pub root: String,
}

impl StorageLocation {
    /// Creates a storage location.
    #[must_use]
    pub fn new(name: impl Into<String>, platform: StoragePlatform, root: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform,
            root: root.into(),
        }
    }

    /// Ensures the location can be listed by prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] for non-object-store platforms.
    pub fn require_prefix_listing(&self) -> Result<&Self> {
        if self.platform.supports_prefix_listing() {
            Ok(self)
        } else {
            Err(Error::UnsupportedPlatform {
                storage_name: self.name.clone(),
                platform: self.platform.to_string(),
            })
        }
    }
}

/// Resolves storage names to locations.
#[async_trait]
pub trait StorageLocationResolver: Send + Sync + 'static {
    /// Resolves `storage_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageNotFound`] if no storage has that name.
    async fn resolve(&self, storage_name: &str) -> Result<StorageLocation>;
}

/// A fixed set of storage locations, typically loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticStorageLocations {
    locations: HashMap<String, StorageLocation>,
}

impl StaticStorageLocations {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a location, replacing any location with the same name.
    #[must_use]
    pub fn with(mut self, location: StorageLocation) -> Self {
        self.insert(location);
        self
    }

    /// Adds a location, replacing any location with the same name.
    pub fn insert(&mut self, location: StorageLocation) {
        self.locations.insert(location.name.clone(), location);
    }

    /// Returns the number of known locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Returns true if no locations are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

impl FromIterator<StorageLocation> for StaticStorageLocations {
    fn from_iter<I: IntoIterator<Item = StorageLocation>>(iter: I) -> Self {
        let mut set = Self::new();
        for location in iter {
            set.insert(location);
        }
        set
    }
}

#[async_trait]
impl StorageLocationResolver for StaticStorageLocations {
    async fn resolve(&self, storage_name: &str) -> Result<StorageLocation> {
        self.locations
            .get(storage_name)
            .cloned()
            .ok_or_else(|| Error::StorageNotFound {
                storage_name: storage_name.to_string(),
            })
    }
}
