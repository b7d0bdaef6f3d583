//! Ordinary registration flows.
//!
//! Pre-registration hands out the next data version for a key while its bytes
//! are still being written. It shares [`KeyLocks`] with the reconciliation
//! engine so the two can never assign the same version. Status changes and
//! attributes run through the same locks.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use cairn_core::key_prefix::SEPARATOR;
use cairn_core::observability::registration_span;
use cairn_core::{CatalogKey, DataStatus, KeyPrefix, KeyPrefixBuilder, StorageLocationResolver};
use chrono::Utc;
use tracing::Instrument;

use crate::error::{CatalogError, Result};
use crate::index::CatalogIndex;
use crate::key_lock::KeyLocks;
use crate::metrics;
use crate::reconciler::normalize;
use crate::registered::RegisteredData;
use crate::versioning::VersionGapResolver;

/// Registration operations on individual data versions.
pub struct RegistrationService {
    index: Arc<dyn CatalogIndex>,
    locations: Arc<dyn StorageLocationResolver>,
    locks: Arc<KeyLocks>,
}

impl std::fmt::Debug for RegistrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationService").finish_non_exhaustive()
    }
}

impl RegistrationService {
    /// Creates a service. Pass the reconciliation engine's locks so both
    /// writers serialize on the same keys.
    #[must_use]
    pub fn new(
        index: Arc<dyn CatalogIndex>,
        locations: Arc<dyn StorageLocationResolver>,
        locks: Arc<KeyLocks>,
    ) -> Self {
        Self {
            index,
            locations,
            locks,
        }
    }

    /// Registers the next data version of `key` in `UPLOADING` status.
    ///
    /// The new row's directory is `{prefix}/data-v={version}` and it becomes the
    /// latest version. Reconciled rows may already own that directory, since
    /// their catalog versions need not match their `data-v=<n>` numbers; the
    /// directory number then moves up to the first one no row owns.
    ///
    /// # Errors
    ///
    /// Fails on validation errors, unknown or non-object-store storage, an
    /// unregistered format, and version conflicts with other writers.
    pub async fn pre_register(
        &self,
        key: &CatalogKey,
        storage_name: &str,
    ) -> Result<RegisteredData> {
        let (key, storage_name) = normalize(key, storage_name)?;
        let span = registration_span("pre_register", &key);
        self.pre_register_key(&key, &storage_name)
            .instrument(span)
            .await
    }

    async fn pre_register_key(&self, key: &CatalogKey, storage_name: &str) -> Result<RegisteredData> {
        let location = self.locations.resolve(storage_name).await?;
        location.require_prefix_listing()?;

        let format = key.format_key();
        if !self.index.format_exists(&format).await? {
            return Err(CatalogError::FormatNotFound { format });
        }
        let prefix = KeyPrefixBuilder::build(key)?;

        let _guard = self.locks.lock(key).await?;
        let rows = self.index.registered(key).await?;
        let existing: BTreeSet<u32> = rows.iter().map(|row| row.version).collect();
        let version = VersionGapResolver::next_version(&existing)?;
        let directory = unclaimed_directory(&prefix, version, &rows)?;

        let data = RegisteredData::new(key.clone(), version, DataStatus::Uploading, storage_name)
            .with_directory(directory);
        let stored = self.index.persist(data).await?;

        metrics::record_versions_registered("pre_register", 1);
        tracing::info!(
            version,
            directory = stored.storage_directory.as_deref().unwrap_or_default(),
            "Pre-registered data version"
        );
        Ok(stored)
    }

    /// Moves a data version to `status`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DataNotFound`] for unknown versions and
    /// [`CatalogError::InvalidTransition`] for moves the lifecycle forbids.
    pub async fn update_status(
        &self,
        key: &CatalogKey,
        version: u32,
        status: DataStatus,
    ) -> Result<RegisteredData> {
        let key = key.normalized()?;
        let _guard = self.locks.lock(&key).await?;

        let mut row = self.require(&key, version).await?;
        let previous = row.status;
        row.status = previous.transition(status)?;
        row.updated_at = Utc::now();
        let stored = self.index.replace(row).await?;

        metrics::record_status_transition(status.as_str());
        tracing::info!(key = %key, version, from = %previous, to = %status, "Updated data status");
        Ok(stored)
    }

    /// Adds a named attribute to a data version.
    ///
    /// Names are trimmed and compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] for a blank name or deleted data,
    /// [`CatalogError::AttributeExists`] for a duplicate name, and
    /// [`CatalogError::DataNotFound`] for unknown versions.
    pub async fn create_attribute(
        &self,
        key: &CatalogKey,
        version: u32,
        name: &str,
        value: impl Into<String>,
    ) -> Result<RegisteredData> {
        let key = key.normalized()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::validation(
                "attribute_name",
                "The attribute name is required",
            ));
        }

        let _guard = self.locks.lock(&key).await?;
        let mut row = self.require(&key, version).await?;

        if row.status.is_terminal() {
            return Err(CatalogError::validation(
                "status",
                format!("Business object data {key} version {version} is deleted."),
            ));
        }
        if row.attributes.keys().any(|existing| existing.eq_ignore_ascii_case(name)) {
            return Err(CatalogError::AttributeExists {
                key,
                version,
                name: name.to_string(),
            });
        }

        row.attributes.insert(name.to_string(), value.into());
        row.updated_at = Utc::now();
        let stored = self.index.replace(row).await?;
        tracing::debug!(key = %key, version, attribute = name, "Created data attribute");
        Ok(stored)
    }

    /// Returns the row for (`key`, `version`).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DataNotFound`] for unknown versions.
    pub async fn get(&self, key: &CatalogKey, version: u32) -> Result<RegisteredData> {
        let key = key.normalized()?;
        self.require(&key, version).await
    }

    async fn require(&self, key: &CatalogKey, version: u32) -> Result<RegisteredData> {
        self.index
            .get(key, version)
            .await?
            .ok_or_else(|| CatalogError::DataNotFound {
                key: key.clone(),
                version,
            })
    }
}

/// Returns the first `data-v=<n>` directory with `n >= version` that no row owns.
fn unclaimed_directory(prefix: &KeyPrefix, version: u32, rows: &[RegisteredData]) -> Result<String> {
    let claimed: HashSet<&str> = rows
        .iter()
        .filter_map(|row| row.storage_directory.as_deref())
        .map(|dir| dir.trim_end_matches(SEPARATOR))
        .collect();

    let mut number = version;
    loop {
        let directory = prefix.data_version_dir(number);
        if !claimed.contains(directory.as_str()) {
            return Ok(directory);
        }
        number = number.checked_add(1).ok_or_else(|| CatalogError::Internal {
            message: format!("no unclaimed data version directory under {prefix}"),
        })?;
    }
}
