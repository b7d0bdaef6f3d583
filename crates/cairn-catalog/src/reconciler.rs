//! Storage/catalog reconciliation.
//!
//! The reconciler registers data that exists in object storage but is unknown
//! to the catalog. For one catalog key it:
//!
//! 1. Validates and trims the key and storage name (no I/O before this passes).
//! 2. Resolves the storage and requires a prefix-listable platform.
//! 3. Requires the key's object format to be registered.
//! 4. Builds the canonical prefix, lists storage, drops keys that only share a
//!    string prefix, and groups the rest by data version directory.
//! 5. Under the key's lock, loads the registered rows, keeps only groupings the
//!    catalog does not account for, plans versions and persists one
//!    [`DataStatus::UNREGISTERED`] row per grouping in a single batch.
//!
//! Listing happens before the lock is taken and writes nothing, so a run that
//! fails or times out while listing leaves the catalog untouched. The batch is
//! all or nothing: a conflict on any version writes no row at all. Re-running
//! without storage changes registers nothing.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cairn_core::observability::reconcile_span;
use cairn_core::{
    CatalogKey, DataStatus, KeyPrefix, KeyPrefixBuilder, PrefixMatcher, StorageLister,
    StorageLocation, StorageLocationResolver,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT, ReconcilerConfig};
use crate::error::{CatalogError, Result};
use crate::grouping::{GroupKind, StorageGrouper};
use crate::index::CatalogIndex;
use crate::key_lock::KeyLocks;
use crate::metrics;
use crate::registered::RegisteredData;
use crate::versioning::{VersionGapResolver, VersionPlan};

// ============================================================================
// Fan-out Requests
// ============================================================================

/// One key to reconcile in a fan-out run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    /// The key to reconcile.
    pub key: CatalogKey,
    /// Storage to list.
    pub storage_name: String,
}

impl ReconcileRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(key: CatalogKey, storage_name: impl Into<String>) -> Self {
        Self {
            key,
            storage_name: storage_name.into(),
        }
    }
}

/// Result of one key in a fan-out run.
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// The request this outcome answers.
    pub request: ReconcileRequest,
    /// Newly registered rows, or why the key failed.
    pub result: Result<Vec<RegisteredData>>,
}

impl ReconcileOutcome {
    /// Returns true if the key reconciled without error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Reconciles storage contents with the catalog, one key at a time.
pub struct ReconciliationEngine {
    lister: Arc<dyn StorageLister>,
    locations: Arc<dyn StorageLocationResolver>,
    index: Arc<dyn CatalogIndex>,
    locks: Arc<KeyLocks>,
    timeout: Duration,
    concurrency: usize,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("timeout", &self.timeout)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    /// Creates an engine with its own key locks and default fan-out settings.
    #[must_use]
    pub fn new(
        lister: Arc<dyn StorageLister>,
        locations: Arc<dyn StorageLocationResolver>,
        index: Arc<dyn CatalogIndex>,
    ) -> Self {
        Self {
            lister,
            locations,
            index,
            locks: Arc::new(KeyLocks::new()),
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Shares key locks with other writers (e.g. a registration service).
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<KeyLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Applies fan-out settings from configuration.
    #[must_use]
    pub fn with_config(mut self, config: &ReconcilerConfig) -> Self {
        self.timeout = config.timeout;
        self.concurrency = config.concurrency.max(1);
        self
    }

    /// Sets the per-key deadline for fan-out runs.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of keys reconciled at once by fan-out runs.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Returns the key locks used by this engine.
    #[must_use]
    pub fn locks(&self) -> &Arc<KeyLocks> {
        &self.locks
    }

    /// Returns the canonical prefix for `key` in `storage_name`.
    ///
    /// # Errors
    ///
    /// Fails on validation errors, unknown or non-object-store storage, and keys
    /// that cannot be rendered into a path.
    pub async fn build_prefix(&self, key: &CatalogKey, storage_name: &str) -> Result<KeyPrefix> {
        let (key, storage_name) = normalize(key, storage_name)?;
        self.resolve_location(&storage_name).await?;
        Ok(KeyPrefixBuilder::build(&key)?)
    }

    /// Returns the directory data version `version` of `key` is written to.
    ///
    /// # Errors
    ///
    /// Same as [`Self::build_prefix`].
    pub async fn data_directory(
        &self,
        key: &CatalogKey,
        storage_name: &str,
        version: u32,
    ) -> Result<String> {
        Ok(self
            .build_prefix(key, storage_name)
            .await?
            .data_version_dir(version))
    }

    /// Registers data found in storage but unknown to the catalog.
    ///
    /// Returns the newly persisted rows in ascending version order. The list is
    /// empty when nothing new was found or when registering would require
    /// versions the catalog never recorded.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Validation`] for missing or blank key fields
    /// - [`CatalogError::StorageNotFound`] / [`CatalogError::UnsupportedPlatform`]
    /// - [`CatalogError::FormatNotFound`] if the object format is not registered
    /// - [`CatalogError::StorageUnavailable`] if listing fails
    /// - [`CatalogError::AmbiguousVersion`] for more than one new grouping without a version
    /// - [`CatalogError::Conflict`] if another writer took a version first
    pub async fn reconcile(
        &self,
        key: &CatalogKey,
        storage_name: &str,
    ) -> Result<Vec<RegisteredData>> {
        let (key, storage_name) = normalize(key, storage_name)?;
        let started = Instant::now();
        let span = reconcile_span(&key, &storage_name);

        let result = self.reconcile_key(&key, &storage_name).instrument(span).await;

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(Reconciled::Registered(rows)) if rows.is_empty() => {
                metrics::record_reconcile("noop", 0, elapsed);
            }
            Ok(Reconciled::Registered(rows)) => {
                metrics::record_reconcile("registered", rows.len(), elapsed);
            }
            Ok(Reconciled::GapSuppressed) => {
                metrics::record_gap_suppressed();
                metrics::record_reconcile("gap_suppressed", 0, elapsed);
            }
            Err(_) => metrics::record_reconcile("error", 0, elapsed),
        }

        result.map(Reconciled::into_rows)
    }

    /// Reconciles many keys with bounded concurrency and a per-key deadline.
    ///
    /// Keys are independent: one key's failure or timeout never affects the
    /// others. Outcomes are returned in request order.
    pub async fn reconcile_many(&self, requests: Vec<ReconcileRequest>) -> Vec<ReconcileOutcome> {
        let timeout = self.timeout;
        let mut outcomes: Vec<(usize, ReconcileOutcome)> =
            futures::stream::iter(requests.into_iter().enumerate())
                .map(|(position, request)| async move {
                    let result = match tokio::time::timeout(
                        timeout,
                        self.reconcile(&request.key, &request.storage_name),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            tracing::warn!(
                                key = %request.key,
                                storage = %request.storage_name,
                                timeout_secs = timeout.as_secs(),
                                "Reconciliation timed out"
                            );
                            Err(CatalogError::Timeout {
                                key: request.key.clone(),
                                timeout_secs: timeout.as_secs(),
                            })
                        }
                    };
                    (position, ReconcileOutcome { request, result })
                })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        outcomes.sort_by_key(|(position, _)| *position);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    async fn resolve_location(&self, storage_name: &str) -> Result<StorageLocation> {
        let location = self.locations.resolve(storage_name).await?;
        location.require_prefix_listing()?;
        Ok(location)
    }

    async fn reconcile_key(&self, key: &CatalogKey, storage_name: &str) -> Result<Reconciled> {
        let location = self.resolve_location(storage_name).await?;

        let format = key.format_key();
        if !self.index.format_exists(&format).await? {
            return Err(CatalogError::FormatNotFound { format });
        }

        let prefix = KeyPrefixBuilder::build(key)?;
        let listed = self
            .lister
            .list(&location.root, prefix.as_str())
            .await
            .map_err(|e| CatalogError::from_listing(e, storage_name, prefix.as_str()))?;
        let matched = PrefixMatcher::filter(prefix.as_str(), &listed);
        let groups = StorageGrouper::group(&prefix, &matched);

        tracing::debug!(
            prefix = %prefix,
            listed = listed.len(),
            matched = matched.len(),
            groups = groups.len(),
            "Listed storage"
        );

        let _guard = self.locks.lock(key).await?;

        let rows = self.index.registered(key).await?;
        let existing: BTreeSet<u32> = rows.iter().map(|row| row.version).collect();
        let new_groups: Vec<_> = groups
            .into_iter()
            .filter(|group| !group.is_registered(&rows))
            .collect();

        let undetermined: Vec<String> = new_groups
            .iter()
            .filter(|group| group.kind == GroupKind::Undetermined)
            .map(|group| group.directory.clone())
            .collect();
        if undetermined.len() > 1 {
            return Err(CatalogError::AmbiguousVersion {
                key: key.clone(),
                storage_name: storage_name.to_string(),
                directories: undetermined,
            });
        }

        let assignments = match VersionGapResolver::plan(&existing, new_groups)? {
            VersionPlan::Assign(assignments) => assignments,
            VersionPlan::GapAtOutset { lowest_implied } => {
                tracing::warn!(
                    prefix = %prefix,
                    lowest_implied,
                    "Storage holds data versions above 0 but the catalog has none; registering nothing"
                );
                return Ok(Reconciled::GapSuppressed);
            }
        };

        let batch: Vec<RegisteredData> = assignments
            .into_iter()
            .map(|(version, group)| {
                RegisteredData::new(key.clone(), version, DataStatus::UNREGISTERED, storage_name)
                    .with_directory(group.directory)
                    .with_files(group.keys)
            })
            .collect();
        let registered = if batch.is_empty() {
            batch
        } else {
            self.index.persist_all(batch).await?
        };
        for stored in &registered {
            tracing::debug!(
                version = stored.version,
                directory = stored.storage_directory.as_deref().unwrap_or_default(),
                files = stored.storage_files.len(),
                "Registered data version"
            );
        }

        if registered.is_empty() {
            tracing::debug!(existing = existing.len(), "Nothing to reconcile");
        } else {
            tracing::info!(
                registered = registered.len(),
                first_version = registered.first().map(|r| r.version),
                last_version = registered.last().map(|r| r.version),
                "Registered unregistered data found in storage"
            );
        }

        Ok(Reconciled::Registered(registered))
    }
}

enum Reconciled {
    Registered(Vec<RegisteredData>),
    GapSuppressed,
}

impl Reconciled {
    fn into_rows(self) -> Vec<RegisteredData> {
        match self {
            Self::Registered(rows) => rows,
            Self::GapSuppressed => Vec::new(),
        }
    }
}

/// Trims and validates a key and storage name.
pub(crate) fn normalize(key: &CatalogKey, storage_name: &str) -> Result<(CatalogKey, String)> {
    let key = key.normalized()?;
    let storage_name = storage_name.trim();
    if storage_name.is_empty() {
        return Err(CatalogError::validation(
            "storage_name",
            "The storage name is required",
        ));
    }
    Ok((key, storage_name.to_string()))
}
