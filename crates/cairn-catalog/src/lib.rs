//! # cairn-catalog
//!
//! Storage/catalog reconciliation and data versioning for cairn.
//!
//! This crate keeps the catalog consistent with object storage:
//!
//! - **Reconciliation**: [`ReconciliationEngine`] registers data written directly
//!   to storage, one key at a time or fanned out over many keys
//! - **Versioning**: [`VersionGapResolver`] continues from the catalog's own
//!   maximum version and never back-fills removed versions
//! - **Registration**: [`RegistrationService`] pre-registers versions, moves
//!   them through the status lifecycle and attaches attributes
//! - **Index**: the [`CatalogIndex`] contract and an in-memory implementation
//!
//! ## Storage Layout
//!
//! ```text
//! {namespace}/{definition}/{usage}/{file_type}/schm-v{format_version}/{partition_key}={value}/
//! ├── data-v=0/           # registered version 0
//! ├── data-v=1/           # registered version 1
//! └── part-0.txt          # written outside the catalog, found by reconciliation
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use cairn_catalog::prelude::*;
//! use cairn_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let key = CatalogKey::new("ns", "orders", "PRC", "TXT", 0, "TRADE_DATE", "2024-01-31");
//!
//! let storage = Arc::new(MemoryBackend::new());
//! storage
//!     .put("managed", "ns/orders/PRC/TXT/schm-v0/TRADE_DATE=2024-01-31/part-0.txt", Bytes::new())
//!     .unwrap();
//!
//! let index = Arc::new(MemoryCatalogIndex::new());
//! index.register_format(key.format_key()).unwrap();
//!
//! let locations = StaticStorageLocations::new()
//!     .with(StorageLocation::new("S3_MANAGED", StoragePlatform::S3, "managed"));
//!
//! let engine = ReconciliationEngine::new(storage, Arc::new(locations), index);
//! let registered = engine.reconcile(&key, "S3_MANAGED").await.unwrap();
//! assert_eq!(registered[0].version, 0);
//! assert_eq!(registered[0].status, DataStatus::UNREGISTERED);
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod grouping;
pub mod index;
pub mod key_lock;
pub mod metrics;
pub mod reconciler;
pub mod registered;
pub mod registration;
pub mod versioning;

// Re-export main types at crate root
pub use config::ReconcilerConfig;
pub use error::{CatalogError, Result};
pub use grouping::{GroupKind, StorageGrouper, StorageObjectGroup};
pub use index::{CatalogIndex, MemoryCatalogIndex};
pub use key_lock::{KeyLockGuard, KeyLocks};
pub use reconciler::{ReconcileOutcome, ReconcileRequest, ReconciliationEngine};
pub use registered::RegisteredData;
pub use registration::RegistrationService;
pub use versioning::{VersionGapResolver, VersionPlan};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::ReconcilerConfig;
    pub use crate::error::CatalogError;
    pub use crate::index::{CatalogIndex, MemoryCatalogIndex};
    pub use crate::key_lock::KeyLocks;
    pub use crate::reconciler::{ReconcileOutcome, ReconcileRequest, ReconciliationEngine};
    pub use crate::registered::RegisteredData;
    pub use crate::registration::RegistrationService;
}
