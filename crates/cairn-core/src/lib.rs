//! # cairn-core
//!
//! Core primitives for the cairn object-store data catalog.
//!
//! This crate provides the types every other cairn crate builds on:
//!
//! - **Catalog keys**: [`CatalogKey`] and [`FormatKey`] identify datasets and formats
//! - **Key prefixes**: [`KeyPrefixBuilder`] maps a key to its canonical storage prefix
//! - **Prefix matching**: [`PrefixMatcher`] enforces directory boundaries on listings
//! - **Storage**: [`StorageLister`] and named [`StorageLocation`]s
//! - **Status**: the [`DataStatus`] lifecycle state machine
//!
//! ## Example
//!
//! ```rust
//! use cairn_core::prelude::*;
//!
//! let key = CatalogKey::new("ns", "orders", "PRC", "TXT", 0, "TRADE_DATE", "2024-01-31");
//! let prefix = KeyPrefixBuilder::build(&key).unwrap();
//! assert!(PrefixMatcher::matches(prefix.as_str(), &prefix.data_version_dir(0)));
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod catalog_key;
pub mod error;
pub mod id;
pub mod key_prefix;
pub mod observability;
pub mod prefix_match;
pub mod status;
pub mod storage;
pub mod storage_location;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::catalog_key::{CatalogKey, FormatKey, MAX_SUB_PARTITION_VALUES};
    pub use crate::error::{Error, Result};
    pub use crate::id::DataId;
    pub use crate::key_prefix::{KeyPrefix, KeyPrefixBuilder};
    pub use crate::prefix_match::PrefixMatcher;
    pub use crate::status::DataStatus;
    pub use crate::storage::{MemoryBackend, ObjectStoreBackend, StorageLister};
    pub use crate::storage_location::{
        StaticStorageLocations, StorageLocation, StorageLocationResolver, StoragePlatform,
    };
}

pub use catalog_key::{CatalogKey, FormatKey};
pub use error::{Error, Result};
pub use id::DataId;
pub use key_prefix::{KeyPrefix, KeyPrefixBuilder};
pub use observability::{LogFormat, init_logging};
pub use prefix_match::PrefixMatcher;
pub use status::DataStatus;
pub use storage::{MemoryBackend, ObjectStoreBackend, StorageLister};
pub use storage_location::{
    StaticStorageLocations, StorageLocation, StorageLocationResolver, StoragePlatform,
};
