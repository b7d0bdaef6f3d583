//! Error types for cairn-catalog operations.
//!
//! Every error carries enough context (key, storage name, field or version) for
//! the caller to log it and decide whether to retry. Nothing is retried here.

use cairn_core::{CatalogKey, DataStatus, FormatKey};
use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A required field is missing or blank. Never retryable.
    #[error("{message}")]
    Validation {
        /// The field that failed validation.
        field: &'static str,
        /// Human-readable description.
        message: String,
    },

    /// A key segment cannot be rendered into an unambiguous storage path.
    #[error("invalid key segment {field}: {message}")]
    InvalidKey {
        /// The offending field.
        field: &'static str,
        /// What made the segment invalid.
        message: String,
    },

    /// The named storage does not exist.
    #[error("Storage with name \"{storage_name}\" doesn't exist.")]
    StorageNotFound {
        /// The storage name that was looked up.
        storage_name: String,
    },

    /// The storage is not backed by a prefix-listable object store.
    #[error("The specified storage '{storage_name}' is not an object store platform ({platform}).")]
    UnsupportedPlatform {
        /// The storage name that was resolved.
        storage_name: String,
        /// The platform backing it.
        platform: String,
    },

    /// Listing storage failed. The caller owns the retry policy.
    #[error("storage unavailable while listing '{prefix}' in storage '{storage_name}': {message}")]
    StorageUnavailable {
        /// Storage being listed.
        storage_name: String,
        /// Prefix being listed.
        prefix: String,
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// More than one new undetermined grouping was found in one run.
    #[error(
        "found {} unregistered data directories without a data version for key {key} in storage '{storage_name}': {}",
        .directories.len(),
        .directories.join(", ")
    )]
    AmbiguousVersion {
        /// The key being reconciled.
        key: CatalogKey,
        /// Storage being reconciled.
        storage_name: String,
        /// The competing directories.
        directories: Vec<String>,
    },

    /// A concurrent writer already created this (key, version).
    #[error("data version {version} already exists for key {key}")]
    Conflict {
        /// The contended key.
        key: CatalogKey,
        /// The contended version.
        version: u32,
    },

    /// A status change is not permitted.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: DataStatus,
        /// Requested status.
        to: DataStatus,
    },

    /// The object format is not registered.
    #[error("Business object format with {format} doesn't exist.")]
    FormatNotFound {
        /// The missing format.
        format: FormatKey,
    },

    /// No registered data exists for this key and version.
    #[error("Business object data {key} version {version} doesn't exist.")]
    DataNotFound {
        /// The key looked up.
        key: CatalogKey,
        /// The version looked up.
        version: u32,
    },

    /// An attribute with this name is already present.
    #[error("Attribute \"{name}\" already exists for business object data {key} version {version}.")]
    AttributeExists {
        /// The key of the data.
        key: CatalogKey,
        /// The version of the data.
        version: u32,
        /// The duplicate attribute name.
        name: String,
    },

    /// A per-key operation exceeded its deadline.
    #[error("reconciliation of key {key} timed out after {timeout_secs}s")]
    Timeout {
        /// The key that timed out.
        key: CatalogKey,
        /// The configured timeout.
        timeout_secs: u64,
    },

    /// Invalid configuration or arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl CatalogError {
    /// Creates a validation error for a field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns true if the caller may retry the operation unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable { .. } | Self::Conflict { .. } | Self::Timeout { .. }
        )
    }

    /// Adds listing context to a core storage error.
    pub(crate) fn from_listing(
        err: cairn_core::Error,
        storage_name: &str,
        prefix: &str,
    ) -> Self {
        match err {
            cairn_core::Error::StorageUnavailable { message, source } => Self::StorageUnavailable {
                storage_name: storage_name.to_string(),
                prefix: prefix.to_string(),
                message,
                source,
            },
            other => other.into(),
        }
    }
}

impl From<cairn_core::Error> for CatalogError {
    fn from(err: cairn_core::Error) -> Self {
        use cairn_core::Error as Core;
        match err {
            Core::Validation { field, message } => Self::Validation { field, message },
            Core::InvalidKey { field, message } => Self::InvalidKey { field, message },
            Core::StorageNotFound { storage_name } => Self::StorageNotFound { storage_name },
            Core::UnsupportedPlatform {
                storage_name,
                platform,
            } => Self::UnsupportedPlatform {
                storage_name,
                platform,
            },
            Core::StorageUnavailable { message, source } => Self::StorageUnavailable {
                storage_name: String::new(),
                prefix: String::new(),
                message,
                source,
            },
            Core::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
            Core::InvalidId { message } | Core::InvalidInput(message) => {
                Self::InvalidInput(message)
            }
            Core::Internal { message } => Self::Internal { message },
        }
    }
}
