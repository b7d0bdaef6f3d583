//! Error types and result aliases for cairn.
//!
//! This module defines the shared error types used by the key, path, storage and
//! status primitives. Errors are structured for programmatic handling and carry
//! the offending field, storage name or status so callers can log and decide on
//! retries without parsing messages.

use crate::status::DataStatus;

/// The result type used throughout cairn-core.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in cairn core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required key field is missing or blank.
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
        /// The field whose value produced the bad segment.
        field: &'static str,
        /// Description of what made the segment invalid.
        message: String,
    },

    /// The named storage location is not known.
    #[error("Storage with name \"{storage_name}\" doesn't exist.")]
    StorageNotFound {
        /// The storage name that was looked up.
        storage_name: String,
    },

    /// The storage location is not backed by a prefix-listable object store.
    #[error("The specified storage '{storage_name}' is not an object store platform ({platform}).")]
    UnsupportedPlatform {
        /// The storage name that was resolved.
        storage_name: String,
        /// The platform the storage is backed by.
        platform: String,
    },

    /// A storage listing failed.
    #[error("storage unavailable: {message}")]
    StorageUnavailable {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A status change is not permitted by the lifecycle state machine.
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: DataStatus,
        /// Requested status.
        to: DataStatus,
    },

    /// An identifier could not be parsed.
    #[error("invalid ID: {message}")]
    InvalidId {
        /// Description of the parse failure.
        message: String,
    },

    /// Invalid input was provided (configuration, arguments).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a validation error for a field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Creates an invalid key segment error for a field.
    #[must_use]
    pub fn invalid_key(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidKey {
            field,
            message: message.into(),
        }
    }

    /// Creates a storage unavailable error with the given message.
    #[must_use]
    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a storage unavailable error with a source cause.
    #[must_use]
    pub fn storage_unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
