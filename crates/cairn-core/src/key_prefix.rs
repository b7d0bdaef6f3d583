//! Canonical storage key prefixes for catalog keys.
//!
//! This module is the **single source of truth** for where a catalog key's objects
//! live in storage. Reconciliation lists under these prefixes and ordinary
//! registration assigns directories from them, so both must agree byte for byte.
//!
//! # Layout
//!
//! ```text
//! {namespace}/{definition}/{usage}/{file_type}/schm-v{format_version}/{partition_key}={value}
//! ├── partition2={sub_value}/...        # deeper keys (sub-partitions)
//! ├── data-v=0/
//! │   └── *.{ext}
//! └── data-v=1/
//!     └── *.{ext}
//! ```
//!
//! Values are used verbatim: no case folding and no escaping. Any segment that
//! would change the number of path segments (`/`, `\`, `.`, `..`) is rejected,
//! which keeps the mapping from key to prefix injective. A literal `%` is
//! rejected as well: object stores percent-encode paths, and listed keys are
//! decoded before matching, so `%` must only ever mean an escape.

use std::fmt::Write as _;

use crate::catalog_key::CatalogKey;
use crate::error::{Error, Result};

/// Path separator used by every storage backend.
pub const SEPARATOR: char = '/';

/// Label of the directory segment that encodes a data version.
pub const DATA_VERSION_LABEL: &str = "data-v";

/// Label prefix of sub-partition segments (`partition2` .. `partition5`).
pub const SUB_PARTITION_LABEL: &str = "partition";

/// A canonical key prefix (no trailing separator).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Returns the prefix string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the directory holding data version `version` under this prefix.
    #[must_use]
    pub fn data_version_dir(&self, version: u32) -> String {
        format!("{}{SEPARATOR}{DATA_VERSION_LABEL}={version}", self.0)
    }

    /// Returns the prefix as a listing prefix ending in the separator.
    #[must_use]
    pub fn as_directory(&self) -> String {
        format!("{}{SEPARATOR}", self.0)
    }

    /// Consumes the prefix and returns the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for KeyPrefix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds canonical key prefixes from catalog keys.
///
/// # Example
///
/// ```
/// use cairn_core::{CatalogKey, KeyPrefixBuilder};
///
/// let key = CatalogKey::new("ns", "orders", "PRC", "TXT", 1, "TRADE_DATE", "2024-01-31");
/// let prefix = KeyPrefixBuilder::build(&key).unwrap();
/// assert_eq!(prefix.as_str(), "ns/orders/PRC/TXT/schm-v1/TRADE_DATE=2024-01-31");
/// assert_eq!(
///     prefix.data_version_dir(0),
///     "ns/orders/PRC/TXT/schm-v1/TRADE_DATE=2024-01-31/data-v=0"
/// );
/// ```
pub struct KeyPrefixBuilder;

impl KeyPrefixBuilder {
    /// Builds the canonical prefix for `key`.
    ///
    /// Deterministic and free of I/O: the same key always yields the same prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if any segment is empty after trimming, is a
    /// relative path component, or contains a separator or control character.
    /// Also fails if the format version is negative.
    pub fn build(key: &CatalogKey) -> Result<KeyPrefix> {
        let namespace = segment(&key.namespace, "namespace")?;
        let definition = segment(&key.object_definition_name, "object_definition_name")?;
        let usage = segment(&key.format_usage, "format_usage")?;
        let file_type = segment(&key.format_file_type, "format_file_type")?;
        if key.format_version < 0 {
            return Err(Error::invalid_key(
                "format_version",
                format!("{} is negative", key.format_version),
            ));
        }
        let partition_key = segment(&key.partition_key, "partition_key")?;
        if partition_key.contains('=') {
            return Err(Error::invalid_key(
                "partition_key",
                format!("'{partition_key}' must not contain '='"),
            ));
        }
        let partition_value = segment(&key.partition_value, "partition_value")?;

        let mut prefix = format!(
            "{namespace}/{definition}/{usage}/{file_type}/schm-v{}/{partition_key}={partition_value}",
            key.format_version
        );
        for (i, value) in key.sub_partition_values.iter().enumerate() {
            let value = segment(value, "sub_partition_values")?;
            let _ = write!(prefix, "{SEPARATOR}{SUB_PARTITION_LABEL}{}={value}", i + 2);
        }
        Ok(KeyPrefix(prefix))
    }

    /// Parses a `data-v=<n>` directory segment.
    #[must_use]
    pub fn parse_data_version(segment: &str) -> Option<u32> {
        segment
            .strip_prefix(DATA_VERSION_LABEL)?
            .strip_prefix('=')?
            .parse::<u32>()
            .ok()
    }

    /// Returns true if `segment` is a `partition{2..5}=<value>` sub-partition segment.
    #[must_use]
    pub fn is_sub_partition_segment(segment: &str) -> bool {
        let Some((label, _)) = segment.split_once('=') else {
            return false;
        };
        label
            .strip_prefix(SUB_PARTITION_LABEL)
            .and_then(|n| n.parse::<usize>().ok())
            .is_some_and(|n| (2..=5).contains(&n))
    }
}

fn segment<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_key(field, "segment is empty"));
    }
    if trimmed == "." || trimmed == ".." {
        return Err(Error::invalid_key(
            field,
            format!("'{trimmed}' is a relative path component"),
        ));
    }
    if trimmed.contains(SEPARATOR) || trimmed.contains('\\') {
        return Err(Error::invalid_key(
            field,
            format!("'{trimmed}' contains a path separator"),
        ));
    }
    if trimmed.contains('%') {
        return Err(Error::invalid_key(
            field,
            format!("'{trimmed}' contains '%'"),
        ));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(Error::invalid_key(
            field,
            "segment contains control characters",
        ));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CatalogKey {
        CatalogKey::new("ns", "orders", "PRC", "TXT", 1, "TRADE_DATE", "2024-01-31")
    }

    fn invalid_field(key: &CatalogKey) -> &'static str {
        match KeyPrefixBuilder::build(key) {
            Err(Error::InvalidKey { field, .. }) => field,
            other => panic!("expected invalid key, got {other:?}"),
        }
    }

    #[test]
    fn builds_the_documented_layout() {
        let prefix = KeyPrefixBuilder::build(&key()).unwrap();
        assert_eq!(
            prefix.as_str(),
            "ns/orders/PRC/TXT/schm-v1/TRADE_DATE=2024-01-31"
        );
        assert_eq!(
            prefix.as_directory(),
            "ns/orders/PRC/TXT/schm-v1/TRADE_DATE=2024-01-31/"
        );
    }

    #[test]
    fn sub_partitions_are_labelled_by_position() {
        let key = key().with_sub_partition_values(["US", "NYSE"]);
        let prefix = KeyPrefixBuilder::build(&key).unwrap();
        assert!(
            prefix
                .as_str()
                .ends_with("TRADE_DATE=2024-01-31/partition2=US/partition3=NYSE")
        );
    }

    #[test]
    fn same_key_same_prefix() {
        let a = KeyPrefixBuilder::build(&key()).unwrap();
        let b = KeyPrefixBuilder::build(&key()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn case_is_preserved() {
        let mut lower = key();
        lower.partition_value = "a".into();
        let mut upper = key();
        upper.partition_value = "A".into();
        assert_ne!(
            KeyPrefixBuilder::build(&lower).unwrap(),
            KeyPrefixBuilder::build(&upper).unwrap()
        );
    }

    #[test]
    fn separators_are_rejected() {
        let mut k = key();
        k.partition_value = "2024/01".into();
        assert_eq!(invalid_field(&k), "partition_value");

        let mut k = key();
        k.namespace = "a\\b".into();
        assert_eq!(invalid_field(&k), "namespace");

        let k = key().with_sub_partition_values(["x/y"]);
        assert_eq!(invalid_field(&k), "sub_partition_values");
    }

    #[test]
    fn empty_and_relative_segments_are_rejected() {
        let mut k = key();
        k.partition_key = "  ".into();
        assert_eq!(invalid_field(&k), "partition_key");

        let mut k = key();
        k.object_definition_name = "..".into();
        assert_eq!(invalid_field(&k), "object_definition_name");
    }

    #[test]
    fn percent_sign_is_rejected() {
        let mut k = key();
        k.partition_value = "50%".into();
        assert_eq!(invalid_field(&k), "partition_value");

        let mut k = key();
        k.partition_value = "a#b [x]?".into();
        assert!(KeyPrefixBuilder::build(&k).is_ok());
    }

    #[test]
    fn partition_key_cannot_hold_equals() {
        let mut k = key();
        k.partition_key = "A=B".into();
        assert_eq!(invalid_field(&k), "partition_key");
    }

    #[test]
    fn parses_data_version_segments() {
        assert_eq!(KeyPrefixBuilder::parse_data_version("data-v=0"), Some(0));
        assert_eq!(KeyPrefixBuilder::parse_data_version("data-v=17"), Some(17));
        assert_eq!(KeyPrefixBuilder::parse_data_version("data-v=x"), None);
        assert_eq!(KeyPrefixBuilder::parse_data_version("data-v0"), None);
        assert_eq!(KeyPrefixBuilder::parse_data_version("file.txt"), None);
    }

    #[test]
    fn recognizes_sub_partition_segments() {
        assert!(KeyPrefixBuilder::is_sub_partition_segment("partition2=US"));
        assert!(KeyPrefixBuilder::is_sub_partition_segment("partition5=x"));
        assert!(!KeyPrefixBuilder::is_sub_partition_segment("partition6=x"));
        assert!(!KeyPrefixBuilder::is_sub_partition_segment("partition2"));
        assert!(!KeyPrefixBuilder::is_sub_partition_segment("data-v=1"));
    }
}
