//! Assertion helpers for registered data.

use cairn_catalog::{CatalogIndex, RegisteredData};
use cairn_core::{CatalogKey, DataStatus};

/// Asserts the registered rows carry exactly `expected` versions, in order.
///
/// # Panics
///
/// Panics if the versions differ.
pub fn assert_versions(rows: &[RegisteredData], expected: &[u32]) {
    let actual: Vec<u32> = rows.iter().map(|r| r.version).collect();
    assert_eq!(actual, expected, "Unexpected registered versions");
}

/// Asserts every row was registered by reconciliation.
///
/// # Panics
///
/// Panics if any row is not in the unregistered status.
pub fn assert_all_unregistered(rows: &[RegisteredData]) {
    for row in rows {
        assert_eq!(
            row.status,
            DataStatus::UNREGISTERED,
            "Version {} has status {}",
            row.version,
            row.status
        );
    }
}

/// Asserts exactly one version of `key` is marked latest and that it is the highest.
///
/// # Panics
///
/// Panics if the latest marker is missing, duplicated or misplaced.
pub async fn assert_single_latest(index: &dyn CatalogIndex, key: &CatalogKey) {
    let rows = index.registered(key).await.expect("registered rows");
    let latest: Vec<u32> = rows
        .iter()
        .filter(|r| r.latest_version)
        .map(|r| r.version)
        .collect();
    let highest = rows.iter().map(|r| r.version).max();

    assert_eq!(latest.len(), 1, "Expected one latest version, got {latest:?}");
    assert_eq!(latest.first().copied(), highest, "Latest is not the highest version");
}
