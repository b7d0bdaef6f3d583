//! Grouping of matched storage keys into data version directories.
//!
//! Keys below a prefix are bucketed by their first path segment:
//!
//! ```text
//! {prefix}/file.txt                 -> root grouping (undetermined), directory = {prefix}
//! {prefix}/data-v=3/part-0.txt      -> versioned grouping 3, directory = {prefix}/data-v=3
//! {prefix}/partition2=US/...        -> excluded, belongs to a deeper key
//! {prefix}/upload-1/part-0.txt      -> undetermined grouping, directory = {prefix}/upload-1
//! ```

use std::collections::BTreeMap;

use cairn_core::{KeyPrefix, KeyPrefixBuilder};
use cairn_core::key_prefix::SEPARATOR;

use crate::registered::RegisteredData;

/// How a grouping's data version is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKind {
    /// The directory encodes a data version (`data-v=<n>`).
    Versioned(u32),
    /// No version is encoded in the path.
    Undetermined,
}

/// Storage keys sharing one data version directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObjectGroup {
    /// Directory holding the keys, without a trailing separator.
    pub directory: String,
    /// Version encoding of the directory.
    pub kind: GroupKind,
    /// Keys in the grouping, sorted.
    pub keys: Vec<String>,
}

impl StorageObjectGroup {
    /// Returns the storage-implied version, if the path encodes one.
    #[must_use]
    pub fn implied_version(&self) -> Option<u32> {
        match self.kind {
            GroupKind::Versioned(v) => Some(v),
            GroupKind::Undetermined => None,
        }
    }

    /// Returns true if the catalog already accounts for this grouping.
    ///
    /// A grouping is accounted for when a row has the same directory, when
    /// every key is a recorded file of some row, or when its storage-implied
    /// version belongs to a row that records no directory. A row whose
    /// directory points elsewhere never claims this grouping by number alone,
    /// since catalog versions and `data-v=<n>` directories can disagree.
    #[must_use]
    pub fn is_registered(&self, rows: &[RegisteredData]) -> bool {
        let same_directory = rows.iter().any(|row| {
            row.storage_directory
                .as_deref()
                .is_some_and(|dir| dir.trim_end_matches(SEPARATOR) == self.directory)
        });
        if same_directory {
            return true;
        }

        let numbered_without_directory = self.implied_version().is_some_and(|v| {
            rows.iter()
                .any(|row| row.version == v && row.storage_directory.is_none())
        });
        if numbered_without_directory {
            return true;
        }

        !self.keys.is_empty()
            && self
                .keys
                .iter()
                .all(|key| rows.iter().any(|row| row.has_file(key)))
    }
}

/// Groups boundary-matched keys by data version directory.
pub struct StorageGrouper;

impl StorageGrouper {
    /// Groups `matched` keys found under `prefix`.
    ///
    /// Keys must already have passed [`cairn_core::PrefixMatcher`]. Groupings
    /// are returned ordered by directory.
    #[must_use]
    pub fn group<S: AsRef<str>>(prefix: &KeyPrefix, matched: &[S]) -> Vec<StorageObjectGroup> {
        let mut groups: BTreeMap<String, StorageObjectGroup> = BTreeMap::new();

        for key in matched {
            let key = key.as_ref();
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let rest = rest.trim_start_matches(SEPARATOR);

            let (directory, kind) = match rest.split_once(SEPARATOR) {
                None => (prefix.as_str().to_string(), GroupKind::Undetermined),
                Some((segment, _)) => {
                    if let Some(version) = KeyPrefixBuilder::parse_data_version(segment) {
                        (prefix.data_version_dir(version), GroupKind::Versioned(version))
                    } else if KeyPrefixBuilder::is_sub_partition_segment(segment) {
                        continue;
                    } else {
                        (
                            format!("{}{SEPARATOR}{segment}", prefix.as_str()),
                            GroupKind::Undetermined,
                        )
                    }
                }
            };

            groups
                .entry(directory.clone())
                .or_insert_with(|| StorageObjectGroup {
                    directory,
                    kind,
                    keys: Vec::new(),
                })
                .keys
                .push(key.to_string());
        }

        groups
            .into_values()
            .map(|mut group| {
                group.keys.sort();
                group.keys.dedup();
                group
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::{CatalogKey, DataStatus};

    fn key() -> CatalogKey {
        CatalogKey::new("ns", "def", "PRC", "TXT", 0, "PK", "A")
    }

    fn prefix() -> KeyPrefix {
        KeyPrefixBuilder::build(&key()).unwrap()
    }

    fn p(rest: &str) -> String {
        format!("{}/{rest}", prefix())
    }

    #[test]
    fn files_directly_under_prefix_form_the_root_grouping() {
        let groups = StorageGrouper::group(&prefix(), &[p("b.txt"), p("a.txt")]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].directory, prefix().as_str());
        assert_eq!(groups[0].kind, GroupKind::Undetermined);
        assert_eq!(groups[0].keys, vec![p("a.txt"), p("b.txt")]);
    }

    #[test]
    fn placeholder_object_joins_the_root_grouping() {
        let groups = StorageGrouper::group(&prefix(), &[prefix().into_string()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].directory, prefix().as_str());
    }

    #[test]
    fn data_version_directories_are_versioned() {
        let groups = StorageGrouper::group(
            &prefix(),
            &[p("data-v=1/x.txt"), p("data-v=0/x.txt"), p("data-v=1/y.txt")],
        );
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].kind, GroupKind::Versioned(0));
        assert_eq!(groups[1].kind, GroupKind::Versioned(1));
        assert_eq!(groups[1].keys.len(), 2);
        assert_eq!(groups[1].directory, prefix().data_version_dir(1));
    }

    #[test]
    fn deeper_sub_partitions_are_excluded() {
        let groups = StorageGrouper::group(
            &prefix(),
            &[p("partition2=US/data-v=0/x.txt"), p("data-v=0/x.txt")],
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].implied_version(), Some(0));
    }

    #[test]
    fn other_directories_are_undetermined() {
        let groups =
            StorageGrouper::group(&prefix(), &[p("upload-1/x.txt"), p("upload-2/x.txt")]);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.kind == GroupKind::Undetermined));
        assert_eq!(groups[0].directory, p("upload-1"));
    }

    #[test]
    fn registration_by_directory_version_or_files() {
        let groups = StorageGrouper::group(
            &prefix(),
            &[p("data-v=0/x.txt"), p("data-v=1/x.txt"), p("f.txt"), p("up/x.txt")],
        );
        let by_dir = RegisteredData::new(key(), 7, DataStatus::Valid, "S3")
            .with_directory(format!("{}/", p("up")));
        let by_files = RegisteredData::new(key(), 8, DataStatus::Valid, "S3")
            .with_files(vec![p("f.txt")]);
        let by_number = RegisteredData::new(key(), 0, DataStatus::Valid, "S3");
        let rows = vec![by_number, by_dir, by_files];

        let registered: Vec<bool> = groups.iter().map(|g| g.is_registered(&rows)).collect();
        // Ordered by directory: root, data-v=0, data-v=1, up
        assert_eq!(
            groups.iter().map(|g| g.directory.clone()).collect::<Vec<_>>(),
            vec![prefix().into_string(), p("data-v=0"), p("data-v=1"), p("up")]
        );
        assert_eq!(registered, vec![true, true, false, true]);
    }

    #[test]
    fn version_number_living_elsewhere_does_not_claim_the_directory() {
        let groups = StorageGrouper::group(&prefix(), &[p("data-v=1/x.txt")]);
        let elsewhere = RegisteredData::new(key(), 1, DataStatus::UNREGISTERED, "S3")
            .with_directory(p("data-v=4"));

        assert!(!groups[0].is_registered(&[elsewhere]));
    }
}
