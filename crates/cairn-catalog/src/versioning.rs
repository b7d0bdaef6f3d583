//! Data version assignment.
//!
//! New versions always continue from the catalog's own maximum. Storage-implied
//! numbering (`data-v=<n>`) only decides the order in which new groupings are
//! numbered. It never back-fills a hole left below the maximum.

use std::collections::BTreeSet;

use crate::error::{CatalogError, Result};
use crate::grouping::{GroupKind, StorageObjectGroup};

/// Outcome of planning versions for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionPlan {
    /// Register each grouping under the paired version, in this order.
    Assign(Vec<(u32, StorageObjectGroup)>),
    /// Registration would need history the catalog never recorded.
    GapAtOutset {
        /// Lowest storage-implied version among the new groupings.
        lowest_implied: u32,
    },
}

impl VersionPlan {
    /// Returns the number of versions this plan registers.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Assign(pairs) => pairs.len(),
            Self::GapAtOutset { .. } => 0,
        }
    }

    /// Returns true if nothing will be registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Computes assignable data versions.
pub struct VersionGapResolver;

impl VersionGapResolver {
    /// Returns the next version after every existing one (0 if none).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Internal`] if the version space is exhausted.
    pub fn next_version(existing: &BTreeSet<u32>) -> Result<u32> {
        match existing.last() {
            None => Ok(0),
            Some(&max) => max.checked_add(1).ok_or_else(|| CatalogError::Internal {
                message: "data version space exhausted".into(),
            }),
        }
    }

    /// Returns `count` consecutive versions starting after the current maximum.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Internal`] if the version space is exhausted.
    pub fn resolve(existing: &BTreeSet<u32>, count: usize) -> Result<Vec<u32>> {
        let start = Self::next_version(existing)?;
        (0..count)
            .map(|i| {
                u32::try_from(i)
                    .ok()
                    .and_then(|i| start.checked_add(i))
                    .ok_or_else(|| CatalogError::Internal {
                        message: "data version space exhausted".into(),
                    })
            })
            .collect()
    }

    /// Plans versions for the new (not yet registered) groupings of one key.
    ///
    /// Versioned groupings are numbered first in ascending storage order,
    /// followed by the undetermined grouping. When the catalog knows no version
    /// at all and every new grouping claims a version above 0, the plan is
    /// [`VersionPlan::GapAtOutset`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Internal`] if the version space is exhausted.
    pub fn plan(
        existing: &BTreeSet<u32>,
        mut groups: Vec<StorageObjectGroup>,
    ) -> Result<VersionPlan> {
        groups.sort_by(|a, b| match (a.kind, b.kind) {
            (GroupKind::Versioned(x), GroupKind::Versioned(y)) => {
                x.cmp(&y).then_with(|| a.directory.cmp(&b.directory))
            }
            (GroupKind::Versioned(_), GroupKind::Undetermined) => std::cmp::Ordering::Less,
            (GroupKind::Undetermined, GroupKind::Versioned(_)) => std::cmp::Ordering::Greater,
            (GroupKind::Undetermined, GroupKind::Undetermined) => a.directory.cmp(&b.directory),
        });

        let has_undetermined = groups.iter().any(|g| g.kind == GroupKind::Undetermined);
        let gap = groups
            .iter()
            .filter_map(StorageObjectGroup::implied_version)
            .min()
            .filter(|&lowest| lowest > 0 && existing.is_empty() && !has_undetermined);
        if let Some(lowest_implied) = gap {
            return Ok(VersionPlan::GapAtOutset { lowest_implied });
        }

        let versions = Self::resolve(existing, groups.len())?;
        Ok(VersionPlan::Assign(versions.into_iter().zip(groups).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(directory: &str, kind: GroupKind) -> StorageObjectGroup {
        StorageObjectGroup {
            directory: directory.to_string(),
            kind,
            keys: vec![format!("{directory}/f.txt")],
        }
    }

    fn assigned(plan: VersionPlan) -> Vec<(u32, String)> {
        match plan {
            VersionPlan::Assign(pairs) => pairs.into_iter().map(|(v, g)| (v, g.directory)).collect(),
            VersionPlan::GapAtOutset { .. } => panic!("expected an assignment"),
        }
    }

    #[test]
    fn next_version_starts_at_zero() {
        assert_eq!(VersionGapResolver::next_version(&BTreeSet::new()).unwrap(), 0);
        assert_eq!(
            VersionGapResolver::next_version(&BTreeSet::from([0, 1, 4])).unwrap(),
            5
        );
    }

    #[test]
    fn removed_versions_are_never_back_filled() {
        let versions = VersionGapResolver::resolve(&BTreeSet::from([0, 2]), 1).unwrap();
        assert_eq!(versions, vec![3]);
    }

    #[test]
    fn resolve_yields_consecutive_versions() {
        let versions = VersionGapResolver::resolve(&BTreeSet::from([0]), 3).unwrap();
        assert_eq!(versions, vec![1, 2, 3]);
        assert!(VersionGapResolver::resolve(&BTreeSet::new(), 0).unwrap().is_empty());
    }

    #[test]
    fn exhausted_version_space_is_an_error() {
        let err = VersionGapResolver::resolve(&BTreeSet::from([u32::MAX]), 1).unwrap_err();
        assert!(matches!(err, CatalogError::Internal { .. }));
        let err = VersionGapResolver::resolve(&BTreeSet::from([u32::MAX - 1]), 2).unwrap_err();
        assert!(matches!(err, CatalogError::Internal { .. }));
    }

    #[test]
    fn versioned_groups_come_first_in_storage_order() {
        let plan = VersionGapResolver::plan(
            &BTreeSet::from([0]),
            vec![
                group("p", GroupKind::Undetermined),
                group("p/data-v=5", GroupKind::Versioned(5)),
                group("p/data-v=2", GroupKind::Versioned(2)),
            ],
        )
        .unwrap();
        assert_eq!(
            assigned(plan),
            vec![
                (1, "p/data-v=2".to_string()),
                (2, "p/data-v=5".to_string()),
                (3, "p".to_string()),
            ]
        );
    }

    #[test]
    fn gap_at_outset_registers_nothing() {
        let plan = VersionGapResolver::plan(
            &BTreeSet::new(),
            vec![group("p/data-v=1", GroupKind::Versioned(1))],
        )
        .unwrap();
        assert_eq!(plan, VersionPlan::GapAtOutset { lowest_implied: 1 });
        assert!(plan.is_empty());
    }

    #[test]
    fn storage_version_zero_is_not_a_gap() {
        let plan = VersionGapResolver::plan(
            &BTreeSet::new(),
            vec![
                group("p/data-v=0", GroupKind::Versioned(0)),
                group("p/data-v=3", GroupKind::Versioned(3)),
            ],
        )
        .unwrap();
        assert_eq!(
            assigned(plan),
            vec![(0, "p/data-v=0".to_string()), (1, "p/data-v=3".to_string())]
        );
    }

    #[test]
    fn undetermined_grouping_bypasses_the_gap_rule() {
        let plan = VersionGapResolver::plan(
            &BTreeSet::new(),
            vec![
                group("p/data-v=2", GroupKind::Versioned(2)),
                group("p", GroupKind::Undetermined),
            ],
        )
        .unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn gaps_after_known_versions_continue_from_the_maximum() {
        let plan = VersionGapResolver::plan(
            &BTreeSet::from([0]),
            vec![group("p/data-v=4", GroupKind::Versioned(4))],
        )
        .unwrap();
        assert_eq!(assigned(plan), vec![(1, "p/data-v=4".to_string())]);
    }
}
