//! Boundary-aware prefix matching.
//!
//! Object stores list by raw string prefix, so a listing for `.../PARTITION=A`
//! also returns `.../PARTITION=AA/...`. A key only belongs to a prefix when the
//! remainder after the prefix is empty or starts at a path separator.

use crate::key_prefix::SEPARATOR;

/// Filters listed keys down to true descendants of a prefix directory.
pub struct PrefixMatcher;

impl PrefixMatcher {
    /// Returns true if `candidate` is `prefix` itself or lives below it.
    ///
    /// A trailing separator on `prefix` is ignored.
    ///
    /// ```
    /// use cairn_core::PrefixMatcher;
    ///
    /// assert!(PrefixMatcher::matches("ns/def/A", "ns/def/A/file.txt"));
    /// assert!(PrefixMatcher::matches("ns/def/A", "ns/def/A"));
    /// assert!(!PrefixMatcher::matches("ns/def/A", "ns/def/AA/file.txt"));
    /// ```
    #[must_use]
    pub fn matches(prefix: &str, candidate: &str) -> bool {
        let prefix = prefix.trim_end_matches(SEPARATOR);
        match candidate.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }

    /// Returns the matching candidates, sorted and de-duplicated.
    #[must_use]
    pub fn filter<I, S>(prefix: &str, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matched: Vec<String> = candidates
            .into_iter()
            .filter(|c| Self::matches(prefix, c.as_ref()))
            .map(|c| c.as_ref().to_string())
            .collect();
        matched.sort();
        matched.dedup();
        matched
    }
}
