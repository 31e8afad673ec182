//! Ordered index over the log positions contributing to queue state.

use std::collections::BTreeMap;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use sluice_types::LogIndex;

/// Ordered map from [`LogIndex`] to an optional shadow slot.
///
/// Every log index still contributing to queue state — unassigned or
/// checked out — has exactly one entry here. The shadow slot co-locates
/// a reduced state snapshot with the index whose enqueue it preceded,
/// so the snapshot can be published as a release cursor once that index
/// becomes the smallest live one.
///
/// Keys are appended in strictly increasing order; the consensus layer
/// guarantees monotonic log indices, so a violation is a host bug and
/// trips an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index<S> {
    entries: BTreeMap<LogIndex, Option<S>>,
}

impl<S> Default for Index<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Index<S> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Inserts an entry for `idx` carrying an optional shadow.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not strictly greater than every previously
    /// appended key.
    pub fn append(&mut self, idx: LogIndex, shadow: Option<S>) {
        if let Some((last, _)) = self.entries.last_key_value() {
            assert!(
                idx > *last,
                "log index must be appended in strictly increasing order: got {idx} after {last}"
            );
        }
        self.entries.insert(idx, shadow);
    }

    /// Removes the entry for `idx`, if present.
    pub fn delete(&mut self, idx: LogIndex) {
        self.entries.remove(&idx);
    }

    /// Minimum key and its stored shadow, or `None` when empty.
    pub fn smallest(&self) -> Option<(LogIndex, Option<&S>)> {
        self.entries
            .first_key_value()
            .map(|(idx, shadow)| (*idx, shadow.as_ref()))
    }

    /// Least key strictly greater than `idx`.
    pub fn next_key_after(&self, idx: LogIndex) -> Option<LogIndex> {
        self.entries
            .range((Bound::Excluded(idx), Bound::Unbounded))
            .next()
            .map(|(next, _)| *next)
    }

    /// True if an entry exists for `idx`.
    pub fn contains(&self, idx: LogIndex) -> bool {
        self.entries.contains_key(&idx)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Transforms every stored shadow in place. Test support.
    pub fn map<F>(&mut self, mut f: F)
    where
        F: FnMut(LogIndex, Option<S>) -> Option<S>,
    {
        self.entries = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(idx, shadow)| (idx, f(idx, shadow)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(i: u64) -> LogIndex {
        LogIndex::new(i)
    }

    #[test]
    fn smallest_tracks_minimum_key() {
        let mut index: Index<u32> = Index::new();
        assert_eq!(index.smallest(), None);

        index.append(idx(3), Some(30));
        index.append(idx(7), None);
        assert_eq!(index.smallest(), Some((idx(3), Some(&30))));

        index.delete(idx(3));
        assert_eq!(index.smallest(), Some((idx(7), None)));
    }

    #[test]
    fn next_key_after_skips_gaps() {
        let mut index: Index<u32> = Index::new();
        index.append(idx(1), None);
        index.append(idx(5), None);
        index.append(idx(9), None);

        assert_eq!(index.next_key_after(idx(1)), Some(idx(5)));
        assert_eq!(index.next_key_after(idx(2)), Some(idx(5)));
        assert_eq!(index.next_key_after(idx(9)), None);
    }

    #[test]
    fn delete_is_idempotent() {
        let mut index: Index<u32> = Index::new();
        index.append(idx(4), None);
        index.delete(idx(4));
        index.delete(idx(4));
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn map_transforms_every_shadow() {
        let mut index: Index<u32> = Index::new();
        index.append(idx(1), Some(1));
        index.append(idx(2), None);
        index.append(idx(3), Some(3));

        index.map(|_, shadow| shadow.map(|s| s * 10));

        assert_eq!(index.smallest(), Some((idx(1), Some(&10))));
        assert_eq!(index.len(), 3);
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn append_rejects_non_monotonic_key() {
        let mut index: Index<u32> = Index::new();
        index.append(idx(10), None);
        index.append(idx(10), None);
    }
}
