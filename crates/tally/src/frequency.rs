//! Frequency tables and ranked score views.
//!
//! A [`FrequencyTable`] counts occurrences of string keys. Reading it never
//! hands out references into its storage: [`FrequencyTable::scores`] returns
//! an owned [`ScoreList`] snapshot that can be sorted, filtered and truncated
//! freely.
//!
//! ## Ordering
//!
//! Every sort in this module orders by count descending. Equal counts are
//! ordered by key ascending (byte-wise), so ranked output is deterministic
//! across runs even though the underlying map iterates in arbitrary order.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A single `(key, count)` pair taken from a [`FrequencyTable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    pub key: String,
    pub count: u64,
}

impl Score {
    /// Create a new score.
    pub fn new(key: impl Into<String>, count: u64) -> Self {
        Self {
            key: key.into(),
            count,
        }
    }
}

/// Count descending, then key ascending.
fn rank(a: &Score, b: &Score) -> Ordering {
    b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key))
}

/// Occurrence counts keyed by arbitrary strings.
///
/// Only ever grows: there is no decrement, and a key is present exactly when
/// it has been incremented at least once. Not synchronized; the owner is the
/// single writer.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    counts: FxHashMap<String, u64>,
}

impl FrequencyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `key`.
    pub fn increment(&mut self, key: &str) {
        // Avoid allocating the key on the hot path when it already exists.
        if let Some(count) = self.counts.get_mut(key) {
            *count = count.saturating_add(1);
        } else {
            self.counts.insert(key.to_owned(), 1);
        }
    }

    /// Current count for `key`, zero when absent.
    pub fn count(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether nothing has been counted yet.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Snapshot of every key and its count, in unspecified order.
    pub fn scores(&self) -> ScoreList {
        self.counts
            .iter()
            .map(|(key, count)| Score::new(key.clone(), *count))
            .collect()
    }

    /// Snapshot of every key ranked by count descending.
    ///
    /// Equal counts are ordered by key ascending.
    pub fn sorted_scores(&self) -> ScoreList {
        let mut scores = self.scores();
        scores.sort_in_place();
        scores
    }
}

impl<S: AsRef<str>> Extend<S> for FrequencyTable {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for key in iter {
            self.increment(key.as_ref());
        }
    }
}

/// An owned sequence of [`Score`]s.
///
/// All view operations return a new list and leave `self` untouched, so they
/// chain: `scores.greater_than(1).sorted().first(10)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreList(Vec<Score>);

impl ScoreList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Score> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Score] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Score> {
        self.0
    }

    /// A copy ranked by count descending, equal counts by key ascending.
    pub fn sorted(&self) -> ScoreList {
        let mut copy = self.clone();
        copy.sort_in_place();
        copy
    }

    /// Scores whose count is strictly greater than `n`, in their current order.
    pub fn greater_than(&self, n: u64) -> ScoreList {
        self.0.iter().filter(|s| s.count > n).cloned().collect()
    }

    /// The first `min(n, len)` scores. `first(0)` is empty.
    pub fn first(&self, n: usize) -> ScoreList {
        self.0.iter().take(n).cloned().collect()
    }

    fn sort_in_place(&mut self) {
        // The comparator is a total order, so an unstable sort is deterministic.
        self.0.sort_unstable_by(rank);
    }
}

impl From<Vec<Score>> for ScoreList {
    fn from(scores: Vec<Score>) -> Self {
        Self(scores)
    }
}

impl FromIterator<Score> for ScoreList {
    fn from_iter<I: IntoIterator<Item = Score>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ScoreList {
    type Item = Score;
    type IntoIter = std::vec::IntoIter<Score>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ScoreList {
    type Item = &'a Score;
    type IntoIter = std::slice::Iter<'a, Score>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
