//! FILENAME: core/lineup-engine/src/stats/cache.rs
//! Memoized summaries keyed by column, subset and summary kind.
//!
//! Subsets carry the generation of the order they were cut from, so a new
//! order supersedes every entry of older generations without comparing row
//! sets. Each drop operation reports the columns it dropped entries for so
//! the owner can announce them.

use log::trace;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::summary::Summary;
use crate::column::ColumnId;

/// Which slice of a ranking's order a summary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubsetSlot {
    /// The whole (filtered) order.
    Order,
    /// One leaf group, by index.
    Group(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubsetId {
    pub generation: u64,
    pub slot: SubsetSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SummaryKind {
    /// Histogram (numeric) or category counts (categorical).
    Distribution,
    BoxPlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatsKey {
    pub column: ColumnId,
    pub subset: SubsetId,
    pub kind: SummaryKind,
}

/// Columns whose entries were dropped by one invalidation.
pub type DroppedColumns = SmallVec<[ColumnId; 4]>;

#[derive(Debug, Default)]
pub struct StatsCache {
    entries: FxHashMap<StatsKey, Summary>,
    hits: u64,
    misses: u64,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation.
    pub fn counters(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn get(&mut self, key: &StatsKey) -> Option<&Summary> {
        match self.entries.get(key) {
            Some(summary) => {
                self.hits += 1;
                trace!("stats hit {} {:?}", key.column, key.subset);
                Some(summary)
            }
            None => {
                self.misses += 1;
                trace!("stats miss {} {:?}", key.column, key.subset);
                None
            }
        }
    }

    pub fn contains(&self, key: &StatsKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: StatsKey, summary: Summary) {
        self.entries.insert(key, summary);
    }

    fn drop_where(&mut self, mut doomed: impl FnMut(&StatsKey) -> bool) -> DroppedColumns {
        let mut dropped = DroppedColumns::new();
        self.entries.retain(|key, _| {
            if doomed(key) {
                if !dropped.contains(&key.column) {
                    dropped.push(key.column);
                }
                false
            } else {
                true
            }
        });
        dropped.sort();
        dropped
    }

    /// Drops every entry cut from an order other than `generation`.
    pub fn retain_generation(&mut self, generation: u64) -> DroppedColumns {
        self.drop_where(|key| key.subset.generation != generation)
    }

    pub fn invalidate_columns(&mut self, columns: &[ColumnId]) -> DroppedColumns {
        self.drop_where(|key| columns.contains(&key.column))
    }

    pub fn clear(&mut self) -> DroppedColumns {
        self.drop_where(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::summary::{BoxPlotSummary, Summary};

    fn key(local: u32, generation: u64) -> StatsKey {
        StatsKey {
            column: ColumnId { ranking: 0, local },
            subset: SubsetId {
                generation,
                slot: SubsetSlot::Order,
            },
            kind: SummaryKind::BoxPlot,
        }
    }

    fn create_test_summary() -> Summary {
        Summary::BoxPlot(BoxPlotSummary {
            count: 0,
            missing: 0,
            box_plot: None,
        })
    }

    #[test]
    fn test_hits_and_misses() {
        let mut cache = StatsCache::new();
        assert!(cache.get(&key(0, 1)).is_none());
        cache.insert(key(0, 1), create_test_summary());
        assert!(cache.get(&key(0, 1)).is_some());
        assert_eq!(cache.counters(), (1, 1));
    }

    #[test]
    fn test_generation_supersedes_entries() {
        let mut cache = StatsCache::new();
        cache.insert(key(0, 1), create_test_summary());
        cache.insert(key(1, 1), create_test_summary());
        cache.insert(key(1, 2), create_test_summary());

        let dropped = cache.retain_generation(2);

        assert_eq!(dropped.as_slice(), &[ColumnId { ranking: 0, local: 0 }, ColumnId { ranking: 0, local: 1 }]);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key(1, 2)));
    }

    #[test]
    fn test_invalidate_columns_and_clear() {
        let mut cache = StatsCache::new();
        cache.insert(key(0, 1), create_test_summary());
        cache.insert(key(1, 1), create_test_summary());

        let dropped = cache.invalidate_columns(&[ColumnId { ranking: 0, local: 1 }]);
        assert_eq!(dropped.len(), 1);
        assert_eq!(cache.clear().len(), 1);
        assert!(cache.is_empty());
        assert!(cache.clear().is_empty());
    }
}
