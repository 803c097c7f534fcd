//! FILENAME: core/lineup-engine/src/aggregate.rs
//! Aggregation decision: whether a group renders collapsed or row by row.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::column::RankingId;
use crate::group::{Group, GroupSegment};

/// Decides per (ranking, group) whether the group is shown aggregated.
pub trait AggregationPolicy: Send + Sync + fmt::Debug {
    fn is_aggregated(&self, ranking: RankingId, group: &Group) -> bool;
}

/// Aggregates non-empty groups with fewer than `threshold` rows.
/// A threshold of 0 never aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThresholdPolicy {
    pub threshold: usize,
}

impl ThresholdPolicy {
    pub fn new(threshold: usize) -> Self {
        ThresholdPolicy { threshold }
    }
}

impl AggregationPolicy for ThresholdPolicy {
    fn is_aggregated(&self, _ranking: RankingId, group: &Group) -> bool {
        let len = group.len();
        len > 0 && len < self.threshold
    }
}

/// Explicit per-group decisions that take precedence over the policy,
/// keyed by group key so they survive regrouping and relabelling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationOverrides {
    by_group: FxHashMap<Vec<GroupSegment>, bool>,
}

impl AggregationOverrides {
    pub fn get(&self, key: &[GroupSegment]) -> Option<bool> {
        self.by_group.get(key).copied()
    }

    /// Returns true when the stored decision changed.
    pub fn set(&mut self, key: &[GroupSegment], aggregated: bool) -> bool {
        self.by_group.insert(key.to_vec(), aggregated) != Some(aggregated)
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.by_group.is_empty();
        self.by_group.clear();
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[GroupSegment], bool)> {
        self.by_group.iter().map(|(k, v)| (k.as_slice(), *v))
    }
}
