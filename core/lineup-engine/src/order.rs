//! FILENAME: core/lineup-engine/src/order.rs
//! Order computation: sort criteria -> total order over data indices.
//!
//! Sort keys are extracted once per row and criterion, then the filtered
//! population (in ascending data-index order) goes through one stable sort.
//! Rows that compare equal on every criterion keep their data-index order.

use std::cmp::Ordering;
use std::sync::Arc;

use lineup_data::{DataIndex, RowSource};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::column::{ColumnId, ColumnKind, ColumnTree, RowRef};
use crate::config::MissingPlacement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortCriterion {
    pub column: ColumnId,
    pub ascending: bool,
}

impl SortCriterion {
    pub fn new(column: ColumnId, ascending: bool) -> Self {
        SortCriterion { column, ascending }
    }
}

/// Immutable snapshot of a ranking's row order. Recomputed, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    generation: u64,
    indices: Arc<[DataIndex]>,
}

impl Order {
    pub fn new(generation: u64, indices: Vec<DataIndex>) -> Self {
        Order {
            generation,
            indices: indices.into(),
        }
    }

    pub fn empty() -> Self {
        Order::new(0, Vec::new())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn indices(&self) -> &[DataIndex] {
        &self.indices
    }

    /// Shared handle to the index sequence.
    pub fn shared(&self) -> Arc<[DataIndex]> {
        Arc::clone(&self.indices)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Rank (0-based position) of a data index, if it is part of the order.
    pub fn rank_of(&self, index: DataIndex) -> Option<usize> {
        self.indices.iter().position(|i| *i == index)
    }
}

// ============================================================================
// SORT KEYS
// ============================================================================

/// Precomputed comparison key of one row for one criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Missing,
    /// Selection state; selected rows rank first in ascending order.
    Bool(bool),
    Number(f64),
    Text(String),
    /// Position in the declared category list.
    Category(usize),
    /// Children of a nested column, compared lexicographically.
    Tuple(Vec<SortKey>),
}

impl SortKey {
    pub fn extract(tree: &ColumnTree, id: ColumnId, row: &RowRef<'_>) -> SortKey {
        let column = tree.column(id);
        if let ColumnKind::Nested { children, .. } = &column.kind {
            return SortKey::Tuple(children.iter().map(|c| SortKey::extract(tree, *c, row)).collect());
        }
        if tree.is_missing(id, row) {
            return SortKey::Missing;
        }
        match &column.kind {
            ColumnKind::Text { .. } => SortKey::Text(tree.label(id, row).to_lowercase()),
            ColumnKind::Number { .. } | ColumnKind::Stack { .. } => SortKey::Number(tree.number(id, row)),
            ColumnKind::Categorical { .. } => match tree.category(id, row) {
                Some(category) => SortKey::Category(category.index),
                None => SortKey::Missing,
            },
            ColumnKind::Selection => SortKey::Bool(row.selected),
            ColumnKind::Nested { .. } => SortKey::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, SortKey::Missing)
    }

    /// Ascending comparison with missing values greatest.
    pub fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
            (SortKey::Missing, _) => Ordering::Greater,
            (_, SortKey::Missing) => Ordering::Less,

            (SortKey::Number(a), SortKey::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Category(a), SortKey::Category(b)) => a.cmp(b),
            (SortKey::Bool(a), SortKey::Bool(b)) => b.cmp(a),
            (SortKey::Tuple(a), SortKey::Tuple(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.compare(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),

            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Bool(_) => 0,
            SortKey::Number(_) => 1,
            SortKey::Category(_) => 2,
            SortKey::Text(_) => 3,
            SortKey::Tuple(_) => 4,
            SortKey::Missing => 5,
        }
    }
}

/// Compares two keys for one criterion, honoring direction and missing placement.
/// Tuples apply the placement rule to each child.
pub fn compare_keys(a: &SortKey, b: &SortKey, ascending: bool, placement: MissingPlacement) -> Ordering {
    if let (SortKey::Tuple(x), SortKey::Tuple(y)) = (a, b) {
        return x
            .iter()
            .zip(y)
            .map(|(p, q)| compare_keys(p, q, ascending, placement))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| {
                let by_len = x.len().cmp(&y.len());
                if ascending {
                    by_len
                } else {
                    by_len.reverse()
                }
            });
    }
    let ord = a.compare(b);
    if ascending {
        return ord;
    }
    match placement {
        MissingPlacement::FollowDirection => ord.reverse(),
        MissingPlacement::Last if a.is_missing() || b.is_missing() => ord,
        MissingPlacement::Last => ord.reverse(),
    }
}

// ============================================================================
// ORDER COMPUTATION
// ============================================================================

/// Rows that pass every column filter, in ascending data-index order.
pub fn filtered_population(tree: &ColumnTree, filtered: &[ColumnId], source: &dyn RowSource) -> Vec<DataIndex> {
    (0..source.len() as DataIndex)
        .filter(|index| {
            let row = RowRef::from_source(source, *index);
            filtered.iter().all(|id| {
                tree.column(*id)
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.accepts(tree, *id, &row))
            })
        })
        .collect()
}

pub fn compute_order(
    tree: &ColumnTree,
    criteria: &[SortCriterion],
    filtered: &[ColumnId],
    source: &dyn RowSource,
    placement: MissingPlacement,
    generation: u64,
) -> Order {
    let population = filtered_population(tree, filtered, source);
    if criteria.is_empty() {
        return Order::new(generation, population);
    }

    let mut keyed: Vec<(DataIndex, SmallVec<[SortKey; 2]>)> = population
        .into_iter()
        .map(|index| {
            let row = RowRef::from_source(source, index);
            let keys = criteria
                .iter()
                .map(|c| SortKey::extract(tree, c.column, &row))
                .collect();
            (index, keys)
        })
        .collect();

    keyed.sort_by(|(_, a), (_, b)| {
        criteria
            .iter()
            .enumerate()
            .map(|(i, c)| compare_keys(&a[i], &b[i], c.ascending, placement))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });

    Order::new(generation, keyed.into_iter().map(|(index, _)| index).collect())
}
