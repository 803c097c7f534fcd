//! FILENAME: core/lineup-engine/src/stats/mod.rs
//! Lazily computed, cached column statistics over a subset of a ranking.
//!
//! Numeric columns summarize as a histogram with quartiles (or a box plot on
//! request), categorical and selection columns as per-category counts. Text
//! and nested columns have no summary.

pub mod cache;
pub mod summary;

use std::sync::Arc;

use lineup_data::{DataIndex, RowSource};

use crate::column::{ColumnId, ColumnTree, RowRef};
pub use cache::{DroppedColumns, StatsCache, StatsKey, SubsetId, SubsetSlot, SummaryKind};
pub use summary::{
    bin_count, quantile, BoxPlot, BoxPlotSummary, CategoricalAccumulator, CategoricalSummary, CategoryBin,
    HistogramBin, NumericAccumulator, NumericSummary, Summary,
};

enum Pending {
    Numeric {
        slot: usize,
        domain: Option<[f64; 2]>,
        acc: NumericAccumulator,
    },
    Categorical {
        slot: usize,
        acc: CategoricalAccumulator,
    },
}

/// Statistics access for one subset (whole order or one leaf group).
pub struct SubsetStats<'a> {
    tree: &'a ColumnTree,
    source: &'a dyn RowSource,
    subset: SubsetId,
    indices: Arc<[DataIndex]>,
    cache: &'a mut StatsCache,
    /// False while the ranking has unpublished changes; results are then
    /// computed without touching the cache.
    cacheable: bool,
}

impl<'a> SubsetStats<'a> {
    pub(crate) fn new(
        tree: &'a ColumnTree,
        source: &'a dyn RowSource,
        subset: SubsetId,
        indices: Arc<[DataIndex]>,
        cache: &'a mut StatsCache,
        cacheable: bool,
    ) -> Self {
        SubsetStats {
            tree,
            source,
            subset,
            indices,
            cache,
            cacheable,
        }
    }

    pub fn subset(&self) -> SubsetId {
        self.subset
    }

    /// Number of rows in the subset.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn key(&self, column: ColumnId, kind: SummaryKind) -> StatsKey {
        StatsKey {
            column,
            subset: self.subset,
            kind,
        }
    }

    /// Memoized summary, only consulted while the subset is current.
    fn cached(&mut self, column: ColumnId, kind: SummaryKind) -> Option<Summary> {
        if !self.cacheable {
            return None;
        }
        let key = self.key(column, kind);
        self.cache.get(&key).cloned()
    }

    pub fn for_column(&mut self, column: ColumnId) -> Option<Summary> {
        self.for_columns(&[column]).pop().flatten()
    }

    /// Summaries for several columns. Uncached columns are computed in a
    /// single pass over the subset.
    pub fn for_columns(&mut self, columns: &[ColumnId]) -> Vec<Option<Summary>> {
        let mut out: Vec<Option<Summary>> = vec![None; columns.len()];
        let mut pending = Vec::new();

        for (slot, column) in columns.iter().enumerate() {
            if !self.tree.contains(*column) {
                continue;
            }
            if let Some(summary) = self.cached(*column, SummaryKind::Distribution) {
                out[slot] = Some(summary);
            } else if let Some(numeric) = self.tree.numeric(*column) {
                pending.push(Pending::Numeric {
                    slot,
                    domain: numeric.domain,
                    acc: NumericAccumulator::default(),
                });
            } else if let Some(categorical) = self.tree.categorical(*column) {
                pending.push(Pending::Categorical {
                    slot,
                    acc: CategoricalAccumulator::new(categorical.categories.len()),
                });
            }
        }
        if pending.is_empty() {
            return out;
        }

        for index in self.indices.iter() {
            let row = RowRef::from_source(self.source, *index);
            for p in pending.iter_mut() {
                match p {
                    Pending::Numeric { slot, acc, .. } => acc.add(self.tree.number(columns[*slot], &row)),
                    Pending::Categorical { slot, acc } => {
                        acc.add(self.tree.category(columns[*slot], &row).map(|c| c.index))
                    }
                }
            }
        }

        for p in pending {
            let (slot, summary) = match p {
                Pending::Numeric { slot, domain, acc } => (slot, Summary::Numeric(acc.summarize(domain))),
                Pending::Categorical { slot, acc } => {
                    let categories = self
                        .tree
                        .categorical(columns[slot])
                        .map(|c| c.categories)
                        .unwrap_or(&[]);
                    (slot, Summary::Categorical(acc.summarize(categories)))
                }
            };
            if self.cacheable {
                self.cache
                    .insert(self.key(columns[slot], SummaryKind::Distribution), summary.clone());
            }
            out[slot] = Some(summary);
        }
        out
    }

    /// Box-plot summary of a numeric column; `None` for other kinds.
    pub fn box_plot(&mut self, column: ColumnId) -> Option<BoxPlotSummary> {
        let numeric = self.tree.numeric(column)?;
        if let Some(Summary::BoxPlot(summary)) = self.cached(column, SummaryKind::BoxPlot) {
            return Some(summary);
        }
        let mut acc = NumericAccumulator::default();
        for index in self.indices.iter() {
            acc.add(numeric.number(&RowRef::from_source(self.source, *index)));
        }
        let summary = acc.box_plot();
        if self.cacheable {
            let key = self.key(column, SummaryKind::BoxPlot);
            self.cache.insert(key, Summary::BoxPlot(summary.clone()));
        }
        Some(summary)
    }
}
