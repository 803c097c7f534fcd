//! FILENAME: core/lineup-engine/src/ranking.rs
//! Ranking orchestration.
//!
//! A ranking owns its column tree, sort and group criteria, filters and the
//! derived order, groups and statistics. Mutations only record what became
//! dirty; `refresh` runs one recomputation pass for everything accumulated
//! since the previous one:
//!
//! ```text
//! Idle -> Recomputing(Order) -> Recomputing(Groups) -> Idle
//! ```
//!
//! The published order is the leaf groups concatenated in group order; the
//! sorted order is only the input that grouping partitions. Every published
//! pass gets a new generation. Statistics keyed by older generations are
//! dropped at publication time.

use log::{debug, warn};
use rustc_hash::FxHashSet;
use std::sync::mpsc::Receiver;

use lineup_data::{DataEvent, EventBus, RowSource, SourceVersion};

use crate::aggregate::{AggregationOverrides, AggregationPolicy, ThresholdPolicy};
use crate::column::{
    flatten, validate_weights, Column, ColumnFilter, ColumnId, ColumnKind, ColumnTree, FlatColumn, RankingId,
};
use crate::config::RankingConfig;
use crate::descriptor::{ColumnDesc, ColumnType, RankingDesc, SortDesc};
use crate::error::{ConfigError, EngineError, Result};
use crate::events::{ChangeReason, ColumnChange, RankingEvent};
use crate::group::{compute_groups, layout_groups, Group, GroupExtent, GroupSegment, Groups};
use crate::order::{compute_order, Order, SortCriterion};
use crate::stats::{DroppedColumns, StatsCache, SubsetId, SubsetSlot, SubsetStats};

/// Upper bound on passes per refresh when the source keeps moving.
const MAX_PASSES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Order,
    Groups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingState {
    Idle,
    Recomputing(Phase),
}

pub struct Ranking {
    id: RankingId,
    config: RankingConfig,
    tree: ColumnTree,
    /// Top-level columns in display order.
    children: Vec<ColumnId>,
    sort_criteria: Vec<SortCriterion>,
    group_criteria: Vec<ColumnId>,

    /// Sort result before grouping; reused when only the groups change.
    sorted: Order,
    order: Order,
    groups: Groups,
    generation: u64,
    published: Option<SourceVersion>,
    /// Set when a data or selection invalidation reached this ranking since
    /// its last refresh.
    notified: bool,

    dirty_order: Option<ChangeReason>,
    dirty_groups: Option<ChangeReason>,
    state: RankingState,

    stats: StatsCache,
    policy: Box<dyn AggregationPolicy>,
    overrides: AggregationOverrides,
    events: EventBus<RankingEvent>,
}

impl std::fmt::Debug for Ranking {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ranking")
            .field("id", &self.id)
            .field("children", &self.children)
            .field("sort_criteria", &self.sort_criteria)
            .field("group_criteria", &self.group_criteria)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .finish()
    }
}

impl Ranking {
    pub fn new(id: RankingId, config: RankingConfig) -> Self {
        let policy = ThresholdPolicy::new(config.aggregation_threshold);
        Ranking {
            id,
            config,
            tree: ColumnTree::new(id),
            children: Vec::new(),
            sort_criteria: Vec::new(),
            group_criteria: Vec::new(),
            sorted: Order::empty(),
            order: Order::empty(),
            groups: Groups::empty(),
            generation: 0,
            published: None,
            notified: false,
            dirty_order: Some(ChangeReason::DataChanged),
            dirty_groups: None,
            state: RankingState::Idle,
            stats: StatsCache::new(),
            policy: Box::new(policy),
            overrides: AggregationOverrides::default(),
            events: EventBus::new(),
        }
    }

    /// Builds a ranking from its descriptor. Nothing is kept if any column,
    /// sort entry or group entry is invalid.
    pub fn from_desc(id: RankingId, desc: &RankingDesc, config: RankingConfig) -> Result<Self> {
        let mut ranking = Ranking::new(id, config);
        for column in &desc.columns {
            let built = ranking.tree.build(column, None)?;
            ranking.children.push(built);
        }
        for sort in &desc.sort_criteria {
            let column = ranking.resolve_path(&sort.column)?;
            ranking.sort_criteria.push(SortCriterion::new(column, sort.ascending));
        }
        for path in &desc.group_criteria {
            let column = ranking.resolve_path(path)?;
            ranking.check_groupable(column)?;
            ranking.group_criteria.push(column);
        }
        Ok(ranking)
    }

    fn resolve_path(&self, path: &[usize]) -> Result<ColumnId> {
        self.tree
            .resolve_path(&self.children, path)
            .ok_or_else(|| ConfigError::UnknownPath(path.to_vec()).into())
    }

    pub fn to_desc(&self) -> RankingDesc {
        let path = |id: ColumnId| self.tree.path_of(&self.children, id).unwrap_or_default();
        RankingDesc {
            columns: self.children.iter().map(|c| self.tree.to_desc(*c)).collect(),
            sort_criteria: self
                .sort_criteria
                .iter()
                .map(|c| SortDesc {
                    column: path(c.column),
                    ascending: c.ascending,
                })
                .collect(),
            group_criteria: self.group_criteria.iter().map(|c| path(*c)).collect(),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> RankingId {
        self.id
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn tree(&self) -> &ColumnTree {
        &self.tree
    }

    pub fn children(&self) -> &[ColumnId] {
        &self.children
    }

    pub fn column(&self, id: ColumnId) -> Result<&Column> {
        self.tree.get(id).ok_or(EngineError::UnknownColumn(id))
    }

    pub fn sort_criteria(&self) -> &[SortCriterion] {
        &self.sort_criteria
    }

    pub fn group_criteria(&self) -> &[ColumnId] {
        &self.group_criteria
    }

    pub fn state(&self) -> RankingState {
        self.state
    }

    /// True while mutations are waiting for the next refresh.
    pub fn is_dirty(&self) -> bool {
        self.dirty_order.is_some() || self.dirty_groups.is_some()
    }

    pub fn subscribe(&mut self) -> Receiver<RankingEvent> {
        self.events.subscribe()
    }

    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn groups(&self) -> &Groups {
        &self.groups
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn flatten_columns(&self) -> Vec<FlatColumn> {
        flatten(&self.tree, &self.children, self.config.column_padding)
    }

    pub fn group_layout(&self) -> Vec<GroupExtent> {
        layout_groups(&self.groups, &self.config.layout, |g| self.is_aggregated(g))
    }

    // ------------------------------------------------------------------------
    // Dirty tracking
    // ------------------------------------------------------------------------

    fn mark_order(&mut self, reason: ChangeReason) {
        self.dirty_order.get_or_insert(reason);
    }

    fn mark_groups(&mut self, reason: ChangeReason) {
        self.dirty_groups.get_or_insert(reason);
    }

    /// Columns whose value feeds the order (sort criteria and filters) and
    /// the grouping, including everything below them.
    fn watched(&self) -> (FxHashSet<ColumnId>, FxHashSet<ColumnId>) {
        let mut order = FxHashSet::default();
        for criterion in &self.sort_criteria {
            order.extend(self.tree.subtree(criterion.column));
        }
        for id in self.tree.ids() {
            if self.tree.column(id).filter.is_some() {
                order.extend(self.tree.subtree(id));
            }
        }
        let mut groups = FxHashSet::default();
        for column in &self.group_criteria {
            groups.extend(self.tree.subtree(*column));
        }
        (order, groups)
    }

    fn mark_if_watched<'c>(&mut self, changed: impl IntoIterator<Item = &'c ColumnId>, reason: ChangeReason) -> bool {
        let (order, groups) = self.watched();
        let mut marked = false;
        for column in changed {
            if order.contains(column) {
                self.mark_order(reason);
                marked = true;
            }
            if groups.contains(column) {
                self.mark_groups(reason);
                marked = true;
            }
        }
        marked
    }

    fn announce_dropped(&mut self, dropped: DroppedColumns) {
        for column in dropped {
            self.events.emit(RankingEvent::StatsInvalidated {
                ranking: self.id,
                column,
            });
        }
    }

    /// The derived value of `column` changed: drop its statistics and those
    /// of its ancestors, and re-sort if anything depends on it.
    fn value_changed(&mut self, column: ColumnId, reason: ChangeReason) {
        let mut affected = vec![column];
        affected.extend(self.tree.ancestors(column));
        let dropped = self.stats.invalidate_columns(&affected);
        self.announce_dropped(dropped);
        self.mark_if_watched(&affected, reason);
    }

    // ------------------------------------------------------------------------
    // Column structure
    // ------------------------------------------------------------------------

    /// Inserts a top-level column. Adding a column does not re-sort unless
    /// its descriptor carries a filter.
    pub fn insert_column(&mut self, desc: &ColumnDesc, index: usize) -> Result<ColumnId> {
        if index > self.children.len() {
            return Err(EngineError::InvalidIndex {
                index,
                len: self.children.len(),
            });
        }
        let id = self.tree.build(desc, None)?;
        self.children.insert(index, id);
        if self.tree.subtree(id).iter().any(|c| self.tree.column(*c).filter.is_some()) {
            self.mark_order(ChangeReason::FilterChanged);
        }
        self.events.emit(RankingEvent::ColumnAdded {
            ranking: self.id,
            column: id,
            index,
        });
        Ok(id)
    }

    pub fn push_column(&mut self, desc: &ColumnDesc) -> Result<ColumnId> {
        self.insert_column(desc, self.children.len())
    }

    /// Appends a child to a stack or nested column. Stack children get weight 1.
    pub fn push_child(&mut self, parent: ColumnId, desc: &ColumnDesc) -> Result<ColumnId> {
        let kind = &self.column(parent)?.kind;
        if !kind.is_composite() {
            return Err(EngineError::NotStack(parent));
        }
        if matches!(kind, ColumnKind::Stack { .. })
            && !matches!(desc.column_type()?, ColumnType::Number | ColumnType::Stack)
        {
            return Err(ConfigError::NonNumericStackChild(desc.kind.clone()).into());
        }
        let id = self.tree.build(desc, Some(parent))?;
        let index = match self.tree.column_mut(parent).map(|c| &mut c.kind) {
            Some(ColumnKind::Stack {
                children, weights, ..
            }) => {
                children.push(id);
                weights.push(1.0);
                children.len() - 1
            }
            Some(ColumnKind::Nested { children, .. }) => {
                children.push(id);
                children.len() - 1
            }
            _ => 0,
        };
        self.events.emit(RankingEvent::ColumnAdded {
            ranking: self.id,
            column: id,
            index,
        });
        self.value_changed(parent, ChangeReason::ColumnChanged);
        Ok(id)
    }

    /// Removes a column with its descendants. Criteria referring to removed
    /// columns are dropped.
    pub fn remove_column(&mut self, id: ColumnId) -> Result<()> {
        let parent = self.column(id)?.parent;
        let ancestors = self.tree.ancestors(id);
        let (watched_order, watched_groups) = self.watched();

        let removed = self.tree.remove(id);
        self.children.retain(|c| *c != id);

        let mut dropped = self.stats.invalidate_columns(&removed);
        for column in self.stats.invalidate_columns(&ancestors) {
            if !dropped.contains(&column) {
                dropped.push(column);
            }
        }
        self.events.emit(RankingEvent::ColumnRemoved {
            ranking: self.id,
            columns: removed.clone(),
        });
        self.announce_dropped(dropped);

        let sort_before = self.sort_criteria.len();
        self.sort_criteria.retain(|c| !removed.contains(&c.column));
        if self.sort_criteria.len() != sort_before {
            self.emit_sort_criteria();
        }
        let group_before = self.group_criteria.len();
        self.group_criteria.retain(|c| !removed.contains(c));
        if self.group_criteria.len() != group_before {
            self.emit_group_criteria();
        }

        if removed.iter().any(|c| watched_order.contains(c)) {
            self.mark_order(ChangeReason::ColumnChanged);
        }
        if removed.iter().any(|c| watched_groups.contains(c)) {
            self.mark_groups(ChangeReason::ColumnChanged);
        }
        if let Some(parent) = parent {
            self.events.emit(RankingEvent::ColumnChanged {
                ranking: self.id,
                column: parent,
                change: ColumnChange::Value,
            });
        }
        Ok(())
    }

    /// Moves a column to `index` among its siblings.
    pub fn move_column(&mut self, id: ColumnId, index: usize) -> Result<()> {
        let parent = self.column(id)?.parent;
        let from = match parent {
            None => {
                let from = self.children.iter().position(|c| *c == id).unwrap_or(0);
                if index >= self.children.len() {
                    return Err(EngineError::InvalidIndex {
                        index,
                        len: self.children.len(),
                    });
                }
                let moved = self.children.remove(from);
                self.children.insert(index, moved);
                from
            }
            Some(parent) => {
                let len = self.tree.children(parent).len();
                if index >= len {
                    return Err(EngineError::InvalidIndex { index, len });
                }
                let mut from = 0;
                match self.tree.column_mut(parent).map(|c| &mut c.kind) {
                    Some(ColumnKind::Stack {
                        children, weights, ..
                    }) => {
                        from = children.iter().position(|c| *c == id).unwrap_or(0);
                        let moved = children.remove(from);
                        children.insert(index, moved);
                        let weight = weights.remove(from);
                        weights.insert(index, weight);
                    }
                    Some(ColumnKind::Nested { children, .. }) => {
                        from = children.iter().position(|c| *c == id).unwrap_or(0);
                        let moved = children.remove(from);
                        children.insert(index, moved);
                    }
                    _ => {}
                }
                // nested comparison is positional
                self.mark_if_watched(&[parent], ChangeReason::ColumnChanged);
                from
            }
        };
        if from != index {
            self.events.emit(RankingEvent::ColumnMoved {
                ranking: self.id,
                column: id,
                from,
                to: index,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Column properties
    // ------------------------------------------------------------------------

    fn column_changed(&mut self, column: ColumnId, change: ColumnChange) {
        self.events.emit(RankingEvent::ColumnChanged {
            ranking: self.id,
            column,
            change,
        });
    }

    pub fn set_width(&mut self, id: ColumnId, width: f64) -> Result<()> {
        if !width.is_finite() || width < 0.0 {
            return Err(ConfigError::InvalidWidth(width).into());
        }
        let column = self.tree.column_mut(id).ok_or(EngineError::UnknownColumn(id))?;
        if column.width != width {
            column.width = width;
            self.column_changed(id, ColumnChange::Width);
        }
        Ok(())
    }

    pub fn set_label(&mut self, id: ColumnId, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        let column = self.tree.column_mut(id).ok_or(EngineError::UnknownColumn(id))?;
        if column.label != label {
            column.label = label;
            self.column_changed(id, ColumnChange::Metadata);
        }
        Ok(())
    }

    pub fn set_color(&mut self, id: ColumnId, color: Option<String>) -> Result<()> {
        let column = self.tree.column_mut(id).ok_or(EngineError::UnknownColumn(id))?;
        if column.color != color {
            column.color = color;
            self.column_changed(id, ColumnChange::Metadata);
        }
        Ok(())
    }

    /// Collapsing only changes the flattened layout.
    pub fn set_collapsed(&mut self, id: ColumnId, value: bool) -> Result<()> {
        let column = self.tree.column_mut(id).ok_or(EngineError::UnknownColumn(id))?;
        let changed = match &mut column.kind {
            ColumnKind::Stack { collapsed, .. } | ColumnKind::Nested { collapsed, .. } => {
                std::mem::replace(collapsed, value) != value
            }
            _ => return Err(EngineError::NotStack(id)),
        };
        if changed {
            self.column_changed(id, ColumnChange::Metadata);
        }
        Ok(())
    }

    pub fn set_weights(&mut self, id: ColumnId, new_weights: Vec<f64>) -> Result<()> {
        let column = self.tree.column_mut(id).ok_or(EngineError::UnknownColumn(id))?;
        let ColumnKind::Stack {
            children, weights, ..
        } = &mut column.kind
        else {
            return Err(EngineError::NotStack(id));
        };
        if new_weights.len() != children.len() {
            return Err(ConfigError::WeightCountMismatch {
                expected: children.len(),
                found: new_weights.len(),
            }
            .into());
        }
        validate_weights(&new_weights)?;
        if *weights == new_weights {
            return Ok(());
        }
        *weights = new_weights;
        self.column_changed(id, ColumnChange::Value);
        self.value_changed(id, ChangeReason::ColumnChanged);
        Ok(())
    }

    /// Sets or clears the normalization domain of a number column.
    pub fn set_domain(&mut self, id: ColumnId, new_domain: Option<[f64; 2]>) -> Result<()> {
        if let Some([lo, hi]) = new_domain {
            if !lo.is_finite() || !hi.is_finite() || lo == hi {
                return Err(ConfigError::InvalidDomain(lo, hi).into());
            }
        }
        let column = self.tree.column_mut(id).ok_or(EngineError::UnknownColumn(id))?;
        let ColumnKind::Number { domain, .. } = &mut column.kind else {
            return Err(EngineError::NotNumeric(id));
        };
        if *domain == new_domain {
            return Ok(());
        }
        *domain = new_domain;
        self.column_changed(id, ColumnChange::Value);
        self.value_changed(id, ChangeReason::ColumnChanged);
        Ok(())
    }

    pub fn set_filter(&mut self, id: ColumnId, filter: Option<ColumnFilter>) -> Result<()> {
        let column = self.tree.column_mut(id).ok_or(EngineError::UnknownColumn(id))?;
        if let Some(f) = &filter {
            if !f.applies_to(&column.kind) {
                return Err(EngineError::FilterMismatch(id));
            }
        }
        if column.filter == filter {
            return Ok(());
        }
        column.filter = filter;
        self.mark_order(ChangeReason::FilterChanged);
        self.events.emit(RankingEvent::FilterChanged {
            ranking: self.id,
            column: id,
        });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Sorting and grouping
    // ------------------------------------------------------------------------

    fn emit_sort_criteria(&mut self) {
        self.events.emit(RankingEvent::SortCriteriaChanged {
            ranking: self.id,
            columns: self.sort_criteria.iter().map(|c| c.column).collect(),
        });
    }

    fn emit_group_criteria(&mut self) {
        self.events.emit(RankingEvent::GroupCriteriaChanged {
            ranking: self.id,
            columns: self.group_criteria.clone(),
        });
    }

    /// Sorts by `column`. Non-additive sorting replaces all criteria;
    /// additive sorting updates or appends the column's criterion.
    pub fn sort_by(&mut self, column: ColumnId, ascending: bool, additive: bool) -> Result<()> {
        self.column(column)?;
        let criterion = SortCriterion::new(column, ascending);
        if additive {
            match self.sort_criteria.iter_mut().find(|c| c.column == column) {
                Some(existing) => existing.ascending = ascending,
                None => self.sort_criteria.push(criterion),
            }
        } else {
            self.sort_criteria = vec![criterion];
        }
        self.mark_order(ChangeReason::OrderChanged);
        self.emit_sort_criteria();
        Ok(())
    }

    /// Flips the primary criterion when it is `column`; otherwise sorts by
    /// `column` alone in its natural direction (numbers descending, text and
    /// categories ascending).
    pub fn toggle_sort(&mut self, column: ColumnId) -> Result<()> {
        let kind = &self.column(column)?.kind;
        let ascending = match self.sort_criteria.first() {
            Some(primary) if primary.column == column => !primary.ascending,
            _ => !matches!(kind, ColumnKind::Number { .. } | ColumnKind::Stack { .. }),
        };
        self.sort_by(column, ascending, false)
    }

    pub fn clear_sort(&mut self) {
        if self.sort_criteria.is_empty() {
            return;
        }
        self.sort_criteria.clear();
        self.mark_order(ChangeReason::OrderChanged);
        self.emit_sort_criteria();
    }

    pub fn set_sort_criteria(&mut self, criteria: Vec<SortCriterion>) -> Result<()> {
        for criterion in &criteria {
            self.column(criterion.column)?;
        }
        if criteria == self.sort_criteria {
            return Ok(());
        }
        self.sort_criteria = criteria;
        self.mark_order(ChangeReason::OrderChanged);
        self.emit_sort_criteria();
        Ok(())
    }

    fn check_groupable(&self, column: ColumnId) -> Result<()> {
        match &self.column(column)?.kind {
            ColumnKind::Nested { .. } => Err(EngineError::NotGroupable(column)),
            _ => Ok(()),
        }
    }

    /// Replaces the group criteria; an empty list restores the default group.
    pub fn group_by(&mut self, columns: Vec<ColumnId>) -> Result<()> {
        for column in &columns {
            self.check_groupable(*column)?;
        }
        if columns == self.group_criteria {
            return Ok(());
        }
        self.group_criteria = columns;
        self.mark_groups(ChangeReason::GroupChanged);
        self.emit_group_criteria();
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Aggregation
    // ------------------------------------------------------------------------

    pub fn set_aggregation_policy(&mut self, policy: Box<dyn AggregationPolicy>) {
        self.policy = policy;
    }

    pub fn is_aggregated(&self, group: &Group) -> bool {
        self.overrides
            .get(&group.key)
            .unwrap_or_else(|| self.policy.is_aggregated(self.id, group))
    }

    /// Explicit decision recorded for the group with this key.
    pub fn aggregation_override(&self, key: &[GroupSegment]) -> Option<bool> {
        self.overrides.get(key)
    }

    /// Records an explicit decision for one leaf group. The decision is
    /// keyed by the group's key and applies to later groupings too.
    pub fn set_aggregated(&mut self, group: usize, aggregated: bool) -> Result<bool> {
        let leaf = self.groups.leaves().get(group).ok_or(EngineError::InvalidIndex {
            index: group,
            len: self.groups.len(),
        })?;
        let name = leaf.name.clone();
        let changed = self.overrides.set(&leaf.key, aggregated);
        if changed {
            self.events.emit(RankingEvent::AggregationChanged {
                ranking: self.id,
                group: name,
                aggregated,
            });
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------------
    // Invalidation from the data side
    // ------------------------------------------------------------------------

    /// Routes a raw-data event: re-sorts only when rows appeared or a field
    /// feeding the order or grouping changed; otherwise drops the statistics
    /// of the columns reading the changed fields.
    pub fn invalidate_data(&mut self, event: &DataEvent) {
        self.notified = true;
        match event {
            DataEvent::RowsAdded { .. } | DataEvent::RowsResolved { .. } => {
                self.mark_order(ChangeReason::DataChanged);
            }
            DataEvent::ValuesChanged { fields, .. } if fields.is_empty() => {
                self.mark_order(ChangeReason::DataChanged);
            }
            DataEvent::ValuesChanged { fields, .. } => {
                let mut affected: FxHashSet<ColumnId> = FxHashSet::default();
                for field in fields {
                    affected.extend(self.tree.columns_reading(field));
                }
                let affected: Vec<ColumnId> = affected.into_iter().collect();
                if !self.mark_if_watched(&affected, ChangeReason::DataChanged) {
                    let dropped = self.stats.invalidate_columns(&affected);
                    self.announce_dropped(dropped);
                }
            }
        }
    }

    /// Selection changed: only rankings that sort, group or filter by a
    /// selection column recompute; selection statistics are dropped either way.
    pub fn invalidate_selection(&mut self) -> bool {
        self.notified = true;
        let mut affected = self.tree.selection_columns();
        if affected.is_empty() {
            return false;
        }
        for column in affected.clone() {
            affected.extend(self.tree.ancestors(column));
        }
        let dropped = self.stats.invalidate_columns(&affected);
        self.announce_dropped(dropped);
        self.mark_if_watched(&affected, ChangeReason::SelectionChanged)
    }

    /// Drops every cached summary.
    pub fn clear_stats(&mut self) {
        let dropped = self.stats.clear();
        self.announce_dropped(dropped);
    }

    // ------------------------------------------------------------------------
    // Recomputation
    // ------------------------------------------------------------------------

    /// Runs one recomputation pass over `source` if anything is dirty.
    /// A pass whose source changed while computing is discarded and rerun.
    /// Returns true when a new order/groups pair was published.
    ///
    /// A source that moved since the last publication without any
    /// invalidation reaching this ranking is treated as a full data change.
    pub fn refresh(&mut self, source: &dyn RowSource) -> bool {
        let current = source.version();
        let unannounced = matches!(self.published, Some(v) if v != current);
        if unannounced && !self.notified && !self.is_dirty() {
            debug!("ranking {}: source moved without invalidation, recomputing", self.id);
            self.mark_order(ChangeReason::DataChanged);
        }
        self.notified = false;
        if !self.is_dirty() {
            // every change since the last pass was routed here and needed no pass
            self.published = Some(current);
            return false;
        }
        let generation = self.generation + 1;

        for pass in 1..=MAX_PASSES {
            let version = source.version();

            let sorted = match self.dirty_order {
                Some(_) => {
                    self.state = RankingState::Recomputing(Phase::Order);
                    let filtered: Vec<ColumnId> = self
                        .tree
                        .ids()
                        .filter(|id| self.tree.column(*id).filter.is_some())
                        .collect();
                    compute_order(
                        &self.tree,
                        &self.sort_criteria,
                        &filtered,
                        source,
                        self.config.missing_placement,
                        generation,
                    )
                }
                None => Order::new(generation, self.sorted.indices().to_vec()),
            };

            self.state = RankingState::Recomputing(Phase::Groups);
            let groups = compute_groups(&self.tree, &self.group_criteria, &sorted, source, &self.config);

            if source.version() != version && pass < MAX_PASSES {
                warn!(
                    "ranking {}: source changed during pass {}, discarding result",
                    self.id, pass
                );
                continue;
            }

            debug!(
                "ranking {}: published generation {} ({} rows, {} groups, pass {})",
                self.id,
                generation,
                sorted.len(),
                groups.len(),
                pass
            );
            self.publish(sorted, groups, version);
            break;
        }
        self.state = RankingState::Idle;
        true
    }

    fn publish(&mut self, sorted: Order, groups: Groups, version: SourceVersion) {
        let order_reason = self.dirty_order.take();
        let group_reason = self.dirty_groups.take().or(order_reason);

        self.generation = sorted.generation();
        self.order = match groups.leaves() {
            [single] => single.order.clone(),
            leaves => Order::new(
                self.generation,
                leaves.iter().flat_map(|g| g.order.indices().iter().copied()).collect(),
            ),
        };
        self.sorted = sorted;
        self.groups = groups;
        self.published = Some(version);

        let dropped = self.stats.retain_generation(self.generation);
        if let Some(reason) = order_reason {
            self.events.emit(RankingEvent::OrderChanged {
                ranking: self.id,
                generation: self.generation,
                reason,
            });
        }
        if let Some(reason) = group_reason {
            self.events.emit(RankingEvent::GroupChanged {
                ranking: self.id,
                generation: self.generation,
                reason,
            });
        }
        self.announce_dropped(dropped);
    }

    // ------------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------------

    pub fn subset_id(&self, slot: SubsetSlot) -> SubsetId {
        SubsetId {
            generation: self.generation,
            slot,
        }
    }

    /// Statistics over the whole order or one leaf group. Results are
    /// memoized only when the ranking is up to date with `source`.
    pub fn stats<'a>(&'a mut self, slot: SubsetSlot, source: &'a dyn RowSource) -> Result<SubsetStats<'a>> {
        let indices = match slot {
            SubsetSlot::Order => self.order.shared(),
            SubsetSlot::Group(i) => match self.groups.leaves().get(i) {
                Some(group) => group.order.shared(),
                None => {
                    return Err(EngineError::InvalidIndex {
                        index: i,
                        len: self.groups.len(),
                    })
                }
            },
        };
        let cacheable = !self.is_dirty() && self.published == Some(source.version());
        let subset = self.subset_id(slot);
        Ok(SubsetStats::new(&self.tree, source, subset, indices, &mut self.stats, cacheable))
    }

    pub fn order_stats<'a>(&'a mut self, source: &'a dyn RowSource) -> SubsetStats<'a> {
        let subset = self.subset_id(SubsetSlot::Order);
        let cacheable = !self.is_dirty() && self.published == Some(source.version());
        SubsetStats::new(&self.tree, source, subset, self.order.shared(), &mut self.stats, cacheable)
    }

    /// Number of memoized summaries.
    pub fn cached_stats(&self) -> usize {
        self.stats.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ColumnDesc;
    use crate::stats::Summary;
    use lineup_data::{drain, DataIndex, Row, RowState, RowStore, RowValue};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn create_test_store() -> RowStore {
        RowStore::from_rows([Some(3.0), Some(1.0), None, Some(1.0), Some(2.0)].iter().zip(["Y", "X", "Y", "X", "X"]).map(
            |(v, k)| Row::new().with("x", RowValue::from(*v)).with("k", k),
        ))
    }

    fn create_test_ranking() -> (Ranking, ColumnId, ColumnId) {
        let mut ranking = Ranking::new(0, RankingConfig::default());
        let x = ranking.push_column(&ColumnDesc::number("x")).unwrap();
        let k = ranking
            .push_column(&ColumnDesc::categorical("k", ["X", "Y"]))
            .unwrap();
        (ranking, x, k)
    }

    #[test]
    fn test_sort_and_group() {
        let store = create_test_store();
        let (mut ranking, x, k) = create_test_ranking();
        ranking.sort_by(x, true, false).unwrap();
        ranking.group_by(vec![k]).unwrap();

        assert!(ranking.refresh(&store));

        assert_eq!(ranking.order().indices(), &[1, 3, 4, 0, 2]);
        let groups = ranking.groups();
        assert_eq!(groups.leaves()[0].order.indices(), &[1, 3, 4]);
        assert_eq!(groups.leaves()[1].order.indices(), &[0, 2]);
        assert_eq!(ranking.state(), RankingState::Idle);
        assert!(!ranking.refresh(&store));
    }

    #[test]
    fn test_published_order_follows_groups() {
        let store = create_test_store();
        let (mut ranking, x, k) = create_test_ranking();
        ranking.sort_by(x, false, false).unwrap();
        ranking.group_by(vec![k]).unwrap();
        ranking.refresh(&store);

        assert_eq!(ranking.groups().leaves()[0].order.indices(), &[4, 1, 3]);
        assert_eq!(ranking.groups().leaves()[1].order.indices(), &[0, 2]);
        assert_eq!(ranking.order().indices(), &[4, 1, 3, 0, 2]);
        assert_eq!(ranking.order().generation(), ranking.groups().generation());

        // ungrouping goes back to the sorted order without re-sorting
        ranking.group_by(Vec::new()).unwrap();
        ranking.refresh(&store);
        assert_eq!(ranking.order().indices(), &[0, 4, 1, 3, 2]);
    }

    #[test]
    fn test_mutations_coalesce_into_one_pass() {
        let store = create_test_store();
        let (mut ranking, x, k) = create_test_ranking();
        ranking.refresh(&store);
        let rx = ranking.subscribe();

        ranking.sort_by(x, true, false).unwrap();
        ranking.sort_by(x, false, false).unwrap();
        ranking.group_by(vec![k]).unwrap();
        ranking.refresh(&store);

        let orders = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, RankingEvent::OrderChanged { .. }))
            .count();
        assert_eq!(orders, 1);
        assert_eq!(ranking.generation(), 2);
    }

    #[test]
    fn test_width_change_does_not_resort() {
        let store = create_test_store();
        let (mut ranking, x, _) = create_test_ranking();
        ranking.sort_by(x, true, false).unwrap();
        ranking.refresh(&store);
        let rx = ranking.subscribe();

        ranking.set_width(x, 42.0).unwrap();

        assert!(!ranking.is_dirty());
        assert_eq!(
            drain(&rx),
            vec![RankingEvent::ColumnChanged {
                ranking: 0,
                column: x,
                change: ColumnChange::Width
            }]
        );
    }

    #[test]
    fn test_value_change_on_unsorted_column_only_drops_stats() {
        let mut store = create_test_store();
        let (mut ranking, x, k) = create_test_ranking();
        ranking.sort_by(k, true, false).unwrap();
        ranking.refresh(&store);
        ranking.order_stats(&store).for_column(x);
        assert_eq!(ranking.cached_stats(), 1);
        let rx = ranking.subscribe();

        store.set_value(0, "x", 10.0).unwrap();
        ranking.invalidate_data(&DataEvent::ValuesChanged {
            indices: vec![0],
            fields: vec!["x".to_string()],
        });

        assert!(!ranking.is_dirty());
        assert_eq!(ranking.cached_stats(), 0);
        assert_eq!(
            drain(&rx),
            vec![RankingEvent::StatsInvalidated { ranking: 0, column: x }]
        );
    }

    #[test]
    fn test_unannounced_source_change_is_not_served_from_cache() {
        let mut store = create_test_store();
        let (mut ranking, x, k) = create_test_ranking();
        ranking.sort_by(k, true, false).unwrap();
        ranking.refresh(&store);
        let max = |summary: Option<Summary>| match summary {
            Some(Summary::Numeric(numeric)) => numeric.max,
            other => panic!("expected a numeric summary, got {:?}", other),
        };
        assert_eq!(max(ranking.order_stats(&store).for_column(x)), Some(3.0));
        let rx = ranking.subscribe();

        store.set_value(0, "x", 100.0).unwrap();
        assert!(ranking.refresh(&store));

        assert_eq!(max(ranking.order_stats(&store).for_column(x)), Some(100.0));
        assert!(drain(&rx).contains(&RankingEvent::StatsInvalidated { ranking: 0, column: x }));
        assert!(!ranking.refresh(&store));
    }

    /// Store whose version advances on each of its first `moves` reads,
    /// as if a writer kept mutating it during a pass.
    struct MovingSource {
        store: RowStore,
        moves: Cell<u32>,
        ticks: Cell<u64>,
    }

    impl MovingSource {
        fn new(moves: u32) -> Self {
            MovingSource {
                store: create_test_store(),
                moves: Cell::new(moves),
                ticks: Cell::new(0),
            }
        }
    }

    impl RowSource for MovingSource {
        fn len(&self) -> usize {
            self.store.len()
        }

        fn row(&self, index: DataIndex) -> RowState<'_> {
            self.store.row(index)
        }

        fn is_selected(&self, _index: DataIndex) -> bool {
            false
        }

        fn version(&self) -> SourceVersion {
            if self.moves.get() > 0 {
                self.moves.set(self.moves.get() - 1);
                self.ticks.set(self.ticks.get() + 1);
            }
            SourceVersion {
                rows: self.ticks.get(),
                selection: 0,
            }
        }
    }

    #[test]
    fn test_superseded_pass_is_discarded() {
        let source = MovingSource::new(3);
        let (mut ranking, x, _) = create_test_ranking();
        ranking.sort_by(x, true, false).unwrap();
        let rx = ranking.subscribe();

        assert!(ranking.refresh(&source));

        // the first pass saw the version move and was rerun once
        let orders = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, RankingEvent::OrderChanged { .. }))
            .count();
        assert_eq!(orders, 1);
        assert_eq!(ranking.generation(), 1);
        assert_eq!(ranking.order().indices(), &[1, 3, 4, 0, 2]);
        ranking.order_stats(&source).for_column(x);
        assert_eq!(ranking.cached_stats(), 1);
    }

    #[test]
    fn test_pass_limit_publishes_uncacheable_result() {
        let source = MovingSource::new(100);
        let (mut ranking, x, _) = create_test_ranking();
        ranking.sort_by(x, true, false).unwrap();

        assert!(ranking.refresh(&source));

        assert_eq!(ranking.generation(), 1);
        assert_eq!(ranking.state(), RankingState::Idle);
        ranking.order_stats(&source).for_column(x);
        assert_eq!(ranking.cached_stats(), 0);
    }

    #[test]
    fn test_remove_sorted_column_drops_criterion() {
        let store = create_test_store();
        let (mut ranking, x, _) = create_test_ranking();
        ranking.sort_by(x, true, false).unwrap();
        ranking.refresh(&store);

        ranking.remove_column(x).unwrap();

        assert!(ranking.sort_criteria().is_empty());
        assert!(ranking.is_dirty());
        assert!(matches!(ranking.column(x), Err(EngineError::UnknownColumn(_))));
        ranking.refresh(&store);
        assert_eq!(ranking.order().indices(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_invalid_descriptor_leaves_ranking_untouched() {
        let (mut ranking, _, _) = create_test_ranking();
        let bad = ColumnDesc::stack(vec![ColumnDesc::string("k")], vec![1.0]);
        assert!(matches!(
            ranking.push_column(&bad),
            Err(EngineError::Configuration(ConfigError::NonNumericStackChild(_)))
        ));
        assert_eq!(ranking.children().len(), 2);
        assert_eq!(ranking.tree().len(), 2);
    }

    #[test]
    fn test_toggle_sort_direction() {
        let (mut ranking, x, k) = create_test_ranking();
        ranking.toggle_sort(x).unwrap();
        assert_eq!(ranking.sort_criteria(), &[SortCriterion::new(x, false)]);
        ranking.toggle_sort(x).unwrap();
        assert_eq!(ranking.sort_criteria(), &[SortCriterion::new(x, true)]);
        ranking.toggle_sort(k).unwrap();
        assert_eq!(ranking.sort_criteria(), &[SortCriterion::new(k, true)]);
        ranking.sort_by(x, false, true).unwrap();
        assert_eq!(ranking.sort_criteria().len(), 2);
    }

    #[test]
    fn test_desc_round_trip() {
        let (mut ranking, x, k) = create_test_ranking();
        ranking.sort_by(x, false, false).unwrap();
        ranking.group_by(vec![k]).unwrap();

        let desc = ranking.to_desc();
        let rebuilt = Ranking::from_desc(1, &desc, RankingConfig::default()).unwrap();

        assert_eq!(rebuilt.to_desc(), desc);
        assert_eq!(rebuilt.sort_criteria()[0].ascending, false);
    }

    #[test]
    fn test_group_stats_out_of_range() {
        let store = create_test_store();
        let (mut ranking, _, _) = create_test_ranking();
        ranking.refresh(&store);
        assert!(matches!(
            ranking.stats(SubsetSlot::Group(5), &store),
            Err(EngineError::InvalidIndex { index: 5, len: 1 })
        ));
    }
}
