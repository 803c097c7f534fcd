//! FILENAME: core/lineup-engine/src/group.rs
//! Grouping: partitions an order into named, ordered, possibly nested groups.
//!
//! The first criterion partitions the order, each partition is partitioned
//! by the next criterion, and so on. Rows keep their relative order inside
//! every group. Concatenating the leaf groups in group order yields the
//! order a ranking publishes.

use lineup_data::{DataIndex, RowSource};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::column::{ColumnId, ColumnTree, RowRef};
use crate::config::{GroupOrdering, LayoutOptions, RankingConfig};
use crate::order::Order;

/// Separator between path segments in a nested group's name.
pub const GROUP_PATH_SEPARATOR: &str = " ∩ ";

/// Identity of a group at one grouping level. Unlike the display name it
/// does not depend on category labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupSegment {
    /// Category name.
    Category(String),
    /// Display text of a non-categorical value.
    Value(String),
    Missing,
}

/// A leaf group: a contiguous slice of the published ranking order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    /// One segment per grouping level; empty for the default group.
    pub key: Vec<GroupSegment>,
    pub color: String,
    /// One name per grouping level, outermost first.
    pub path: Vec<String>,
    /// Nesting depth of the leaf, 0 for single-level grouping.
    pub depth: usize,
    pub order: Order,
}

impl Group {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Node of the group hierarchy. Leaves point into `Groups::leaves`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupNode {
    pub name: String,
    pub color: String,
    pub depth: usize,
    /// Number of rows below this node.
    pub size: usize,
    pub children: Vec<GroupNode>,
    pub leaf: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Groups {
    generation: u64,
    leaves: Vec<Group>,
    tree: Vec<GroupNode>,
}

impl Groups {
    pub fn empty() -> Self {
        Groups {
            generation: 0,
            leaves: Vec::new(),
            tree: Vec::new(),
        }
    }

    /// Generation of the order these groups partition.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Leaf groups in display order.
    pub fn leaves(&self) -> &[Group] {
        &self.leaves
    }

    pub fn tree(&self) -> &[GroupNode] {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn by_key(&self, key: &[GroupSegment]) -> Option<&Group> {
        self.leaves.iter().find(|g| g.key == key)
    }
}

// ============================================================================
// GROUP KEYS
// ============================================================================

struct Bucket {
    segment: GroupSegment,
    /// Declared position for category buckets.
    position: Option<usize>,
    name: String,
    color: String,
    rows: Vec<DataIndex>,
}

struct Grouper<'a> {
    tree: &'a ColumnTree,
    criteria: &'a [ColumnId],
    source: &'a dyn RowSource,
    config: &'a RankingConfig,
    generation: u64,
    leaves: Vec<Group>,
}

impl Grouper<'_> {
    /// Empty bucket the row belongs to.
    fn bucket_of(&self, column: ColumnId, index: DataIndex) -> Bucket {
        let row = RowRef::from_source(self.source, index);
        let missing = Bucket {
            segment: GroupSegment::Missing,
            position: None,
            name: self.config.missing_group.name.clone(),
            color: self.config.missing_group.color.clone(),
            rows: Vec::new(),
        };
        if let Some(view) = self.tree.categorical(column) {
            return match view.category(&row) {
                Some(c) => Bucket {
                    segment: GroupSegment::Category(c.name.clone()),
                    position: Some(c.index),
                    name: c.label().to_string(),
                    color: c.color().to_string(),
                    rows: Vec::new(),
                },
                None => missing,
            };
        }
        if self.tree.is_missing(column, &row) {
            return missing;
        }
        let label = self.tree.label(column, &row);
        let color = self
            .tree
            .column(column)
            .color
            .clone()
            .unwrap_or_else(|| self.config.default_group.color.clone());
        Bucket {
            segment: GroupSegment::Value(label.clone()),
            position: None,
            name: label,
            color,
            rows: Vec::new(),
        }
    }

    fn bucket(&self, column: ColumnId, rows: &[DataIndex]) -> Vec<Bucket> {
        let mut buckets: Vec<Bucket> = Vec::new();
        let mut lookup: FxHashMap<GroupSegment, usize> = FxHashMap::default();
        for index in rows {
            let bucket = self.bucket_of(column, *index);
            let slot = match lookup.get(&bucket.segment) {
                Some(slot) => *slot,
                None => {
                    lookup.insert(bucket.segment.clone(), buckets.len());
                    buckets.push(bucket);
                    buckets.len() - 1
                }
            };
            buckets[slot].rows.push(*index);
        }
        buckets
    }

    /// Reorders buckets that are in first-appearance order.
    fn arrange(&self, buckets: &mut [Bucket], level: usize) {
        let natural = !matches!(self.config.group_ordering, GroupOrdering::FirstAppearance);
        if natural {
            // categories by declared position, missing last; labels keep first appearance
            buckets.sort_by_key(|b| match (&b.segment, b.position) {
                (GroupSegment::Missing, _) => (2, 0),
                (_, Some(i)) => (0, i),
                (_, None) => (1, 0),
            });
        }
        if let (0, GroupOrdering::Explicit(names)) = (level, &self.config.group_ordering) {
            buckets.sort_by_key(|b| names.iter().position(|n| *n == b.name).unwrap_or(names.len()));
        }
    }

    fn partition(
        &mut self,
        rows: &[DataIndex],
        level: usize,
        path: &[String],
        key: &[GroupSegment],
    ) -> Vec<GroupNode> {
        let column = self.criteria[level];
        let mut buckets = self.bucket(column, rows);
        self.arrange(&mut buckets, level);

        let last = level + 1 == self.criteria.len();
        buckets
            .into_iter()
            .map(|bucket| {
                let mut child_path = path.to_vec();
                child_path.push(bucket.name.clone());
                let mut child_key = key.to_vec();
                child_key.push(bucket.segment);
                let size = bucket.rows.len();
                if last {
                    let leaf = self.leaves.len();
                    self.leaves.push(Group {
                        name: child_path.join(GROUP_PATH_SEPARATOR),
                        key: child_key,
                        color: bucket.color.clone(),
                        path: child_path,
                        depth: level,
                        order: Order::new(self.generation, bucket.rows),
                    });
                    GroupNode {
                        name: bucket.name,
                        color: bucket.color,
                        depth: level,
                        size,
                        children: Vec::new(),
                        leaf: Some(leaf),
                    }
                } else {
                    let children = self.partition(&bucket.rows, level + 1, &child_path, &child_key);
                    GroupNode {
                        name: bucket.name,
                        color: bucket.color,
                        depth: level,
                        size,
                        children,
                        leaf: None,
                    }
                }
            })
            .collect()
    }
}

/// Partitions `order` by `criteria`. With no criteria the result is the
/// configured default group holding the whole order.
pub fn compute_groups(
    tree: &ColumnTree,
    criteria: &[ColumnId],
    order: &Order,
    source: &dyn RowSource,
    config: &RankingConfig,
) -> Groups {
    let generation = order.generation();
    if criteria.is_empty() {
        let meta = &config.default_group;
        return Groups {
            generation,
            leaves: vec![Group {
                name: meta.name.clone(),
                key: Vec::new(),
                color: meta.color.clone(),
                path: vec![meta.name.clone()],
                depth: 0,
                order: order.clone(),
            }],
            tree: vec![GroupNode {
                name: meta.name.clone(),
                color: meta.color.clone(),
                depth: 0,
                size: order.len(),
                children: Vec::new(),
                leaf: Some(0),
            }],
        };
    }

    let mut grouper = Grouper {
        tree,
        criteria,
        source,
        config,
        generation,
        leaves: Vec::new(),
    };
    let nodes = grouper.partition(order.indices(), 0, &[], &[]);
    Groups {
        generation,
        leaves: grouper.leaves,
        tree: nodes,
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Vertical extent of one leaf group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupExtent {
    /// Index into `Groups::leaves`.
    pub group: usize,
    pub name: String,
    pub aggregated: bool,
    pub y: f64,
    pub height: f64,
}

/// Stacks leaf groups vertically. Aggregated groups take `group_height`,
/// expanded ones one row height per row; `row_padding` separates groups.
pub fn layout_groups(
    groups: &Groups,
    options: &LayoutOptions,
    mut is_aggregated: impl FnMut(&Group) -> bool,
) -> Vec<GroupExtent> {
    let mut y = 0.0;
    groups
        .leaves()
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let aggregated = is_aggregated(group);
            let height = if aggregated {
                options.group_height
            } else {
                options.row_height * group.len() as f64
            };
            let extent = GroupExtent {
                group: i,
                name: group.name.clone(),
                aggregated,
                y,
                height,
            };
            y += height + options.row_padding;
            extent
        })
        .collect()
}
