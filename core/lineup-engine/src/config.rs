//! FILENAME: core/lineup-engine/src/config.rs
//! Per-ranking configuration. Passed by value into each ranking; there is no
//! global configuration.

use serde::{Deserialize, Serialize};

/// Where rows with a missing sort value go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingPlacement {
    /// Missing values trail in both directions.
    #[default]
    Last,
    /// Missing values trail in ascending order and lead in descending order.
    FollowDirection,
}

/// Iteration order of top-level groups for non-categorical criteria.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupOrdering {
    /// Declared category order for categorical criteria, first appearance otherwise.
    #[default]
    Natural,
    /// First appearance in the current order for every criterion.
    FirstAppearance,
    /// Named groups first, in this order; the rest follow naturally.
    Explicit(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMeta {
    pub name: String,
    pub color: String,
}

impl GroupMeta {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        GroupMeta {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Vertical sizes used to compute group extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    pub row_height: f64,
    /// Height of an aggregated (collapsed) group.
    pub group_height: f64,
    pub row_padding: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            row_height: 20.0,
            group_height: 100.0,
            row_padding: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RankingConfig {
    pub missing_placement: MissingPlacement,
    pub group_ordering: GroupOrdering,
    /// The single group used when no grouping criterion is active.
    pub default_group: GroupMeta,
    /// Group for rows whose grouping value is missing.
    pub missing_group: GroupMeta,
    pub layout: LayoutOptions,
    /// Horizontal gap between sibling columns.
    pub column_padding: f64,
    /// Groups smaller than this are aggregated; 0 disables aggregation.
    pub aggregation_threshold: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        RankingConfig {
            missing_placement: MissingPlacement::Last,
            group_ordering: GroupOrdering::Natural,
            default_group: GroupMeta::new("Default", "gray"),
            missing_group: GroupMeta::new("Missing values", "gray"),
            layout: LayoutOptions::default(),
            column_padding: 5.0,
            aggregation_threshold: 0,
        }
    }
}

impl RankingConfig {
    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
