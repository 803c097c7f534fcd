//! FILENAME: core/lineup-engine/src/column/filter.rs
//! Per-column row filters. A filtered-out row is absent from the ranking's
//! order and therefore from every group and statistic.

use serde::{Deserialize, Serialize};

use super::access::RowRef;
use super::{ColumnId, ColumnKind, ColumnTree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ColumnFilter {
    /// Keeps rows whose raw number lies in `[min, max]`; open bounds are `None`.
    NumberRange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, rename = "filterMissing")]
        filter_missing: bool,
    },
    /// Keeps rows whose category is one of `allowed`.
    Categories {
        allowed: Vec<String>,
        #[serde(default, rename = "filterMissing")]
        filter_missing: bool,
    },
    /// Keeps rows whose text contains `contains`, ignoring case.
    Text {
        contains: String,
        #[serde(default, rename = "filterMissing")]
        filter_missing: bool,
    },
}

impl ColumnFilter {
    pub fn number_range(min: Option<f64>, max: Option<f64>) -> Self {
        ColumnFilter::NumberRange {
            min,
            max,
            filter_missing: false,
        }
    }

    pub fn categories<S: Into<String>>(allowed: impl IntoIterator<Item = S>) -> Self {
        ColumnFilter::Categories {
            allowed: allowed.into_iter().map(Into::into).collect(),
            filter_missing: false,
        }
    }

    pub fn text(contains: impl Into<String>) -> Self {
        ColumnFilter::Text {
            contains: contains.into(),
            filter_missing: false,
        }
    }

    pub fn filtering_missing(mut self) -> Self {
        match &mut self {
            ColumnFilter::NumberRange { filter_missing, .. }
            | ColumnFilter::Categories { filter_missing, .. }
            | ColumnFilter::Text { filter_missing, .. } => *filter_missing = true,
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColumnFilter::NumberRange { .. } => "numberRange",
            ColumnFilter::Categories { .. } => "categories",
            ColumnFilter::Text { .. } => "text",
        }
    }

    fn filters_missing(&self) -> bool {
        match self {
            ColumnFilter::NumberRange { filter_missing, .. }
            | ColumnFilter::Categories { filter_missing, .. }
            | ColumnFilter::Text { filter_missing, .. } => *filter_missing,
        }
    }

    pub fn applies_to(&self, kind: &ColumnKind) -> bool {
        match self {
            ColumnFilter::NumberRange { .. } => {
                matches!(kind, ColumnKind::Number { .. } | ColumnKind::Stack { .. })
            }
            ColumnFilter::Categories { .. } => {
                matches!(kind, ColumnKind::Categorical { .. } | ColumnKind::Selection)
            }
            ColumnFilter::Text { .. } => matches!(kind, ColumnKind::Text { .. }),
        }
    }

    /// Whether `row` passes this filter on column `id`. Missing values pass
    /// unless `filter_missing` is set.
    pub fn accepts(&self, tree: &ColumnTree, id: ColumnId, row: &RowRef<'_>) -> bool {
        if tree.is_missing(id, row) {
            return !self.filters_missing();
        }
        match self {
            ColumnFilter::NumberRange { min, max, .. } => {
                let v = tree.raw_number(id, row);
                min.map_or(true, |m| v >= m) && max.map_or(true, |m| v <= m)
            }
            ColumnFilter::Categories { allowed, .. } => tree
                .category(id, row)
                .is_some_and(|c| allowed.iter().any(|a| *a == c.name)),
            ColumnFilter::Text { contains, .. } => tree
                .label(id, row)
                .to_lowercase()
                .contains(&contains.to_lowercase()),
        }
    }
}
