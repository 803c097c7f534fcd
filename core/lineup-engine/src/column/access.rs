//! FILENAME: core/lineup-engine/src/column/access.rs
//! Per-row accessors and capability views.
//!
//! Callers that need "something numeric" or "something with categories" ask
//! for a view instead of matching on the concrete column kind.

use lineup_data::{format_number, DataIndex, RowState, RowValue};
use once_cell::sync::Lazy;

use super::{Category, ColumnId, ColumnKind, ColumnTree};

/// Implicit categories of a selection column, selected first.
static SELECTION_CATEGORIES: Lazy<Vec<Category>> = Lazy::new(|| {
    vec![
        Category {
            name: "selected".to_string(),
            label: Some("Selected".to_string()),
            color: Some("#ffa500".to_string()),
            index: 0,
        },
        Category {
            name: "unselected".to_string(),
            label: Some("Unselected".to_string()),
            color: Some("#d3d3d3".to_string()),
            index: 1,
        },
    ]
});

/// One row as seen by column accessors.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    pub index: DataIndex,
    pub row: RowState<'a>,
    pub selected: bool,
}

impl<'a> RowRef<'a> {
    pub fn new(index: DataIndex, row: RowState<'a>, selected: bool) -> Self {
        RowRef {
            index,
            row,
            selected,
        }
    }

    pub fn from_source(source: &'a dyn lineup_data::RowSource, index: DataIndex) -> Self {
        RowRef {
            index,
            row: source.row(index),
            selected: source.is_selected(index),
        }
    }
}

/// How one stack child contributes to the stack value of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct StackContribution {
    pub child: ColumnId,
    pub weight: f64,
    /// Child value, NaN when missing.
    pub value: f64,
    /// Share of the stack value: `weight * value / sum of present weights`.
    pub contribution: f64,
}

fn normalize(value: f64, domain: Option<[f64; 2]>) -> f64 {
    match domain {
        Some([lo, hi]) if !value.is_nan() => ((value - lo) / (hi - lo)).clamp(0.0, 1.0),
        _ => value,
    }
}

impl ColumnTree {
    /// The raw value a leaf column reads. Composite columns yield their
    /// combined number (stack) or `Missing` (nested).
    pub fn value(&self, id: ColumnId, row: &RowRef<'_>) -> RowValue {
        match &self.column(id).kind {
            ColumnKind::Text { field }
            | ColumnKind::Number { field, .. }
            | ColumnKind::Categorical { field, .. } => row.row.get(field).clone(),
            ColumnKind::Stack { .. } => {
                let n = self.number(id, row);
                if n.is_nan() {
                    RowValue::Missing
                } else {
                    RowValue::Number(n)
                }
            }
            ColumnKind::Nested { .. } => RowValue::Missing,
            ColumnKind::Selection => RowValue::Bool(row.selected),
        }
    }

    /// Numeric value: normalized for number columns with a domain, the
    /// weighted mean of present children for stacks, NaN otherwise.
    pub fn number(&self, id: ColumnId, row: &RowRef<'_>) -> f64 {
        match &self.column(id).kind {
            ColumnKind::Number { field, domain } => normalize(row.row.get(field).as_number(), *domain),
            ColumnKind::Stack {
                children, weights, ..
            } => {
                let mut sum = 0.0;
                let mut total_weight = 0.0;
                for (child, weight) in children.iter().zip(weights) {
                    let v = self.number(*child, row);
                    if !v.is_nan() {
                        sum += weight * v;
                        total_weight += weight;
                    }
                }
                if total_weight > 0.0 {
                    sum / total_weight
                } else {
                    f64::NAN
                }
            }
            ColumnKind::Selection => {
                if row.selected {
                    1.0
                } else {
                    0.0
                }
            }
            _ => f64::NAN,
        }
    }

    /// Number before domain normalization.
    pub fn raw_number(&self, id: ColumnId, row: &RowRef<'_>) -> f64 {
        match &self.column(id).kind {
            ColumnKind::Number { field, .. } => row.row.get(field).as_number(),
            _ => self.number(id, row),
        }
    }

    pub fn is_missing(&self, id: ColumnId, row: &RowRef<'_>) -> bool {
        let column = self.column(id);
        match &column.kind {
            ColumnKind::Text { field } => row.row.get(field).is_missing(),
            ColumnKind::Number { .. } | ColumnKind::Stack { .. } => self.number(id, row).is_nan(),
            ColumnKind::Categorical { .. } => self.category(id, row).is_none(),
            ColumnKind::Nested { children, .. } => children.iter().all(|c| self.is_missing(*c, row)),
            ColumnKind::Selection => false,
        }
    }

    /// Display text of the row's value; empty when missing.
    pub fn label(&self, id: ColumnId, row: &RowRef<'_>) -> String {
        let column = self.column(id);
        match &column.kind {
            ColumnKind::Text { field } => row.row.get(field).display(),
            ColumnKind::Number { .. } | ColumnKind::Stack { .. } => {
                let n = self.raw_number(id, row);
                if n.is_nan() {
                    String::new()
                } else {
                    format_number(n)
                }
            }
            ColumnKind::Categorical { .. } | ColumnKind::Selection => self
                .category(id, row)
                .map(|c| c.label().to_string())
                .unwrap_or_default(),
            ColumnKind::Nested { children, .. } => children
                .iter()
                .map(|c| self.label(*c, row))
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    /// The category a row maps to. Raw values that match no declared
    /// category count as missing.
    pub fn category(&self, id: ColumnId, row: &RowRef<'_>) -> Option<&Category> {
        match &self.column(id).kind {
            ColumnKind::Categorical { field, categories } => {
                let value = row.row.get(field);
                if value.is_missing() {
                    return None;
                }
                let name = value.display();
                categories.iter().find(|c| c.name == name)
            }
            ColumnKind::Selection => Some(&SELECTION_CATEGORIES[usize::from(!row.selected)]),
            _ => None,
        }
    }

    /// Per-child breakdown of a stack value. Empty for non-stack columns.
    pub fn stack_contributions(&self, id: ColumnId, row: &RowRef<'_>) -> Vec<StackContribution> {
        let ColumnKind::Stack {
            children, weights, ..
        } = &self.column(id).kind
        else {
            return Vec::new();
        };
        let values: Vec<f64> = children.iter().map(|c| self.number(*c, row)).collect();
        let total_weight: f64 = values
            .iter()
            .zip(weights)
            .filter(|(v, _)| !v.is_nan())
            .map(|(_, w)| w)
            .sum();
        children
            .iter()
            .zip(weights)
            .zip(values)
            .map(|((child, weight), value)| StackContribution {
                child: *child,
                weight: *weight,
                value,
                contribution: if value.is_nan() || total_weight <= 0.0 {
                    0.0
                } else {
                    weight * value / total_weight
                },
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Capability views
    // ------------------------------------------------------------------------

    pub fn numeric(&self, id: ColumnId) -> Option<Numeric<'_>> {
        let column = self.get(id)?;
        let domain = match &column.kind {
            ColumnKind::Number { domain, .. } => domain.map(|_| [0.0, 1.0]),
            ColumnKind::Stack { children, .. } => {
                let normalized = !children.is_empty()
                    && children
                        .iter()
                        .all(|c| self.numeric(*c).and_then(|n| n.domain) == Some([0.0, 1.0]));
                normalized.then_some([0.0, 1.0])
            }
            _ => return None,
        };
        Some(Numeric {
            tree: self,
            id,
            domain,
        })
    }

    pub fn categorical(&self, id: ColumnId) -> Option<Categorical<'_>> {
        let categories: &[Category] = match &self.get(id)?.kind {
            ColumnKind::Categorical { categories, .. } => categories.as_slice(),
            ColumnKind::Selection => SELECTION_CATEGORIES.as_slice(),
            _ => return None,
        };
        Some(Categorical {
            tree: self,
            id,
            categories,
        })
    }
}

/// A column that yields numbers.
#[derive(Debug, Clone, Copy)]
pub struct Numeric<'t> {
    tree: &'t ColumnTree,
    pub id: ColumnId,
    /// Fixed value domain, `None` when the observed range should be used.
    pub domain: Option<[f64; 2]>,
}

impl Numeric<'_> {
    pub fn number(&self, row: &RowRef<'_>) -> f64 {
        self.tree.number(self.id, row)
    }
}

/// A column that maps rows onto an ordered category set.
#[derive(Debug, Clone, Copy)]
pub struct Categorical<'t> {
    tree: &'t ColumnTree,
    pub id: ColumnId,
    pub categories: &'t [Category],
}

impl<'t> Categorical<'t> {
    pub fn category(&self, row: &RowRef<'_>) -> Option<&'t Category> {
        self.tree.category(self.id, row)
    }
}
