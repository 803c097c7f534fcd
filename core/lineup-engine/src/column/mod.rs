//! FILENAME: core/lineup-engine/src/column/mod.rs
//! Column model.
//!
//! A column is a closed sum type over its kinds. Columns of one ranking live
//! in a `ColumnTree` arena keyed by engine-assigned ids; composites refer to
//! their children by id and children point back through `parent`.
//!
//! Layers:
//! - `mod`: kinds, the arena, descriptor translation (both directions)
//! - `access`: per-row value accessors and capability views
//! - `filter`: per-column row filters
//! - `flatten`: depth-first layout of the column tree

pub mod access;
pub mod filter;
pub mod flatten;

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::descriptor::{CategoryDesc, ColumnDesc, ColumnPath, ColumnType};
use crate::error::ConfigError;

pub use access::{Categorical, Numeric, RowRef, StackContribution};
pub use filter::ColumnFilter;
pub use flatten::{flatten, FlatColumn};

/// Identifier of a ranking within a provider session.
pub type RankingId = u32;

/// Default width of a freshly built column, in pixels.
pub const DEFAULT_WIDTH: f64 = 100.0;

/// Colors handed to categories that do not declare one, by position.
pub const CATEGORY_PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Session-unique column identifier: the owning ranking plus a counter local
/// to that ranking. Ids are never reused within a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId {
    pub ranking: RankingId,
    pub local: u32,
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}c{}", self.ranking, self.local)
    }
}

// ============================================================================
// KINDS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub label: Option<String>,
    pub color: Option<String>,
    /// Position in the declared category list.
    pub index: usize,
}

impl Category {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Category {
            name: name.into(),
            label: None,
            color: None,
            index,
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Declared color, or the palette color for the category's position.
    pub fn color(&self) -> &str {
        self.color
            .as_deref()
            .unwrap_or(CATEGORY_PALETTE[self.index % CATEGORY_PALETTE.len()])
    }

    fn to_desc(&self) -> CategoryDesc {
        if self.label.is_none() && self.color.is_none() {
            CategoryDesc::Name(self.name.clone())
        } else {
            CategoryDesc::Full {
                name: self.name.clone(),
                label: self.label.clone(),
                color: self.color.clone(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// Reads a field as text.
    Text { field: String },
    /// Reads a field as a number, optionally normalized from `domain` onto [0, 1].
    Number {
        field: String,
        domain: Option<[f64; 2]>,
    },
    /// Maps a field onto one of a fixed, ordered category set.
    Categorical {
        field: String,
        categories: Vec<Category>,
    },
    /// Weighted combination of numeric children.
    Stack {
        children: Vec<ColumnId>,
        weights: Vec<f64>,
        collapsed: bool,
    },
    /// Visual grouping of children; values are not combined.
    Nested {
        children: Vec<ColumnId>,
        collapsed: bool,
    },
    /// Per-row selection state held by the provider.
    Selection,
}

impl ColumnKind {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnKind::Text { .. } => ColumnType::String,
            ColumnKind::Number { .. } => ColumnType::Number,
            ColumnKind::Categorical { .. } => ColumnType::Categorical,
            ColumnKind::Stack { .. } => ColumnType::Stack,
            ColumnKind::Nested { .. } => ColumnType::Nested,
            ColumnKind::Selection => ColumnType::Selection,
        }
    }

    pub fn children(&self) -> &[ColumnId] {
        match self {
            ColumnKind::Stack { children, .. } | ColumnKind::Nested { children, .. } => children,
            _ => &[],
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            ColumnKind::Text { field }
            | ColumnKind::Number { field, .. }
            | ColumnKind::Categorical { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, ColumnKind::Stack { .. } | ColumnKind::Nested { .. })
    }

    pub fn is_collapsed(&self) -> bool {
        match self {
            ColumnKind::Stack { collapsed, .. } | ColumnKind::Nested { collapsed, .. } => {
                *collapsed
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub id: ColumnId,
    pub label: String,
    pub width: f64,
    pub color: Option<String>,
    pub parent: Option<ColumnId>,
    pub kind: ColumnKind,
    pub filter: Option<ColumnFilter>,
}

// ============================================================================
// COLUMN TREE
// ============================================================================

/// Arena holding every column of one ranking, top-level and nested.
#[derive(Debug, Clone)]
pub struct ColumnTree {
    ranking: RankingId,
    next_local: u32,
    columns: FxHashMap<ColumnId, Column>,
}

impl ColumnTree {
    pub fn new(ranking: RankingId) -> Self {
        ColumnTree {
            ranking,
            next_local: 0,
            columns: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, id: ColumnId) -> bool {
        self.columns.contains_key(&id)
    }

    pub fn get(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(&id)
    }

    /// Returns a live column.
    ///
    /// # Panics
    /// Accessing a removed column is a programming error and fails fast.
    pub fn column(&self, id: ColumnId) -> &Column {
        match self.columns.get(&id) {
            Some(column) => column,
            None => panic!("column {} accessed after removal", id),
        }
    }

    pub(crate) fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns.get_mut(&id)
    }

    pub fn children(&self, id: ColumnId) -> &[ColumnId] {
        self.column(id).kind.children()
    }

    /// The column itself followed by all its descendants, depth-first.
    pub fn subtree(&self, id: ColumnId) -> Vec<ColumnId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(column) = self.columns.get(&next) {
                stack.extend(column.kind.children().iter().rev());
            }
        }
        out
    }

    /// Parent chain from the direct parent up to the top-level column.
    pub fn ancestors(&self, id: ColumnId) -> Vec<ColumnId> {
        let mut out = Vec::new();
        let mut current = self.columns.get(&id).and_then(|c| c.parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.columns.get(&parent).and_then(|c| c.parent);
        }
        out
    }

    /// Columns whose derived value depends on `field`, including the
    /// composites above them.
    pub fn columns_reading(&self, field: &str) -> FxHashSet<ColumnId> {
        let mut out = FxHashSet::default();
        for column in self.columns.values() {
            if column.kind.field() == Some(field) {
                out.insert(column.id);
                out.extend(self.ancestors(column.id));
            }
        }
        out
    }

    /// Ids of all selection columns, including nested ones.
    pub fn selection_columns(&self) -> Vec<ColumnId> {
        self.columns
            .values()
            .filter(|c| matches!(c.kind, ColumnKind::Selection))
            .map(|c| c.id)
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        self.columns.keys().copied()
    }

    // ------------------------------------------------------------------------
    // Descriptor -> tree
    // ------------------------------------------------------------------------

    /// Validates `desc` and inserts the column subtree it describes.
    /// On error nothing is inserted and no id is consumed.
    pub fn build(&mut self, desc: &ColumnDesc, parent: Option<ColumnId>) -> Result<ColumnId, ConfigError> {
        let start = self.next_local;
        let mut scratch = Vec::new();
        match self.translate(desc, parent, &mut scratch) {
            Ok(id) => {
                for column in scratch {
                    self.columns.insert(column.id, column);
                }
                Ok(id)
            }
            Err(e) => {
                self.next_local = start;
                Err(e)
            }
        }
    }

    fn allocate(&mut self) -> ColumnId {
        let id = ColumnId {
            ranking: self.ranking,
            local: self.next_local,
        };
        self.next_local += 1;
        id
    }

    fn translate(
        &mut self,
        desc: &ColumnDesc,
        parent: Option<ColumnId>,
        scratch: &mut Vec<Column>,
    ) -> Result<ColumnId, ConfigError> {
        let column_type = desc.column_type()?;
        let width = desc.width.unwrap_or(DEFAULT_WIDTH);
        if !width.is_finite() || width < 0.0 {
            return Err(ConfigError::InvalidWidth(width));
        }

        let field = if column_type.reads_field() {
            Some(desc.column.clone().ok_or_else(|| ConfigError::MissingField {
                kind: column_type.as_str().to_string(),
            })?)
        } else {
            None
        };

        let id = self.allocate();
        let kind = match column_type {
            ColumnType::String => ColumnKind::Text {
                field: field.unwrap_or_default(),
            },
            ColumnType::Number => {
                if let Some([lo, hi]) = desc.domain {
                    if !lo.is_finite() || !hi.is_finite() || lo == hi {
                        return Err(ConfigError::InvalidDomain(lo, hi));
                    }
                }
                ColumnKind::Number {
                    field: field.unwrap_or_default(),
                    domain: desc.domain,
                }
            }
            ColumnType::Categorical => {
                let field = field.unwrap_or_default();
                let categories = translate_categories(&field, desc.categories.as_deref())?;
                ColumnKind::Categorical { field, categories }
            }
            ColumnType::Stack => {
                let child_descs = desc.children.as_deref().unwrap_or(&[]);
                let weights = match &desc.weights {
                    Some(w) if w.len() != child_descs.len() => {
                        return Err(ConfigError::WeightCountMismatch {
                            expected: child_descs.len(),
                            found: w.len(),
                        })
                    }
                    Some(w) => w.clone(),
                    None => vec![1.0; child_descs.len()],
                };
                validate_weights(&weights)?;
                let mut children = Vec::with_capacity(child_descs.len());
                for child in child_descs {
                    let child_type = child.column_type()?;
                    if !matches!(child_type, ColumnType::Number | ColumnType::Stack) {
                        return Err(ConfigError::NonNumericStackChild(child.kind.clone()));
                    }
                    children.push(self.translate(child, Some(id), scratch)?);
                }
                ColumnKind::Stack {
                    children,
                    weights,
                    collapsed: desc.collapsed.unwrap_or(false),
                }
            }
            ColumnType::Nested => {
                let mut children = Vec::new();
                for child in desc.children.as_deref().unwrap_or(&[]) {
                    children.push(self.translate(child, Some(id), scratch)?);
                }
                ColumnKind::Nested {
                    children,
                    collapsed: desc.collapsed.unwrap_or(false),
                }
            }
            ColumnType::Selection => ColumnKind::Selection,
        };

        if let Some(filter) = &desc.filter {
            if !filter.applies_to(&kind) {
                return Err(ConfigError::FilterMismatch {
                    filter: filter.name().to_string(),
                    kind: column_type.as_str().to_string(),
                });
            }
        }

        let label = desc
            .label
            .clone()
            .or_else(|| desc.column.clone())
            .unwrap_or_else(|| column_type.as_str().to_string());

        scratch.push(Column {
            id,
            label,
            width,
            color: desc.color.clone(),
            parent,
            kind,
            filter: desc.filter.clone(),
        });
        Ok(id)
    }

    // ------------------------------------------------------------------------
    // Tree -> descriptor
    // ------------------------------------------------------------------------

    /// Re-emits the live subtree rooted at `id` in descriptor form.
    pub fn to_desc(&self, id: ColumnId) -> ColumnDesc {
        let column = self.column(id);
        let mut desc = ColumnDesc {
            kind: column.kind.column_type().as_str().to_string(),
            column: column.kind.field().map(str::to_string),
            label: Some(column.label.clone()),
            color: column.color.clone(),
            width: Some(column.width),
            domain: None,
            categories: None,
            children: None,
            weights: None,
            collapsed: None,
            filter: column.filter.clone(),
        };
        match &column.kind {
            ColumnKind::Number { domain, .. } => desc.domain = *domain,
            ColumnKind::Categorical { categories, .. } => {
                desc.categories = Some(categories.iter().map(Category::to_desc).collect());
            }
            ColumnKind::Stack {
                children,
                weights,
                collapsed,
            } => {
                desc.children = Some(children.iter().map(|c| self.to_desc(*c)).collect());
                desc.weights = Some(weights.clone());
                desc.collapsed = Some(*collapsed);
            }
            ColumnKind::Nested { children, collapsed } => {
                desc.children = Some(children.iter().map(|c| self.to_desc(*c)).collect());
                desc.collapsed = Some(*collapsed);
            }
            ColumnKind::Text { .. } | ColumnKind::Selection => {}
        }
        desc
    }

    // ------------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------------

    /// Removes a column with all its descendants and detaches it from its
    /// parent (dropping the matching stack weight). Returns the removed ids.
    pub(crate) fn remove(&mut self, id: ColumnId) -> Vec<ColumnId> {
        let removed = self.subtree(id);
        let parent = self.columns.get(&id).and_then(|c| c.parent);
        if let Some(parent) = parent.and_then(|p| self.columns.get_mut(&p)) {
            match &mut parent.kind {
                ColumnKind::Stack {
                    children, weights, ..
                } => {
                    if let Some(pos) = children.iter().position(|c| *c == id) {
                        children.remove(pos);
                        weights.remove(pos);
                    }
                }
                ColumnKind::Nested { children, .. } => children.retain(|c| *c != id),
                _ => {}
            }
        }
        for column in &removed {
            self.columns.remove(column);
        }
        removed
    }

    // ------------------------------------------------------------------------
    // Paths (session persistence)
    // ------------------------------------------------------------------------

    /// Position of `id` relative to the given top-level list.
    pub fn path_of(&self, top_level: &[ColumnId], id: ColumnId) -> Option<ColumnPath> {
        let mut path = Vec::new();
        let mut current = id;
        loop {
            let parent = self.columns.get(&current)?.parent;
            let siblings = match parent {
                Some(p) => self.children(p),
                None => top_level,
            };
            path.push(siblings.iter().position(|c| *c == current)?);
            match parent {
                Some(p) => current = p,
                None => break,
            }
        }
        path.reverse();
        Some(path)
    }

    pub fn resolve_path(&self, top_level: &[ColumnId], path: &[usize]) -> Option<ColumnId> {
        let (first, rest) = path.split_first()?;
        let mut current = *top_level.get(*first)?;
        for index in rest {
            current = *self.get(current)?.kind.children().get(*index)?;
        }
        Some(current)
    }
}

fn translate_categories(field: &str, descs: Option<&[CategoryDesc]>) -> Result<Vec<Category>, ConfigError> {
    let descs = descs.unwrap_or(&[]);
    if descs.is_empty() {
        return Err(ConfigError::EmptyCategories(field.to_string()));
    }
    let mut seen = FxHashSet::default();
    let mut categories = Vec::with_capacity(descs.len());
    for (index, desc) in descs.iter().enumerate() {
        if !seen.insert(desc.name().to_string()) {
            return Err(ConfigError::DuplicateCategory(desc.name().to_string()));
        }
        let mut category = Category::new(desc.name(), index);
        if let CategoryDesc::Full { label, color, .. } = desc {
            category.label = label.clone();
            category.color = color.clone();
        }
        categories.push(category);
    }
    Ok(categories)
}

pub(crate) fn validate_weights(weights: &[f64]) -> Result<(), ConfigError> {
    match weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        Some(w) => Err(ConfigError::InvalidWeight(*w)),
        None => Ok(()),
    }
}
