//! FILENAME: core/lineup-engine/src/descriptor.rs
//! Column Descriptors - The serializable configuration.
//!
//! This module contains the types needed to DESCRIBE the columns of a
//! ranking. These structures are designed to be:
//! - Serializable (session persistence, camelCase JSON)
//! - Validated and translated into the live column tree at build time
//! - Re-emitted from the live tree in the same shape (round-trip fidelity)

use serde::{Deserialize, Serialize};

use crate::column::ColumnFilter;
use crate::error::ConfigError;

// ============================================================================
// COLUMN TYPE
// ============================================================================

/// The closed set of column kinds a descriptor may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Number,
    Categorical,
    Stack,
    Nested,
    Selection,
}

impl ColumnType {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "string" => Ok(ColumnType::String),
            "number" => Ok(ColumnType::Number),
            "categorical" => Ok(ColumnType::Categorical),
            "stack" => Ok(ColumnType::Stack),
            "nested" => Ok(ColumnType::Nested),
            "selection" => Ok(ColumnType::Selection),
            other => Err(ConfigError::UnknownType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Number => "number",
            ColumnType::Categorical => "categorical",
            ColumnType::Stack => "stack",
            ColumnType::Nested => "nested",
            ColumnType::Selection => "selection",
        }
    }

    /// Leaf kinds read a named field of the row.
    pub fn reads_field(&self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::Number | ColumnType::Categorical
        )
    }
}

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// A category entry: either a bare name or a name with label and color.
/// The shape given is the shape re-emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryDesc {
    Name(String),
    Full {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    },
}

impl CategoryDesc {
    pub fn name(&self) -> &str {
        match self {
            CategoryDesc::Name(name) => name,
            CategoryDesc::Full { name, .. } => name,
        }
    }
}

/// Serializable description of one column (and, for composites, its children).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDesc {
    /// Column type name (`string`, `number`, `categorical`, `stack`, `nested`, `selection`).
    #[serde(rename = "type")]
    pub kind: String,

    /// Row field the column reads (leaf kinds only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    /// Number columns: raw range mapped onto [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<[f64; 2]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryDesc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ColumnDesc>>,

    /// Stack columns: one weight per child.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,

    /// Composite columns: whether children are hidden in the flattened layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ColumnFilter>,
}

impl ColumnDesc {
    fn bare(kind: ColumnType) -> Self {
        ColumnDesc {
            kind: kind.as_str().to_string(),
            column: None,
            label: None,
            color: None,
            width: None,
            domain: None,
            categories: None,
            children: None,
            weights: None,
            collapsed: None,
            filter: None,
        }
    }

    pub fn string(field: impl Into<String>) -> Self {
        ColumnDesc {
            column: Some(field.into()),
            ..Self::bare(ColumnType::String)
        }
    }

    pub fn number(field: impl Into<String>) -> Self {
        ColumnDesc {
            column: Some(field.into()),
            ..Self::bare(ColumnType::Number)
        }
    }

    pub fn categorical<S: Into<String>>(
        field: impl Into<String>,
        categories: impl IntoIterator<Item = S>,
    ) -> Self {
        ColumnDesc {
            column: Some(field.into()),
            categories: Some(
                categories
                    .into_iter()
                    .map(|c| CategoryDesc::Name(c.into()))
                    .collect(),
            ),
            ..Self::bare(ColumnType::Categorical)
        }
    }

    pub fn stack(children: Vec<ColumnDesc>, weights: Vec<f64>) -> Self {
        ColumnDesc {
            children: Some(children),
            weights: Some(weights),
            ..Self::bare(ColumnType::Stack)
        }
    }

    pub fn nested(children: Vec<ColumnDesc>) -> Self {
        ColumnDesc {
            children: Some(children),
            ..Self::bare(ColumnType::Nested)
        }
    }

    pub fn selection() -> Self {
        Self::bare(ColumnType::Selection)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_domain(mut self, min: f64, max: f64) -> Self {
        self.domain = Some([min, max]);
        self
    }

    pub fn column_type(&self) -> Result<ColumnType, ConfigError> {
        ColumnType::parse(&self.kind)
    }

    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// RANKING / SESSION DESCRIPTORS
// ============================================================================

/// Position of a column inside a ranking: index among the top-level children,
/// then index among that column's children, and so on.
pub type ColumnPath = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDesc {
    pub column: ColumnPath,
    pub ascending: bool,
}

/// Everything needed to rebuild one ranking.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingDesc {
    pub columns: Vec<ColumnDesc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort_criteria: Vec<SortDesc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_criteria: Vec<ColumnPath>,
}

impl RankingDesc {
    pub fn new(columns: Vec<ColumnDesc>) -> Self {
        RankingDesc {
            columns,
            ..Default::default()
        }
    }
}
