//! FILENAME: core/lineup-engine/src/error.rs
//! Error types for ranking construction and engine operations.

use lineup_data::DataError;
use thiserror::Error;

use crate::column::{ColumnId, RankingId};

/// Malformed column descriptors. Fatal at construction time: nothing from a
/// rejected descriptor is ever committed to a ranking.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown column type '{0}'")]
    UnknownType(String),

    #[error("{kind} column requires a 'column' field name")]
    MissingField { kind: String },

    #[error("categorical column '{0}' declares no categories")]
    EmptyCategories(String),

    #[error("duplicate category '{0}'")]
    DuplicateCategory(String),

    #[error("stack column expects {expected} weights, found {found}")]
    WeightCountMismatch { expected: usize, found: usize },

    #[error("invalid weight {0}: weights must be finite and non-negative")]
    InvalidWeight(f64),

    #[error("invalid domain [{0}, {1}]")]
    InvalidDomain(f64, f64),

    #[error("invalid width {0}")]
    InvalidWidth(f64),

    #[error("a stack column can only combine numeric children, found '{0}'")]
    NonNumericStackChild(String),

    #[error("{filter} filter cannot apply to a {kind} column")]
    FilterMismatch { filter: String, kind: String },

    #[error("unknown column path {0:?}")]
    UnknownPath(Vec<usize>),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("unknown column {0}")]
    UnknownColumn(ColumnId),

    #[error("unknown ranking {0}")]
    UnknownRanking(RankingId),

    #[error("column {0} is not a stack column")]
    NotStack(ColumnId),

    #[error("column {0} is not a number column")]
    NotNumeric(ColumnId),

    #[error("column {0} cannot be used as a grouping criterion")]
    NotGroupable(ColumnId),

    #[error("filter does not apply to column {0}")]
    FilterMismatch(ColumnId),

    #[error("index {index} out of range (len {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
