//! FILENAME: core/lineup-data/src/error.rs
//! Errors raised by row store mutations and JSON loading.

use thiserror::Error;

use crate::store::DataIndex;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("row index {index} out of range (store holds {len} rows)")]
    IndexOutOfRange { index: DataIndex, len: usize },

    #[error("row {0} is already resolved")]
    NotPending(DataIndex),

    #[error("expected a JSON object per row, found: {0}")]
    NotAnObject(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DataError>;
