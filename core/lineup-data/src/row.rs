//! FILENAME: core/lineup-data/src/row.rs
//! PURPOSE: A single ingested row: a map from field name to raw value.
//! CONTEXT: Rows are opaque to the ranking engine. Columns name the field they
//! read and the row answers with `RowValue::Missing` for absent fields.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::value::RowValue;

static MISSING: RowValue = RowValue::Missing;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: FxHashMap<String, RowValue>,
}

impl Row {
    pub fn new() -> Self {
        Row::default()
    }

    /// Builder-style setter, handy for fixtures and ingestion code.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<RowValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Returns the value of `field`, or `Missing` if the row has no such field.
    pub fn get(&self, field: &str) -> &RowValue {
        self.fields.get(field).unwrap_or(&MISSING)
    }

    /// Sets a field and returns the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<RowValue>) -> RowValue {
        self.fields
            .insert(field.into(), value.into())
            .unwrap_or_default()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds a row from a JSON object. Any other JSON shape is rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| DataError::NotAnObject(value.to_string()))?;
        let fields = object
            .iter()
            .map(|(k, v)| (k.clone(), RowValue::from_json(v)))
            .collect();
        Ok(Row { fields })
    }
}

impl<K: Into<String>, V: Into<RowValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
