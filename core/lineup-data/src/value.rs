//! FILENAME: core/lineup-data/src/value.rs
//! PURPOSE: Defines the raw value a row holds for a single field.
//! CONTEXT: Columns read rows exclusively through these values. A missing
//! value is a first-class state rather than an error: it sorts after present
//! values and is counted separately by the statistics layer.

use serde::{Deserialize, Serialize};

/// The raw content of one field of one row.
///
/// Deserializes from plain JSON scalars: `null` becomes `Missing`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowValue {
    #[default]
    Missing,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RowValue {
    pub fn text(s: impl Into<String>) -> Self {
        RowValue::Text(s.into())
    }

    /// True for `Missing`, NaN numbers and blank text.
    pub fn is_missing(&self) -> bool {
        match self {
            RowValue::Missing => true,
            RowValue::Number(n) => n.is_nan(),
            RowValue::Text(s) => s.trim().is_empty(),
            RowValue::Bool(_) => false,
        }
    }

    /// Numeric interpretation of the value. NaN for missing or non-numeric.
    /// Text is parsed leniently (surrounding whitespace ignored).
    pub fn as_number(&self) -> f64 {
        match self {
            RowValue::Number(n) => *n,
            RowValue::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            RowValue::Bool(_) | RowValue::Missing => f64::NAN,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Display form of the value. Missing values render as an empty string.
    pub fn display(&self) -> String {
        match self {
            RowValue::Missing => String::new(),
            RowValue::Number(n) => format_number(*n),
            RowValue::Text(s) => s.clone(),
            RowValue::Bool(b) => b.to_string(),
        }
    }

    /// Converts an arbitrary JSON value. Nested arrays and objects are kept as
    /// their JSON text since no column kind reads structured values.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RowValue::Missing,
            serde_json::Value::Bool(b) => RowValue::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(RowValue::Missing, RowValue::Number),
            serde_json::Value::String(s) => RowValue::Text(s.clone()),
            other => RowValue::Text(other.to_string()),
        }
    }
}

/// Formats a number without unnecessary decimal places.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        String::new()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl From<f64> for RowValue {
    fn from(value: f64) -> Self {
        RowValue::Number(value)
    }
}

impl From<i64> for RowValue {
    fn from(value: i64) -> Self {
        RowValue::Number(value as f64)
    }
}

impl From<bool> for RowValue {
    fn from(value: bool) -> Self {
        RowValue::Bool(value)
    }
}

impl From<&str> for RowValue {
    fn from(value: &str) -> Self {
        RowValue::Text(value.to_string())
    }
}

impl From<String> for RowValue {
    fn from(value: String) -> Self {
        RowValue::Text(value)
    }
}

impl<T: Into<RowValue>> From<Option<T>> for RowValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValue::Missing, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_states() {
        assert!(RowValue::Missing.is_missing());
        assert!(RowValue::Number(f64::NAN).is_missing());
        assert!(RowValue::text("  ").is_missing());
        assert!(!RowValue::Number(0.0).is_missing());
        assert!(!RowValue::Bool(false).is_missing());
    }

    #[test]
    fn test_as_number() {
        assert_eq!(RowValue::Number(2.5).as_number(), 2.5);
        assert_eq!(RowValue::text(" 42 ").as_number(), 42.0);
        assert!(RowValue::text("abc").as_number().is_nan());
        assert!(RowValue::Missing.as_number().is_nan());
    }

    #[test]
    fn test_display_drops_trailing_zeroes() {
        assert_eq!(RowValue::Number(3.0).display(), "3");
        assert_eq!(RowValue::Number(0.25).display(), "0.25");
        assert_eq!(RowValue::Missing.display(), "");
    }

    #[test]
    fn test_deserialize_null_as_missing() {
        let values: Vec<RowValue> = serde_json::from_str(r#"[null, 1.5, "x", true]"#).unwrap();
        assert_eq!(
            values,
            vec![
                RowValue::Missing,
                RowValue::Number(1.5),
                RowValue::text("x"),
                RowValue::Bool(true),
            ]
        );
    }
}
