use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{error::Error, schema::ColumnKind};

/// A typed literal, either bound as a query parameter or read back from a
/// stored row.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Text(String),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce a JSON literal into the value type of a column.
    ///
    /// Null and mistyped literals are rejected: a search term has to be
    /// comparable to the column it targets.
    pub fn coerce(json: &serde_json::Value, kind: ColumnKind) -> Result<Value, Error> {
        let mismatch = || {
            Error::MalformedExpression(format!(
                "search term {} is not comparable to a {} column",
                json,
                kind.name()
            ))
        };

        match (kind, json) {
            (_, serde_json::Value::Null) => Err(Error::MalformedExpression(
                "search term must be present".to_string(),
            )),
            (ColumnKind::Text, serde_json::Value::String(s)) => Ok(Value::Text(s.clone())),
            (ColumnKind::Int, serde_json::Value::Number(n)) => {
                n.as_i64().map(Value::Int).ok_or_else(mismatch)
            }
            (ColumnKind::Float, serde_json::Value::Number(n)) => {
                n.as_f64().map(Value::Float).ok_or_else(mismatch)
            }
            (ColumnKind::Bool, serde_json::Value::Bool(b)) => Ok(Value::Bool(*b)),
            (ColumnKind::Date, serde_json::Value::String(s)) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|_| mismatch())
            }
            _ => Err(mismatch()),
        }
    }

    /// Read a stored JSON cell as a value of the given column type.
    /// Cells that do not fit the type read as null.
    pub fn from_cell(json: Option<&serde_json::Value>, kind: ColumnKind) -> Value {
        match json {
            None | Some(serde_json::Value::Null) => Value::Null,
            Some(json) => Value::coerce(json, kind).unwrap_or(Value::Null),
        }
    }

    /// SQL-style comparison: anything involving null is unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_float(), b.as_float()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }
}

// Helper trait to convert key and literal types to Value
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ToValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl ToValue for i32 {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ToValue for NaiveDate {
    fn to_value(&self) -> Value {
        Value::Date(*self)
    }
}
