//! Column value coercion and ordering
//!
//! Values are stored coerced to their column's type family so that a key
//! written as `1` and looked up as `"1"` address the same row.

use crate::errors::Result;
use changegate_core::errors::ExError;
use changegate_core::model::ColumnSchema;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Float,
    Bool,
    Json,
    Text,
}

/// Classify a declared column type such as `int`, `varchar(64)` or `decimal(10,2)`
pub fn family(col_type: &str) -> TypeFamily {
    let base = col_type
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match base.as_str() {
        "int" | "integer" | "bigint" | "smallint" | "tinyint" | "mediumint" => {
            TypeFamily::Integer
        }
        "float" | "double" | "real" | "decimal" | "numeric" => TypeFamily::Float,
        "bool" | "boolean" => TypeFamily::Bool,
        "json" => TypeFamily::Json,
        _ => TypeFamily::Text,
    }
}

fn mismatch(column: &ColumnSchema, value: &Value) -> ExError {
    ExError::invalid_argument(format!(
        "column {} ({}) cannot hold value {}",
        column.name, column.col_type, value
    ))
}

/// Coerce `value` into the representation stored for `column`
pub fn coerce(column: &ColumnSchema, value: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match family(&column.col_type) {
        TypeFamily::Integer => as_integer(value)
            .map(Value::from)
            .ok_or_else(|| mismatch(column, value)),
        TypeFamily::Float => as_float(value)
            .map(Value::from)
            .ok_or_else(|| mismatch(column, value)),
        TypeFamily::Bool => as_bool(value)
            .map(Value::Bool)
            .ok_or_else(|| mismatch(column, value)),
        TypeFamily::Json => Ok(value.clone()),
        TypeFamily::Text => Ok(Value::String(render(value))),
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Text form of a value; strings are not quoted
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Canonical key of an already-coerced primary key value
pub fn key_of(value: &Value) -> String {
    value.to_string()
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting: null < bool < number < string < composite
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i.cmp(&j),
            _ => x
                .as_f64()
                .unwrap_or(0.0)
                .partial_cmp(&y.as_f64().unwrap_or(0.0))
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}
