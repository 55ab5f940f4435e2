use crate::errors::{ExError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Column name to value
pub type Row = BTreeMap<String, Value>;

/// Column/value pairs in store order, used where column prefixes
/// (`base_`, `our_`, `from_`, ...) carry meaning.
pub type FlatRow = Vec<(String, Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowOpType {
    Insert,
    Update,
    Delete,
}

/// One abstract row mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOp {
    #[serde(rename = "type")]
    pub op_type: RowOpType,
    pub table: String,
    #[serde(default)]
    pub values: Row,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pk: Option<Row>,
}

impl RowOp {
    pub fn insert(table: impl Into<String>, values: Row) -> Self {
        Self {
            op_type: RowOpType::Insert,
            table: table.into(),
            values,
            pk: None,
        }
    }

    pub fn update(
        table: impl Into<String>,
        pk_column: impl Into<String>,
        pk_value: impl Into<Value>,
        values: Row,
    ) -> Self {
        Self {
            op_type: RowOpType::Update,
            table: table.into(),
            values,
            pk: Some(Row::from([(pk_column.into(), pk_value.into())])),
        }
    }

    pub fn delete(
        table: impl Into<String>,
        pk_column: impl Into<String>,
        pk_value: impl Into<Value>,
    ) -> Self {
        Self {
            op_type: RowOpType::Delete,
            table: table.into(),
            values: Row::new(),
            pk: Some(Row::from([(pk_column.into(), pk_value.into())])),
        }
    }

    /// The single primary-key pair of an update/delete.
    ///
    /// Composite keys are not supported, so anything other than exactly one
    /// entry is `INVALID_ARGUMENT`.
    pub fn single_pk(&self) -> Result<(&str, &Value)> {
        match &self.pk {
            Some(pk) if pk.len() == 1 => pk
                .iter()
                .next()
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| ExError::internal("pk map lost its entry")),
            _ => Err(ExError::invalid_argument(format!(
                "{} requires exactly one primary key column",
                match self.op_type {
                    RowOpType::Insert => "insert",
                    RowOpType::Update => "update",
                    RowOpType::Delete => "delete",
                }
            ))
            .with_table(&self.table)),
        }
    }
}
