//! In-memory table snapshot: the content of one commit's tree.
//!
//! Every table has exactly one primary-key column. Rows are keyed by the
//! canonical text of their coerced key and always carry every schema column.

use crate::errors::{serialization_error, Result};
use crate::values::{coerce, key_of};
use changegate_core::errors::{ExError, ExErrorKind};
use changegate_core::model::table::primary_key_column;
use changegate_core::model::{ColumnSchema, Row};
use changegate_core::validation::validate_identifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tables: BTreeMap<String, TableData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<ColumnSchema>,
    pub rows: BTreeMap<String, Row>,
}

/// One NOT NULL or foreign key violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub table: String,
    pub key: String,
    pub column: String,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    NotNull,
    ForeignKey,
}

fn table_not_found(table: &str) -> ExError {
    ExError::new(ExErrorKind::NotFound)
        .with_table(table)
        .with_message(format!("table not found: {}", table))
}

impl TableData {
    /// Validate a schema and create an empty table
    pub fn new(columns: Vec<ColumnSchema>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for c in &columns {
            validate_identifier("column name", &c.name)?;
            if !seen.insert(c.name.as_str()) {
                return Err(ExError::invalid_argument(format!(
                    "duplicate column {}",
                    c.name
                )));
            }
        }
        let pk_count = columns.iter().filter(|c| c.primary_key).count();
        if pk_count != 1 {
            return Err(ExError::invalid_argument(format!(
                "table needs exactly one primary key column, found {}",
                pk_count
            )));
        }
        Ok(Self {
            columns,
            rows: BTreeMap::new(),
        })
    }

    pub fn pk_column(&self) -> Result<&ColumnSchema> {
        primary_key_column(&self.columns)
            .ok_or_else(|| ExError::invalid_argument("table has no primary key"))
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn require_column(&self, name: &str) -> Result<&ColumnSchema> {
        self.column(name)
            .ok_or_else(|| ExError::invalid_argument(format!("unknown column: {}", name)))
    }

    /// Row key for a value addressed through `pk_column`
    pub fn key_for(&self, pk_column: &str, value: &Value) -> Result<String> {
        let pk = self.pk_column()?;
        if pk.name != pk_column {
            return Err(ExError::invalid_argument(format!(
                "{} is not the primary key column (expected {})",
                pk_column, pk.name
            )));
        }
        let coerced = coerce(pk, value)?;
        if coerced.is_null() {
            return Err(ExError::invalid_argument(format!(
                "primary key {} must not be null",
                pk.name
            )));
        }
        Ok(key_of(&coerced))
    }

    /// Coerce the given columns; unknown columns are rejected
    fn coerce_values(&self, values: &Row) -> Result<Row> {
        values
            .iter()
            .map(|(name, v)| {
                let column = self.require_column(name)?;
                Ok((name.clone(), coerce(column, v)?))
            })
            .collect()
    }

    /// Fill absent schema columns with null and drop unknown ones
    pub fn complete_row(&self, row: &Row) -> Row {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), row.get(&c.name).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    fn row_key(&self, row: &Row) -> Result<String> {
        let pk = self.pk_column()?;
        let value = row.get(&pk.name).cloned().unwrap_or(Value::Null);
        if value.is_null() {
            return Err(ExError::invalid_argument(format!(
                "primary key {} is required",
                pk.name
            )));
        }
        Ok(key_of(&value))
    }

    pub fn insert(&mut self, values: &Row) -> Result<u64> {
        let row = self.complete_row(&self.coerce_values(values)?);
        let key = self.row_key(&row)?;
        if self.rows.contains_key(&key) {
            return Err(ExError::invalid_argument(format!(
                "duplicate primary key {}",
                key
            )));
        }
        self.rows.insert(key, row);
        Ok(1)
    }

    /// Apply `values` to the row addressed by `pk`. Changing the key column
    /// re-keys the row.
    pub fn update(&mut self, values: &Row, pk: (&str, &Value)) -> Result<u64> {
        let key = self.key_for(pk.0, pk.1)?;
        let updates = self.coerce_values(values)?;
        let Some(existing) = self.rows.get(&key) else {
            return Ok(0);
        };
        let mut row = existing.clone();
        row.extend(updates);
        let new_key = self.row_key(&row)?;
        if new_key != key && self.rows.contains_key(&new_key) {
            return Err(ExError::invalid_argument(format!(
                "duplicate primary key {}",
                new_key
            )));
        }
        self.rows.remove(&key);
        self.rows.insert(new_key, row);
        Ok(1)
    }

    pub fn delete(&mut self, pk: (&str, &Value)) -> Result<u64> {
        let key = self.key_for(pk.0, pk.1)?;
        Ok(u64::from(self.rows.remove(&key).is_some()))
    }

    pub fn get(&self, pk: (&str, &Value)) -> Result<Option<&Row>> {
        let key = self.key_for(pk.0, pk.1)?;
        Ok(self.rows.get(&key))
    }

    /// Whether any row holds `value` in `column`
    fn contains_value(&self, column: &str, value: &Value) -> bool {
        let Some(schema) = self.column(column) else {
            return false;
        };
        let Ok(target) = coerce(schema, value) else {
            return false;
        };
        if schema.primary_key {
            return self.rows.contains_key(&key_of(&target));
        }
        self.rows.values().any(|r| r.get(column) == Some(&target))
    }
}

impl Snapshot {
    pub fn table(&self, name: &str) -> Result<&TableData> {
        self.tables.get(name).ok_or_else(|| table_not_found(name))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut TableData> {
        self.tables.get_mut(name).ok_or_else(|| table_not_found(name))
    }

    /// NOT NULL and foreign key violations across all tables
    pub fn violations(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        for (table_name, table) in &self.tables {
            for (key, row) in &table.rows {
                for column in &table.columns {
                    let value = row.get(&column.name).unwrap_or(&Value::Null);
                    if value.is_null() {
                        if !column.nullable {
                            out.push(Violation {
                                table: table_name.clone(),
                                key: key.clone(),
                                column: column.name.clone(),
                                kind: ViolationKind::NotNull,
                            });
                        }
                        continue;
                    }
                    if let Some(fk) = &column.references {
                        let satisfied = self
                            .tables
                            .get(&fk.table)
                            .map(|parent| parent.contains_value(&fk.column, value))
                            .unwrap_or(false);
                        if !satisfied {
                            out.push(Violation {
                                table: table_name.clone(),
                                key: key.clone(),
                                column: column.name.clone(),
                                kind: ViolationKind::ForeignKey,
                            });
                        }
                    }
                }
            }
        }
        out
    }

    /// Violation count per table, only tables with violations
    pub fn violation_counts(&self) -> BTreeMap<String, u64> {
        let mut counts = BTreeMap::new();
        for v in self.violations() {
            *counts.entry(v.table).or_insert(0) += 1;
        }
        counts
    }

    /// Canonical JSON encoding (all maps are ordered)
    pub fn to_canonical_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| serialization_error("encode_tree", e))
    }

    pub fn digest(&self) -> Result<String> {
        Ok(hex::encode(Sha256::digest(self.to_canonical_json()?.as_bytes())))
    }
}
