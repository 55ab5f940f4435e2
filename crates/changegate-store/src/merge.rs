//! Three-way merge of snapshots.
//!
//! Tables merge schema first: a column list changed differently on both
//! sides is a schema conflict and the table keeps our version untouched.
//! Otherwise rows merge cell by cell against the common ancestor.

use crate::snapshot::{Snapshot, TableData};
use changegate_core::model::{ColumnSchema, ConflictSummary, Row};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A row both sides changed incompatibly. `None` means absent on that side.
#[derive(Debug, Clone, PartialEq)]
pub struct RowConflict {
    pub key: String,
    pub base: Option<Row>,
    pub ours: Option<Row>,
    pub theirs: Option<Row>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMerge {
    pub schema_conflict: bool,
    pub conflicts: Vec<RowConflict>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeResult {
    pub merged: Snapshot,
    /// Only tables that did not merge cleanly
    pub tables: BTreeMap<String, TableMerge>,
}

impl MergeResult {
    pub fn has_conflicts(&self) -> bool {
        self.tables
            .values()
            .any(|t| t.schema_conflict || !t.conflicts.is_empty())
    }

    /// Per-table summary, merged with per-table constraint violation counts
    pub fn summaries(&self, violations: &BTreeMap<String, u64>) -> Vec<ConflictSummary> {
        let names: BTreeSet<&String> = self.tables.keys().chain(violations.keys()).collect();
        names
            .into_iter()
            .map(|name| {
                let (data, schema) = self
                    .tables
                    .get(name)
                    .map(|t| (t.conflicts.len() as u64, u64::from(t.schema_conflict)))
                    .unwrap_or((0, 0));
                let mut summary = ConflictSummary::new(name.clone(), data, schema);
                summary.constraint_violations = violations.get(name).copied().unwrap_or(0);
                summary
            })
            .filter(|s| !s.is_clean())
            .collect()
    }
}

/// Pick the side that changed; `None` when both changed differently
fn pick<'a, T: PartialEq>(base: &'a T, ours: &'a T, theirs: &'a T) -> Option<&'a T> {
    if ours == theirs || theirs == base {
        Some(ours)
    } else if ours == base {
        Some(theirs)
    } else {
        None
    }
}

pub fn three_way(base: &Snapshot, ours: &Snapshot, theirs: &Snapshot) -> MergeResult {
    let mut result = MergeResult::default();
    let names: BTreeSet<&String> = base
        .tables
        .keys()
        .chain(ours.tables.keys())
        .chain(theirs.tables.keys())
        .collect();

    for name in names {
        let b = base.tables.get(name);
        let o = ours.tables.get(name);
        let t = theirs.tables.get(name);

        if let Some(chosen) = pick(&b, &o, &t) {
            if let Some(table) = chosen {
                result.merged.tables.insert(name.clone(), (*table).clone());
            }
            continue;
        }

        // Dropped on one side and changed on the other
        let (Some(o), Some(t)) = (o, t) else {
            if let Some(o) = o {
                result.merged.tables.insert(name.clone(), o.clone());
            }
            result.tables.insert(
                name.clone(),
                TableMerge {
                    schema_conflict: true,
                    conflicts: Vec::new(),
                },
            );
            continue;
        };

        let base_columns = b.map(|b| b.columns.clone());
        let Some(columns) = pick(&base_columns, &Some(o.columns.clone()), &Some(t.columns.clone()))
            .cloned()
            .flatten()
        else {
            result.merged.tables.insert(name.clone(), o.clone());
            result.tables.insert(
                name.clone(),
                TableMerge {
                    schema_conflict: true,
                    conflicts: Vec::new(),
                },
            );
            continue;
        };

        let (merged, conflicts) = merge_rows(columns, b, o, t);
        result.merged.tables.insert(name.clone(), merged);
        if !conflicts.is_empty() {
            result.tables.insert(
                name.clone(),
                TableMerge {
                    schema_conflict: false,
                    conflicts,
                },
            );
        }
    }
    result
}

fn merge_rows(
    columns: Vec<ColumnSchema>,
    base: Option<&TableData>,
    ours: &TableData,
    theirs: &TableData,
) -> (TableData, Vec<RowConflict>) {
    let mut merged = TableData {
        columns,
        rows: BTreeMap::new(),
    };
    let mut conflicts = Vec::new();

    let keys: BTreeSet<&String> = base
        .into_iter()
        .flat_map(|b| b.rows.keys())
        .chain(ours.rows.keys())
        .chain(theirs.rows.keys())
        .collect();

    for key in keys {
        // Compare rows in the merged shape so an added column is not a change
        let rb = base.and_then(|b| b.rows.get(key)).map(|r| merged.complete_row(r));
        let ro = ours.rows.get(key).map(|r| merged.complete_row(r));
        let rt = theirs.rows.get(key).map(|r| merged.complete_row(r));

        let resolved = match pick(&rb, &ro, &rt) {
            Some(row) => Ok(row.clone()),
            None => match (&rb, &ro, &rt) {
                (Some(b), Some(o), Some(t)) => merge_cells(&merged.columns, b, o, t).map(Some),
                _ => Err(()),
            },
        };

        match resolved {
            Ok(Some(row)) => {
                merged.rows.insert(key.clone(), row);
            }
            Ok(None) => {}
            Err(()) => {
                if let Some(o) = &ro {
                    merged.rows.insert(key.clone(), o.clone());
                }
                conflicts.push(RowConflict {
                    key: key.clone(),
                    base: rb,
                    ours: ro,
                    theirs: rt,
                });
            }
        }
    }
    (merged, conflicts)
}

fn merge_cells(columns: &[ColumnSchema], base: &Row, ours: &Row, theirs: &Row) -> Result<Row, ()> {
    let mut row = Row::new();
    for column in columns {
        let b = base.get(&column.name).unwrap_or(&Value::Null);
        let o = ours.get(&column.name).unwrap_or(&Value::Null);
        let t = theirs.get(&column.name).unwrap_or(&Value::Null);
        let value = pick(b, o, t).ok_or(())?;
        row.insert(column.name.clone(), value.clone());
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(rows: &[(i64, &str, i64)]) -> Snapshot {
        let mut table = TableData::new(vec![
            ColumnSchema::new("id", "int").primary_key(),
            ColumnSchema::new("name", "text"),
            ColumnSchema::new("qty", "int"),
        ])
        .unwrap();
        for (id, name, qty) in rows {
            table
                .insert(&Row::from([
                    ("id".to_string(), json!(id)),
                    ("name".to_string(), json!(name)),
                    ("qty".to_string(), json!(qty)),
                ]))
                .unwrap();
        }
        let mut snap = Snapshot::default();
        snap.tables.insert("items".into(), table);
        snap
    }

    #[test]
    fn test_disjoint_cell_changes_merge() {
        let base = snapshot(&[(1, "a", 1)]);
        let ours = snapshot(&[(1, "b", 1)]);
        let theirs = snapshot(&[(1, "a", 5)]);
        let result = three_way(&base, &ours, &theirs);
        assert!(!result.has_conflicts());
        let row = result.merged.table("items").unwrap().rows.values().next().unwrap();
        assert_eq!(row.get("name"), Some(&json!("b")));
        assert_eq!(row.get("qty"), Some(&json!(5)));
    }

    #[test]
    fn test_same_cell_changed_differently_conflicts() {
        let base = snapshot(&[(1, "a", 1)]);
        let ours = snapshot(&[(1, "b", 1)]);
        let theirs = snapshot(&[(1, "c", 1)]);
        let result = three_way(&base, &ours, &theirs);
        assert!(result.has_conflicts());
        let summaries = result.summaries(&BTreeMap::new());
        assert_eq!(summaries, vec![ConflictSummary::new("items", 1, 0)]);
        let row = result.merged.table("items").unwrap().rows.values().next().unwrap();
        assert_eq!(row.get("name"), Some(&json!("b")));
    }

    #[test]
    fn test_delete_versus_modify_conflicts() {
        let base = snapshot(&[(1, "a", 1)]);
        let ours = snapshot(&[]);
        let theirs = snapshot(&[(1, "a", 2)]);
        let result = three_way(&base, &ours, &theirs);
        let conflict = &result.tables["items"].conflicts[0];
        assert!(conflict.ours.is_none());
        assert!(conflict.theirs.is_some());
    }

    #[test]
    fn test_added_column_on_one_side_merges() {
        let base = snapshot(&[(1, "a", 1)]);
        let ours = snapshot(&[(1, "a", 2)]);
        let mut theirs = base.clone();
        let table = theirs.table_mut("items").unwrap();
        table.columns.push(ColumnSchema::new("note", "text"));
        for row in table.rows.values_mut() {
            row.insert("note".into(), Value::Null);
        }
        let result = three_way(&base, &ours, &theirs);
        assert!(!result.has_conflicts());
        let merged = result.merged.table("items").unwrap();
        assert_eq!(merged.columns.len(), 4);
        assert_eq!(merged.rows.values().next().unwrap().get("qty"), Some(&json!(2)));
    }

    #[test]
    fn test_divergent_schema_is_schema_conflict() {
        let base = snapshot(&[]);
        let mut ours = base.clone();
        ours.table_mut("items")
            .unwrap()
            .columns
            .push(ColumnSchema::new("a", "text"));
        let mut theirs = base.clone();
        theirs
            .table_mut("items")
            .unwrap()
            .columns
            .push(ColumnSchema::new("b", "int"));
        let result = three_way(&base, &ours, &theirs);
        assert!(result.tables["items"].schema_conflict);
        assert_eq!(result.summaries(&BTreeMap::new())[0].schema_conflicts, 1);
    }

    #[test]
    fn test_violations_reported_for_clean_tables() {
        let snap = snapshot(&[]);
        let result = three_way(&snap, &snap, &snap);
        let violations = BTreeMap::from([("items".to_string(), 2u64)]);
        let summaries = result.summaries(&violations);
        assert_eq!(summaries[0].constraint_violations, 2);
        assert_eq!(summaries[0].data_conflicts, 0);
    }
}
