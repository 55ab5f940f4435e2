//! Preview Generators
//!
//! Turn a template row or pasted tabular text into draft row operations for
//! review. Nothing here writes to the store; the drafts are applied later
//! through the Write Applier.

use changegate_core::errors::{ExError, Result};
use changegate_core::model::table::primary_key_column;
use changegate_core::model::{
    BranchContext, ColumnSchema, Filter, PreviewResult, Row, RowOp, RowQuery,
};
use changegate_core::store::{SessionFactory, StoreSession};
use changegate_core::validation::{validate_columns, validate_identifier, validate_ref};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub table: String,
    pub template_pk: Row,
    pub new_pks: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchGenerateRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub table: String,
    pub template_pk: Row,
    pub new_pks: Vec<Value>,
    /// Values applied to every generated row
    #[serde(default)]
    pub overrides: Row,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub table: String,
    /// Tab-separated text; the header row starts with the primary key column
    pub tsv_data: String,
}

/// Key used to spot duplicate primary keys across JSON types
fn pk_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The table's primary key column, or `INVALID_ARGUMENT` when it has none
fn schema_pk<'a>(table: &str, schema: &'a [ColumnSchema]) -> Result<&'a ColumnSchema> {
    primary_key_column(schema).ok_or_else(|| {
        ExError::invalid_argument(format!("table {} has no primary key", table)).with_table(table)
    })
}

/// One insert per new key, copying the template row
fn clone_ops(
    session: &mut dyn StoreSession,
    table: &str,
    template_pk: &Row,
    new_pks: &[Value],
) -> Result<(Vec<RowOp>, Vec<ColumnSchema>)> {
    validate_identifier("table name", table)?;
    let (pk_column, pk_value) = match template_pk.iter().next() {
        Some((column, value)) if template_pk.len() == 1 => (column, value),
        _ => return Err(ExError::invalid_argument("single primary key required")),
    };
    validate_identifier("pk column", pk_column)?;
    if new_pks.is_empty() {
        return Err(ExError::invalid_argument("at least one new_pk is required"));
    }

    let mut seen = HashSet::new();
    for pk in new_pks {
        if !seen.insert(pk_key(pk)) {
            return Err(ExError::invalid_argument(format!(
                "duplicate new PK: {}",
                pk_key(pk)
            ))
            .with_table(table));
        }
    }

    let schema = session.table_schema(table)?;
    let pk = schema_pk(table, &schema)?;
    if pk.name != *pk_column {
        return Err(ExError::invalid_argument(format!(
            "template pk column '{}' must match PK column '{}'",
            pk_column, pk.name
        ))
        .with_table(table));
    }

    // Step 1: template
    let query = RowQuery {
        filters: vec![Filter::eq(pk_column.as_str(), pk_value.clone())],
        limit: Some(1),
        ..RowQuery::default()
    };
    let (rows, _) = session.query_rows(table, &query)?;
    let template = rows.into_iter().next().ok_or_else(|| {
        ExError::not_found("template row not found")
            .with_table(table)
            .with_detail("template_pk", pk_key(pk_value))
    })?;

    // Step 2: collisions
    let collisions = session.count_existing(table, pk_column, new_pks)?;
    if collisions > 0 {
        return Err(ExError::invalid_argument(format!(
            "{} new PKs already exist in table",
            collisions
        ))
        .with_table(table)
        .with_detail("collisions", collisions));
    }

    // Step 3: ops
    let ops = new_pks
        .iter()
        .map(|new_pk| {
            let mut values = template.clone();
            values.insert(pk_column.clone(), new_pk.clone());
            RowOp::insert(table, values)
        })
        .collect();
    Ok((ops, schema))
}

/// Inserts copying one template row under each of `new_pks`
///
/// # Errors
///
/// `INVALID_ARGUMENT` for a composite or mismatched template key, an empty
/// or repeated `new_pks`, or keys that already exist; `NOT_FOUND` when the
/// template row is missing.
pub fn preview_clone(factory: &dyn SessionFactory, req: &CloneRequest) -> Result<PreviewResult> {
    validate_ref("branch name", &req.ctx.branch)?;
    let mut session = factory.open(&req.ctx)?;
    let (ops, _) = clone_ops(session.as_mut(), &req.table, &req.template_pk, &req.new_pks)?;
    Ok(PreviewResult {
        ops,
        ..PreviewResult::default()
    })
}

/// [`preview_clone`] with `overrides` written into every generated row
pub fn preview_batch_generate(
    factory: &dyn SessionFactory,
    req: &BatchGenerateRequest,
) -> Result<PreviewResult> {
    validate_ref("branch name", &req.ctx.branch)?;
    validate_columns(req.overrides.keys())?;
    let mut session = factory.open(&req.ctx)?;
    let (mut ops, schema) =
        clone_ops(session.as_mut(), &req.table, &req.template_pk, &req.new_pks)?;

    for column in req.overrides.keys() {
        match schema.iter().find(|c| c.name == *column) {
            None => {
                return Err(ExError::invalid_argument(format!("unknown override column: {}", column))
                    .with_table(&req.table))
            }
            Some(c) if c.primary_key => {
                return Err(ExError::invalid_argument(format!(
                    "override may not set the primary key column: {}",
                    column
                ))
                .with_table(&req.table))
            }
            Some(_) => {}
        }
    }

    for op in &mut ops {
        op.values
            .extend(req.overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Ok(PreviewResult {
        ops,
        ..PreviewResult::default()
    })
}

/// Parsed TSV body: header columns and `(line number, fields)` data rows
#[derive(Debug)]
struct Tsv {
    header: Vec<String>,
    rows: Vec<(usize, Vec<String>)>,
    blank_lines: Vec<usize>,
}

fn parse_tsv(text: &str) -> Result<Tsv> {
    let mut lines = text
        .trim()
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .enumerate();

    let header: Vec<String> = match lines.next() {
        Some((_, line)) => line.split('\t').map(|h| h.trim().to_string()).collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    let mut blank_lines = Vec::new();
    for (index, line) in lines {
        let line_no = index + 1;
        if line.trim().is_empty() {
            blank_lines.push(line_no);
            continue;
        }
        let fields: Vec<String> = line.split('\t').map(|f| f.trim().to_string()).collect();
        if fields.len() != header.len() {
            return Err(ExError::invalid_argument(format!(
                "TSV row {} has {} fields, expected {}",
                line_no,
                fields.len(),
                header.len()
            )));
        }
        rows.push((line_no, fields));
    }

    if rows.is_empty() {
        return Err(ExError::invalid_argument(
            "TSV must have header and at least one data row",
        ));
    }
    Ok(Tsv {
        header,
        rows,
        blank_lines,
    })
}

/// Updates from tab-separated text whose first column is the primary key.
///
/// Every referenced key must exist: a single missing key rejects the whole
/// batch.
///
/// # Errors
///
/// `INVALID_ARGUMENT` for malformed text, unknown or unsafe columns, a first
/// column that is not the primary key, repeated keys, or missing keys (with
/// `missing` and `total` details).
pub fn preview_bulk_update(
    factory: &dyn SessionFactory,
    req: &BulkUpdateRequest,
) -> Result<PreviewResult> {
    validate_identifier("table name", &req.table)?;
    validate_ref("branch name", &req.ctx.branch)?;

    // Step 1: shape
    let tsv = parse_tsv(&req.tsv_data)?;
    if tsv.header.len() < 2 {
        return Err(ExError::invalid_argument(
            "TSV must have PK column and at least one update column",
        ));
    }
    for column in &tsv.header {
        validate_identifier("column name", column).map_err(|_| {
            ExError::invalid_argument(format!("invalid column name in TSV header: {}", column))
        })?;
    }

    // Step 2: header against the schema
    let mut session = factory.open(&req.ctx)?;
    let schema = session.table_schema(&req.table)?;
    let pk = schema_pk(&req.table, &schema)?;
    let pk_column = &tsv.header[0];
    if *pk_column != pk.name {
        return Err(ExError::invalid_argument(format!(
            "first TSV column '{}' must match PK column '{}'",
            pk_column, pk.name
        ))
        .with_table(&req.table));
    }
    let update_columns = &tsv.header[1..];
    if let Some(unknown) = update_columns
        .iter()
        .find(|c| !schema.iter().any(|s| s.name == **c))
    {
        return Err(ExError::invalid_argument(format!("unknown column in TSV: {}", unknown))
            .with_table(&req.table));
    }

    // Step 3: keys are unique within the input, compared as the store
    // compares them
    let keys: Vec<Value> = tsv
        .rows
        .iter()
        .map(|(_, fields)| Value::String(fields[0].clone()))
        .collect();
    let canonical = session.canonical_keys(&req.table, pk_column, &keys)?;
    let mut seen = HashSet::new();
    for ((_, fields), key) in tsv.rows.iter().zip(&canonical) {
        let key = key.as_deref().unwrap_or(fields[0].as_str());
        if !seen.insert(key) {
            return Err(
                ExError::invalid_argument(format!("duplicate PK in TSV: {}", fields[0]))
                    .with_table(&req.table),
            );
        }
    }

    // Step 4: every key exists
    let total = keys.len() as u64;
    let found = session.count_existing(&req.table, pk_column, &keys)?;
    if found != total {
        return Err(ExError::invalid_argument(format!(
            "{} of {} PKs not found in table",
            total - found,
            total
        ))
        .with_table(&req.table)
        .with_detail("missing", total - found)
        .with_detail("total", total));
    }

    // Step 5: ops
    let ops = tsv
        .rows
        .into_iter()
        .map(|(_, mut fields)| {
            let key = fields.remove(0);
            let values: Row = update_columns
                .iter()
                .cloned()
                .zip(fields.into_iter().map(Value::String))
                .collect();
            RowOp::update(&req.table, pk_column.as_str(), key, values)
        })
        .collect();
    let warnings = tsv
        .blank_lines
        .iter()
        .map(|n| format!("blank line {} skipped", n))
        .collect();

    Ok(PreviewResult {
        ops,
        warnings,
        errors: Vec::new(),
    })
}
