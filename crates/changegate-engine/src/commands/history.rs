//! Diffs between refs, branch history and per-row history. Read-only.

use crate::commands::browse::{default_page, default_page_size, page_offset};
use changegate_core::errors::{ExError, Result};
use changegate_core::model::table::primary_key_column;
use changegate_core::model::{
    BranchContext, CommitInfo, DiffMode, DiffRow, DiffSummaryEntry, DiffType, FlatRow,
    HistoryFilter, Row,
};
use changegate_core::store::SessionFactory;
use changegate_core::validation::{validate_identifier, validate_ref};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub table: String,
    pub from_ref: String,
    pub to_ref: String,
    #[serde(default)]
    pub mode: DiffMode,
    /// Only rows of this kind; all kinds when absent
    #[serde(default)]
    pub diff_type: Option<DiffType>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffPage {
    pub rows: Vec<DiffRow>,
    pub total_count: u64,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummaryRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub from_ref: String,
    pub to_ref: String,
    #[serde(default)]
    pub mode: DiffMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    #[serde(default)]
    pub filter: HistoryFilter,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowHistoryRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub table: String,
    pub pk: Row,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

/// Split a flat diff row into its `from` and `to` sides
fn split_diff_row(flat: FlatRow) -> DiffRow {
    let mut diff_type = DiffType::Modified;
    let mut from = Row::new();
    let mut to = Row::new();
    for (column, value) in flat {
        if column == "diff_type" {
            if let Some(kind) = value.as_str().and_then(DiffType::parse) {
                diff_type = kind;
            }
        } else if let Some(name) = column.strip_prefix("from_") {
            from.insert(name.to_string(), value);
        } else if let Some(name) = column.strip_prefix("to_") {
            to.insert(name.to_string(), value);
        }
    }
    DiffRow {
        diff_type,
        from,
        to,
    }
}

/// Row differences of one table between two refs, paged
///
/// # Errors
///
/// `INVALID_ARGUMENT` for malformed refs, table names or paging;
/// `NOT_FOUND` for unknown refs or a table absent on both sides.
pub fn diff_table(factory: &dyn SessionFactory, req: &DiffRequest) -> Result<DiffPage> {
    validate_identifier("table name", &req.table)?;
    validate_ref("from", &req.from_ref)?;
    validate_ref("to", &req.to_ref)?;
    let offset = page_offset(req.page, req.page_size)?;

    let flat = factory
        .open(&req.ctx)?
        .diff(&req.from_ref, &req.to_ref, &req.table, req.mode)?;
    let matching: Vec<DiffRow> = flat
        .into_iter()
        .map(split_diff_row)
        .filter(|row| req.diff_type.map_or(true, |t| row.diff_type == t))
        .collect();

    let total_count = matching.len() as u64;
    let rows = matching
        .into_iter()
        .skip(offset)
        .take(req.page_size)
        .collect();
    Ok(DiffPage {
        rows,
        total_count,
        page: req.page,
        page_size: req.page_size,
    })
}

/// Added/modified/removed counts for every table that changed.
/// Tables with no row changes are left out.
pub fn diff_summary(
    factory: &dyn SessionFactory,
    req: &DiffSummaryRequest,
) -> Result<Vec<DiffSummaryEntry>> {
    validate_ref("from", &req.from_ref)?;
    validate_ref("to", &req.to_ref)?;

    let mut session = factory.open(&req.ctx)?;
    let mut summary = Vec::new();
    for table in session.changed_tables(&req.from_ref, &req.to_ref, req.mode)? {
        if validate_identifier("table name", &table).is_err() {
            continue;
        }
        let mut entry = DiffSummaryEntry {
            table: table.clone(),
            ..DiffSummaryEntry::default()
        };
        for row in session.diff(&req.from_ref, &req.to_ref, &table, req.mode)? {
            match split_diff_row(row).diff_type {
                DiffType::Added => entry.added += 1,
                DiffType::Modified => entry.modified += 1,
                DiffType::Removed => entry.removed += 1,
            }
        }
        if !entry.is_empty() {
            summary.push(entry);
        }
    }
    Ok(summary)
}

/// Commits of the branch, newest first
pub fn history_commits(
    factory: &dyn SessionFactory,
    req: &HistoryRequest,
) -> Result<Vec<CommitInfo>> {
    validate_ref("branch name", &req.ctx.branch)?;
    let offset = page_offset(req.page, req.page_size)?;
    let commits = factory.open(&req.ctx)?.log("HEAD")?;
    Ok(commits
        .into_iter()
        .filter(|c| req.filter.accepts(c))
        .skip(offset)
        .take(req.page_size)
        .collect())
}

/// Versions of one row, newest first, each tagged with the commit that
/// produced it
///
/// # Errors
///
/// `INVALID_ARGUMENT` for a composite key, a table without a primary key or
/// a key naming some other column.
pub fn history_row(factory: &dyn SessionFactory, req: &RowHistoryRequest) -> Result<Vec<Row>> {
    validate_identifier("table name", &req.table)?;
    validate_ref("branch name", &req.ctx.branch)?;
    if req.limit < 1 {
        return Err(ExError::invalid_argument("limit must be >= 1"));
    }
    let (column, value): (&String, &Value) = match req.pk.iter().next() {
        Some(entry) if req.pk.len() == 1 => entry,
        _ => return Err(ExError::invalid_argument("single primary key required")),
    };

    let mut session = factory.open(&req.ctx)?;
    let schema = session.table_schema(&req.table)?;
    let pk = primary_key_column(&schema)
        .ok_or_else(|| ExError::invalid_argument("table has no primary key").with_table(&req.table))?;
    if pk.name != *column {
        return Err(ExError::invalid_argument(format!(
            "pk column '{}' must match PK column '{}'",
            column, pk.name
        ))
        .with_table(&req.table));
    }
    session.row_history(&req.table, (column, value), req.limit)
}
