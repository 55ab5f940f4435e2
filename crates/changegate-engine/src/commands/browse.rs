//! Metadata and table browsing: targets, databases, branches, tables, rows.
//! Everything here is read-only except branch creation and deletion.

use crate::commands::common::{DatabaseRef, HeadResult};
use changegate_core::config::EngineConfig;
use changegate_core::errors::{ExError, Result};
use changegate_core::model::table::primary_key_column;
use changegate_core::model::{
    BranchContext, BranchInfo, ColumnSchema, Filter, Row, RowQuery, SortKey,
};
use changegate_core::store::SessionFactory;
use changegate_core::validation::{
    ensure_writable, validate_identifier, validate_ref, TRUNK_BRANCH,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of store-internal tables hidden from listings
pub const SYSTEM_TABLE_PREFIX: &str = "dolt_";

pub const MAX_PAGE_SIZE: usize = 1000;
pub const DEFAULT_PAGE_SIZE: usize = 50;

pub(crate) fn default_page() -> usize {
    1
}

pub(crate) fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Validate paging and return the number of items to skip
pub(crate) fn page_offset(page: usize, page_size: usize) -> Result<usize> {
    if page < 1 {
        return Err(ExError::invalid_argument("page must be >= 1"));
    }
    if page_size < 1 || page_size > MAX_PAGE_SIZE {
        return Err(ExError::invalid_argument(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| ExError::invalid_argument("page is out of range").with_detail("page", page))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub table: String,
    /// AND-combined
    #[serde(default)]
    pub filters: Vec<Filter>,
    /// `col,-other`; the primary key is appended ascending when absent
    #[serde(default)]
    pub sort: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsPage {
    pub rows: Vec<Row>,
    pub page: usize,
    pub page_size: usize,
    pub total_count: u64,
}

pub fn list_targets(config: &EngineConfig) -> Vec<TargetSummary> {
    config
        .targets
        .iter()
        .map(|t| TargetSummary { id: t.id.clone() })
        .collect()
}

/// Databases configured on a target
///
/// # Errors
///
/// `NOT_FOUND` for an unknown target.
pub fn list_databases(config: &EngineConfig, target_id: &str) -> Result<Vec<DatabaseSummary>> {
    if config.find_target(target_id).is_none() {
        return Err(ExError::not_found(format!("target not found: {}", target_id))
            .with_detail("target_id", target_id));
    }
    Ok(config
        .databases_for(target_id)
        .into_iter()
        .map(|d| DatabaseSummary {
            name: d.name.clone(),
        })
        .collect())
}

pub fn list_branches(factory: &dyn SessionFactory, db: &DatabaseRef) -> Result<Vec<BranchInfo>> {
    factory.open(&db.trunk())?.list_branches()
}

/// Create a work branch from the trunk head
///
/// # Errors
///
/// `INVALID_ARGUMENT` for a malformed or existing name, `FORBIDDEN` for the
/// trunk itself.
pub fn create_branch(factory: &dyn SessionFactory, db: &DatabaseRef, name: &str) -> Result<BranchInfo> {
    validate_ref("branch name", name)?;
    ensure_writable(name)?;
    let mut trunk = factory.open(&db.trunk())?;
    trunk.create_branch(name, TRUNK_BRANCH)?;
    let hash = trunk.resolve_ref(name)?;
    tracing::info!(branch = name, head = %hash, "branch created");
    Ok(BranchInfo {
        name: name.to_string(),
        hash,
    })
}

/// Force-delete a branch. The trunk cannot be deleted.
pub fn delete_branch(factory: &dyn SessionFactory, db: &DatabaseRef, name: &str) -> Result<()> {
    validate_ref("branch name", name)?;
    ensure_writable(name)?;
    factory.open(&db.trunk())?.delete_branch(name, true)?;
    tracing::info!(branch = name, "branch deleted");
    Ok(())
}

/// Commit hash of a branch, tag or commit
pub fn get_head(factory: &dyn SessionFactory, db: &DatabaseRef, reference: &str) -> Result<HeadResult> {
    validate_ref("ref", reference)?;
    let hash = factory.open(&db.trunk())?.resolve_ref(reference)?;
    Ok(HeadResult { hash })
}

/// User tables of the branch, store-internal tables excluded
pub fn list_tables(factory: &dyn SessionFactory, ctx: &BranchContext) -> Result<Vec<String>> {
    validate_ref("branch name", &ctx.branch)?;
    let tables = factory.open(ctx)?.list_tables()?;
    Ok(tables
        .into_iter()
        .filter(|t| !t.starts_with(SYSTEM_TABLE_PREFIX))
        .collect())
}

pub fn table_schema(
    factory: &dyn SessionFactory,
    ctx: &BranchContext,
    table: &str,
) -> Result<TableSchema> {
    validate_identifier("table name", table)?;
    validate_ref("branch name", &ctx.branch)?;
    let columns = factory.open(ctx)?.table_schema(table)?;
    Ok(TableSchema {
        table: table.to_string(),
        columns,
    })
}

/// One page of rows with the total number of matches
///
/// # Errors
///
/// `INVALID_ARGUMENT` for paging out of range, columns outside the table
/// schema, malformed filters or tables without a primary key.
pub fn table_rows(factory: &dyn SessionFactory, req: &RowsRequest) -> Result<RowsPage> {
    validate_identifier("table name", &req.table)?;
    validate_ref("branch name", &req.ctx.branch)?;
    let offset = page_offset(req.page, req.page_size)?;

    let mut session = factory.open(&req.ctx)?;
    let schema = session.table_schema(&req.table)?;
    let pk = primary_key_column(&schema)
        .ok_or_else(|| {
            ExError::invalid_argument("table has no primary key (not supported)")
                .with_table(&req.table)
        })?
        .name
        .clone();
    let known = |column: &str| schema.iter().any(|c| c.name == column);

    for filter in &req.filters {
        filter.validate()?;
        if !known(&filter.column) {
            return Err(ExError::invalid_argument(format!(
                "unknown column in filter: {}",
                filter.column
            ))
            .with_table(&req.table));
        }
    }

    let mut sort = SortKey::parse_list(&req.sort)?;
    if let Some(unknown) = sort.iter().find(|k| !known(&k.column)) {
        return Err(
            ExError::invalid_argument(format!("unknown column in sort: {}", unknown.column))
                .with_table(&req.table),
        );
    }
    if !sort.iter().any(|k| k.column == pk) {
        sort.push(SortKey {
            column: pk,
            descending: false,
        });
    }

    let query = RowQuery {
        filters: req.filters.clone(),
        sort,
        offset,
        limit: Some(req.page_size),
    };
    let (rows, total_count) = session.query_rows(&req.table, &query)?;
    Ok(RowsPage {
        rows,
        page: req.page,
        page_size: req.page_size,
        total_count,
    })
}

/// One row addressed by its single primary key
///
/// # Errors
///
/// `INVALID_ARGUMENT` for a composite key, `NOT_FOUND` when no row matches.
pub fn table_row(
    factory: &dyn SessionFactory,
    ctx: &BranchContext,
    table: &str,
    pk: &Row,
) -> Result<Row> {
    validate_identifier("table name", table)?;
    validate_ref("branch name", &ctx.branch)?;
    let (column, value): (&String, &Value) = match pk.iter().next() {
        Some(entry) if pk.len() == 1 => entry,
        _ => {
            return Err(ExError::invalid_argument(
                "single primary key required (composite PKs not supported)",
            ))
        }
    };
    validate_identifier("pk column", column)?;

    let query = RowQuery {
        filters: vec![Filter::eq(column.as_str(), value.clone())],
        limit: Some(1),
        ..RowQuery::default()
    };
    let (rows, _) = factory.open(ctx)?.query_rows(table, &query)?;
    rows.into_iter()
        .next()
        .ok_or_else(|| ExError::not_found("row not found").with_table(table))
}
