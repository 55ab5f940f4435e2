//! Engine-level read-only query surface.
//!
//! `apply_engine_query` is the single entry point for reads and previews.
//! Nothing reached from here publishes a head, a tag or a request record.

use crate::commands::browse::{
    get_head, list_branches, list_databases, list_tables, list_targets, table_row, table_rows,
    table_schema, DatabaseSummary, RowsPage, RowsRequest, TableSchema, TargetSummary,
};
use crate::commands::common::{DatabaseRef, HeadResult};
use crate::commands::conflict::{conflict_rows, list_conflicts};
use crate::commands::engine_command::observe;
use crate::commands::history::{
    diff_summary, diff_table, history_commits, history_row, DiffPage, DiffRequest,
    DiffSummaryRequest, HistoryRequest, RowHistoryRequest,
};
use crate::commands::preview::{
    preview_batch_generate, preview_bulk_update, preview_clone, BatchGenerateRequest,
    BulkUpdateRequest, CloneRequest,
};
use crate::commands::request::{get_request, list_requests, RequestSummary};
use changegate_core::config::EngineConfig;
use changegate_core::errors::Result;
use changegate_core::model::{
    BranchContext, BranchInfo, CommitInfo, ConflictRow, ConflictSummary, DiffSummaryEntry,
    PreviewResult, Row,
};
use changegate_core::store::SessionFactory;
use changegate_core_types::OperationContext;
use serde::Serialize;

/// Read-only queries supported by the engine
#[derive(Debug, Clone)]
pub enum EngineQuery {
    // ── Metadata ─────────────────────────────────────────────────────────────
    ListTargets,
    ListDatabases { target_id: String },
    ListBranches(DatabaseRef),
    GetHead { db: DatabaseRef, reference: String },

    // ── Tables ───────────────────────────────────────────────────────────────
    ListTables(BranchContext),
    TableSchema { ctx: BranchContext, table: String },
    TableRows(RowsRequest),
    TableRow { ctx: BranchContext, table: String, pk: Row },

    // ── Conflicts ────────────────────────────────────────────────────────────
    ConflictList(BranchContext),
    ConflictRows { ctx: BranchContext, table: String },

    // ── Requests ─────────────────────────────────────────────────────────────
    RequestList(DatabaseRef),
    RequestGet { db: DatabaseRef, request_id: String },

    // ── Previews ─────────────────────────────────────────────────────────────
    PreviewClone(CloneRequest),
    PreviewBatchGenerate(BatchGenerateRequest),
    PreviewBulkUpdate(BulkUpdateRequest),

    // ── Diff & history ───────────────────────────────────────────────────────
    DiffTable(DiffRequest),
    DiffSummary(DiffSummaryRequest),
    HistoryCommits(HistoryRequest),
    HistoryRow(RowHistoryRequest),
}

impl EngineQuery {
    pub fn op_name(&self) -> &'static str {
        match self {
            EngineQuery::ListTargets => "list_targets",
            EngineQuery::ListDatabases { .. } => "list_databases",
            EngineQuery::ListBranches(_) => "list_branches",
            EngineQuery::GetHead { .. } => "get_head",
            EngineQuery::ListTables(_) => "list_tables",
            EngineQuery::TableSchema { .. } => "table_schema",
            EngineQuery::TableRows(_) => "table_rows",
            EngineQuery::TableRow { .. } => "table_row",
            EngineQuery::ConflictList(_) => "conflict_list",
            EngineQuery::ConflictRows { .. } => "conflict_rows",
            EngineQuery::RequestList(_) => "request_list",
            EngineQuery::RequestGet { .. } => "request_get",
            EngineQuery::PreviewClone(_) => "preview_clone",
            EngineQuery::PreviewBatchGenerate(_) => "preview_batch_generate",
            EngineQuery::PreviewBulkUpdate(_) => "preview_bulk_update",
            EngineQuery::DiffTable(_) => "diff_table",
            EngineQuery::DiffSummary(_) => "diff_summary",
            EngineQuery::HistoryCommits(_) => "history_commits",
            EngineQuery::HistoryRow(_) => "history_row",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EngineQueryResult {
    Targets(Vec<TargetSummary>),
    Databases(Vec<DatabaseSummary>),
    Branches(Vec<BranchInfo>),
    Head(HeadResult),
    Tables(Vec<String>),
    Schema(TableSchema),
    Rows(RowsPage),
    Row(Row),
    Conflicts(Vec<ConflictSummary>),
    ConflictRows(Vec<ConflictRow>),
    Requests(Vec<RequestSummary>),
    Request(RequestSummary),
    Preview(PreviewResult),
    Diff(DiffPage),
    DiffSummary(Vec<DiffSummaryEntry>),
    Commits(Vec<CommitInfo>),
    RowHistory(Vec<Row>),
}

/// Apply a read-only query.
///
/// `config` answers the metadata queries; everything else goes through
/// sessions from `factory`.
pub fn apply_engine_query(
    query: EngineQuery,
    factory: &dyn SessionFactory,
    config: &EngineConfig,
    op_ctx: &OperationContext,
) -> Result<EngineQueryResult> {
    use EngineQueryResult as R;

    let op = query.op_name();
    observe(op, op_ctx, || match query {
        EngineQuery::ListTargets => Ok(R::Targets(list_targets(config))),
        EngineQuery::ListDatabases { target_id } => {
            list_databases(config, &target_id).map(R::Databases)
        }
        EngineQuery::ListBranches(db) => list_branches(factory, &db).map(R::Branches),
        EngineQuery::GetHead { db, reference } => get_head(factory, &db, &reference).map(R::Head),

        EngineQuery::ListTables(ctx) => list_tables(factory, &ctx).map(R::Tables),
        EngineQuery::TableSchema { ctx, table } => {
            table_schema(factory, &ctx, &table).map(R::Schema)
        }
        EngineQuery::TableRows(req) => table_rows(factory, &req).map(R::Rows),
        EngineQuery::TableRow { ctx, table, pk } => {
            table_row(factory, &ctx, &table, &pk).map(R::Row)
        }

        EngineQuery::ConflictList(ctx) => list_conflicts(factory, &ctx).map(R::Conflicts),
        EngineQuery::ConflictRows { ctx, table } => {
            conflict_rows(factory, &ctx, &table).map(R::ConflictRows)
        }

        EngineQuery::RequestList(db) => list_requests(factory, &db).map(R::Requests),
        EngineQuery::RequestGet { db, request_id } => {
            get_request(factory, &db, &request_id).map(R::Request)
        }

        EngineQuery::PreviewClone(req) => preview_clone(factory, &req).map(R::Preview),
        EngineQuery::PreviewBatchGenerate(req) => {
            preview_batch_generate(factory, &req).map(R::Preview)
        }
        EngineQuery::PreviewBulkUpdate(req) => preview_bulk_update(factory, &req).map(R::Preview),

        EngineQuery::DiffTable(req) => diff_table(factory, &req).map(R::Diff),
        EngineQuery::DiffSummary(req) => diff_summary(factory, &req).map(R::DiffSummary),
        EngineQuery::HistoryCommits(req) => history_commits(factory, &req).map(R::Commits),
        EngineQuery::HistoryRow(req) => history_row(factory, &req).map(R::RowHistory),
    })
}
