//! Diff and log commands

use super::context::{parse_choice, parse_json, CliContext, CliResult};
use changegate_core::model::{DiffMode, DiffType, HistoryFilter};
use changegate_engine::commands::browse::DEFAULT_PAGE_SIZE;
use changegate_engine::commands::engine_query::EngineQuery;
use changegate_engine::commands::history::{
    DiffRequest, DiffSummaryRequest, HistoryRequest, RowHistoryRequest, DEFAULT_HISTORY_LIMIT,
};
use clap::Args;

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Table to diff; per-table counts for all tables when omitted
    pub table: Option<String>,

    #[arg(long, default_value = "main")]
    pub branch: String,

    #[arg(long)]
    pub from: String,

    #[arg(long)]
    pub to: String,

    /// `two_dot` compares the refs; `three_dot` compares `to` with the merge base
    #[arg(long, default_value = "two_dot", value_parser = parse_choice::<DiffMode>)]
    pub mode: DiffMode,

    /// Only `added`, `modified` or `removed` rows
    #[arg(long = "type", value_parser = parse_choice::<DiffType>)]
    pub diff_type: Option<DiffType>,

    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

#[derive(Debug, Args)]
pub struct LogArgs {
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// `all`, `merges_only` or `exclude_auto_merge`
    #[arg(long, default_value = "all", value_parser = parse_choice::<HistoryFilter>)]
    pub filter: HistoryFilter,

    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Show the versions of one row of this table instead of commits
    #[arg(long, requires = "pk")]
    pub table: Option<String>,

    /// JSON object naming the row's key, e.g. `{"id": 1}`
    #[arg(long, requires = "table")]
    pub pk: Option<String>,

    #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub limit: usize,
}

pub fn execute_diff(ctx: &CliContext, args: DiffArgs) -> CliResult<()> {
    let branch = ctx.on_branch(&args.branch);
    match args.table {
        Some(table) => ctx.query(EngineQuery::DiffTable(DiffRequest {
            ctx: branch,
            table,
            from_ref: args.from,
            to_ref: args.to,
            mode: args.mode,
            diff_type: args.diff_type,
            page: args.page,
            page_size: args.page_size,
        })),
        None => ctx.query(EngineQuery::DiffSummary(DiffSummaryRequest {
            ctx: branch,
            from_ref: args.from,
            to_ref: args.to,
            mode: args.mode,
        })),
    }
}

pub fn execute_log(ctx: &CliContext, args: LogArgs) -> CliResult<()> {
    let branch = ctx.on_branch(&args.branch);
    if let (Some(table), Some(pk)) = (args.table, args.pk) {
        return ctx.query(EngineQuery::HistoryRow(RowHistoryRequest {
            ctx: branch,
            table,
            pk: parse_json("pk", &pk)?,
            limit: args.limit,
        }));
    }
    ctx.query(EngineQuery::HistoryCommits(HistoryRequest {
        ctx: branch,
        filter: args.filter,
        page: args.page,
        page_size: args.page_size,
    }))
}
