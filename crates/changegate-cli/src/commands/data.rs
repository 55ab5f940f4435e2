//! Table browsing and direct writes

use super::context::{parse_json, CliContext, CliResult};
use changegate_core::model::{Filter, RowOp};
use changegate_engine::commands::browse::{RowsRequest, DEFAULT_PAGE_SIZE};
use changegate_engine::commands::engine_command::EngineCommand;
use changegate_engine::commands::engine_query::EngineQuery;
use changegate_engine::commands::write::WriteRequest;
use clap::Args;

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[arg(long, default_value = "main")]
    pub branch: String,
}

#[derive(Debug, Args)]
pub struct RowsArgs {
    pub table: String,

    #[arg(long, default_value = "main")]
    pub branch: String,

    /// JSON array of `{column, op: eq|contains|in, value}`, or `@file`
    #[arg(long)]
    pub filter: Option<String>,

    /// Comma-separated columns; prefix `-` for descending
    #[arg(long, default_value = "")]
    pub sort: String,

    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Print the row with this primary key (JSON object) instead of a page
    #[arg(long, conflicts_with_all = ["filter", "sort"])]
    pub pk: Option<String>,
}

#[derive(Debug, Args)]
pub struct CommitArgs {
    #[arg(long)]
    pub branch: String,

    /// Defaults to the branch's current head
    #[arg(long)]
    pub expected_head: Option<String>,

    #[arg(long)]
    pub message: String,

    /// JSON array of row operations, or `@file`
    #[arg(long)]
    pub ops: String,
}

pub fn execute_tables(ctx: &CliContext, args: TablesArgs) -> CliResult<()> {
    ctx.query(EngineQuery::ListTables(ctx.on_branch(&args.branch)))
}

pub fn execute_rows(ctx: &CliContext, args: RowsArgs) -> CliResult<()> {
    if let Some(pk) = args.pk {
        return ctx.query(EngineQuery::TableRow {
            ctx: ctx.on_branch(&args.branch),
            table: args.table,
            pk: parse_json("pk", &pk)?,
        });
    }

    let filters: Vec<Filter> = match args.filter {
        Some(text) => parse_json("filter", &text)?,
        None => Vec::new(),
    };
    ctx.query(EngineQuery::TableRows(RowsRequest {
        ctx: ctx.on_branch(&args.branch),
        table: args.table,
        filters,
        sort: args.sort,
        page: args.page,
        page_size: args.page_size,
    }))
}

pub fn execute_commit(ctx: &CliContext, args: CommitArgs) -> CliResult<()> {
    let ops: Vec<RowOp> = parse_json("ops", &args.ops)?;
    let expected_head = ctx.expected_head(&args.branch, args.expected_head)?;
    ctx.command(EngineCommand::WriteApply(WriteRequest {
        ctx: ctx.on_branch(&args.branch),
        expected_head,
        commit_message: args.message,
        ops,
    }))
}
