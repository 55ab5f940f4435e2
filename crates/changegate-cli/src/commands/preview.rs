//! Preview commands. Nothing here writes; feed the printed `ops` to
//! `changegate commit --ops @file` to apply them.

use super::context::{parse_json, read_arg, CliContext, CliResult};
use changegate_core::model::Row;
use changegate_engine::commands::engine_query::EngineQuery;
use changegate_engine::commands::preview::{
    BatchGenerateRequest, BulkUpdateRequest, CloneRequest,
};
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(subcommand)]
    pub command: PreviewCommand,
}

#[derive(Debug, Subcommand)]
pub enum PreviewCommand {
    /// Copy a template row under new primary keys
    Clone(CloneArgs),
    /// Like `clone`, with column overrides applied to every copy
    Batch(BatchArgs),
    /// One update per TSV line; the header's first column is the key
    BulkUpdate(BulkUpdateArgs),
}

#[derive(Debug, Args)]
pub struct CloneArgs {
    pub table: String,

    #[arg(long)]
    pub branch: String,

    /// JSON object naming the template row's key, e.g. `{"id": 1}`
    #[arg(long)]
    pub template_pk: String,

    /// JSON array of new key values, or `@file`
    #[arg(long)]
    pub new_pks: String,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    #[command(flatten)]
    pub clone: CloneArgs,

    /// JSON object of column values to set on every copy
    #[arg(long, default_value = "{}")]
    pub overrides: String,
}

#[derive(Debug, Args)]
pub struct BulkUpdateArgs {
    pub table: String,

    #[arg(long)]
    pub branch: String,

    /// TSV text, `@file`, or `@-` for stdin
    #[arg(long)]
    pub tsv: String,
}

fn clone_request(ctx: &CliContext, args: CloneArgs) -> CliResult<CloneRequest> {
    Ok(CloneRequest {
        ctx: ctx.on_branch(&args.branch),
        table: args.table,
        template_pk: parse_json("template_pk", &args.template_pk)?,
        new_pks: parse_json("new_pks", &args.new_pks)?,
    })
}

pub fn execute(ctx: &CliContext, args: PreviewArgs) -> CliResult<()> {
    match args.command {
        PreviewCommand::Clone(args) => {
            ctx.query(EngineQuery::PreviewClone(clone_request(ctx, args)?))
        }
        PreviewCommand::Batch(args) => {
            let overrides: Row = parse_json("overrides", &args.overrides)?;
            let base = clone_request(ctx, args.clone)?;
            ctx.query(EngineQuery::PreviewBatchGenerate(BatchGenerateRequest {
                ctx: base.ctx,
                table: base.table,
                template_pk: base.template_pk,
                new_pks: base.new_pks,
                overrides,
            }))
        }
        PreviewCommand::BulkUpdate(args) => {
            ctx.query(EngineQuery::PreviewBulkUpdate(BulkUpdateRequest {
                ctx: ctx.on_branch(&args.branch),
                table: args.table,
                tsv_data: read_arg(&args.tsv)?,
            }))
        }
    }
}
