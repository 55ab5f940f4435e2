//! Sync, conflict and change-request commands

use super::context::{parse_choice, CliContext, CliResult};
use changegate_core::model::ResolveStrategy;
use changegate_engine::commands::conflict::ResolveRequest;
use changegate_engine::commands::engine_command::EngineCommand;
use changegate_engine::commands::engine_query::EngineQuery;
use changegate_engine::commands::request::{ApproveRequest, SubmitRequest};
use changegate_engine::commands::sync::SyncRequest;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[arg(long)]
    pub branch: String,

    /// Defaults to the branch's current head
    #[arg(long)]
    pub expected_head: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConflictsArgs {
    #[command(subcommand)]
    pub command: ConflictsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConflictsCommand {
    /// Per-table conflict counts against the trunk
    List {
        #[arg(long)]
        branch: String,
    },
    /// Conflicting rows of one table, split into base/ours/theirs
    Show {
        table: String,
        #[arg(long)]
        branch: String,
    },
    /// Merge the trunk and settle one table's conflicts
    Resolve {
        table: String,
        #[arg(long)]
        branch: String,
        /// `ours` keeps the work branch, `theirs` takes the trunk
        #[arg(long, value_parser = parse_choice::<ResolveStrategy>)]
        strategy: ResolveStrategy,
        #[arg(long)]
        expected_head: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct RequestArgs {
    #[command(subcommand)]
    pub command: RequestCommand,
}

#[derive(Debug, Subcommand)]
pub enum RequestCommand {
    /// Sync a work branch and open (or replace) its change request
    Submit {
        #[arg(long)]
        branch: String,
        #[arg(long)]
        expected_head: Option<String>,
        #[arg(long, default_value = "")]
        summary: String,
    },
    /// Live change requests, ordered by id
    List,
    Show { request_id: String },
    /// Merge a request into the trunk and roll its branch to the next round
    Approve {
        request_id: String,
        #[arg(long, default_value = "")]
        message: String,
    },
    /// Close a request, keeping its work branch
    Reject { request_id: String },
}

pub fn execute_sync(ctx: &CliContext, args: SyncArgs) -> CliResult<()> {
    let expected_head = ctx.expected_head(&args.branch, args.expected_head)?;
    ctx.command(EngineCommand::Sync(SyncRequest {
        ctx: ctx.on_branch(&args.branch),
        expected_head,
    }))
}

pub fn execute_conflicts(ctx: &CliContext, args: ConflictsArgs) -> CliResult<()> {
    match args.command {
        ConflictsCommand::List { branch } => {
            ctx.query(EngineQuery::ConflictList(ctx.on_branch(&branch)))
        }
        ConflictsCommand::Show { table, branch } => ctx.query(EngineQuery::ConflictRows {
            ctx: ctx.on_branch(&branch),
            table,
        }),
        ConflictsCommand::Resolve {
            table,
            branch,
            strategy,
            expected_head,
        } => {
            let expected_head = ctx.expected_head(&branch, expected_head)?;
            ctx.command(EngineCommand::ConflictResolve(ResolveRequest {
                ctx: ctx.on_branch(&branch),
                expected_head,
                table,
                strategy,
            }))
        }
    }
}

pub fn execute_request(ctx: &CliContext, args: RequestArgs) -> CliResult<()> {
    match args.command {
        RequestCommand::Submit {
            branch,
            expected_head,
            summary,
        } => {
            let expected_head = ctx.expected_head(&branch, expected_head)?;
            ctx.command(EngineCommand::RequestSubmit(SubmitRequest {
                ctx: ctx.on_branch(&branch),
                expected_head,
                summary,
            }))
        }
        RequestCommand::List => ctx.query(EngineQuery::RequestList(ctx.db())),
        RequestCommand::Show { request_id } => ctx.query(EngineQuery::RequestGet {
            db: ctx.db(),
            request_id,
        }),
        RequestCommand::Approve {
            request_id,
            message,
        } => ctx.command(EngineCommand::RequestApprove(ApproveRequest {
            db: ctx.db(),
            request_id,
            merge_message: message,
        })),
        RequestCommand::Reject { request_id } => ctx.command(EngineCommand::RequestReject {
            db: ctx.db(),
            request_id,
        }),
    }
}
