//! Branch commands

use super::context::{CliContext, CliResult};
use changegate_engine::commands::engine_command::EngineCommand;
use changegate_engine::commands::engine_query::EngineQuery;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct BranchArgs {
    #[command(subcommand)]
    pub command: BranchCommand,
}

#[derive(Debug, Subcommand)]
pub enum BranchCommand {
    /// List branches with their heads
    List,
    /// Create a branch from the trunk
    Create { name: String },
    /// Delete a branch (never the trunk)
    Delete { name: String },
    /// Resolve a branch, tag or commit to a hash
    Head {
        #[arg(default_value = "main")]
        reference: String,
    },
}

pub fn execute(ctx: &CliContext, args: BranchArgs) -> CliResult<()> {
    match args.command {
        BranchCommand::List => ctx.query(EngineQuery::ListBranches(ctx.db())),
        BranchCommand::Create { name } => ctx.command(EngineCommand::BranchCreate {
            db: ctx.db(),
            name,
        }),
        BranchCommand::Delete { name } => ctx.command(EngineCommand::BranchDelete {
            db: ctx.db(),
            name,
        }),
        BranchCommand::Head { reference } => ctx.query(EngineQuery::GetHead {
            db: ctx.db(),
            reference,
        }),
    }
}
