//! changegate CLI
//!
//! Command-line interface over the change-workflow engine and the SQLite store

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::context::CliContext;

#[derive(Debug, Parser)]
#[command(name = "changegate")]
#[command(about = "changegate - reviewed edits to versioned tables", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, default_value = "changegate.yaml")]
    config: PathBuf,

    /// Store target (defaults to the first configured target)
    #[arg(long, global = true)]
    target: Option<String>,

    /// Database (defaults to the first database configured on the target)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the database with an empty trunk
    Init,
    /// Administrative schema changes, committed directly to a branch
    Schema(commands::schema::SchemaArgs),
    /// Branch operations
    Branch(commands::branch::BranchArgs),
    /// List the tables of a branch
    Tables(commands::data::TablesArgs),
    /// Browse the rows of a table
    Rows(commands::data::RowsArgs),
    /// Apply row operations to a work branch as one commit
    Commit(commands::data::CommitArgs),
    /// Merge the trunk into a work branch
    Sync(commands::workflow::SyncArgs),
    /// Inspect and resolve merge conflicts
    Conflicts(commands::workflow::ConflictsArgs),
    /// Submit, review, approve or reject change requests
    Request(commands::workflow::RequestArgs),
    /// Generate row operations without writing them
    Preview(commands::preview::PreviewArgs),
    /// Row differences between two refs
    Diff(commands::history::DiffArgs),
    /// Commit history of a branch, or the versions of one row
    Log(commands::history::LogArgs),
}

fn run(ctx: &CliContext, command: Commands) -> commands::context::CliResult<()> {
    match command {
        Commands::Init => commands::schema::execute_init(ctx),
        Commands::Schema(args) => commands::schema::execute(ctx, args),
        Commands::Branch(args) => commands::branch::execute(ctx, args),
        Commands::Tables(args) => commands::data::execute_tables(ctx, args),
        Commands::Rows(args) => commands::data::execute_rows(ctx, args),
        Commands::Commit(args) => commands::data::execute_commit(ctx, args),
        Commands::Sync(args) => commands::workflow::execute_sync(ctx, args),
        Commands::Conflicts(args) => commands::workflow::execute_conflicts(ctx, args),
        Commands::Request(args) => commands::workflow::execute_request(ctx, args),
        Commands::Preview(args) => commands::preview::execute(ctx, args),
        Commands::Diff(args) => commands::history::execute_diff(ctx, args),
        Commands::Log(args) => commands::history::execute_log(ctx, args),
    }
}

fn main() {
    let cli = Cli::parse();

    let result = CliContext::load(&cli.config, cli.target, cli.database)
        .and_then(|ctx| run(&ctx, cli.command));

    if let Err(e) = result {
        commands::context::report_error(e.as_ref());
        std::process::exit(1);
    }
}
