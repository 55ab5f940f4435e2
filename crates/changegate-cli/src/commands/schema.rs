//! Database initialization and administrative schema changes
//!
//! Usage:
//!   changegate init
//!   changegate schema create-table <TABLE> --columns <JSON> [--branch main]
//!   changegate schema add-column <TABLE> --column <JSON> [--branch main]
//!
//! Schema changes bypass the engine: they open a store session directly and
//! commit on the named branch, trunk included.

use super::context::{parse_json, print_json, CliContext, CliResult};
use changegate_core::model::ColumnSchema;
use changegate_core::store::StoreSession;
use changegate_engine::commands::common::HeadResult;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommand,
}

#[derive(Debug, Subcommand)]
pub enum SchemaCommand {
    /// Create a table from a JSON column list
    CreateTable(CreateTableArgs),
    /// Append one column to an existing table
    AddColumn(AddColumnArgs),
}

#[derive(Debug, Args)]
pub struct CreateTableArgs {
    pub table: String,

    /// JSON array of `{name, type, nullable?, primary_key?, references?}`, or `@file`
    #[arg(long)]
    pub columns: String,

    #[arg(long, default_value = "main")]
    pub branch: String,

    #[arg(long)]
    pub message: Option<String>,
}

#[derive(Debug, Args)]
pub struct AddColumnArgs {
    pub table: String,

    /// JSON column definition, or `@file`
    #[arg(long)]
    pub column: String,

    #[arg(long, default_value = "main")]
    pub branch: String,

    #[arg(long)]
    pub message: Option<String>,
}

pub fn execute_init(ctx: &CliContext) -> CliResult<()> {
    let hash = ctx.factory.init_database(&ctx.target_id, &ctx.database)?;
    print_json(&HeadResult { hash })
}

pub fn execute(ctx: &CliContext, args: SchemaArgs) -> CliResult<()> {
    let hash = match args.command {
        SchemaCommand::CreateTable(args) => {
            let columns: Vec<ColumnSchema> = parse_json("columns", &args.columns)?;
            let mut session = ctx.factory.open_session(&ctx.on_branch(&args.branch))?;
            session.create_table(&args.table, columns)?;
            let message = args
                .message
                .unwrap_or_else(|| format!("Create table {}", args.table));
            session.create_commit(&message)?
        }
        SchemaCommand::AddColumn(args) => {
            let column: ColumnSchema = parse_json("column", &args.column)?;
            let mut session = ctx.factory.open_session(&ctx.on_branch(&args.branch))?;
            let message = args
                .message
                .unwrap_or_else(|| format!("Add column {} to {}", column.name, args.table));
            session.add_column(&args.table, column)?;
            session.create_commit(&message)?
        }
    };
    tracing::info!(database = %ctx.database, head = %hash, "schema committed");
    print_json(&HeadResult { hash })
}
