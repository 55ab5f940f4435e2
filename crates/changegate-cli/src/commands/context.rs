//! Shared state and helpers for every subcommand
//!
//! All engine calls go through `apply_engine_command` / `apply_engine_query`
//! so the CLI gets the same log boundary and error stamping as any other
//! caller.

use changegate_core::config::EngineConfig;
use changegate_core::errors::ExError;
use changegate_core::logging_facility;
use changegate_core::model::BranchContext;
use changegate_core_types::OperationContext;
use changegate_engine::commands::common::DatabaseRef;
use changegate_engine::commands::engine_command::{apply_engine_command, EngineCommand};
use changegate_engine::commands::engine_query::{
    apply_engine_query, EngineQuery, EngineQueryResult,
};
use changegate_store::SqliteSessionFactory;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

pub struct CliContext {
    pub config: EngineConfig,
    pub factory: SqliteSessionFactory,
    pub target_id: String,
    pub database: String,
    pub op_ctx: OperationContext,
}

impl CliContext {
    /// Load the config, start logging and pick the target and database
    pub fn load(
        path: &Path,
        target: Option<String>,
        database: Option<String>,
    ) -> CliResult<Self> {
        let config = EngineConfig::load(path)?;
        logging_facility::init(config.logging.profile);

        let target_id = match target {
            Some(t) => t,
            None => config
                .targets
                .first()
                .map(|t| t.id.clone())
                .ok_or("no targets configured")?,
        };
        let database = match database {
            Some(d) => d,
            None => config
                .databases_for(&target_id)
                .first()
                .map(|d| d.name.clone())
                .ok_or_else(|| format!("no databases configured for target {}", target_id))?,
        };

        tracing::debug!(target_id = %target_id, database = %database, "cli context ready");
        Ok(Self {
            factory: SqliteSessionFactory::new(config.clone()),
            config,
            target_id,
            database,
            op_ctx: OperationContext::new().with_actor("cli"),
        })
    }

    pub fn db(&self) -> DatabaseRef {
        DatabaseRef::new(&self.target_id, &self.database)
    }

    pub fn on_branch(&self, branch: &str) -> BranchContext {
        self.db().on_branch(branch)
    }

    /// Run a mutating command and print its result
    pub fn command(&self, cmd: EngineCommand) -> CliResult<()> {
        let result = apply_engine_command(cmd, &self.factory, &self.op_ctx)?;
        print_json(&result)
    }

    /// Run a query and print its result
    pub fn query(&self, query: EngineQuery) -> CliResult<()> {
        let result = self.ask(query)?;
        print_json(&result)
    }

    pub fn ask(&self, query: EngineQuery) -> CliResult<EngineQueryResult> {
        Ok(apply_engine_query(
            query,
            &self.factory,
            &self.config,
            &self.op_ctx,
        )?)
    }

    /// `expected` when given, otherwise the branch's current head
    pub fn expected_head(&self, branch: &str, expected: Option<String>) -> CliResult<String> {
        if let Some(hash) = expected {
            return Ok(hash);
        }
        match self.ask(EngineQuery::GetHead {
            db: self.db(),
            reference: branch.to_string(),
        })? {
            EngineQueryResult::Head(head) => Ok(head.hash),
            _ => Err("unexpected result for head lookup".into()),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Read an argument that is inline text or `@path`
pub fn read_arg(text: &str) -> CliResult<String> {
    match text.strip_prefix('@') {
        Some("-") => Ok(std::io::read_to_string(std::io::stdin())?),
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(text.to_string()),
    }
}

/// Parse a JSON argument (inline or `@path`)
pub fn parse_json<T: DeserializeOwned>(what: &str, text: &str) -> CliResult<T> {
    let raw = read_arg(text)?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid JSON for {}: {}", what, e).into())
}

/// clap value parser for the snake_case names of serde enums
pub fn parse_choice<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(Value::String(s.to_string())).map_err(|_| format!("unknown value: {}", s))
}

/// Print `Error: …` and, for engine errors, the details object
pub fn report_error(err: &(dyn std::error::Error + 'static)) {
    eprintln!("Error: {}", err);
    if let Some(ex) = err.downcast_ref::<ExError>() {
        if !ex.details().is_empty() {
            if let Ok(details) = serde_json::to_string_pretty(ex.details()) {
                eprintln!("{}", details);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use changegate_core::model::{DiffMode, ResolveStrategy};

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice::<DiffMode>("three_dot"), Ok(DiffMode::ThreeDot));
        assert_eq!(parse_choice::<ResolveStrategy>("ours"), Ok(ResolveStrategy::Ours));
        assert!(parse_choice::<ResolveStrategy>("mine").is_err());
    }

    #[test]
    fn test_parse_json_inline() {
        let v: Vec<i64> = parse_json("ids", "[1, 2]").unwrap();
        assert_eq!(v, vec![1, 2]);
        let err = parse_json::<Vec<i64>>("ids", "[1,").unwrap_err();
        assert!(err.to_string().starts_with("invalid JSON for ids"));
    }
}
