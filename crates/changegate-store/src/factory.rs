//! Session factory over configured targets
//!
//! Each target is a directory; each allowed database is one SQLite file in
//! it. Every [`SessionFactory::open`] call opens a fresh connection.

use crate::db;
use crate::errors::{io_error, Result};
use crate::migrations::apply_migrations;
use crate::objects::{self, CommitObject};
use crate::refs;
use crate::session::SqliteSession;
use crate::snapshot::Snapshot;
use changegate_core::config::EngineConfig;
use changegate_core::errors::{ExError, ExErrorKind};
use changegate_core::model::BranchContext;
use changegate_core::store::{SessionFactory, StoreSession};
use changegate_core::validation::{validate_ref, TRUNK_BRANCH};
use chrono::Utc;
use std::path::PathBuf;

pub const ROOT_COMMIT_MESSAGE: &str = "Initialize data repository";

#[derive(Debug, Clone)]
pub struct SqliteSessionFactory {
    config: EngineConfig,
}

impl SqliteSessionFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// File backing `database` on `target_id`
    ///
    /// # Errors
    ///
    /// `NOT_FOUND` for an unknown target, `FORBIDDEN` for a database not
    /// configured on it.
    pub fn database_path(&self, target_id: &str, database: &str) -> Result<PathBuf> {
        let target = self.config.find_target(target_id).ok_or_else(|| {
            ExError::not_found(format!("target not found: {}", target_id))
                .with_detail("target_id", target_id)
        })?;
        if !self.config.is_allowed(target_id, database) {
            return Err(ExError::new(ExErrorKind::Forbidden)
                .with_message(format!(
                    "database {} is not configured for target {}",
                    database, target_id
                ))
                .with_detail("target_id", target_id)
                .with_detail("db_name", database));
        }
        Ok(target.root.join(format!("{}.db", database)))
    }

    /// Open a concrete session, for callers that need the admin API
    pub fn open_session(&self, ctx: &BranchContext) -> Result<SqliteSession> {
        validate_ref("branch name", &ctx.branch)?;
        let path = self.database_path(&ctx.target_id, &ctx.database)?;
        if !path.exists() {
            return Err(ExError::not_found(format!(
                "database not initialized: {}",
                ctx.database
            ))
            .with_detail("db_name", ctx.database.as_str()));
        }
        let mut conn = db::open(&path)?;
        apply_migrations(&mut conn)?;
        let author = self
            .config
            .find_target(&ctx.target_id)
            .map(|t| t.author().to_string())
            .unwrap_or_default();
        SqliteSession::open(conn, &ctx.branch, author)
    }

    /// Create the database file with an empty root commit on the trunk.
    /// Returns the trunk head; running it again changes nothing.
    pub fn init_database(&self, target_id: &str, database: &str) -> Result<String> {
        let path = self.database_path(target_id, database)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| io_error("init_database", e))?;
        }
        let mut conn = db::open(&path)?;
        apply_migrations(&mut conn)?;

        if let Some(head) = refs::branch_head(&conn, TRUNK_BRANCH)? {
            return Ok(head);
        }
        let author = self
            .config
            .find_target(target_id)
            .map(|t| t.author().to_string())
            .unwrap_or_default();
        let tree = objects::put_tree(&conn, &Snapshot::default())?;
        let head = objects::put_commit(
            &conn,
            &CommitObject {
                tree,
                parents: Vec::new(),
                message: ROOT_COMMIT_MESSAGE.to_string(),
                author,
                timestamp: Utc::now(),
            },
        )?;
        refs::create_branch(&conn, TRUNK_BRANCH, &head)?;
        tracing::info!(target_id, database, head = %head, "database initialized");
        Ok(head)
    }
}

impl SessionFactory for SqliteSessionFactory {
    fn open(&self, ctx: &BranchContext) -> Result<Box<dyn StoreSession>> {
        Ok(Box::new(self.open_session(ctx)?))
    }
}
