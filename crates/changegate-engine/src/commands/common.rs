//! Pieces shared by every command: request addressing, the expected-head
//! guard and the transaction wrapper.

use changegate_core::errors::{ExError, ExErrorKind, Result};
use changegate_core::model::BranchContext;
use changegate_core::store::StoreSession;
use changegate_core::validation::TRUNK_BRANCH;
use serde::{Deserialize, Serialize};

/// A database on a target, without a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRef {
    pub target_id: String,
    #[serde(rename = "db_name")]
    pub database: String,
}

impl DatabaseRef {
    pub fn new(target_id: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            database: database.into(),
        }
    }

    pub fn on_branch(&self, branch: impl Into<String>) -> BranchContext {
        BranchContext::new(&self.target_id, &self.database, branch)
    }

    pub fn trunk(&self) -> BranchContext {
        self.on_branch(TRUNK_BRANCH)
    }
}

impl From<&BranchContext> for DatabaseRef {
    fn from(ctx: &BranchContext) -> Self {
        Self::new(&ctx.target_id, &ctx.database)
    }
}

/// New head of a branch after a write, sync or resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadResult {
    pub hash: String,
}

/// Fail with `STALE_HEAD` unless the session's branch is at `expected`.
/// Returns the current head.
pub fn check_expected_head(session: &mut dyn StoreSession, expected: &str) -> Result<String> {
    let actual = session.head()?;
    if actual != expected {
        return Err(ExError::stale_head(expected, &actual).with_branch(session.branch()));
    }
    Ok(actual)
}

/// Run `f` inside a store transaction and publish its result.
///
/// Every failure, including a publish that loses the race for the branch,
/// rolls the transaction back before the error is returned.
pub fn in_transaction<T, F>(session: &mut dyn StoreSession, f: F) -> Result<T>
where
    F: FnOnce(&mut dyn StoreSession) -> Result<T>,
{
    session.begin_transaction()?;
    let outcome = f(&mut *session).and_then(|value| {
        session.commit_transaction()?;
        Ok(value)
    });

    if let Err(err) = &outcome {
        if let Err(rollback_err) = session.rollback_transaction() {
            tracing::warn!(
                branch = session.branch(),
                err_code = err.code(),
                rollback_error = %rollback_err,
                "rollback failed"
            );
        }
    }
    outcome
}

/// Re-type an error, keeping its message and details
pub(crate) fn rekind(err: ExError, kind: ExErrorKind) -> ExError {
    let base = ExError::new(kind).with_message(err.message());
    err.details()
        .iter()
        .fold(base, |acc, (key, value)| acc.with_detail(key, value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_ref_contexts() {
        let db = DatabaseRef::new("local", "inventory");
        let ctx = db.on_branch("wi/A/01");
        assert_eq!(ctx.branch, "wi/A/01");
        assert_eq!(db.trunk().branch, "main");
        assert_eq!(DatabaseRef::from(&ctx), db);
    }

    #[test]
    fn test_rekind_keeps_details() {
        let err = ExError::new(ExErrorKind::SchemaConflictsPresent)
            .with_message("schema conflicts detected")
            .with_detail("tables", vec!["items"]);
        let err = rekind(err, ExErrorKind::MergeConflictsPresent);
        assert_eq!(err.kind(), ExErrorKind::MergeConflictsPresent);
        assert_eq!(err.message(), "schema conflicts detected");
        assert!(err.details().contains_key("tables"));
    }
}
