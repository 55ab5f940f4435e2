//! Conflict Engine: list, inspect and resolve conflicts between a work
//! branch and the trunk.

use crate::commands::common::{check_expected_head, in_transaction, HeadResult};
use crate::commands::sync::schema_conflict_error;
use crate::commands::write::CONSTRAINT_HINT;
use changegate_core::errors::{ExError, ExErrorKind, Result};
use changegate_core::model::history::RESOLVE_COMMIT_MESSAGE;
use changegate_core::model::{
    BranchContext, ConflictRow, ConflictSummary, FlatRow, ResolveStrategy,
};
use changegate_core::store::{MergeOptions, MergeOutcome, SessionFactory};
use changegate_core::validation::{
    ensure_writable, validate_identifier, validate_ref, TRUNK_BRANCH,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub expected_head: String,
    pub table: String,
    pub strategy: ResolveStrategy,
}

/// Per-table conflict counts of merging the trunk into the branch. Read-only.
pub fn list_conflicts(
    factory: &dyn SessionFactory,
    ctx: &BranchContext,
) -> Result<Vec<ConflictSummary>> {
    validate_ref("branch name", &ctx.branch)?;
    let mut session = factory.open(ctx)?;
    session.preview_merge_summary(&ctx.branch, TRUNK_BRANCH)
}

/// Conflicting rows of one table, each split into base/ours/theirs
pub fn conflict_rows(
    factory: &dyn SessionFactory,
    ctx: &BranchContext,
    table: &str,
) -> Result<Vec<ConflictRow>> {
    validate_identifier("table name", table)?;
    validate_ref("branch name", &ctx.branch)?;
    let mut session = factory.open(ctx)?;
    let rows = session.list_conflict_rows(&ctx.branch, TRUNK_BRANCH, table)?;
    Ok(rows.into_iter().map(split_conflict_row).collect())
}

/// Distribute prefixed columns to their side; unprefixed ones go to all three
fn split_conflict_row(flat: FlatRow) -> ConflictRow {
    let mut row = ConflictRow::default();
    for (column, value) in flat {
        if let Some(name) = column.strip_prefix("base_") {
            row.base.insert(name.to_string(), value);
        } else if let Some(name) = column.strip_prefix("our_") {
            row.ours.insert(name.to_string(), value);
        } else if let Some(name) = column.strip_prefix("their_") {
            row.theirs.insert(name.to_string(), value);
        } else {
            for side in [&mut row.base, &mut row.ours] {
                side.insert(column.clone(), value.clone());
            }
            row.theirs.insert(column, value);
        }
    }
    row
}

/// Merge the trunk into the branch, settling the data conflicts of one table
/// with `strategy`.
///
/// ## Pipeline (in order):
/// 1. Trunk guard and expected-head check
/// 2. Schema-conflict pre-check over every table
/// 3. Non-fast-forward merge; a clean merge is the whole result
/// 4. Apply the strategy to the named table, then require zero conflicts
///    anywhere
/// 5. Constraint verification
/// 6. Commit with a fixed message
///
/// # Errors
///
/// `FORBIDDEN`, `STALE_HEAD`, `INVALID_ARGUMENT`,
/// `SCHEMA_CONFLICTS_PRESENT`, `MERGE_CONFLICTS_PRESENT` when other tables
/// still conflict, `CONSTRAINT_VIOLATIONS_PRESENT`.
pub fn resolve_conflicts(
    factory: &dyn SessionFactory,
    req: &ResolveRequest,
) -> Result<HeadResult> {
    ensure_writable(&req.ctx.branch)?;
    validate_ref("branch name", &req.ctx.branch)?;
    validate_identifier("table name", &req.table)?;

    let mut session = factory.open(&req.ctx)?;
    let hash = in_transaction(session.as_mut(), |s| {
        // Step 1: expected head
        check_expected_head(s, &req.expected_head)?;

        // Step 2: schema conflicts are never resolved here
        let summaries = s.preview_merge_summary(&req.ctx.branch, TRUNK_BRANCH)?;
        if let Some(err) = schema_conflict_error(&req.ctx.branch, &summaries) {
            return Err(err);
        }

        // Step 3: merge, keeping conflicts for resolution
        let options = MergeOptions {
            no_ff: true,
            ..MergeOptions::default()
        };
        if let MergeOutcome::Applied { hash, .. } = s.merge(TRUNK_BRANCH, &options)? {
            return Ok(hash);
        }

        // Step 4: one table per call
        s.resolve_conflicts(&req.table, req.strategy)?;
        let remaining = s.conflict_count()?;
        if remaining > 0 {
            return Err(ExError::new(ExErrorKind::MergeConflictsPresent)
                .with_branch(&req.ctx.branch)
                .with_message("unresolved conflicts remain")
                .with_detail("remaining", remaining));
        }

        // Step 5: integrity
        let violations = s.verify_constraints()?;
        if violations > 0 {
            return Err(ExError::new(ExErrorKind::ConstraintViolationsPresent)
                .with_branch(&req.ctx.branch)
                .with_message("constraint violations detected after merge")
                .with_detail("violations", violations)
                .with_hint(CONSTRAINT_HINT));
        }

        // Step 6: commit
        s.create_commit(RESOLVE_COMMIT_MESSAGE)
    })?;

    tracing::debug!(
        branch = %req.ctx.branch,
        table = %req.table,
        strategy = %req.strategy,
        head = %hash,
        "conflicts resolved"
    );
    Ok(HeadResult { hash })
}
