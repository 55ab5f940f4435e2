//! Sync Controller: merge the trunk forward into a work branch.
//!
//! ## Pipeline (in order):
//! 1. Trunk guard and expected-head check
//! 2. Conflict preview against the trunk (schema conflicts first, then data)
//! 3. Auto-committing merge
//! 4. If the merge still stops, re-run the preview to classify it; anything
//!    the preview cannot see is a constraint violation

use crate::commands::common::{check_expected_head, in_transaction, HeadResult};
use crate::commands::write::CONSTRAINT_HINT;
use changegate_core::errors::{ExError, ExErrorKind, Result};
use changegate_core::model::{BranchContext, ConflictSummary};
use changegate_core::store::{MergeOptions, MergeOutcome, SessionFactory, StoreSession};
use changegate_core::validation::{ensure_writable, validate_ref, TRUNK_BRANCH};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SCHEMA_CONFLICT_HINT: &str = "Schema conflicts must be resolved via CLI.";
pub const DATA_CONFLICT_HINT: &str = "Resolve conflicts and retry.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub expected_head: String,
}

/// Bring the trunk into a work branch and return the branch's new head
///
/// # Errors
///
/// `FORBIDDEN`, `STALE_HEAD`, `SCHEMA_CONFLICTS_PRESENT`,
/// `MERGE_CONFLICTS_PRESENT` or `CONSTRAINT_VIOLATIONS_PRESENT`; the branch
/// is untouched in every case.
pub fn sync_branch(factory: &dyn SessionFactory, req: &SyncRequest) -> Result<HeadResult> {
    ensure_writable(&req.ctx.branch)?;
    validate_ref("branch name", &req.ctx.branch)?;

    let mut session = factory.open(&req.ctx)?;
    let hash = in_transaction(session.as_mut(), |s| {
        check_expected_head(s, &req.expected_head)?;
        merge_trunk_forward(s).map(|merged| merged.head)
    })?;
    Ok(HeadResult { hash })
}

/// Branch head after a forward merge and the trunk commit that was merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ForwardMerge {
    pub head: String,
    pub trunk_hash: String,
}

/// Preview, then merge the trunk into the session's branch with autocommit.
/// The trunk head is resolved once; preview and merge both use that commit.
pub(crate) fn merge_trunk_forward(session: &mut dyn StoreSession) -> Result<ForwardMerge> {
    let branch = session.branch().to_string();
    let trunk_hash = session.resolve_ref(TRUNK_BRANCH)?;

    // Step 1: mandatory pre-flight, nothing is merged blind
    preflight(session, &branch, &trunk_hash)?;

    // Step 2: auto-committing merge
    let options = MergeOptions::autocommit()
        .with_message(format!("Merge branch '{}' into {}", TRUNK_BRANCH, branch));
    let summaries = match session.merge(&trunk_hash, &options)? {
        MergeOutcome::Applied { hash, fast_forward } => {
            tracing::debug!(branch = %branch, head = %hash, trunk = %trunk_hash, fast_forward, "trunk merged forward");
            return Ok(ForwardMerge {
                head: hash,
                trunk_hash,
            });
        }
        MergeOutcome::Conflicted(summaries) => summaries,
    };

    // Step 3: the preview saw no conflicts, so what stopped the merge is a
    // constraint violation
    preflight(session, &branch, &trunk_hash)?;
    let tables: Vec<&str> = summaries.iter().map(|s| s.table.as_str()).collect();
    Err(ExError::new(ExErrorKind::ConstraintViolationsPresent)
        .with_branch(&branch)
        .with_message("constraint violations detected after merge")
        .with_detail("tables", tables)
        .with_hint(CONSTRAINT_HINT))
}

/// Fail if merging `trunk` into `branch` would conflict
pub(crate) fn preflight(session: &mut dyn StoreSession, branch: &str, trunk: &str) -> Result<()> {
    let summaries = session.preview_merge_summary(branch, trunk)?;
    if let Some(err) = schema_conflict_error(branch, &summaries) {
        return Err(err);
    }

    let conflicts: Vec<Value> = summaries
        .iter()
        .filter(|s| s.data_conflicts > 0)
        .map(|s| json!({ "table": s.table, "data_conflicts": s.data_conflicts }))
        .collect();
    if !conflicts.is_empty() {
        return Err(ExError::new(ExErrorKind::MergeConflictsPresent)
            .with_branch(branch)
            .with_message("merge conflicts detected")
            .with_detail("conflicts", conflicts)
            .with_hint(DATA_CONFLICT_HINT));
    }
    Ok(())
}

/// `SCHEMA_CONFLICTS_PRESENT` naming every table with a schema conflict
pub(crate) fn schema_conflict_error(branch: &str, summaries: &[ConflictSummary]) -> Option<ExError> {
    let tables: Vec<&str> = summaries
        .iter()
        .filter(|s| s.schema_conflicts > 0)
        .map(|s| s.table.as_str())
        .collect();
    if tables.is_empty() {
        return None;
    }
    Some(
        ExError::new(ExErrorKind::SchemaConflictsPresent)
            .with_branch(branch)
            .with_message("schema conflicts detected")
            .with_detail("tables", tables)
            .with_hint(SCHEMA_CONFLICT_HINT),
    )
}
