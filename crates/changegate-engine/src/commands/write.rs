//! Write Applier
//!
//! Applies a batch of row operations to a work branch as one commit. The
//! batch runs in a single store transaction, so either every operation lands
//! in the new commit or the branch is left exactly as it was.

use crate::commands::common::{check_expected_head, in_transaction, HeadResult};
use changegate_core::errors::{ExError, ExErrorKind, Result};
use changegate_core::model::{BranchContext, RowOp, RowOpType};
use changegate_core::store::{SessionFactory, StoreSession};
use changegate_core::validation::{
    ensure_writable, validate_columns, validate_identifier, validate_ref,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CONSTRAINT_HINT: &str = "Constraint violations must be resolved via CLI.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub expected_head: String,
    pub commit_message: String,
    pub ops: Vec<RowOp>,
}

/// Commit `ops` on the request's branch and return the new head.
///
/// # Errors
///
/// - `FORBIDDEN` on the trunk
/// - `STALE_HEAD` when the branch is not at `expected_head`
/// - `INVALID_ARGUMENT` for bad identifiers or op shapes; the failing op's
///   position is in the `op_index` detail
/// - `NOT_FOUND` when an update or delete addresses no row
/// - `CONSTRAINT_VIOLATIONS_PRESENT` when the batch breaks NOT NULL or a
///   foreign key
pub fn apply_write(factory: &dyn SessionFactory, req: &WriteRequest) -> Result<HeadResult> {
    ensure_writable(&req.ctx.branch)?;
    validate_ref("branch name", &req.ctx.branch)?;
    if req.ops.is_empty() {
        return Err(ExError::invalid_argument("ops must not be empty"));
    }
    if req.commit_message.trim().is_empty() {
        return Err(ExError::invalid_argument("commit_message must not be empty"));
    }

    let mut session = factory.open(&req.ctx)?;
    let hash = in_transaction(session.as_mut(), |s| {
        check_expected_head(s, &req.expected_head)?;

        for (index, op) in req.ops.iter().enumerate() {
            apply_op(s, op).map_err(|e| e.with_detail("op_index", index))?;
        }

        let violations = s.verify_constraints()?;
        if violations > 0 {
            return Err(ExError::new(ExErrorKind::ConstraintViolationsPresent)
                .with_branch(&req.ctx.branch)
                .with_message("constraint violations detected")
                .with_detail("violations", violations)
                .with_hint(CONSTRAINT_HINT));
        }

        s.create_commit(&req.commit_message)
    })?;

    Ok(HeadResult { hash })
}

/// Apply one operation to the session's working set
fn apply_op(session: &mut dyn StoreSession, op: &RowOp) -> Result<()> {
    validate_identifier("table name", &op.table)?;
    validate_columns(op.values.keys())?;

    match op.op_type {
        RowOpType::Insert => {
            if op.values.is_empty() {
                return Err(
                    ExError::invalid_argument("insert requires values").with_table(&op.table)
                );
            }
            session.insert_row(&op.table, &op.values)?;
        }
        RowOpType::Update => {
            let (column, value) = op.single_pk()?;
            validate_identifier("pk column", column)?;
            if op.values.is_empty() {
                return Err(
                    ExError::invalid_argument("update requires values").with_table(&op.table)
                );
            }
            if session.update_row(&op.table, &op.values, (column, value))? == 0 {
                return Err(row_not_found(&op.table, column, value));
            }
        }
        RowOpType::Delete => {
            let (column, value) = op.single_pk()?;
            validate_identifier("pk column", column)?;
            if session.delete_row(&op.table, (column, value))? == 0 {
                return Err(row_not_found(&op.table, column, value));
            }
        }
    }
    Ok(())
}

fn row_not_found(table: &str, column: &str, value: &Value) -> ExError {
    ExError::not_found(format!("row not found in {}", table))
        .with_table(table)
        .with_detail("pk", json!({ column: value }))
}
