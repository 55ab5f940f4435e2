//! Engine-level action commands.
//!
//! `apply_engine_command` is the single entry point for every operation that
//! moves a branch head, a tag or a request record. It owns the operation's
//! log boundary and stamps failures with the op name and correlation ids.

use crate::commands::browse::{create_branch, delete_branch};
use crate::commands::common::{DatabaseRef, HeadResult};
use crate::commands::conflict::{resolve_conflicts, ResolveRequest};
use crate::commands::request::{
    approve_request, reject_request, submit_request, ApproveRequest, ApproveResult,
    SubmitRequest, SubmitResult,
};
use crate::commands::sync::{sync_branch, SyncRequest};
use crate::commands::write::{apply_write, WriteRequest};
use changegate_core::errors::Result;
use changegate_core::model::BranchInfo;
use changegate_core::store::SessionFactory;
use changegate_core::{log_op_end, log_op_error, log_op_start};
use changegate_core_types::OperationContext;
use serde::Serialize;

/// Mutating engine operations
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Apply row operations to a work branch as one commit
    WriteApply(WriteRequest),
    /// Merge the trunk into a work branch
    Sync(SyncRequest),
    ConflictResolve(ResolveRequest),
    RequestSubmit(SubmitRequest),
    RequestApprove(ApproveRequest),
    RequestReject { db: DatabaseRef, request_id: String },
    BranchCreate { db: DatabaseRef, name: String },
    BranchDelete { db: DatabaseRef, name: String },
}

impl EngineCommand {
    /// Operation name used in logs and error envelopes
    pub fn op_name(&self) -> &'static str {
        match self {
            EngineCommand::WriteApply(_) => "write_apply",
            EngineCommand::Sync(_) => "sync",
            EngineCommand::ConflictResolve(_) => "conflict_resolve",
            EngineCommand::RequestSubmit(_) => "request_submit",
            EngineCommand::RequestApprove(_) => "request_approve",
            EngineCommand::RequestReject { .. } => "request_reject",
            EngineCommand::BranchCreate { .. } => "branch_create",
            EngineCommand::BranchDelete { .. } => "branch_delete",
        }
    }
}

/// Status returned by commands with no other payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EngineCommandResult {
    Head(HeadResult),
    Submitted(SubmitResult),
    Approved(ApproveResult),
    Branch(BranchInfo),
    Ack(Ack),
}

/// Run `f` inside the canonical start/end log boundary of `op`.
///
/// Errors leave with `op` (unless a deeper layer already named one) and the
/// caller's correlation and trace ids.
pub(crate) fn observe<T>(
    op: &'static str,
    op_ctx: &OperationContext,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    log_op_start!(op, correlation_id = op_ctx.correlation_id.as_str());
    let start = std::time::Instant::now();

    let result = f().map_err(|e| {
        let e = if e.op().is_none() { e.with_op(op) } else { e };
        let e = e.with_correlation_id(op_ctx.correlation_id.clone());
        match &op_ctx.trace_id {
            Some(trace_id) => e.with_trace_id(trace_id.clone()),
            None => e,
        }
    });

    let elapsed = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => log_op_end!(
            op,
            duration_ms = elapsed,
            correlation_id = op_ctx.correlation_id.as_str()
        ),
        Err(e) => log_op_error!(
            op,
            e.clone(),
            duration_ms = elapsed,
            correlation_id = op_ctx.correlation_id.as_str()
        ),
    }
    result
}

/// Apply a mutating engine command.
///
/// # Errors
///
/// Whatever the underlying operation returns, stamped with the op name and
/// the correlation id of `op_ctx`.
pub fn apply_engine_command(
    cmd: EngineCommand,
    factory: &dyn SessionFactory,
    op_ctx: &OperationContext,
) -> Result<EngineCommandResult> {
    let op = cmd.op_name();
    observe(op, op_ctx, || match cmd {
        EngineCommand::WriteApply(req) => apply_write(factory, &req).map(EngineCommandResult::Head),
        EngineCommand::Sync(req) => sync_branch(factory, &req).map(EngineCommandResult::Head),
        EngineCommand::ConflictResolve(req) => {
            resolve_conflicts(factory, &req).map(EngineCommandResult::Head)
        }
        EngineCommand::RequestSubmit(req) => {
            submit_request(factory, &req).map(EngineCommandResult::Submitted)
        }
        EngineCommand::RequestApprove(req) => {
            approve_request(factory, &req).map(EngineCommandResult::Approved)
        }
        EngineCommand::RequestReject { db, request_id } => {
            reject_request(factory, &db, &request_id)?;
            Ok(EngineCommandResult::Ack(Ack { status: "rejected" }))
        }
        EngineCommand::BranchCreate { db, name } => {
            create_branch(factory, &db, &name).map(EngineCommandResult::Branch)
        }
        EngineCommand::BranchDelete { db, name } => {
            delete_branch(factory, &db, &name)?;
            Ok(EngineCommandResult::Ack(Ack { status: "deleted" }))
        }
    })
}
