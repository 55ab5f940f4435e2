//! Request Lifecycle Manager
//!
//! `none -> submitted -> {merged | rejected}`. Submitting records the work
//! branch's state for review; approving merges exactly that state into the
//! trunk; rejecting drops the record and leaves the branch for revision.

use crate::commands::common::{check_expected_head, in_transaction, rekind, DatabaseRef};
use crate::commands::request_store::{RequestStore, TagRequestStore};
use crate::commands::sync::merge_trunk_forward;
use changegate_core::errors::{ExError, ExErrorKind, Result};
use changegate_core::model::{BranchContext, Request};
use changegate_core::naming::{RequestId, WorkBranch};
use changegate_core::store::{MergeOptions, MergeOutcome, SessionFactory, StoreSession};
use changegate_core::validation::{ensure_writable, TRUNK_BRANCH};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub const APPROVE_CONFLICT_HINT: &str = "Contact administrator for conflict resolution.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(flatten)]
    pub ctx: BranchContext,
    pub expected_head: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub request_id: String,
    pub submitted_main_hash: String,
    pub submitted_work_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveRequest {
    #[serde(flatten)]
    pub db: DatabaseRef,
    pub request_id: String,
    #[serde(default)]
    pub merge_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveResult {
    /// Trunk head after the merge
    pub hash: String,
    /// Next round's work branch; empty when it could not be created
    pub next_branch: String,
}

/// Public projection of a stored request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSummary {
    pub request_id: String,
    pub work_branch: String,
    pub submitted_main_hash: String,
    pub submitted_work_hash: String,
    pub submitted_at: String,
    pub summary: String,
}

impl From<Request> for RequestSummary {
    fn from(r: Request) -> Self {
        Self {
            request_id: r.request_id.to_string(),
            work_branch: r.work_branch,
            submitted_main_hash: r.submitted_main_hash,
            submitted_work_hash: r.submitted_work_hash,
            submitted_at: r.submitted_at.to_rfc3339(),
            summary: r.summary,
        }
    }
}

fn request_not_found(id: &RequestId) -> ExError {
    ExError::not_found("request not found").with_detail("request_id", id.to_string())
}

/// Submit a work branch for approval.
///
/// The trunk is merged forward first so the request always describes a
/// branch that is current with the trunk. Re-submitting replaces the live
/// request of the branch.
///
/// # Errors
///
/// `FORBIDDEN` on the trunk, `INVALID_ARGUMENT` for a name outside
/// `wi/<item>/<NN>`, `STALE_HEAD`, and `MERGE_CONFLICTS_PRESENT` for any
/// conflict met while merging the trunk forward.
pub fn submit_request(factory: &dyn SessionFactory, req: &SubmitRequest) -> Result<SubmitResult> {
    ensure_writable(&req.ctx.branch)?;
    let work = WorkBranch::parse(&req.ctx.branch)?;
    let request_id = work.request_id();

    let mut session = factory.open(&req.ctx)?;

    // Step 1: expected head, then bring the trunk in
    let merged = in_transaction(session.as_mut(), |s| {
        check_expected_head(s, &req.expected_head)?;
        merge_trunk_forward(s).map_err(|e| match e.kind() {
            ExErrorKind::SchemaConflictsPresent
            | ExErrorKind::MergeConflictsPresent
            | ExErrorKind::ConstraintViolationsPresent => {
                rekind(e, ExErrorKind::MergeConflictsPresent).with_branch(&req.ctx.branch)
            }
            _ => e,
        })
    })?;

    // Step 2: both heads come from the merge itself
    let main_hash = merged.trunk_hash;
    let work_hash = merged.head;

    // Step 3: upsert the record
    let request = Request {
        request_id: request_id.clone(),
        work_branch: work.to_string(),
        submitted_main_hash: main_hash.clone(),
        submitted_work_hash: work_hash.clone(),
        submitted_at: Utc::now(),
        summary: req.summary.clone(),
    };
    TagRequestStore::new(session.as_mut()).put(&request)?;

    Ok(SubmitResult {
        request_id: request_id.to_string(),
        submitted_main_hash: main_hash,
        submitted_work_hash: work_hash,
    })
}

/// All pending requests of a database, ordered by id
pub fn list_requests(factory: &dyn SessionFactory, db: &DatabaseRef) -> Result<Vec<RequestSummary>> {
    let mut session = factory.open(&db.trunk())?;
    let requests = TagRequestStore::new(session.as_mut()).list()?;
    Ok(requests.into_iter().map(RequestSummary::from).collect())
}

/// # Errors
///
/// `INVALID_ARGUMENT` for a malformed id, `NOT_FOUND` when no request is live.
pub fn get_request(
    factory: &dyn SessionFactory,
    db: &DatabaseRef,
    request_id: &str,
) -> Result<RequestSummary> {
    let id = RequestId::parse(request_id)?;
    let mut session = factory.open(&db.trunk())?;
    TagRequestStore::new(session.as_mut())
        .get(&id)?
        .map(RequestSummary::from)
        .ok_or_else(|| request_not_found(&id))
}

/// Merge a submitted work branch into the trunk.
///
/// ## Pipeline (in order):
/// 1. Load the request
/// 2. The work branch must still be at the submitted head
/// 3. Auto-committing merge into the trunk; conflicts leave the trunk and the
///    request untouched
/// 4. Best-effort housekeeping: audit tag, request record, work branch
/// 5. Best-effort next-round branch from the new trunk head
///
/// Failures in steps 4 and 5 are logged and never fail the approval.
///
/// # Errors
///
/// `NOT_FOUND`, `PRECONDITION_FAILED` when the branch moved after
/// submission, `MERGE_CONFLICTS_PRESENT`.
pub fn approve_request(factory: &dyn SessionFactory, req: &ApproveRequest) -> Result<ApproveResult> {
    let id = RequestId::parse(&req.request_id)?;
    let work = id.work_branch().clone();
    let work_name = work.to_string();

    let mut trunk = factory.open(&req.db.trunk())?;

    // Step 1: load
    let request = TagRequestStore::new(trunk.as_mut())
        .get(&id)?
        .ok_or_else(|| request_not_found(&id))?;

    // Step 2: the reviewed state is the state being merged
    let current_work_hash = factory.open(&req.db.on_branch(&work_name))?.head()?;
    if current_work_hash != request.submitted_work_hash {
        return Err(ExError::new(ExErrorKind::PreconditionFailed)
            .with_branch(&work_name)
            .with_message("work branch has changed since submission")
            .with_detail("submitted_work_hash", request.submitted_work_hash.as_str())
            .with_detail("current_work_hash", current_work_hash));
    }

    // Step 3: merge the submitted commit, not whatever the branch points at now
    let message = if req.merge_message.trim().is_empty() {
        format!("Merge branch '{}' into {}", work_name, TRUNK_BRANCH)
    } else {
        req.merge_message.clone()
    };
    let options = MergeOptions::autocommit().with_message(message);
    let hash = match trunk.merge(&request.submitted_work_hash, &options)? {
        MergeOutcome::Applied { hash, .. } => hash,
        MergeOutcome::Conflicted(summaries) => {
            if let Err(e) = trunk.abort_merge() {
                tracing::warn!(request_id = %id, error = %e, "merge abort failed");
            }
            let conflicts: u64 = summaries.iter().map(|s| s.data_conflicts).sum();
            return Err(ExError::new(ExErrorKind::MergeConflictsPresent)
                .with_branch(TRUNK_BRANCH)
                .with_message("merge conflicts detected - same cell edited in multiple branches")
                .with_detail("conflicts", conflicts)
                .with_detail("tables", json!(summaries))
                .with_hint(APPROVE_CONFLICT_HINT));
        }
    };

    // Step 4: housekeeping
    housekeeping(trunk.as_mut(), &id, &work, &hash, &req.merge_message);

    // Step 5: next round
    let next_branch = create_next_round(trunk.as_mut(), &id, &work, &hash);

    tracing::info!(
        request_id = %id,
        head = %hash,
        next_branch = %next_branch,
        "request approved"
    );
    Ok(ApproveResult { hash, next_branch })
}

fn housekeeping(
    trunk: &mut dyn StoreSession,
    id: &RequestId,
    work: &WorkBranch,
    hash: &str,
    message: &str,
) {
    let merged_tag = work.merged_tag();
    if let Err(e) = trunk.create_tag(&merged_tag, hash, message) {
        tracing::warn!(request_id = %id, step = "audit_tag", tag = %merged_tag, error = %e, "housekeeping failed");
    }
    if let Err(e) = TagRequestStore::new(&mut *trunk).delete(id) {
        tracing::warn!(request_id = %id, step = "delete_request", error = %e, "housekeeping failed");
    }
    if let Err(e) = trunk.delete_branch(&work.to_string(), true) {
        tracing::warn!(request_id = %id, step = "delete_branch", error = %e, "housekeeping failed");
    }
}

/// Name of the created branch, or empty when it could not be created
fn create_next_round(
    trunk: &mut dyn StoreSession,
    id: &RequestId,
    work: &WorkBranch,
    hash: &str,
) -> String {
    let created = work
        .next_round()
        .map_err(ExError::from)
        .and_then(|next| {
            let name = next.to_string();
            trunk.create_branch(&name, hash).map(|()| name)
        });
    match created {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!(request_id = %id, step = "next_branch", error = %e, "housekeeping failed");
            String::new()
        }
    }
}

/// Drop a pending request. The work branch is kept for revision.
///
/// # Errors
///
/// `INVALID_ARGUMENT` for a malformed id, `NOT_FOUND` when no request is live.
pub fn reject_request(factory: &dyn SessionFactory, db: &DatabaseRef, request_id: &str) -> Result<()> {
    let id = RequestId::parse(request_id)?;
    let mut session = factory.open(&db.trunk())?;
    let mut store = TagRequestStore::new(session.as_mut());
    if store.get(&id)?.is_none() {
        return Err(request_not_found(&id));
    }
    store.delete(&id)
}
