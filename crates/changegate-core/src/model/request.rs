use crate::naming::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pending approval for one work branch's submitted state.
///
/// Requests are created on submit and deleted on approve or reject; they
/// are never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub request_id: RequestId,
    pub work_branch: String,
    pub submitted_main_hash: String,
    pub submitted_work_hash: String,
    pub submitted_at: DateTime<Utc>,
    pub summary: String,
}
