//! Keyed persistence for pending requests
//!
//! A live record means the request is pending; no record means it was
//! approved, rejected or never submitted. Records are replaced or deleted,
//! never edited.

use changegate_core::errors::{ExError, Result};
use changegate_core::model::{Request, TagInfo};
use changegate_core::naming::{RequestId, REQUEST_PREFIX};
use changegate_core::store::StoreSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema marker written into every stored record
pub const REQUEST_RECORD_SCHEMA: &str = "changegate/request@1";

pub trait RequestStore {
    /// Create the record, replacing any record with the same id
    fn put(&mut self, request: &Request) -> Result<()>;

    fn get(&mut self, id: &RequestId) -> Result<Option<Request>>;

    /// Every readable record, ordered by id
    fn list(&mut self) -> Result<Vec<Request>>;

    /// # Errors
    ///
    /// `NOT_FOUND` when no record exists for `id`.
    fn delete(&mut self, id: &RequestId) -> Result<()>;
}

/// Stores each request as a tag named by its id, pointing at the submitted
/// work head, with the metadata as JSON in the tag message.
pub struct TagRequestStore<'a> {
    session: &'a mut dyn StoreSession,
}

#[derive(Debug, Serialize, Deserialize)]
struct RequestRecord {
    schema: String,
    submitted_main_hash: String,
    submitted_work_hash: String,
    submitted_at: DateTime<Utc>,
    work_branch: String,
    #[serde(default)]
    summary: String,
}

impl<'a> TagRequestStore<'a> {
    pub fn new(session: &'a mut dyn StoreSession) -> Self {
        Self { session }
    }

    fn find_tag(&mut self, name: &str) -> Result<Option<TagInfo>> {
        Ok(self
            .session
            .list_tags(name)?
            .into_iter()
            .find(|t| t.name == name))
    }
}

fn decode(id: RequestId, tag: &TagInfo) -> Result<Request> {
    let record: RequestRecord = serde_json::from_str(&tag.message)
        .map_err(|e| ExError::from(e).with_op("decode_request"))?;
    if record.schema != REQUEST_RECORD_SCHEMA {
        return Err(ExError::internal(format!(
            "unsupported request record schema: {}",
            record.schema
        )));
    }
    Ok(Request {
        request_id: id,
        work_branch: record.work_branch,
        submitted_main_hash: record.submitted_main_hash,
        // the tag itself is the authoritative pointer
        submitted_work_hash: tag.hash.clone(),
        submitted_at: record.submitted_at,
        summary: record.summary,
    })
}

impl RequestStore for TagRequestStore<'_> {
    fn put(&mut self, request: &Request) -> Result<()> {
        let name = request.request_id.to_string();
        let message = serde_json::to_string(&RequestRecord {
            schema: REQUEST_RECORD_SCHEMA.to_string(),
            submitted_main_hash: request.submitted_main_hash.clone(),
            submitted_work_hash: request.submitted_work_hash.clone(),
            submitted_at: request.submitted_at,
            work_branch: request.work_branch.clone(),
            summary: request.summary.clone(),
        })?;

        if self.find_tag(&name)?.is_some() {
            self.session.delete_tag(&name)?;
        }
        self.session
            .create_tag(&name, &request.submitted_work_hash, &message)
    }

    fn get(&mut self, id: &RequestId) -> Result<Option<Request>> {
        match self.find_tag(&id.to_string())? {
            Some(tag) => decode(id.clone(), &tag).map(Some),
            None => Ok(None),
        }
    }

    fn list(&mut self) -> Result<Vec<Request>> {
        let mut requests = Vec::new();
        for tag in self.session.list_tags(REQUEST_PREFIX)? {
            let decoded = RequestId::parse(&tag.name)
                .map_err(ExError::from)
                .and_then(|id| decode(id, &tag));
            match decoded {
                Ok(request) => requests.push(request),
                Err(e) => {
                    tracing::warn!(tag = %tag.name, error = %e, "skipping unreadable request record")
                }
            }
        }
        Ok(requests)
    }

    fn delete(&mut self, id: &RequestId) -> Result<()> {
        self.session.delete_tag(&id.to_string())
    }
}
