use changegate_core_types::{CorrelationId, TraceId};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure the engine reports falls into one of these kinds. The code
/// returned by [`ExErrorKind::code`] is stable and is what transport layers
/// and tests match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    /// Malformed or unsafe identifier, bad filter, wrong request shape
    InvalidArgument,
    /// Write attempted against the trunk
    Forbidden,
    /// Missing row, template, branch, tag or request
    NotFound,
    /// Caller's expected head differs from the branch head
    StaleHead,
    /// Work branch moved after its request was submitted
    PreconditionFailed,
    /// Schema conflicts, which only an out-of-band tool can resolve
    SchemaConflictsPresent,
    /// Data conflicts, resolvable with an ours/theirs strategy
    MergeConflictsPresent,
    /// Foreign key or NOT NULL violations after a write or merge
    ConstraintViolationsPresent,
    /// Unexpected store failure
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ExErrorKind::Forbidden => "FORBIDDEN",
            ExErrorKind::NotFound => "NOT_FOUND",
            ExErrorKind::StaleHead => "STALE_HEAD",
            ExErrorKind::PreconditionFailed => "PRECONDITION_FAILED",
            ExErrorKind::SchemaConflictsPresent => "SCHEMA_CONFLICTS_PRESENT",
            ExErrorKind::MergeConflictsPresent => "MERGE_CONFLICTS_PRESENT",
            ExErrorKind::ConstraintViolationsPresent => "CONSTRAINT_VIOLATIONS_PRESENT",
            ExErrorKind::Internal => "INTERNAL",
        }
    }

    /// Transport status a caller should map this kind to
    pub fn http_status(&self) -> u16 {
        match self {
            ExErrorKind::InvalidArgument => 400,
            ExErrorKind::Forbidden => 403,
            ExErrorKind::NotFound => 404,
            ExErrorKind::StaleHead
            | ExErrorKind::SchemaConflictsPresent
            | ExErrorKind::MergeConflictsPresent
            | ExErrorKind::ConstraintViolationsPresent => 409,
            ExErrorKind::PreconditionFailed => 412,
            ExErrorKind::Internal => 500,
        }
    }

    /// Whether the caller can succeed by refreshing state and retrying
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            ExErrorKind::StaleHead | ExErrorKind::PreconditionFailed
        )
    }
}

/// Canonical structured error type
///
/// Carries a kind, the failing operation, the branch/table being worked on
/// and a JSON `details` object with the values a caller needs to reconcile
/// (for example both hashes of a stale-head failure).
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    branch: Option<String>,
    table: Option<String>,
    correlation_id: Option<CorrelationId>,
    trace_id: Option<TraceId>,
    message: String,
    details: Map<String, Value>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            branch: None,
            table: None,
            correlation_id: None,
            trace_id: None,
            message: String::new(),
            details: Map::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add branch context
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Add table context
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add one entry to the details object
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Add a remediation hint for the caller
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        self.with_detail("hint", hint.into())
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        self.correlation_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the details object (empty when nothing was attached)
    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    /// Look up a single string detail
    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    /// Render the `{"error": {code, message, details}}` envelope used by
    /// callers that expose the engine over a wire protocol.
    pub fn to_envelope(&self) -> Value {
        let mut body = json!({
            "code": self.code(),
            "message": self.message,
        });
        if !self.details.is_empty() {
            body["details"] = Value::Object(self.details.clone());
        }
        json!({ "error": body })
    }
}

// ---------- Constructors shared by the engine and store adapters ----------

impl ExError {
    /// `INVALID_ARGUMENT` with a message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        ExError::new(ExErrorKind::InvalidArgument).with_message(message)
    }

    /// `NOT_FOUND` with a message
    pub fn not_found(message: impl Into<String>) -> Self {
        ExError::new(ExErrorKind::NotFound).with_message(message)
    }

    /// `INTERNAL` with a message
    pub fn internal(message: impl Into<String>) -> Self {
        ExError::new(ExErrorKind::Internal).with_message(message)
    }

    /// `STALE_HEAD` carrying both hashes so the caller can reconcile
    pub fn stale_head(expected: &str, actual: &str) -> Self {
        ExError::new(ExErrorKind::StaleHead)
            .with_message("expected_head does not match current HEAD")
            .with_detail("expected_head", expected)
            .with_detail("actual_head", actual)
    }

    /// `FORBIDDEN` for a write aimed at the trunk
    pub fn trunk_write(branch: &str) -> Self {
        ExError::new(ExErrorKind::Forbidden)
            .with_branch(branch)
            .with_message("write operations on main branch are forbidden")
            .with_detail("reason", "main_guard")
            .with_detail("branch", branch)
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(branch) = &self.branch {
            write!(f, " (branch: {})", branch)?;
        }
        if let Some(table) = &self.table {
            write!(f, " (table: {})", table)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Rejections raised by the identifier validator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{kind} must not be empty")]
    Empty { kind: String },

    #[error("invalid {kind}: {value}")]
    InvalidIdentifier { kind: String, value: String },

    #[error("invalid {kind}: {value}")]
    InvalidRef { kind: String, value: String },
}

/// Rejections raised by the work-branch / request naming parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamingError {
    #[error("branch name must match wi/<WorkItem>/<Round>: {name}")]
    InvalidWorkBranch { name: String },

    #[error("request_id must match req/<WorkItem>/<Round>: {name}")]
    InvalidRequestId { name: String },

    #[error("round {round} of work item {item} has no successor")]
    RoundExhausted { item: String, round: u8 },
}

impl From<ValidationError> for ExError {
    fn from(err: ValidationError) -> Self {
        ExError::new(ExErrorKind::InvalidArgument)
            .with_op("validate")
            .with_message(err.to_string())
    }
}

impl From<NamingError> for ExError {
    fn from(err: NamingError) -> Self {
        ExError::new(ExErrorKind::InvalidArgument)
            .with_op("parse_name")
            .with_message(err.to_string())
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Internal)
            .with_op("serde_json")
            .with_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_wire_stable() {
        assert_eq!(ExErrorKind::StaleHead.code(), "STALE_HEAD");
        assert_eq!(
            ExErrorKind::ConstraintViolationsPresent.code(),
            "CONSTRAINT_VIOLATIONS_PRESENT"
        );
        assert_eq!(ExErrorKind::Internal.code(), "INTERNAL");
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ExErrorKind::InvalidArgument.http_status(), 400);
        assert_eq!(ExErrorKind::Forbidden.http_status(), 403);
        assert_eq!(ExErrorKind::PreconditionFailed.http_status(), 412);
        assert_eq!(ExErrorKind::MergeConflictsPresent.http_status(), 409);
    }

    #[test]
    fn test_stale_head_carries_both_hashes() {
        let err = ExError::stale_head("abc", "def");
        assert_eq!(err.kind(), ExErrorKind::StaleHead);
        assert_eq!(err.detail_str("expected_head"), Some("abc"));
        assert_eq!(err.detail_str("actual_head"), Some("def"));
        assert!(err.kind().is_concurrency_conflict());
    }

    #[test]
    fn test_display_includes_context() {
        let err = ExError::invalid_argument("bad table")
            .with_op("write_apply")
            .with_table("t-1");
        let text = err.to_string();
        assert!(text.starts_with("[INVALID_ARGUMENT]"));
        assert!(text.contains("write_apply"));
        assert!(text.contains("t-1"));
    }

    #[test]
    fn test_envelope_omits_empty_details() {
        let env = ExError::not_found("row not found").to_envelope();
        assert_eq!(env["error"]["code"], "NOT_FOUND");
        assert!(env["error"].get("details").is_none());

        let env = ExError::trunk_write("main").to_envelope();
        assert_eq!(env["error"]["details"]["reason"], "main_guard");
    }

    #[test]
    fn test_naming_error_maps_to_invalid_argument() {
        let err: ExError = NamingError::InvalidWorkBranch {
            name: "feature/x".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ExErrorKind::InvalidArgument);
        assert!(err.message().contains("feature/x"));
    }
}
