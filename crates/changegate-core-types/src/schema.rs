//! Field keys and event names shared by the log macros, the engine
//! dispatchers and the test capture

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_CORRELATION_ID: &str = "correlation_id";
pub const FIELD_ERR_CODE: &str = "err_code";

// Workflow addressing
pub const FIELD_BRANCH: &str = "branch";
pub const FIELD_REQUEST_ID: &str = "request_id";

/// Boundary events; an operation ends with exactly one of `end`/`end_error`
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
