//! Command orchestration layer.
//!
//! One module per workflow component. `engine_command` dispatches the
//! mutating operations and `engine_query` the reads; both own the logging
//! boundary.

pub mod browse;
pub mod common;
pub mod conflict;
pub mod engine_command;
pub mod engine_query;
pub mod history;
pub mod preview;
pub mod request;
pub mod request_store;
pub mod sync;
pub mod write;
