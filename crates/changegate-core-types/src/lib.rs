//! Core types shared across changegate facilities
//!
//! - **Correlation types**: CorrelationId, TraceId, SpanId, OperationContext
//! - **Schema constants**: Canonical field keys and event names for structured logs

pub mod correlation;
pub mod schema;

pub use correlation::{CorrelationId, OperationContext, SpanId, TraceId};
