//! changegate core - shared vocabulary of the change-workflow engine
//!
//! - Structured error facility (`ExError`, `ExErrorKind`)
//! - Logging facility with test capture
//! - Identifier validator and work-branch/request naming
//! - Row, conflict, request, diff and history models
//! - The versioned store capability (`SessionFactory`, `StoreSession`)
//! - YAML configuration

pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod naming;
pub mod store;
pub mod validation;

pub use config::EngineConfig;
pub use errors::{ExError, ExErrorKind, Result};
pub use naming::{RequestId, WorkBranch};
pub use store::{MergeOptions, MergeOutcome, SessionFactory, StoreSession};
