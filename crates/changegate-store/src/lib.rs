//! changegate store - a branchable, commit-oriented row store on SQLite
//!
//! Provides:
//! - Content-addressed table snapshots and commits
//! - Branches and tags with compare-and-swap publishing
//! - Three-way cell-level merge with conflict bookkeeping
//! - NOT NULL / foreign key verification
//! - `SqliteSessionFactory`, the `SessionFactory` over configured targets

pub mod db;
pub mod errors;
pub mod factory;
pub mod merge;
pub mod migrations;
pub mod objects;
pub mod refs;
pub mod session;
pub mod snapshot;
pub mod values;

pub use errors::Result;
pub use factory::SqliteSessionFactory;
pub use session::SqliteSession;
