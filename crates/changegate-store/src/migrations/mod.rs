//! Store bookkeeping schema
//!
//! Migrations are embedded, applied in order inside one transaction each,
//! and recorded with a checksum that is verified every time a store opens.

mod checksums;
mod embedded;
mod runner;

pub use runner::apply_migrations;
