//! Error helpers for changegate-store
//!
//! Infrastructure failures surface as `INTERNAL`; the engine never needs to
//! look inside them.

use changegate_core::errors::{ExError, ExErrorKind};

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Failure to encode or decode a stored object
pub fn serialization_error(op: &str, err: serde_json::Error) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op(op.to_string())
        .with_message(format!("object serialization failed: {}", err))
}

/// A digest referenced by a ref or commit has no object
pub fn missing_object(digest: &str) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("load_object")
        .with_message(format!("object not found for digest {}", digest))
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
