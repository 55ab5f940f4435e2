//! Identifier validator
//!
//! Every user-supplied table, column, branch and ref string passes through
//! here before it reaches a store command.

use crate::errors::{ExError, ValidationError};

/// Name of the trunk branch. Read-only to every write path.
pub const TRUNK_BRANCH: &str = "main";

/// Check a table or column name: `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(kind: &str, value: &str) -> Result<(), ValidationError> {
    let mut chars = value.chars();
    let first = chars.next().ok_or_else(|| ValidationError::Empty {
        kind: kind.to_string(),
    })?;

    let head_ok = first.is_ascii_alphabetic() || first == '_';
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier {
            kind: kind.to_string(),
            value: value.to_string(),
        })
    }
}

/// Check a branch, tag or commit ref: `[A-Za-z0-9._/-]+`
pub fn validate_ref(kind: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty {
            kind: kind.to_string(),
        });
    }
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
    {
        Ok(())
    } else {
        Err(ValidationError::InvalidRef {
            kind: kind.to_string(),
            value: value.to_string(),
        })
    }
}

/// Validate every key of a column/value map
pub fn validate_columns<'a, I>(columns: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a String>,
{
    columns
        .into_iter()
        .try_for_each(|c| validate_identifier("column name", c))
}

pub fn is_trunk(branch: &str) -> bool {
    branch == TRUNK_BRANCH
}

/// Refuse write paths aimed at the trunk
pub fn ensure_writable(branch: &str) -> Result<(), ExError> {
    if is_trunk(branch) {
        Err(ExError::trunk_write(branch))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;

    #[test]
    fn test_identifier_accepts_sql_names() {
        assert!(validate_identifier("table name", "items").is_ok());
        assert!(validate_identifier("table name", "_tmp_2").is_ok());
        assert!(validate_identifier("column name", "Price9").is_ok());
    }

    #[test]
    fn test_identifier_rejects_injection() {
        for bad in ["", "1abc", "a-b", "a b", "items;DROP", "`x`", "ñ"] {
            assert!(
                validate_identifier("table name", bad).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_ref_charset() {
        assert!(validate_ref("branch", "wi/Proj-1/01").is_ok());
        assert!(validate_ref("ref", "a1b2c3").is_ok());
        assert!(validate_ref("branch", "").is_err());
        assert!(validate_ref("branch", "x'; --").is_err());
        assert!(validate_ref("branch", "a b").is_err());
    }

    #[test]
    fn test_ensure_writable() {
        let err = ensure_writable("main").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Forbidden);
        assert!(ensure_writable("wi/A/01").is_ok());
    }
}
