//! Branch and tag pointers

use crate::errors::{from_rusqlite, Result};
use changegate_core::errors::ExError;
use changegate_core::model::{BranchInfo, TagInfo};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub fn branch_head(conn: &Connection, name: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT hash FROM branches WHERE name = ?1",
        [name],
        |row| row.get(0),
    )
    .optional()
    .map_err(from_rusqlite)
}

pub fn list_branches(conn: &Connection) -> Result<Vec<BranchInfo>> {
    let mut stmt = conn
        .prepare("SELECT name, hash FROM branches ORDER BY name")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(BranchInfo {
                name: row.get(0)?,
                hash: row.get(1)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

pub fn create_branch(conn: &Connection, name: &str, hash: &str) -> Result<()> {
    if branch_head(conn, name)?.is_some() {
        return Err(ExError::invalid_argument(format!(
            "branch already exists: {}",
            name
        )));
    }
    conn.execute(
        "INSERT INTO branches (name, hash, updated_at) VALUES (?1, ?2, ?3)",
        params![name, hash, Utc::now().timestamp()],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

pub fn delete_branch(conn: &Connection, name: &str) -> Result<()> {
    let n = conn
        .execute("DELETE FROM branches WHERE name = ?1", [name])
        .map_err(from_rusqlite)?;
    if n == 0 {
        return Err(ExError::not_found(format!("branch not found: {}", name)));
    }
    Ok(())
}

/// Move `name` from `expected` to `new` in one statement.
///
/// Fails with `STALE_HEAD` when another writer moved the branch first.
pub fn compare_and_swap(conn: &Connection, name: &str, expected: &str, new: &str) -> Result<()> {
    let n = conn
        .execute(
            "UPDATE branches SET hash = ?1, updated_at = ?2 WHERE name = ?3 AND hash = ?4",
            params![new, Utc::now().timestamp(), name, expected],
        )
        .map_err(from_rusqlite)?;
    if n == 1 {
        return Ok(());
    }
    match branch_head(conn, name)? {
        Some(actual) => Err(ExError::stale_head(expected, &actual).with_branch(name)),
        None => Err(ExError::not_found(format!("branch not found: {}", name))),
    }
}

pub fn find_tag(conn: &Connection, name: &str) -> Result<Option<TagInfo>> {
    conn.query_row(
        "SELECT name, hash, message FROM tags WHERE name = ?1",
        [name],
        |row| {
            Ok(TagInfo {
                name: row.get(0)?,
                hash: row.get(1)?,
                message: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(from_rusqlite)
}

pub fn create_tag(conn: &Connection, name: &str, hash: &str, message: &str) -> Result<()> {
    if find_tag(conn, name)?.is_some() {
        return Err(ExError::invalid_argument(format!(
            "tag already exists: {}",
            name
        )));
    }
    conn.execute(
        "INSERT INTO tags (name, hash, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![name, hash, message, Utc::now().timestamp()],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

pub fn delete_tag(conn: &Connection, name: &str) -> Result<()> {
    let n = conn
        .execute("DELETE FROM tags WHERE name = ?1", [name])
        .map_err(from_rusqlite)?;
    if n == 0 {
        return Err(ExError::not_found(format!("tag not found: {}", name)));
    }
    Ok(())
}

/// Tags starting with `prefix`, ordered by name
pub fn list_tags(conn: &Connection, prefix: &str) -> Result<Vec<TagInfo>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, hash, message FROM tags
             WHERE substr(name, 1, length(?1)) = ?1
             ORDER BY name",
        )
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([prefix], |row| {
            Ok(TagInfo {
                name: row.get(0)?,
                hash: row.get(1)?,
                message: row.get(2)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::apply_migrations;
    use crate::objects::put_tree;
    use crate::snapshot::Snapshot;
    use changegate_core::errors::ExErrorKind;

    fn setup() -> (Connection, String) {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        let digest = put_tree(&conn, &Snapshot::default()).unwrap();
        (conn, digest)
    }

    #[test]
    fn test_compare_and_swap_detects_race() {
        let (conn, h) = setup();
        create_branch(&conn, "wi/A/01", &h).unwrap();
        compare_and_swap(&conn, "wi/A/01", &h, &h).unwrap();

        let err = compare_and_swap(&conn, "wi/A/01", "other", &h).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::StaleHead);
        assert_eq!(err.detail_str("actual_head"), Some(h.as_str()));
    }

    #[test]
    fn test_tag_prefix_listing() {
        let (conn, h) = setup();
        create_tag(&conn, "req/B/01", &h, "{}").unwrap();
        create_tag(&conn, "req/A/01", &h, "{}").unwrap();
        create_tag(&conn, "merged/A/01", &h, "ok").unwrap();

        let names: Vec<_> = list_tags(&conn, "req/")
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["req/A/01", "req/B/01"]);
        assert!(create_tag(&conn, "req/A/01", &h, "").is_err());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let (conn, _) = setup();
        assert_eq!(
            delete_tag(&conn, "x").unwrap_err().kind(),
            ExErrorKind::NotFound
        );
        assert_eq!(
            delete_branch(&conn, "x").unwrap_err().kind(),
            ExErrorKind::NotFound
        );
    }
}
