use crate::errors::{from_rusqlite, migration_error, Result};
use crate::migrations::checksums::compute_checksum;
use crate::migrations::embedded::{Migration, MIGRATIONS};
use rusqlite::Connection;
use std::collections::HashMap;

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS store_migrations (
    migration_id TEXT PRIMARY KEY,
    checksum TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Bring a store database up to date. Fails without applying anything when
/// a recorded migration no longer matches its embedded SQL.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute(LEDGER_DDL, []).map_err(from_rusqlite)?;
    let recorded = recorded_checksums(conn)?;

    for migration in MIGRATIONS {
        if let Some(existing) = recorded.get(migration.id) {
            let embedded = compute_checksum(migration.sql);
            if *existing != embedded {
                return Err(migration_error(
                    migration.id,
                    &format!("checksum mismatch: recorded {}, embedded {}", existing, embedded),
                ));
            }
        }
    }

    MIGRATIONS
        .iter()
        .filter(|m| !recorded.contains_key(m.id))
        .try_for_each(|m| apply_one(conn, m))
}

fn recorded_checksums(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn
        .prepare("SELECT migration_id, checksum FROM store_migrations")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(from_rusqlite)?;
    rows.collect::<rusqlite::Result<_>>().map_err(from_rusqlite)
}

fn apply_one(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO store_migrations (migration_id, checksum, applied_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![
            migration.id,
            compute_checksum(migration.sql),
            chrono::Utc::now().to_rfc3339()
        ],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)?;

    tracing::debug!(migration_id = migration.id, "applied store migration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_len(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM store_migrations", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_database_records_every_migration() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        assert_eq!(ledger_len(&conn), MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_reopen_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        apply_migrations(&mut conn).unwrap();
        assert_eq!(ledger_len(&conn), MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_edited_migration_is_refused() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn.execute("UPDATE store_migrations SET checksum = 'deadbeef'", [])
            .unwrap();

        let err = apply_migrations(&mut conn).unwrap_err();
        assert!(err.message().contains("checksum mismatch"));
    }
}
