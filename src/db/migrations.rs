// src/db/migrations.rs
//
// Versioned schema for the application database.
//
// Every script in `MIGRATIONS` is one schema version (index 0 is version 1).
// Pending scripts run in order, each in its own transaction together with
// its `schema_version` row. A database newer than this build is refused.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{AppError, AppResult};

const MIGRATIONS: &[&str] = &[include_str!("../../schema.sql")];

/// Highest version this build knows how to produce.
pub fn latest_schema_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Bring the schema up to [`latest_schema_version`]. Returns the number of
/// migrations applied; calling it on an up-to-date database is a no-op.
pub fn initialize_database(conn: &Connection) -> AppResult<u32> {
    run_migrations(conn, MIGRATIONS)
}

fn run_migrations(conn: &Connection, migrations: &[&str]) -> AppResult<u32> {
    let latest = migrations.len() as u32;
    let current = schema_version(conn)?;

    if current > latest {
        return Err(AppError::Other(format!(
            "database schema version {} is newer than supported {}",
            current, latest
        )));
    }

    for (index, script) in migrations.iter().enumerate().skip(current as usize) {
        let version = index as u32 + 1;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(script).map_err(|e| {
            AppError::Other(format!("migration to version {} failed: {}", version, e))
        })?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            [version],
        )?;
        tx.commit()?;
        log::info!("database schema migrated to version {}", version);
    }

    Ok(latest - current)
}

/// Recorded schema version, 0 for a database that was never initialized.
fn schema_version(conn: &Connection) -> AppResult<u32> {
    let has_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    if !has_table {
        return Ok(0);
    }

    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}
