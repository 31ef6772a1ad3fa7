//! Schema migrations.
//!
//! Applied versions are recorded in `_migrations`. Each pending migration runs
//! in its own transaction together with its bookkeeping row.

use rusqlite::Connection;

use super::error::DatabaseError;

pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "create_translation_jobs_table",
    sql: include_str!("sql/001_create_translation_jobs.sql"),
}];

/// Brings the schema up to date.
pub fn run_all(conn: &Connection) -> Result<u32, DatabaseError> {
    apply(conn, MIGRATIONS)
}

/// Applies the migrations newer than the recorded version, returning the
/// resulting schema version.
pub(crate) fn apply(conn: &Connection, migrations: &[Migration]) -> Result<u32, DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let mut version = schema_version(conn)?;

    for migration in migrations.iter().filter(move |m| m.version > version) {
        log::info!(
            "Applying schema v{} ({})",
            migration.version,
            migration.description
        );

        let failed = |e: rusqlite::Error| DatabaseError::Migration {
            version: migration.version,
            reason: e.to_string(),
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;

        version = migration.version;
    }

    Ok(version)
}

pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}
