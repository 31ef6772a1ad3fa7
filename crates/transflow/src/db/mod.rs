//! SQLite store behind the local job service.
//!
//! The CLI operator commands and a running session may open the same file at
//! once, so file databases run in WAL mode with a busy timeout.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;

pub use error::DatabaseError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to one connection. Clones use the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the job database at `path`, creating its directory and bringing
    /// the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| DatabaseError::CreateDir {
                dir: dir.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        let db = Self::prepare(conn)?;

        log::info!("Job database at {} ({} journal)", path.display(), mode);
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let version = migrations::run_all(&conn)?;
        log::debug!("Job database schema at v{}", version);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job database lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        f(&self.lock())
    }
}

/// `~/.transflow/data/transflow.db`
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".transflow").join("data").join("transflow.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_jobs(db: &Database) -> u32 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM translation_jobs", [], |r| r.get(0))?)
        })
        .unwrap()
    }

    fn insert_job(db: &Database, id: &str) {
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO translation_jobs
                 (id, reference, file_name, payload, created_at, updated_at)
                 VALUES (?1, ?1, 'a.txt', '{}', '2026-01-01', '2026-01-01')",
                [id],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_open_creates_directory_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.db");
        let db = Database::open(&path).unwrap();

        assert!(path.exists());
        let version = db.with_conn(migrations::schema_version).unwrap();
        assert_eq!(version, 1);
        assert_eq!(count_jobs(&db), 0);
    }

    #[test]
    fn test_two_handles_on_one_file_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");
        let session = Database::open(&path).unwrap();
        let operator = Database::open(&path).unwrap();

        insert_job(&session, "j1");
        assert_eq!(count_jobs(&operator), 1);
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");
        insert_job(&Database::open(&path).unwrap(), "j1");

        assert_eq!(count_jobs(&Database::open(&path).unwrap()), 1);
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with("transflow.db"));
        assert!(path.to_string_lossy().contains(".transflow"));
    }
}
