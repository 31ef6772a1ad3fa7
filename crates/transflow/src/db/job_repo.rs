//! Queries over the `translation_jobs` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationJobRow {
    pub id: String,
    pub reference: String,
    pub file_name: String,
    /// The submission as JSON.
    pub payload: String,
    pub status: String,
    pub project_name: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl TranslationJobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            reference: row.get("reference")?,
            file_name: row.get("file_name")?,
            payload: row.get("payload")?,
            status: row.get("status")?,
            project_name: row.get("project_name")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts a job. Returns `false` when a job with the same reference exists.
pub fn insert(db: &Database, job: &TranslationJobRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT INTO translation_jobs (id, reference, file_name, payload, status,
             project_name, error, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(reference) DO NOTHING",
            params![
                job.id,
                job.reference,
                job.file_name,
                job.payload,
                job.status,
                job.project_name,
                job.error,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(inserted == 1)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TranslationJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM translation_jobs WHERE id = ?1",
                params![id],
                TranslationJobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

pub fn find_by_reference(
    db: &Database,
    reference: &str,
) -> Result<Option<TranslationJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM translation_jobs WHERE reference = ?1",
                params![reference],
                TranslationJobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Fetches the given jobs; unknown ids are skipped.
pub fn find_many(db: &Database, ids: &[&str]) -> Result<Vec<TranslationJobRow>, DatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    db.with_conn(|conn| {
        let placeholders = (1..=ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT * FROM translation_jobs WHERE id IN ({}) ORDER BY created_at",
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), TranslationJobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn list_by_status(
    db: &Database,
    status: &str,
) -> Result<Vec<TranslationJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM translation_jobs WHERE status = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(params![status], TranslationJobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Moves a job to a terminal status. Returns `false` for an unknown id.
/// Terminal state written by [`finish`].
#[derive(Debug, Clone, Copy)]
pub struct Finished<'a> {
    pub status: &'a str,
    pub error: Option<&'a str>,
    /// Left untouched when `None`.
    pub project_name: Option<&'a str>,
    pub at: &'a str,
}

/// Moves a job to its terminal state in one statement. Returns `false` for an
/// unknown id.
pub fn finish(db: &Database, id: &str, finished: &Finished<'_>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE translation_jobs
             SET status = ?2, error = ?3, project_name = COALESCE(?4, project_name),
                 updated_at = ?5, completed_at = ?5
             WHERE id = ?1",
            params![
                id,
                finished.status,
                finished.error,
                finished.project_name,
                finished.at
            ],
        )?;
        Ok(updated == 1)
    })
}
