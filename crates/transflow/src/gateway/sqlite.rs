//! A job service backed by the local SQLite database.
//!
//! Jobs are created `pending`; something outside the intake flow (an operator,
//! or the `complete` CLI command) later marks them complete or failed.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;

use super::{JobBackend, JobId, JobStatusReport, JobSubmission, RemoteJobStatus};
use crate::db::job_repo::{self, Finished, TranslationJobRow};
use crate::db::{Database, DatabaseError};
use crate::error::BackendError;

#[derive(Clone)]
pub struct SqliteJobBackend {
    db: Database,
}

impl SqliteJobBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Marks a pending job complete. Returns `false` for an unknown job.
    pub fn mark_complete(
        &self,
        id: &JobId,
        project_name: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let found = self.finish(id, RemoteJobStatus::Complete, None, project_name)?;
        if found {
            log::info!("Job {} marked complete", id);
        }
        Ok(found)
    }

    /// Marks a pending job failed. Returns `false` for an unknown job.
    pub fn mark_failed(&self, id: &JobId, reason: &str) -> Result<bool, DatabaseError> {
        let found = self.finish(id, RemoteJobStatus::Failed, Some(reason), None)?;
        if found {
            log::info!("Job {} marked failed: {}", id, reason);
        }
        Ok(found)
    }

    fn finish(
        &self,
        id: &JobId,
        status: RemoteJobStatus,
        error: Option<&str>,
        project_name: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        job_repo::finish(
            &self.db,
            id.as_str(),
            &Finished {
                status: status.as_str(),
                error,
                project_name,
                at: &now,
            },
        )
    }

    pub fn stored_submission(&self, id: &JobId) -> Result<Option<JobSubmission>, DatabaseError> {
        job_repo::find_by_id(&self.db, id.as_str())?
            .map(|row| {
                serde_json::from_str(&row.payload).map_err(|e| DatabaseError::Payload {
                    id: row.id.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn validate(submission: &JobSubmission) -> Result<(), BackendError> {
        if submission.target_languages.is_empty() {
            return Err(BackendError::Rejected(
                "no target languages selected".to_string(),
            ));
        }
        if submission.file_name.trim().is_empty() {
            return Err(BackendError::Rejected("missing file name".to_string()));
        }
        let expected = submission
            .char_count
            .saturating_mul(submission.target_languages.len() as u64);
        if submission.credits_required != expected {
            return Err(BackendError::Rejected(format!(
                "credit total {} does not match {} characters in {} languages",
                submission.credits_required,
                submission.char_count,
                submission.target_languages.len()
            )));
        }
        Ok(())
    }

    fn insert(&self, submission: &JobSubmission) -> Result<JobId, BackendError> {
        Self::validate(submission)?;

        let id = JobId::new(uuid::Uuid::new_v4().to_string());
        let payload = serde_json::to_string(submission)
            .map_err(|e| BackendError::Rejected(format!("unencodable submission: {}", e)))?;
        let now = Utc::now().to_rfc3339();

        let row = TranslationJobRow {
            id: id.as_str().to_string(),
            reference: submission.reference.clone(),
            file_name: submission.file_name.clone(),
            payload,
            status: RemoteJobStatus::Pending.as_str().to_string(),
            project_name: None,
            error: None,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        };

        if !job_repo::insert(&self.db, &row)? {
            return Err(BackendError::Rejected(format!(
                "request {} was already submitted",
                submission.reference
            )));
        }

        Ok(id)
    }

    fn statuses(&self, ids: &[JobId]) -> Result<HashMap<JobId, JobStatusReport>, BackendError> {
        let keys: Vec<&str> = ids.iter().map(JobId::as_str).collect();
        let rows = job_repo::find_many(&self.db, &keys)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let report = JobStatusReport {
                    status: RemoteJobStatus::parse(&row.status),
                    project_name: row.project_name,
                    file_name: Some(row.file_name),
                };
                (JobId::new(row.id), report)
            })
            .collect())
    }
}

#[async_trait]
impl JobBackend for SqliteJobBackend {
    async fn create_translation_job(
        &self,
        submission: &JobSubmission,
    ) -> Result<JobId, BackendError> {
        let backend = self.clone();
        let submission = submission.clone();
        tokio::task::spawn_blocking(move || backend.insert(&submission))
            .await
            .map_err(|e| BackendError::Unavailable(format!("storage task failed: {}", e)))?
    }

    async fn get_job_statuses(
        &self,
        ids: &[JobId],
    ) -> Result<HashMap<JobId, JobStatusReport>, BackendError> {
        let backend = self.clone();
        let ids = ids.to_vec();
        tokio::task::spawn_blocking(move || backend.statuses(&ids))
            .await
            .map_err(|e| BackendError::Unavailable(format!("storage task failed: {}", e)))?
    }
}
