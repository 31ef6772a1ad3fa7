//! Submission of calculated requests to the external job service.

pub mod http;
pub mod sqlite;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::analysis::FileFormat;
use crate::error::{BackendError, WorkflowError};
use crate::poller::CompletionPoller;
use crate::pricing::Money;
use crate::workflow::TranslationRequest;

pub use http::HttpJobBackend;
pub use sqlite::SqliteJobBackend;

/// Identifier assigned to a submitted job by the job service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Status of a job as reported by the job service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteJobStatus {
    Pending,
    Complete,
    Failed,
    /// Anything the service reports that this client does not know.
    #[serde(other)]
    Unknown,
}

impl RemoteJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteJobStatus::Pending => "pending",
            RemoteJobStatus::Complete => "complete",
            RemoteJobStatus::Failed => "failed",
            RemoteJobStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => RemoteJobStatus::Pending,
            "complete" => RemoteJobStatus::Complete,
            "failed" => RemoteJobStatus::Failed,
            _ => RemoteJobStatus::Unknown,
        }
    }
}

/// One entry of a status lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub status: RemoteJobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl JobStatusReport {
    pub fn new(status: RemoteJobStatus) -> Self {
        Self {
            status,
            project_name: None,
            file_name: None,
        }
    }
}

/// The finalized view of a calculated request sent to the job service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    /// Client-side reference of the originating request.
    pub reference: String,
    pub file_name: String,
    pub file_format: FileFormat,
    pub source_language: String,
    pub subject_matter: String,
    pub target_languages: Vec<String>,
    pub word_count: u64,
    pub char_count: u64,
    pub credits_required: u64,
    pub total_cost: Money,
}

/// The external job service.
#[async_trait]
pub trait JobBackend: Send + Sync {
    async fn create_translation_job(&self, submission: &JobSubmission)
        -> Result<JobId, BackendError>;

    /// Looks up the given jobs. Jobs the service does not mention are simply
    /// absent from the map.
    async fn get_job_statuses(
        &self,
        ids: &[JobId],
    ) -> Result<HashMap<JobId, JobStatusReport>, BackendError>;
}

/// Single enforcement point between calculated requests and the job service.
#[derive(Clone)]
pub struct SubmissionGateway {
    backend: Arc<dyn JobBackend>,
    poller: Arc<CompletionPoller>,
}

impl SubmissionGateway {
    pub fn new(backend: Arc<dyn JobBackend>, poller: Arc<CompletionPoller>) -> Self {
        Self { backend, poller }
    }

    /// Submits a `Calculated` request.
    ///
    /// Anything else fails with `NotCalculated` before the job service is
    /// contacted. A failure from the service leaves the request `Calculated`.
    /// On success the request becomes `Submitted` and the job is tracked by the
    /// completion poller.
    pub async fn submit(&self, request: &mut TranslationRequest) -> Result<JobId, WorkflowError> {
        let submission = request.submission()?;
        let span = tracing::info_span!("submission", reference = %submission.reference);

        let job_id = self
            .backend
            .create_translation_job(&submission)
            .instrument(span)
            .await
            .map_err(|e| {
                log::warn!("Submission of '{}' failed: {}", submission.file_name, e);
                WorkflowError::from(e)
            })?;

        request.mark_submitted(job_id.clone())?;
        self.poller.track(job_id.clone(), &submission.file_name);

        log::info!(
            "Submitted '{}' as job {} ({} credits, {})",
            submission.file_name,
            job_id,
            submission.credits_required,
            submission.total_cost
        );

        Ok(job_id)
    }
}
