//! The job service over HTTP.
//!
//! `POST {endpoint}/jobs` takes a [`JobSubmission`] and answers `{"jobId": ...}`.
//! `POST {endpoint}/jobs/status` takes `{"jobIds": [...]}` and answers
//! `{"jobs": [{"jobId", "status", "projectName"?, "fileName"?}]}`.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{JobBackend, JobId, JobStatusReport, JobSubmission, RemoteJobStatus};
use crate::error::BackendError;

pub struct HttpJobBackend {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedJob {
    #[serde(alias = "id")]
    job_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusQuery<'a> {
    job_ids: &'a [JobId],
}

#[derive(Deserialize)]
struct StatusPage {
    #[serde(default)]
    jobs: Vec<StatusEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusEntry {
    job_id: JobId,
    status: RemoteJobStatus,
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

impl HttpJobBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        route: &str,
        body: &B,
    ) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .post(format!("{}{}", self.endpoint, route))
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let reason = serde_json::from_slice::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());

        // Client errors describe the request itself and are not worth retrying.
        match status {
            StatusCode::BAD_REQUEST
            | StatusCode::CONFLICT
            | StatusCode::UNPROCESSABLE_ENTITY => Err(BackendError::Rejected(reason)),
            _ => Err(BackendError::Unavailable(format!(
                "job service returned {}: {}",
                status, reason
            ))),
        }
    }
}

#[async_trait]
impl JobBackend for HttpJobBackend {
    async fn create_translation_job(
        &self,
        submission: &JobSubmission,
    ) -> Result<JobId, BackendError> {
        let body = self.post("/jobs", submission).await?;
        let created: CreatedJob =
            serde_json::from_slice(&body).map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(JobId::new(created.job_id))
    }

    async fn get_job_statuses(
        &self,
        ids: &[JobId],
    ) -> Result<HashMap<JobId, JobStatusReport>, BackendError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let body = self.post("/jobs/status", &StatusQuery { job_ids: ids }).await?;
        let page: StatusPage =
            serde_json::from_slice(&body).map_err(|e| BackendError::Malformed(e.to_string()))?;

        Ok(page
            .jobs
            .into_iter()
            .map(|entry| {
                let report = JobStatusReport {
                    status: entry.status,
                    project_name: entry.project_name,
                    file_name: entry.file_name,
                };
                (entry.job_id, report)
            })
            .collect())
    }
}
