//! In-memory stand-ins for the external analysis and job services.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use transflow::{
    AnalysisError, BackendError, DocumentAnalysis, DocumentAnalyzer, JobBackend, JobId,
    JobStatusReport, JobSubmission, RemoteJobStatus, UploadedFile,
};

/// Reports the same counts for every file.
pub struct StaticAnalyzer {
    pub char_count: u64,
    pub word_count: u64,
    pub unavailable: bool,
}

impl StaticAnalyzer {
    pub fn with_chars(char_count: u64) -> Self {
        Self {
            char_count,
            word_count: char_count / 6,
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            char_count: 0,
            word_count: 0,
            unavailable: true,
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for StaticAnalyzer {
    async fn analyze(&self, file: &UploadedFile) -> Result<DocumentAnalysis, AnalysisError> {
        if self.unavailable {
            return Err(AnalysisError::Unreachable("connection refused".to_string()));
        }
        Ok(DocumentAnalysis {
            file_name: file.file_name.clone(),
            file_format: file.format(),
            file_size_bytes: file.bytes.len() as u64,
            word_count: self.word_count,
            char_count: self.char_count,
            images_with_text: 0,
            source_language: "English".to_string(),
            subject_matter: "General".to_string(),
        })
    }
}

/// A job service whose answers are set by the test.
///
/// Created jobs get ids `1`, `2`, ... . Status lookups answer from `statuses`
/// (jobs without an entry are omitted) unless a scripted failure is queued.
#[derive(Default)]
pub struct ScriptedJobBackend {
    next_id: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    rejection: Mutex<Option<String>>,
    statuses: Mutex<HashMap<JobId, JobStatusReport>>,
    lookup_failures: Mutex<VecDeque<BackendError>>,
    submissions: Mutex<Vec<JobSubmission>>,
    lookup_gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedJobBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_next_with(&self, reason: &str) {
        *self.rejection.lock().unwrap() = Some(reason.to_string());
    }

    pub fn set_status(&self, id: &str, status: RemoteJobStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(JobId::new(id), JobStatusReport::new(status));
    }

    pub fn complete_with_project(&self, id: &str, project_name: &str) {
        self.statuses.lock().unwrap().insert(
            JobId::new(id),
            JobStatusReport {
                status: RemoteJobStatus::Complete,
                project_name: Some(project_name.to_string()),
                file_name: None,
            },
        );
    }

    pub fn fail_next_lookup(&self, error: BackendError) {
        self.lookup_failures.lock().unwrap().push_back(error);
    }

    /// Makes every later status lookup wait until `gate` is notified.
    pub fn hold_lookups(&self, gate: Arc<Notify>) {
        *self.lookup_gate.lock().unwrap() = Some(gate);
    }

    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobBackend for ScriptedJobBackend {
    async fn create_translation_job(
        &self,
        submission: &JobSubmission,
    ) -> Result<JobId, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.rejection.lock().unwrap().take() {
            return Err(BackendError::Rejected(reason));
        }
        self.submissions.lock().unwrap().push(submission.clone());
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(JobId::new(id.to_string()))
    }

    async fn get_job_statuses(
        &self,
        ids: &[JobId],
    ) -> Result<HashMap<JobId, JobStatusReport>, BackendError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.lookup_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(error) = self.lookup_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let statuses = self.statuses.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| statuses.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }
}
