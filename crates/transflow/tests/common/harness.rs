//! A session wired to scripted collaborators.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use transflow::{
    FileFormat, IntakeSession, JobId, Money, SessionSettings, UploadedFile, WorkflowHandle,
};

use super::fakes::{ScriptedJobBackend, StaticAnalyzer};

pub struct SessionHarness {
    pub session: IntakeSession,
    pub backend: Arc<ScriptedJobBackend>,
}

impl SessionHarness {
    /// Documents of `char_count` characters at 0.01 per credit.
    pub fn new(char_count: u64) -> Self {
        Self::with_analyzer(StaticAnalyzer::with_chars(char_count))
    }

    pub fn with_analyzer(analyzer: StaticAnalyzer) -> Self {
        let backend = Arc::new(ScriptedJobBackend::new());
        let settings = SessionSettings {
            poll_interval: Duration::from_millis(20),
            unit_price: Money::from_micros(10_000),
            supported_formats: FileFormat::RECOGNIZED.to_vec(),
        };
        let session = IntakeSession::new(Arc::new(analyzer), backend.clone(), settings);
        Self { session, backend }
    }

    pub fn document(name: &str) -> UploadedFile {
        UploadedFile::new(name, b"Quarterly results and outlook".to_vec())
    }

    /// Drives a new request to `Calculated`.
    pub async fn calculated(&self, languages: &[&str]) -> WorkflowHandle {
        let handle = self
            .session
            .start_workflow(Self::document("report.docx"))
            .await
            .expect("analysis failed");
        self.session
            .select_languages(handle, languages)
            .await
            .expect("selection failed");
        self.session
            .complete_selection(handle)
            .await
            .expect("calculation failed");
        handle
    }

    /// Drives a new request all the way to `Submitted`.
    pub async fn submitted(&self, languages: &[&str]) -> JobId {
        let handle = self.calculated(languages).await;
        self.session
            .submit_request(handle)
            .await
            .expect("submission failed")
    }
}
