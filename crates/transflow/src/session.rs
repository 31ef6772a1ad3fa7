//! One user's intake session.
//!
//! Owns every request the user is working on, the completion poller and the
//! notification store. Nothing here is shared between sessions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::analysis::{
    DocumentAnalyzer, FileAnalysisAdapter, FileFormat, HttpAnalyzer, LocalAnalyzer, UploadedFile,
};
use crate::config::Config;
use crate::error::{ConfigError, TransflowError, WorkflowError};
use crate::gateway::{HttpJobBackend, JobBackend, JobId, SqliteJobBackend, SubmissionGateway};
use crate::notify::{Notification, NotificationId, NotificationStore, NotificationSubscription};
use crate::poller::{CompletionPoller, PollScheduler, TickReport};
use crate::pricing::{CalculationSummary, CostCalculator, Money};
use crate::workflow::{TranslationRequest, WorkflowHandle};

type SharedRequest = Arc<tokio::sync::Mutex<TranslationRequest>>;

/// The tunable parts of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub unit_price: Money,
    pub supported_formats: Vec<FileFormat>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            unit_price: Money::from_micros(10_000),
            supported_formats: FileFormat::RECOGNIZED.to_vec(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            poll_interval: config.poll_interval(),
            unit_price: config.unit_price()?,
            supported_formats: config.formats()?,
        })
    }
}

pub struct IntakeSession {
    adapter: FileAnalysisAdapter,
    calculator: CostCalculator,
    gateway: SubmissionGateway,
    poller: Arc<CompletionPoller>,
    store: Arc<NotificationStore>,
    workflows: Mutex<HashMap<WorkflowHandle, SharedRequest>>,
    scheduler: Mutex<Option<PollScheduler>>,
    poll_interval: Duration,
    ended: AtomicBool,
}

impl IntakeSession {
    pub fn new(
        analyzer: Arc<dyn DocumentAnalyzer>,
        backend: Arc<dyn JobBackend>,
        settings: SessionSettings,
    ) -> Self {
        let store = Arc::new(NotificationStore::new());
        let poller = Arc::new(CompletionPoller::new(backend.clone(), store.clone()));

        Self {
            adapter: FileAnalysisAdapter::new(analyzer, &settings.supported_formats),
            calculator: CostCalculator::new(settings.unit_price),
            gateway: SubmissionGateway::new(backend, poller.clone()),
            poller,
            store,
            workflows: Mutex::new(HashMap::new()),
            scheduler: Mutex::new(None),
            poll_interval: settings.poll_interval,
            ended: AtomicBool::new(false),
        }
    }

    /// Wires collaborators from configuration: remote services when their
    /// endpoints are set, the in-process analyzer and the SQLite job store
    /// otherwise.
    pub fn from_config(config: &Config) -> Result<Self, TransflowError> {
        let settings = SessionSettings::from_config(config)?;

        let analyzer: Arc<dyn DocumentAnalyzer> = match &config.analysis_endpoint {
            Some(endpoint) => Arc::new(HttpAnalyzer::new(endpoint.as_str())),
            None => Arc::new(LocalAnalyzer::new()),
        };

        let backend: Arc<dyn JobBackend> = match &config.jobs_endpoint {
            Some(endpoint) => Arc::new(HttpJobBackend::new(endpoint.as_str())),
            None => {
                let path = config
                    .resolved_database_path()
                    .ok_or_else(|| ConfigError::Validation {
                        message: "No home directory found; set database_path".to_string(),
                    })?;
                Arc::new(SqliteJobBackend::open(&path)?)
            }
        };

        Ok(Self::new(analyzer, backend, settings))
    }

    fn ensure_active(&self) -> Result<(), WorkflowError> {
        if self.ended.load(Ordering::Acquire) {
            Err(WorkflowError::SessionEnded)
        } else {
            Ok(())
        }
    }

    fn lock_workflows(&self) -> MutexGuard<'_, HashMap<WorkflowHandle, SharedRequest>> {
        match self.workflows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Session workflow lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn workflow(&self, handle: WorkflowHandle) -> Result<SharedRequest, WorkflowError> {
        self.ensure_active()?;
        self.lock_workflows()
            .get(&handle)
            .cloned()
            .ok_or(WorkflowError::UnknownWorkflow(handle))
    }

    /// Analyzes `file` and opens a new request for it in `Analyzed`.
    ///
    /// If the session ends while the analysis is running, its result is
    /// dropped.
    pub async fn start_workflow(
        &self,
        file: UploadedFile,
    ) -> Result<WorkflowHandle, WorkflowError> {
        self.ensure_active()?;

        let analysis = self.adapter.analyze(&file).await?;

        let mut request = TranslationRequest::new();
        request.attach_analysis(analysis)?;
        let handle = request.handle();

        self.ensure_active()?;
        self.lock_workflows()
            .insert(handle, Arc::new(tokio::sync::Mutex::new(request)));

        log::info!("Workflow {} started for '{}'", handle, file.file_name);
        Ok(handle)
    }

    pub async fn select_languages<I, S>(
        &self,
        handle: WorkflowHandle,
        languages: I,
    ) -> Result<(), WorkflowError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let shared = self.workflow(handle)?;
        let mut request = shared.lock().await;
        request.select_languages(languages)
    }

    pub async fn complete_selection(
        &self,
        handle: WorkflowHandle,
    ) -> Result<CalculationSummary, WorkflowError> {
        let shared = self.workflow(handle)?;
        let mut request = shared.lock().await;
        request.complete_selection(&self.calculator)
    }

    pub async fn edit_selection(&self, handle: WorkflowHandle) -> Result<(), WorkflowError> {
        let shared = self.workflow(handle)?;
        let mut request = shared.lock().await;
        request.edit_selection()
    }

    pub async fn submit_request(&self, handle: WorkflowHandle) -> Result<JobId, WorkflowError> {
        let shared = self.workflow(handle)?;
        let mut request = shared.lock().await;
        let job_id = self.gateway.submit(&mut request).await?;

        if self.ensure_active().is_err() {
            self.poller.untrack(&job_id);
            return Err(WorkflowError::SessionEnded);
        }

        Ok(job_id)
    }

    /// A copy of the request as it is now.
    pub async fn request(
        &self,
        handle: WorkflowHandle,
    ) -> Result<TranslationRequest, WorkflowError> {
        let shared = self.workflow(handle)?;
        let request = shared.lock().await;
        Ok(request.clone())
    }

    /// Forgets a request. A call already running against it finishes on its
    /// own copy. Returns `false` for an unknown handle.
    pub fn discard_workflow(&self, handle: WorkflowHandle) -> bool {
        let removed = self.lock_workflows().remove(&handle).is_some();
        if removed {
            log::debug!("Workflow {} discarded", handle);
        }
        removed
    }

    pub fn workflows(&self) -> Vec<WorkflowHandle> {
        self.lock_workflows().keys().copied().collect()
    }

    pub fn subscribe_notifications(&self) -> Result<NotificationSubscription, WorkflowError> {
        self.ensure_active()?;
        Ok(self.store.subscribe())
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.store.snapshot()
    }

    pub fn mark_notification_read(&self, id: NotificationId) -> Result<bool, WorkflowError> {
        self.ensure_active()?;
        Ok(self.store.mark_as_read(id))
    }

    pub fn mark_all_notifications_read(&self) -> Result<usize, WorkflowError> {
        self.ensure_active()?;
        Ok(self.store.mark_all_as_read())
    }

    pub fn unread_count(&self) -> usize {
        self.store.unread_count()
    }

    /// Dismisses the feed without forgetting which jobs were notified.
    pub fn clear_notifications(&self) -> Result<(), WorkflowError> {
        self.ensure_active()?;
        self.store.clear();
        Ok(())
    }

    pub fn tracked_jobs(&self) -> Vec<JobId> {
        self.poller.tracked_jobs()
    }

    /// Starts the background polling loop. Must be called from within a tokio
    /// runtime. Calling it again while the loop runs does nothing.
    pub fn start_polling(&self) -> Result<(), WorkflowError> {
        self.ensure_active()?;
        let mut scheduler = match self.scheduler.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if scheduler.is_none() {
            *scheduler = Some(PollScheduler::start(self.poller.clone(), self.poll_interval));
        }
        Ok(())
    }

    /// Runs one reconciliation pass right away.
    pub async fn poll_now(&self) -> Result<TickReport, WorkflowError> {
        self.ensure_active()?;
        Ok(self.poller.tick().await)
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Ends the session: stops polling, waits for a poll already in flight,
    /// drops every request and resets the notification store. Later calls
    /// fail with `SessionEnded`.
    pub async fn end(&self) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }

        let scheduler = match self.scheduler.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
        self.poller.shutdown().await;

        self.lock_workflows().clear();
        self.poller.clear();
        self.store.reset();

        log::info!("Session ended");
    }
}
