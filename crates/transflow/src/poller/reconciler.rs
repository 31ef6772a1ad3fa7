//! One reconciliation pass: ask the job service about every tracked job and
//! turn completions into notifications.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::gateway::{JobBackend, JobId, RemoteJobStatus};
use crate::notify::{completion_text, Notification, NotificationStore};

#[derive(Debug, Clone)]
struct TrackedJob {
    file_name: String,
    tracked_since: DateTime<Utc>,
}

/// What a pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickReport {
    /// Another pass was still running.
    Skipped,
    /// Nothing was being tracked.
    Idle,
    /// The status lookup failed. Tracking is unchanged.
    Failed(String),
    /// The poller was shut down before or during the pass.
    Stopped,
    Completed(TickOutcome),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Notifications created by this pass.
    pub notified: Vec<Notification>,
    /// Jobs reported complete that had already been notified.
    pub already_notified: Vec<JobId>,
    pub failed: Vec<JobId>,
    pub still_pending: Vec<JobId>,
}

/// Tracks submitted jobs until they complete or fail.
///
/// Passes never overlap: a pass that starts while another is in flight
/// returns [`TickReport::Skipped`] immediately.
pub struct CompletionPoller {
    backend: Arc<dyn JobBackend>,
    store: Arc<NotificationStore>,
    tracked: Mutex<BTreeMap<JobId, TrackedJob>>,
    tick_lock: tokio::sync::Mutex<()>,
    stopped: AtomicBool,
}

impl CompletionPoller {
    pub fn new(backend: Arc<dyn JobBackend>, store: Arc<NotificationStore>) -> Self {
        Self {
            backend,
            store,
            tracked: Mutex::new(BTreeMap::new()),
            tick_lock: tokio::sync::Mutex::new(()),
            stopped: AtomicBool::new(false),
        }
    }

    fn lock_tracked(&self) -> MutexGuard<'_, BTreeMap<JobId, TrackedJob>> {
        match self.tracked.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Poller tracking lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Starts tracking a job. Tracking an already tracked job is a no-op.
    pub fn track(&self, job_id: JobId, file_name: &str) {
        let mut tracked = self.lock_tracked();
        if tracked.contains_key(&job_id) {
            return;
        }
        log::debug!("Tracking job {} ({})", job_id, file_name);
        tracked.insert(
            job_id,
            TrackedJob {
                file_name: file_name.to_string(),
                tracked_since: Utc::now(),
            },
        );
    }

    pub fn untrack(&self, job_id: &JobId) -> bool {
        self.lock_tracked().remove(job_id).is_some()
    }

    pub fn tracked_jobs(&self) -> Vec<JobId> {
        self.lock_tracked().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock_tracked().clear();
    }

    pub fn store(&self) -> &Arc<NotificationStore> {
        &self.store
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stops the poller for good and waits for a pass in flight to finish.
    /// That pass discards its lookup result instead of notifying.
    pub async fn shutdown(&self) {
        self.stopped.store(true, Ordering::Release);
        let _guard = self.tick_lock.lock().await;
        log::debug!("Completion poller stopped");
    }

    /// Runs one pass. Errors are reported, never raised.
    pub async fn tick(&self) -> TickReport {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            log::debug!("Poll tick skipped: previous tick still in flight");
            return TickReport::Skipped;
        };
        if self.is_stopped() {
            return TickReport::Stopped;
        }

        let pending = self.pending_jobs();
        if pending.is_empty() {
            return TickReport::Idle;
        }

        let ids: Vec<JobId> = pending.keys().cloned().collect();
        let span = tracing::debug_span!("poll_tick", jobs = ids.len());
        let statuses = match self.backend.get_job_statuses(&ids).instrument(span).await {
            Ok(statuses) => statuses,
            Err(e) => {
                log::warn!("Status lookup for {} job(s) failed: {}", ids.len(), e);
                return TickReport::Failed(e.to_string());
            }
        };
        if self.is_stopped() {
            log::debug!("Poller stopped during lookup, dropping {} status(es)", statuses.len());
            return TickReport::Stopped;
        }

        let mut outcome = TickOutcome::default();
        for (job_id, job) in pending {
            let Some(report) = statuses.get(&job_id) else {
                outcome.still_pending.push(job_id);
                continue;
            };

            match report.status {
                RemoteJobStatus::Complete => {
                    let file_name = report.file_name.as_deref().unwrap_or(&job.file_name);
                    let (title, message) =
                        completion_text(&job_id, report.project_name.as_deref(), Some(file_name));
                    match self.store.notify_job_complete(&job_id, &title, &message) {
                        Some(notification) => outcome.notified.push(notification),
                        None => outcome.already_notified.push(job_id.clone()),
                    }
                    self.untrack(&job_id);
                }
                RemoteJobStatus::Failed => {
                    self.store.notify_status_change(
                        &job_id,
                        "Translation failed",
                        &format!("The translation of '{}' could not be completed.", job.file_name),
                    );
                    log::warn!("Job {} reported failed", job_id);
                    self.untrack(&job_id);
                    outcome.failed.push(job_id);
                }
                RemoteJobStatus::Pending | RemoteJobStatus::Unknown => {
                    outcome.still_pending.push(job_id);
                }
            }
        }

        if !outcome.notified.is_empty() || !outcome.failed.is_empty() {
            log::info!(
                "Poll tick: {} completed, {} failed, {} pending",
                outcome.notified.len(),
                outcome.failed.len(),
                outcome.still_pending.len()
            );
        }

        TickReport::Completed(outcome)
    }

    /// Tracked jobs that still need a lookup. Jobs that were notified by some
    /// other path are dropped here.
    fn pending_jobs(&self) -> BTreeMap<JobId, TrackedJob> {
        let mut tracked = self.lock_tracked();
        tracked.retain(|job_id, job| {
            let done = self.store.is_notified(job_id);
            if done {
                log::debug!(
                    "Job {} already notified, tracked since {}",
                    job_id,
                    job.tracked_since
                );
            }
            !done
        });
        tracked.clone()
    }
}
