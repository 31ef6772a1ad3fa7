//! Timer-driven polling loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::reconciler::{CompletionPoller, TickReport};

/// Runs [`CompletionPoller::tick`] on a fixed interval until stopped.
pub struct PollScheduler {
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PollScheduler {
    /// Spawns the loop on the current tokio runtime. The first tick runs one
    /// interval after start.
    pub fn start(poller: Arc<CompletionPoller>, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let handle = tokio::spawn({
            let shutdown = Arc::clone(&shutdown);
            let wake = Arc::clone(&wake);
            async move {
                let mut timer = tokio::time::interval(interval);
                timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                timer.tick().await;

                log::info!("Completion polling started (every {:?})", interval);

                loop {
                    tokio::select! {
                        _ = timer.tick() => {},
                        _ = wake.notified() => {},
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }

                    if let TickReport::Failed(reason) = poller.tick().await {
                        log::debug!("Poll tick failed, retrying next interval: {}", reason);
                    }
                }

                log::info!("Completion polling stopped");
            }
        });

        Self {
            shutdown,
            wake,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.load(Ordering::Acquire)
    }

    /// Signals the loop to stop. A tick already in flight finishes first.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::warn!("Polling task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
