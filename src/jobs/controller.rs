//! The single-slot job controller

use crate::fetch::{CitySource, FederationSource};
use crate::jobs::worker::{self, JobContext};
use crate::jobs::{Control, JobError, JobMode, JobSnapshot, JobState};
use crate::storage::Store;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long `stop()` waits for the worker to honor the request
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// State shared between the controller and the worker task
pub(crate) struct JobShared {
    pub control: Control,
    pub progress: Mutex<JobSnapshot>,
}

/// Everything a worker needs besides the shared state
pub struct JobDeps<S> {
    pub store: Arc<Mutex<S>>,
    pub city: Arc<dyn CitySource>,
    pub federation: Arc<dyn FederationSource>,
    pub settings: JobSettings,
}

impl<S> Clone for JobDeps<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            city: Arc::clone(&self.city),
            federation: Arc::clone(&self.federation),
            settings: self.settings.clone(),
        }
    }
}

/// Discovery tuning knobs, copied out of the configuration
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub empty_streak_threshold: u32,
    pub bootstrap_start: u32,
    pub bootstrap_step: u32,
}

/// Owns the job slot: at most one worker task at a time
///
/// All methods take `&self`; the controller is shared behind an `Arc` between
/// the CLI, the auto-updater and signal handlers.
pub struct JobController<S> {
    shared: Arc<JobShared>,
    deps: JobDeps<S>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Store + Send + 'static> JobController<S> {
    pub fn new(deps: JobDeps<S>) -> Self {
        Self {
            shared: Arc::new(JobShared {
                control: Control::new(),
                progress: Mutex::new(JobSnapshot::default()),
            }),
            deps,
            handle: Mutex::new(None),
        }
    }

    /// Starts a job, failing when one is already running or paused
    ///
    /// The progress snapshot is reset under the same lock that rejects a
    /// concurrent start, so two callers can never both see an idle slot.
    pub fn start(&self, mode: JobMode) -> Result<(), JobError> {
        {
            let mut progress = self.shared.progress.lock().expect("progress lock poisoned");
            if progress.state.is_active() {
                return Err(JobError::AlreadyRunning);
            }
            *progress = JobSnapshot {
                state: JobState::Running,
                mode: Some(mode.clone()),
                started_at: Some(Utc::now()),
                ..JobSnapshot::default()
            };
        }
        self.shared.control.reset();

        info!(?mode, "starting job");
        let context = JobContext {
            store: Arc::clone(&self.deps.store),
            city: Arc::clone(&self.deps.city),
            federation: Arc::clone(&self.deps.federation),
            settings: self.deps.settings.clone(),
            shared: Arc::clone(&self.shared),
        };
        let handle = tokio::spawn(worker::run(context, mode));
        *self.handle.lock().expect("handle lock poisoned") = Some(handle);
        Ok(())
    }

    /// Requests a pause; takes effect at the worker's next item boundary
    pub fn pause(&self) -> Result<(), JobError> {
        let progress = self.shared.progress.lock().expect("progress lock poisoned");
        if !progress.state.is_active() {
            return Err(JobError::NotRunning);
        }
        self.shared.control.pause();
        Ok(())
    }

    pub fn resume(&self) -> Result<(), JobError> {
        let progress = self.shared.progress.lock().expect("progress lock poisoned");
        if !progress.state.is_active() {
            return Err(JobError::NotRunning);
        }
        self.shared.control.resume();
        Ok(())
    }

    /// Cooperative stop with a bounded join
    ///
    /// A worker that does not finish within the bound is left running and
    /// logged; the slot is still marked stopped so a new job can start.
    pub async fn stop(&self) {
        self.shared.control.request_stop();

        let handle = self.handle.lock().expect("handle lock poisoned").take();
        if let Some(handle) = handle {
            match tokio::time::timeout(STOP_JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_error)) => {
                    error!(error = %join_error, "job worker panicked");
                    let mut progress =
                        self.shared.progress.lock().expect("progress lock poisoned");
                    progress.state = JobState::Failed;
                    progress.last_error = Some(join_error.to_string());
                    progress.finished_at = Some(Utc::now());
                }
                Err(_) => {
                    warn!(
                        timeout_secs = STOP_JOIN_TIMEOUT.as_secs(),
                        "job worker did not stop in time; leaking the task"
                    );
                }
            }
        }

        let mut progress = self.shared.progress.lock().expect("progress lock poisoned");
        if !progress.state.is_terminal() {
            progress.state = JobState::Stopped;
            progress.finished_at = Some(Utc::now());
        }
    }

    /// A consistent copy of the current progress
    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.progress.lock().expect("progress lock poisoned").clone()
    }

    pub fn is_active(&self) -> bool {
        self.snapshot().state.is_active()
    }
}
