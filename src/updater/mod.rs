//! Background auto-updater
//!
//! After a warm-up delay the updater runs a cycle on a fixed interval: a city
//! frontier scan, a refresh of the newest known federation season, and a
//! probe of the following season number for new-season detection. Cycle
//! failures are logged and the loop keeps going; only an explicit stop ends
//! it.

use crate::fetch::{FederationSource, Outcome};
use crate::jobs::{Control, JobController, JobError, JobMode, JobSnapshot};
use crate::storage::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

const JOB_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct UpdaterSettings {
    pub warmup: Duration,
    pub interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdaterState {
    /// Warm-up delay or between cycles
    #[default]
    Waiting,
    Checking,
    Stopped,
}

/// Status surface of the updater loop
#[derive(Debug, Clone, Serialize, Default)]
pub struct UpdaterStatus {
    pub state: UpdaterState,
    pub last_run: Option<DateTime<Utc>>,
    pub last_city_result: Option<String>,
    pub last_federation_result: Option<String>,
}

/// The background update loop
///
/// Shares the job controller with the CLI: when a foreground job occupies the
/// slot, the cycle is skipped rather than queued.
pub struct AutoUpdater<S> {
    controller: Arc<JobController<S>>,
    federation: Arc<dyn FederationSource>,
    store: Arc<Mutex<S>>,
    settings: UpdaterSettings,
    control: Control,
    status: Mutex<UpdaterStatus>,
}

impl<S: Store + Send + 'static> AutoUpdater<S> {
    pub fn new(
        controller: Arc<JobController<S>>,
        federation: Arc<dyn FederationSource>,
        store: Arc<Mutex<S>>,
        settings: UpdaterSettings,
    ) -> Self {
        Self {
            controller,
            federation,
            store,
            settings,
            control: Control::new(),
            status: Mutex::new(UpdaterStatus::default()),
        }
    }

    pub fn status(&self) -> UpdaterStatus {
        self.status.lock().expect("status lock poisoned").clone()
    }

    /// Requests the loop to end; a running cycle stops at the next boundary
    pub fn request_stop(&self) {
        self.control.request_stop();
    }

    fn with_status(&self, f: impl FnOnce(&mut UpdaterStatus)) {
        let mut status = self.status.lock().expect("status lock poisoned");
        f(&mut status);
    }

    /// Sleeps unless a stop arrives first; returns false on stop
    async fn sleep_or_stop(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.control.stopped() => false,
        }
    }

    pub async fn run(&self) {
        info!(
            warmup_secs = self.settings.warmup.as_secs(),
            interval_secs = self.settings.interval.as_secs(),
            "auto-updater starting"
        );

        if self.sleep_or_stop(self.settings.warmup).await {
            loop {
                if self.control.is_stop_requested() {
                    break;
                }

                self.with_status(|s| s.state = UpdaterState::Checking);
                if let Err(err) = self.cycle().await {
                    warn!(error = %err, "update cycle failed");
                }
                self.with_status(|s| {
                    s.last_run = Some(Utc::now());
                    s.state = UpdaterState::Waiting;
                });

                if !self.sleep_or_stop(self.settings.interval).await {
                    break;
                }
            }
        }

        self.with_status(|s| s.state = UpdaterState::Stopped);
        info!("auto-updater stopped");
    }

    async fn cycle(&self) -> crate::Result<()> {
        // City side: scan past the frontier
        match self.controller.start(JobMode::FrontierScan) {
            Ok(()) => {
                let snapshot = self.wait_for_job().await;
                self.with_status(|s| s.last_city_result = Some(describe_city(&snapshot)));
            }
            Err(JobError::AlreadyRunning) => {
                info!("job slot busy; skipping update cycle");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
        if self.control.is_stop_requested() {
            return Ok(());
        }

        // Federation side: refresh the newest known season
        let newest = {
            let store = self.store.lock().expect("store lock poisoned");
            store.max_season_number()?
        };
        let Some(current) = newest else {
            self.with_status(|s| {
                s.last_federation_result =
                    Some("no seasons known yet; run a season job first".to_string())
            });
            return Ok(());
        };
        self.run_season_job(current).await?;
        if self.control.is_stop_requested() {
            return Ok(());
        }

        // New-season probe: the site answers for any number with a fallback
        // page carrying the current season's name, so inequality is the signal
        let current_name = {
            let store = self.store.lock().expect("store lock poisoned");
            store.season_by_number(current)?.map(|row| row.name)
        }
        .unwrap_or_default();

        match self.federation.season_info(current + 1).await {
            Ok(Outcome::Found(info)) if !info.name.is_empty() && info.name != current_name => {
                info!(number = current + 1, name = %info.name, "new season detected");
                self.run_season_job(current + 1).await?;
            }
            Ok(_) => {}
            Err(err) => {
                // No new season this cycle; not a cycle failure
                warn!(error = %err, "new-season probe failed");
            }
        }
        Ok(())
    }

    async fn run_season_job(&self, number: u32) -> crate::Result<()> {
        match self.controller.start(JobMode::Season {
            number,
            step: None,
            refetch: false,
        }) {
            Ok(()) => {
                let snapshot = self.wait_for_job().await;
                self.with_status(|s| {
                    s.last_federation_result = Some(describe_season(number, &snapshot))
                });
                Ok(())
            }
            Err(JobError::AlreadyRunning) => {
                info!(number, "job slot busy; skipping season refresh");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Polls the controller until its job reaches a terminal state; an
    /// updater stop request is forwarded as a job stop
    async fn wait_for_job(&self) -> JobSnapshot {
        loop {
            if self.control.is_stop_requested() {
                self.controller.stop().await;
                return self.controller.snapshot();
            }
            let snapshot = self.controller.snapshot();
            if !snapshot.state.is_active() {
                return snapshot;
            }
            tokio::time::sleep(JOB_POLL_INTERVAL).await;
        }
    }
}

fn describe_city(snapshot: &JobSnapshot) -> String {
    format!(
        "+{} matches (checked up to {}, {} errors)",
        snapshot.new_items,
        snapshot.last_checked.unwrap_or(0),
        snapshot.errors
    )
}

fn describe_season(number: u32, snapshot: &JobSnapshot) -> String {
    format!(
        "season {}: +{} new, {} errors ({:?})",
        number,
        snapshot.new_items,
        snapshot.errors,
        snapshot.state
    )
    .to_lowercase()
}
