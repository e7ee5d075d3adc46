//! Job orchestration
//!
//! One job at a time: the [`JobController`] owns at most one worker task and a
//! shared progress snapshot. Cooperative pause/stop is polled at every
//! per-item boundary, so a signal is honored within one item's worth of work
//! and the store is never left mid-write.

mod control;
mod controller;
pub(crate) mod worker;

pub use control::{Control, Gate};
pub use controller::{JobController, JobDeps, JobSettings};

use crate::pipeline::{StepName, StepProgress};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors from the job surface
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("A job is already running")]
    AlreadyRunning,

    #[error("No job is running")]
    NotRunning,

    #[error("Invalid identifier range {start}..={end}")]
    InvalidRange { start: u32, end: u32 },

    #[error("Season {0} does not exist at the source")]
    SeasonNotFound(u32),
}

/// Lifecycle state of the single job slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
    Failed,
}

impl JobState {
    /// Running or paused: a worker task exists
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }
}

/// What kind of work a job performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobMode {
    /// Scan past the greatest confirmed identifier until the empty streak
    /// threshold is reached
    FrontierScan,
    /// Fetch every identifier gap below the greatest confirmed identifier,
    /// recording empty sentinels
    Backfill,
    /// First-run ceiling search followed by a full backfill
    Bootstrap,
    /// Re-parse a closed identifier range
    Range { start: u32, end: u32, refetch: bool },
    /// Parse roster pages over a closed identifier range
    Rosters { start: u32, end: u32 },
    /// Full pipeline for one season, optionally restricted to one step
    Season {
        number: u32,
        step: Option<StepName>,
        refetch: bool,
    },
    /// Pipeline over an inclusive span of seasons
    Seasons { first: u32, last: u32 },
}

/// A torn-read-safe copy of the job's progress
///
/// Cloned under the progress mutex; every field belongs to the same instant.
#[derive(Debug, Clone, Serialize, Default)]
pub struct JobSnapshot {
    pub state: JobState,
    pub mode: Option<JobMode>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Known item count; `None` while the total is open-ended
    pub total: Option<u64>,
    /// Items processed, including errored ones
    pub done: u64,
    /// Rows newly created by this job
    pub new_items: u64,
    pub errors: u64,
    pub last_error: Option<String>,
    /// Greatest identifier probed by a frontier scan
    pub last_checked: Option<u32>,
    /// Season currently being processed by a pipeline job
    pub current_season: Option<u32>,
    /// Per-step progress for pipeline jobs, in execution order
    pub steps: Vec<StepProgress>,
}

impl JobSnapshot {
    pub(crate) fn step_mut(&mut self, name: StepName) -> Option<&mut StepProgress> {
        self.steps.iter_mut().find(|step| step.name == name)
    }
}
