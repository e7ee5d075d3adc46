//! Season pipeline
//!
//! A federation season is synchronized by five ordered steps:
//! schedule, teams, matches, players, referees. Later steps derive their
//! candidates from what earlier steps stored, so a single-step run works
//! against whatever is already in the database.

mod runner;

pub(crate) use runner::{run_season, run_seasons};

use serde::Serialize;

/// The pipeline steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StepName {
    Schedule,
    Teams,
    Matches,
    Players,
    Referees,
}

impl StepName {
    /// Execution order
    pub const ALL: [StepName; 5] = [
        StepName::Schedule,
        StepName::Teams,
        StepName::Matches,
        StepName::Players,
        StepName::Referees,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Not selected for this run
    Skipped,
}

/// Progress of one pipeline step
#[derive(Debug, Clone, Serialize)]
pub struct StepProgress {
    pub name: StepName,
    pub status: StepStatus,
    /// Known once the step's candidate set is determined
    pub total: Option<u64>,
    pub done: u64,
    pub errors: u64,
}

impl StepProgress {
    pub(crate) fn new(name: StepName, status: StepStatus) -> Self {
        Self {
            name,
            status,
            total: None,
            done: 0,
            errors: 0,
        }
    }
}
