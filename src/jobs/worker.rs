//! Job worker task: owns the fetch/persist loop for city jobs and drives the
//! season pipeline for federation jobs
//!
//! Per-item failures are counted and logged with the identifier; structural
//! failures (storage, candidate queries, a ceiling-search probe) abort the job
//! and land in `last_error`. The store mutex is never held across an await:
//! fetch first, then lock and write.

use crate::discovery::{gap_candidates, CeilingSearch, FrontierScan, Observation, Probe};
use crate::fetch::{CitySource, FederationSource, Outcome};
use crate::jobs::controller::{JobShared, JobSettings};
use crate::jobs::{Gate, JobError, JobMode, JobSnapshot, JobState};
use crate::pipeline;
use crate::resolver::EntityResolver;
use crate::storage::{Source, Store};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// How a job loop ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finished {
    Completed,
    Stopped,
}

/// Everything a running job can reach
pub(crate) struct JobContext<S> {
    pub store: Arc<Mutex<S>>,
    pub city: Arc<dyn CitySource>,
    pub federation: Arc<dyn FederationSource>,
    pub settings: JobSettings,
    pub shared: Arc<JobShared>,
}

impl<S: Store> JobContext<S> {
    pub(crate) fn with_progress<R>(&self, f: impl FnOnce(&mut JobSnapshot) -> R) -> R {
        let mut progress = self.shared.progress.lock().expect("progress lock poisoned");
        f(&mut progress)
    }

    /// The per-item boundary: honors stop, blocks while paused
    ///
    /// The snapshot state flips to `Paused` for the duration of the block so
    /// observers see the pause take effect.
    pub(crate) async fn checkpoint(&self) -> Gate {
        if self.shared.control.is_stop_requested() {
            return Gate::Stop;
        }
        if !self.shared.control.is_paused() {
            return Gate::Continue;
        }

        self.with_progress(|p| p.state = JobState::Paused);
        info!("job paused");
        let gate = self.shared.control.gate().await;
        if gate == Gate::Continue {
            self.with_progress(|p| p.state = JobState::Running);
            info!("job resumed");
        }
        gate
    }

    pub(crate) fn item_done(&self, created: bool) {
        self.with_progress(|p| {
            p.done += 1;
            if created {
                p.new_items += 1;
            }
        });
    }

    pub(crate) fn item_error(&self, what: &str, err: &dyn std::fmt::Display) {
        warn!(item = what, error = %err, "item failed");
        self.with_progress(|p| {
            p.done += 1;
            p.errors += 1;
            p.last_error = Some(format!("{}: {}", what, err));
        });
    }
}

/// Worker entry point; records the terminal state when the loop returns
pub(crate) async fn run<S: Store + Send + 'static>(ctx: JobContext<S>, mode: JobMode) {
    let result = match mode {
        JobMode::FrontierScan => frontier_scan(&ctx).await,
        JobMode::Backfill => backfill(&ctx).await,
        JobMode::Bootstrap => bootstrap(&ctx).await,
        JobMode::Range {
            start,
            end,
            refetch,
        } => range(&ctx, start, end, refetch).await,
        JobMode::Rosters { start, end } => rosters(&ctx, start, end).await,
        JobMode::Season {
            number,
            step,
            refetch,
        } => pipeline::run_season(&ctx, number, step, refetch).await,
        JobMode::Seasons { first, last } => pipeline::run_seasons(&ctx, first, last).await,
    };

    ctx.with_progress(|p| {
        p.finished_at = Some(Utc::now());
        match &result {
            Ok(Finished::Completed) => p.state = JobState::Completed,
            Ok(Finished::Stopped) => p.state = JobState::Stopped,
            Err(err) => {
                p.state = JobState::Failed;
                p.last_error = Some(err.to_string());
            }
        }
    });
    match result {
        Ok(finished) => info!(?finished, "job finished"),
        Err(err) => error!(error = %err, "job failed"),
    }
}

/// Fetches one city identifier and persists the answer
///
/// `cache_empty` decides whether an authoritative "nothing there" is recorded
/// as a sentinel row. Gap passes cache it; frontier scans must not, because a
/// future match can still appear at an identifier past the frontier.
async fn fetch_city_item<S: Store>(
    ctx: &JobContext<S>,
    site_id: u32,
    cache_empty: bool,
) -> crate::Result<Observation> {
    match ctx.city.fetch_match(site_id).await {
        Ok(Outcome::Found(record)) => {
            let created = {
                let mut store = ctx.store.lock().expect("store lock poisoned");
                EntityResolver::new(&mut *store).save_city_match(site_id, &record)?
            };
            ctx.item_done(created);
            Ok(Observation::Found)
        }
        Ok(Outcome::NotFound) => {
            if cache_empty {
                let mut store = ctx.store.lock().expect("store lock poisoned");
                store.insert_empty_match(Source::City, site_id)?;
            }
            ctx.item_done(false);
            Ok(Observation::Empty)
        }
        Err(err) => {
            ctx.item_error(&format!("match {}", site_id), &err);
            Ok(Observation::Error)
        }
    }
}

async fn frontier_scan<S: Store>(ctx: &JobContext<S>) -> crate::Result<Finished> {
    let (start, present) = {
        let store = ctx.store.lock().expect("store lock poisoned");
        (
            store.max_confirmed_site_id(Source::City)?,
            store.match_site_ids(Source::City)?,
        )
    };
    let mut scan = FrontierScan::new(start, ctx.settings.empty_streak_threshold);
    info!(start, threshold = ctx.settings.empty_streak_threshold, "frontier scan starting");

    while let Some(site_id) = scan.next_id() {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }

        let observation = if present.contains(&site_id) {
            ctx.item_done(false);
            Observation::Known
        } else {
            fetch_city_item(ctx, site_id, false).await?
        };
        scan.observe(observation);
        ctx.with_progress(|p| p.last_checked = Some(scan.last_checked()));
    }

    info!(
        found = scan.found(),
        last_checked = scan.last_checked(),
        "frontier scan finished"
    );
    Ok(Finished::Completed)
}

/// Gap pass below `max`: fetches every absent identifier, caching empties
async fn backfill_to<S: Store>(ctx: &JobContext<S>, max: u32) -> crate::Result<Finished> {
    let present = {
        let store = ctx.store.lock().expect("store lock poisoned");
        store.match_site_ids(Source::City)?
    };
    let gaps = gap_candidates(max, &present);
    info!(max, gaps = gaps.len(), "backfill starting");
    ctx.with_progress(|p| p.total = Some(p.done + gaps.len() as u64));

    for site_id in gaps {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }
        fetch_city_item(ctx, site_id, true).await?;
    }
    Ok(Finished::Completed)
}

async fn backfill<S: Store>(ctx: &JobContext<S>) -> crate::Result<Finished> {
    let max = {
        let store = ctx.store.lock().expect("store lock poisoned");
        store.max_confirmed_site_id(Source::City)?
    };
    backfill_to(ctx, max).await
}

async fn bootstrap<S: Store>(ctx: &JobContext<S>) -> crate::Result<Finished> {
    let mut search = CeilingSearch::new(ctx.settings.bootstrap_start, ctx.settings.bootstrap_step);

    let ceiling = loop {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }
        match search.probe() {
            Probe::Check(site_id) => {
                // A probe cannot be skipped on error without corrupting the
                // search bracket, so a fetch failure here fails the job.
                let outcome = ctx.city.fetch_match(site_id).await?;
                if let Outcome::Found(record) = &outcome {
                    let mut store = ctx.store.lock().expect("store lock poisoned");
                    EntityResolver::new(&mut *store).save_city_match(site_id, record)?;
                }
                search.observe(outcome.is_found());
                ctx.item_done(false);
            }
            Probe::Done(ceiling) => break ceiling,
        }
    };

    info!(ceiling, "ceiling search finished");
    ctx.with_progress(|p| p.last_checked = Some(ceiling));
    backfill_to(ctx, ceiling).await
}

async fn range<S: Store>(
    ctx: &JobContext<S>,
    start: u32,
    end: u32,
    refetch: bool,
) -> crate::Result<Finished> {
    if start == 0 || start > end {
        return Err(JobError::InvalidRange { start, end }.into());
    }
    ctx.with_progress(|p| p.total = Some(u64::from(end - start) + 1));

    for site_id in start..=end {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }

        if !refetch {
            let exists = {
                let store = ctx.store.lock().expect("store lock poisoned");
                store.match_exists(Source::City, site_id)?
            };
            if exists {
                ctx.item_done(false);
                continue;
            }
        }
        fetch_city_item(ctx, site_id, true).await?;
    }
    Ok(Finished::Completed)
}

/// Roster pass over a closed page-identifier range
///
/// Roster pages have no negative-result cache: an absent identifier costs one
/// request either way, and pages appear per draw rather than per archive slot.
async fn rosters<S: Store>(ctx: &JobContext<S>, start: u32, end: u32) -> crate::Result<Finished> {
    if start == 0 || start > end {
        return Err(JobError::InvalidRange { start, end }.into());
    }
    ctx.with_progress(|p| p.total = Some(u64::from(end - start) + 1));

    for roster_id in start..=end {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }

        match ctx.city.fetch_roster(roster_id).await {
            Ok(Outcome::Found(record)) => {
                let created = {
                    let mut store = ctx.store.lock().expect("store lock poisoned");
                    EntityResolver::new(&mut *store).save_roster(roster_id, &record)?
                };
                ctx.item_done(created > 0);
            }
            Ok(Outcome::NotFound) => ctx.item_done(false),
            Err(err) => ctx.item_error(&format!("roster {}", roster_id), &err),
        }
    }
    Ok(Finished::Completed)
}
