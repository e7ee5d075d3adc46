//! Pipeline execution
//!
//! Failure semantics: per-item errors (one match page, one player profile)
//! are counted on the step and the job continues. A step-level failure (a
//! list page, a storage error) marks the step failed and aborts the job; the
//! remaining steps stay pending.

use crate::fetch::Outcome;
use crate::jobs::worker::{Finished, JobContext};
use crate::jobs::{Gate, JobError};
use crate::pipeline::{StepName, StepProgress, StepStatus};
use crate::resolver::EntityResolver;
use crate::storage::{SeasonRow, Source, Store, Tournament};
use tracing::{info, warn};

pub(crate) async fn run_season<S: Store>(
    ctx: &JobContext<S>,
    number: u32,
    only: Option<StepName>,
    refetch: bool,
) -> crate::Result<Finished> {
    init_steps(ctx, number, only);
    let season = ensure_season(ctx, number).await?;
    run_steps(ctx, &season, only, refetch).await
}

pub(crate) async fn run_seasons<S: Store>(
    ctx: &JobContext<S>,
    first: u32,
    last: u32,
) -> crate::Result<Finished> {
    if first == 0 || first > last {
        return Err(JobError::InvalidRange {
            start: first,
            end: last,
        }
        .into());
    }

    for number in first..=last {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }
        init_steps(ctx, number, None);
        let season = ensure_season(ctx, number).await?;
        if run_steps(ctx, &season, None, false).await? == Finished::Stopped {
            return Ok(Finished::Stopped);
        }
    }
    Ok(Finished::Completed)
}

/// Resets the step list and the current-season marker for one season run
fn init_steps<S: Store>(ctx: &JobContext<S>, number: u32, only: Option<StepName>) {
    ctx.with_progress(|p| {
        p.current_season = Some(number);
        p.steps = StepName::ALL
            .iter()
            .map(|&name| {
                let status = match only {
                    Some(selected) if selected != name => StepStatus::Skipped,
                    _ => StepStatus::Pending,
                };
                StepProgress::new(name, status)
            })
            .collect();
    });
}

/// Looks up or creates the season row, refreshing its display name
///
/// A source probe failure is tolerated when the season is already known
/// locally; for an unknown season there is nothing to fall back on.
async fn ensure_season<S: Store>(ctx: &JobContext<S>, number: u32) -> crate::Result<SeasonRow> {
    let existing = {
        let store = ctx.store.lock().expect("store lock poisoned");
        store.season_by_number(number)?
    };

    match ctx.federation.season_info(number).await {
        Ok(Outcome::Found(info)) => {
            let mut store = ctx.store.lock().expect("store lock poisoned");
            match existing {
                Some(row) => {
                    if row.name != info.name {
                        store.set_season_name(row.id, &info.name)?;
                    }
                    Ok(SeasonRow {
                        name: info.name,
                        ..row
                    })
                }
                None => {
                    let id = store.insert_season(number, &info.name)?;
                    info!(number, name = %info.name, "season registered");
                    Ok(SeasonRow {
                        id,
                        number,
                        name: info.name,
                    })
                }
            }
        }
        Ok(Outcome::NotFound) => match existing {
            Some(row) => Ok(row),
            None => Err(JobError::SeasonNotFound(number).into()),
        },
        Err(err) => match existing {
            Some(row) => {
                warn!(number, error = %err, "season probe failed; using stored season");
                Ok(row)
            }
            None => Err(err.into()),
        },
    }
}

async fn run_steps<S: Store>(
    ctx: &JobContext<S>,
    season: &SeasonRow,
    only: Option<StepName>,
    refetch: bool,
) -> crate::Result<Finished> {
    for step in StepName::ALL {
        if matches!(only, Some(selected) if selected != step) {
            continue;
        }

        update_step(ctx, step, |s| s.status = StepStatus::Running);
        info!(season = season.number, ?step, "pipeline step starting");

        let result = match step {
            StepName::Schedule => run_schedule(ctx, season).await,
            StepName::Teams => run_teams(ctx, season).await,
            StepName::Matches => run_matches(ctx, season, refetch).await,
            StepName::Players => run_players(ctx, season).await,
            StepName::Referees => run_referees(ctx, season).await,
        };

        match result {
            Ok(Finished::Completed) => {
                update_step(ctx, step, |s| s.status = StepStatus::Completed)
            }
            Ok(Finished::Stopped) => return Ok(Finished::Stopped),
            Err(err) => {
                update_step(ctx, step, |s| s.status = StepStatus::Failed);
                return Err(err);
            }
        }
    }
    Ok(Finished::Completed)
}

fn update_step<S: Store>(ctx: &JobContext<S>, name: StepName, f: impl FnOnce(&mut StepProgress)) {
    ctx.with_progress(|p| {
        if let Some(step) = p.step_mut(name) {
            f(step);
        }
    });
}

fn step_item_error<S: Store>(
    ctx: &JobContext<S>,
    step: StepName,
    what: &str,
    err: &dyn std::fmt::Display,
) {
    warn!(?step, item = what, error = %err, "pipeline item failed");
    ctx.with_progress(|p| {
        p.errors += 1;
        p.last_error = Some(format!("{}: {}", what, err));
        if let Some(s) = p.step_mut(step) {
            s.done += 1;
            s.errors += 1;
        }
    });
}

/// Schedule step: one unit per tournament draw
async fn run_schedule<S: Store>(ctx: &JobContext<S>, season: &SeasonRow) -> crate::Result<Finished> {
    update_step(ctx, StepName::Schedule, |s| s.total = Some(2));

    for tournament in [Tournament::Championship, Tournament::Cup] {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }

        let entries = ctx.federation.schedule(season.number, tournament).await?;
        let mut created = 0u64;
        {
            let mut store = ctx.store.lock().expect("store lock poisoned");
            let mut resolver = EntityResolver::new(&mut *store);
            for entry in &entries {
                if resolver.save_schedule_entry(season.id, entry)? {
                    created += 1;
                }
            }
        }
        info!(
            season = season.number,
            ?tournament,
            entries = entries.len(),
            created,
            "schedule draw stored"
        );
        ctx.with_progress(|p| {
            p.new_items += created;
            if let Some(s) = p.step_mut(StepName::Schedule) {
                s.done += 1;
            }
        });
    }
    Ok(Finished::Completed)
}

async fn run_teams<S: Store>(ctx: &JobContext<S>, season: &SeasonRow) -> crate::Result<Finished> {
    let teams = ctx.federation.teams(season.number).await?;
    update_step(ctx, StepName::Teams, |s| s.total = Some(teams.len() as u64));

    for team in &teams {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }
        {
            let mut store = ctx.store.lock().expect("store lock poisoned");
            EntityResolver::new(&mut *store).save_team(Source::Federation, team)?;
        }
        update_step(ctx, StepName::Teams, |s| s.done += 1);
    }
    Ok(Finished::Completed)
}

/// Match detail step; candidates are the season's stored match identifiers
async fn run_matches<S: Store>(
    ctx: &JobContext<S>,
    season: &SeasonRow,
    refetch: bool,
) -> crate::Result<Finished> {
    let candidates = {
        let store = ctx.store.lock().expect("store lock poisoned");
        store.season_match_site_ids(season.id)?
    };
    update_step(ctx, StepName::Matches, |s| {
        s.total = Some(candidates.len() as u64)
    });

    for site_id in candidates {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }

        if !refetch {
            let has_stats = {
                let store = ctx.store.lock().expect("store lock poisoned");
                store.match_has_player_stats(Source::Federation, site_id)?
            };
            if has_stats {
                update_step(ctx, StepName::Matches, |s| s.done += 1);
                continue;
            }
        }

        match ctx.federation.match_detail(season.number, site_id).await {
            Ok(Outcome::Found(detail)) => {
                let created = {
                    let mut store = ctx.store.lock().expect("store lock poisoned");
                    EntityResolver::new(&mut *store).save_match_detail(season.id, site_id, &detail)?
                };
                ctx.with_progress(|p| {
                    if created {
                        p.new_items += 1;
                    }
                    if let Some(s) = p.step_mut(StepName::Matches) {
                        s.done += 1;
                    }
                });
            }
            Ok(Outcome::NotFound) => {
                // Listed in the schedule but gone from the site
                warn!(season = season.number, site_id, "match page missing");
                update_step(ctx, StepName::Matches, |s| s.done += 1);
            }
            Err(err) => {
                step_item_error(ctx, StepName::Matches, &format!("match {}", site_id), &err)
            }
        }
    }
    Ok(Finished::Completed)
}

/// Player step; candidates are players seen in the season's statistics
async fn run_players<S: Store>(ctx: &JobContext<S>, season: &SeasonRow) -> crate::Result<Finished> {
    let candidates = {
        let store = ctx.store.lock().expect("store lock poisoned");
        store.season_player_site_ids(season.id)?
    };
    update_step(ctx, StepName::Players, |s| {
        s.total = Some(candidates.len() as u64)
    });

    for site_id in candidates {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }

        match ctx.federation.player(season.number, site_id).await {
            Ok(Outcome::Found(record)) => {
                {
                    let mut store = ctx.store.lock().expect("store lock poisoned");
                    EntityResolver::new(&mut *store).save_player(Source::Federation, &record)?;
                }
                update_step(ctx, StepName::Players, |s| s.done += 1);
            }
            Ok(Outcome::NotFound) => {
                update_step(ctx, StepName::Players, |s| s.done += 1);
            }
            Err(err) => {
                step_item_error(ctx, StepName::Players, &format!("player {}", site_id), &err)
            }
        }
    }
    Ok(Finished::Completed)
}

async fn run_referees<S: Store>(ctx: &JobContext<S>, season: &SeasonRow) -> crate::Result<Finished> {
    let roster = ctx.federation.referees(season.number).await?;
    update_step(ctx, StepName::Referees, |s| {
        s.total = Some(roster.len() as u64)
    });

    for referee in &roster {
        if ctx.checkpoint().await == Gate::Stop {
            return Ok(Finished::Stopped);
        }
        {
            let mut store = ctx.store.lock().expect("store lock poisoned");
            EntityResolver::new(&mut *store).save_referee(Source::Federation, referee)?;
        }
        update_step(ctx, StepName::Referees, |s| s.done += 1);
    }
    Ok(Finished::Completed)
}
