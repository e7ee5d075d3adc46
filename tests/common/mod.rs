//! Scripted fake sources and helpers shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use volleysync::fetch::{
    CitySource, FederationSource, FetchError, FetchResult, MatchDetail, MatchRecord, Outcome,
    PlayerRecord, RefereeRecord, RosterPlayer, RosterRecord, ScheduleEntry, SeasonInfo, StatLine,
    TeamRecord, TeamRef,
};
use volleysync::jobs::{JobController, JobDeps, JobSettings, JobSnapshot};
use volleysync::resolver::EntityResolver;
use volleysync::storage::{MatchStatus, SqliteStore, Tournament};

fn fake_error(what: &str) -> FetchError {
    FetchError::Status {
        url: format!("fake://{}", what),
        status: 500,
    }
}

/// What the fake city archive answers for one identifier; absent means 404
pub enum CityAnswer {
    Found(MatchRecord),
    Error,
}

/// Scripted city source recording every identifier it is asked for
#[derive(Default)]
pub struct FakeCity {
    pub answers: HashMap<u32, CityAnswer>,
    pub rosters: HashMap<u32, RosterRecord>,
    pub delay: Duration,
    calls: Mutex<Vec<u32>>,
    roster_calls: Mutex<Vec<u32>>,
}

impl FakeCity {
    /// Answers `Found` for the given identifiers, 404 elsewhere
    pub fn with_found(ids: &[u32]) -> Self {
        let mut city = Self::default();
        for &id in ids {
            city.answers.insert(id, CityAnswer::Found(match_record(1)));
        }
        city
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn erroring_at(mut self, id: u32) -> Self {
        self.answers.insert(id, CityAnswer::Error);
        self
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    pub fn roster_calls(&self) -> Vec<u32> {
        self.roster_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CitySource for FakeCity {
    async fn fetch_match(&self, site_id: u32) -> FetchResult<Outcome<MatchRecord>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.calls.lock().unwrap().push(site_id);
        match self.answers.get(&site_id) {
            Some(CityAnswer::Found(record)) => Ok(Outcome::Found(record.clone())),
            Some(CityAnswer::Error) => Err(fake_error(&format!("match/{}", site_id))),
            None => Ok(Outcome::NotFound),
        }
    }

    async fn fetch_roster(&self, roster_id: u32) -> FetchResult<Outcome<RosterRecord>> {
        self.roster_calls.lock().unwrap().push(roster_id);
        Ok(match self.rosters.get(&roster_id) {
            Some(record) => Outcome::Found(record.clone()),
            None => Outcome::NotFound,
        })
    }
}

/// Scripted federation source; absent entries answer 404 or an empty list
#[derive(Default)]
pub struct FakeFederation {
    pub seasons: HashMap<u32, String>,
    pub schedules: HashMap<(u32, Tournament), Vec<ScheduleEntry>>,
    pub teams: HashMap<u32, Vec<TeamRecord>>,
    pub teams_error: HashSet<u32>,
    pub details: HashMap<(u32, u32), MatchDetail>,
    pub detail_errors: HashSet<(u32, u32)>,
    pub players: HashMap<(u32, u32), PlayerRecord>,
    pub referees: HashMap<u32, Vec<RefereeRecord>>,
    detail_calls: Mutex<Vec<(u32, u32)>>,
}

impl FakeFederation {
    pub fn detail_calls(&self) -> Vec<(u32, u32)> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FederationSource for FakeFederation {
    async fn season_info(&self, number: u32) -> FetchResult<Outcome<SeasonInfo>> {
        Ok(match self.seasons.get(&number) {
            Some(name) => Outcome::Found(SeasonInfo {
                number,
                name: name.clone(),
            }),
            None => Outcome::NotFound,
        })
    }

    async fn schedule(
        &self,
        number: u32,
        tournament: Tournament,
    ) -> FetchResult<Vec<ScheduleEntry>> {
        Ok(self
            .schedules
            .get(&(number, tournament))
            .cloned()
            .unwrap_or_default())
    }

    async fn teams(&self, number: u32) -> FetchResult<Vec<TeamRecord>> {
        if self.teams_error.contains(&number) {
            return Err(fake_error(&format!("season/{}/teams", number)));
        }
        Ok(self.teams.get(&number).cloned().unwrap_or_default())
    }

    async fn match_detail(&self, number: u32, site_id: u32) -> FetchResult<Outcome<MatchDetail>> {
        self.detail_calls.lock().unwrap().push((number, site_id));
        if self.detail_errors.contains(&(number, site_id)) {
            return Err(fake_error(&format!("season/{}/match/{}", number, site_id)));
        }
        Ok(match self.details.get(&(number, site_id)) {
            Some(detail) => Outcome::Found(detail.clone()),
            None => Outcome::NotFound,
        })
    }

    async fn player(&self, number: u32, site_id: u32) -> FetchResult<Outcome<PlayerRecord>> {
        Ok(match self.players.get(&(number, site_id)) {
            Some(record) => Outcome::Found(record.clone()),
            None => Outcome::NotFound,
        })
    }

    async fn referees(&self, number: u32) -> FetchResult<Vec<RefereeRecord>> {
        Ok(self.referees.get(&number).cloned().unwrap_or_default())
    }
}

/// A minimal played city match with one home team
pub fn match_record(home_site_id: u32) -> MatchRecord {
    MatchRecord {
        status: MatchStatus::Played,
        date_time: None,
        venue: None,
        home_team: TeamRef {
            site_id: home_site_id,
            name: format!("Team {}", home_site_id),
        },
        away_team: None,
        home_score: Some(3),
        away_score: Some(0),
        set_scores: None,
        stats: Vec::new(),
        best_players: Vec::new(),
    }
}

pub fn stat_line(player_site_id: u32, last: &str) -> StatLine {
    StatLine {
        player_site_id,
        last_name: last.to_string(),
        first_name: "Test".to_string(),
        team_site_id: None,
        jersey_number: Some(1),
        points: Some(5),
        attacks: Some(3),
        serves: Some(1),
        blocks: Some(1),
    }
}

pub fn schedule_entry(match_site_id: u32, tournament: Tournament) -> ScheduleEntry {
    ScheduleEntry {
        match_site_id,
        tournament,
        status: MatchStatus::Scheduled,
        date_time: None,
        division_name: None,
        round_name: None,
        home_team: Some(TeamRef {
            site_id: 1,
            name: "Team 1".to_string(),
        }),
        away_team: Some(TeamRef {
            site_id: 2,
            name: "Team 2".to_string(),
        }),
        home_score: None,
        away_score: None,
    }
}

/// A played federation match detail with statistics for the given players
pub fn match_detail(stats_players: &[u32]) -> MatchDetail {
    MatchDetail {
        status: MatchStatus::Played,
        date_time: None,
        venue: None,
        tournament: Some(Tournament::Championship),
        division_name: None,
        round_name: None,
        home_team: Some(TeamRef {
            site_id: 1,
            name: "Team 1".to_string(),
        }),
        away_team: Some(TeamRef {
            site_id: 2,
            name: "Team 2".to_string(),
        }),
        home_score: Some(3),
        away_score: Some(1),
        set_scores: None,
        stats: stats_players
            .iter()
            .map(|&id| stat_line(id, &format!("Player{}", id)))
            .collect(),
        best_players: Vec::new(),
        referees: Vec::new(),
    }
}

/// A roster page for one team listing the given player site ids
pub fn roster_record(team_site_id: u32, player_site_ids: &[u32]) -> RosterRecord {
    RosterRecord {
        team: TeamRef {
            site_id: team_site_id,
            name: format!("Team {}", team_site_id),
        },
        season_label: Some("2023/24".to_string()),
        players: player_site_ids
            .iter()
            .map(|&id| RosterPlayer {
                site_id: id,
                last_name: format!("Player{}", id),
                first_name: "Test".to_string(),
                jersey_number: Some(1),
                height: Some(190),
                position: None,
                photo_url: None,
            })
            .collect(),
    }
}

pub fn player_record(site_id: u32, last: &str) -> PlayerRecord {
    PlayerRecord {
        site_id,
        last_name: last.to_string(),
        first_name: "Test".to_string(),
        birth_date: None,
        height: Some(190),
        weight: None,
        position: None,
        photo_url: None,
    }
}

/// Controller over an in-memory store with test-sized discovery settings
pub fn make_controller(
    city: Arc<dyn CitySource>,
    federation: Arc<dyn FederationSource>,
    empty_streak_threshold: u32,
) -> (Arc<JobController<SqliteStore>>, Arc<Mutex<SqliteStore>>) {
    let store = Arc::new(Mutex::new(SqliteStore::open_in_memory().unwrap()));
    let controller = Arc::new(JobController::new(JobDeps {
        store: Arc::clone(&store),
        city,
        federation,
        settings: JobSettings {
            empty_streak_threshold,
            bootstrap_start: 8,
            bootstrap_step: 4,
        },
    }));
    (controller, store)
}

/// Stores a confirmed city match so the store has a known frontier
pub fn seed_city_match(store: &Arc<Mutex<SqliteStore>>, site_id: u32) {
    let mut store = store.lock().unwrap();
    EntityResolver::new(&mut *store)
        .save_city_match(site_id, &match_record(1))
        .unwrap();
}

/// Polls until the job reaches a terminal state
pub async fn wait_terminal(controller: &JobController<SqliteStore>) -> JobSnapshot {
    for _ in 0..500 {
        let snapshot = controller.snapshot();
        if snapshot.state.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job did not reach a terminal state");
}
