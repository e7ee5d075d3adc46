//! Parsed page contents exchanged between sources and the resolver
//!
//! These are transport-free value types: a source implementation produces
//! them, the entity resolver turns them into storage rows. `site_id` fields
//! always refer to the external site's identifier space, never to internal
//! database ids.

use crate::storage::{MatchStatus, Tournament};
use chrono::{NaiveDate, NaiveDateTime};

/// A team reference as it appears on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRef {
    pub site_id: u32,
    pub name: String,
}

/// One player's statistics line in a match protocol
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatLine {
    pub player_site_id: u32,
    pub last_name: String,
    pub first_name: String,
    /// Site id of the team the line is listed under, when the protocol
    /// groups lines by team
    pub team_site_id: Option<u32>,
    pub jersey_number: Option<u32>,
    pub points: Option<u32>,
    pub attacks: Option<u32>,
    pub serves: Option<u32>,
    pub blocks: Option<u32>,
}

/// A best-player citation; the player link is optional on older pages
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BestPlayerLine {
    pub player_site_id: Option<u32>,
    pub name: String,
    pub points: Option<u32>,
    pub attacks: Option<u32>,
    pub serves: Option<u32>,
    pub blocks: Option<u32>,
}

/// A fully parsed city match page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub status: MatchStatus,
    pub date_time: Option<NaiveDateTime>,
    pub venue: Option<String>,
    pub home_team: TeamRef,
    pub away_team: Option<TeamRef>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub set_scores: Option<String>,
    pub stats: Vec<StatLine>,
    pub best_players: Vec<BestPlayerLine>,
}

/// One player as listed on a roster page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterPlayer {
    pub site_id: u32,
    pub last_name: String,
    pub first_name: String,
    pub jersey_number: Option<u32>,
    pub height: Option<u32>,
    pub position: Option<String>,
    pub photo_url: Option<String>,
}

/// A parsed roster page: one team's lineup for one tournament draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRecord {
    pub team: TeamRef,
    pub season_label: Option<String>,
    pub players: Vec<RosterPlayer>,
}

/// A season probe result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonInfo {
    pub number: u32,
    pub name: String,
}

/// One row of a season schedule
///
/// Schedule rows are stubs: they carry enough to create a match row that a
/// later detail pass enriches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub match_site_id: u32,
    pub tournament: Tournament,
    pub status: MatchStatus,
    pub date_time: Option<NaiveDateTime>,
    pub division_name: Option<String>,
    pub round_name: Option<String>,
    pub home_team: Option<TeamRef>,
    pub away_team: Option<TeamRef>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
}

/// A team as listed on the season's team roster page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRecord {
    pub site_id: u32,
    pub name: String,
    pub logo_url: Option<String>,
    pub is_women: bool,
}

/// A referee reference on a match page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefereeRef {
    pub site_id: u32,
    pub last_name: String,
    pub first_name: String,
}

/// A fully parsed federation match page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchDetail {
    pub status: MatchStatus,
    pub date_time: Option<NaiveDateTime>,
    pub venue: Option<String>,
    pub tournament: Option<Tournament>,
    pub division_name: Option<String>,
    pub round_name: Option<String>,
    pub home_team: Option<TeamRef>,
    pub away_team: Option<TeamRef>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub set_scores: Option<String>,
    pub stats: Vec<StatLine>,
    pub best_players: Vec<BestPlayerLine>,
    pub referees: Vec<RefereeRef>,
}

/// A player profile page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerRecord {
    pub site_id: u32,
    pub last_name: String,
    pub first_name: String,
    pub birth_date: Option<NaiveDate>,
    pub height: Option<u32>,
    pub weight: Option<u32>,
    pub position: Option<String>,
    pub photo_url: Option<String>,
}

/// A referee as listed on the season roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefereeRecord {
    pub site_id: u32,
    pub last_name: String,
    pub first_name: String,
    pub photo_url: Option<String>,
}
