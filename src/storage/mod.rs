//! Storage module for persisting scraped volleyball data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Entity rows (teams, players, referees, matches, seasons)
//! - Per-match player statistics, best-player citations and referee links
//! - Negative-result caching via `empty` match rows

mod schema;
mod sqlite;
mod traits;

pub use schema::initialize_schema;
pub use sqlite::SqliteStore;
pub use traits::{Store, StoreError, StoreResult};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// The external source a row was scraped from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Flat city archive, match pages addressed by numeric id
    City,
    /// Season-structured federation site
    Federation,
}

impl Source {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Federation => "federation",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "city" => Some(Self::City),
            "federation" => Some(Self::Federation),
            _ => None,
        }
    }
}

/// Lifecycle status of a stored match
///
/// `Empty` marks an identifier confirmed to have no data at the source; such
/// rows carry no references and exist only to suppress re-fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Unknown,
    Scheduled,
    Played,
    Cancelled,
    Empty,
}

impl MatchStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Scheduled => "scheduled",
            Self::Played => "played",
            Self::Cancelled => "cancelled",
            Self::Empty => "empty",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(Self::Unknown),
            "scheduled" => Some(Self::Scheduled),
            "played" => Some(Self::Played),
            "cancelled" => Some(Self::Cancelled),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }
}

/// Tournament draw a federation match belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tournament {
    Championship,
    Cup,
}

impl Tournament {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Championship => "championship",
            Self::Cup => "cup",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "championship" => Some(Self::Championship),
            "cup" => Some(Self::Cup),
            _ => None,
        }
    }
}

/// A season of the federation source
#[derive(Debug, Clone)]
pub struct SeasonRow {
    pub id: i64,
    pub number: u32,
    pub name: String,
}

/// A team row
#[derive(Debug, Clone)]
pub struct TeamRow {
    pub id: i64,
    pub source: Source,
    pub site_id: u32,
    pub name: String,
    pub logo_url: Option<String>,
    pub is_women: bool,
}

/// A player row
#[derive(Debug, Clone)]
pub struct PlayerRow {
    pub id: i64,
    pub source: Source,
    pub site_id: u32,
    pub last_name: String,
    pub first_name: String,
    pub birth_date: Option<NaiveDate>,
    pub height: Option<u32>,
    pub weight: Option<u32>,
    pub position: Option<String>,
    pub photo_url: Option<String>,
}

impl PlayerRow {
    /// Person identity key: reliable only when a birth date is present.
    pub fn identity(&self) -> Option<IdentityKey> {
        let birth_date = self.birth_date?;
        if self.last_name.is_empty() || self.first_name.is_empty() {
            return None;
        }
        Some(IdentityKey {
            last_name: self.last_name.clone(),
            first_name: self.first_name.clone(),
            birth_date,
        })
    }
}

/// A referee row
#[derive(Debug, Clone)]
pub struct RefereeRow {
    pub id: i64,
    pub source: Source,
    pub site_id: u32,
    pub last_name: String,
    pub first_name: String,
    pub photo_url: Option<String>,
}

/// A match row with its owned fields and entity references
#[derive(Debug, Clone)]
pub struct MatchRow {
    pub id: i64,
    pub source: Source,
    pub site_id: u32,
    pub season_id: Option<i64>,
    pub status: MatchStatus,
    pub date_time: Option<NaiveDateTime>,
    pub venue: Option<String>,
    pub tournament: Option<Tournament>,
    pub division_name: Option<String>,
    pub round_name: Option<String>,
    pub home_team_id: Option<i64>,
    pub away_team_id: Option<i64>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub set_scores: Option<String>,
    pub parsed_at: Option<String>,
}

impl MatchRow {
    /// A bare row for a site id, with every owned field unset.
    pub fn stub(source: Source, site_id: u32) -> Self {
        Self {
            id: 0,
            source,
            site_id,
            season_id: None,
            status: MatchStatus::Unknown,
            date_time: None,
            venue: None,
            tournament: None,
            division_name: None,
            round_name: None,
            home_team_id: None,
            away_team_id: None,
            home_score: None,
            away_score: None,
            set_scores: None,
            parsed_at: None,
        }
    }
}

/// One player's statistics line for a match
#[derive(Debug, Clone)]
pub struct PlayerStatRow {
    pub id: i64,
    pub match_id: i64,
    pub player_id: i64,
    pub team_id: Option<i64>,
    pub jersey_number: Option<u32>,
    pub points: Option<u32>,
    pub attacks: Option<u32>,
    pub serves: Option<u32>,
    pub blocks: Option<u32>,
}

/// A best-player citation for a match
#[derive(Debug, Clone)]
pub struct BestPlayerRow {
    pub id: i64,
    pub match_id: i64,
    pub player_id: Option<i64>,
    pub player_name: String,
    pub points: Option<u32>,
    pub attacks: Option<u32>,
    pub serves: Option<u32>,
    pub blocks: Option<u32>,
}

/// One player's membership in a team's tournament roster
///
/// `roster_site_id` is the external roster page identifier; one page lists one
/// team's lineup for one draw.
#[derive(Debug, Clone)]
pub struct TeamRosterRow {
    pub id: i64,
    pub team_id: i64,
    pub player_id: i64,
    pub roster_site_id: u32,
    pub season_label: Option<String>,
    pub jersey_number: Option<u32>,
}

/// Natural key identifying one physical person
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityKey {
    pub last_name: String,
    pub first_name: String,
    pub birth_date: NaiveDate,
}

/// Row counts for the stats surface
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreCounts {
    pub seasons: u64,
    pub city_matches: u64,
    pub federation_matches: u64,
    pub empty_matches: u64,
    pub teams: u64,
    pub players: u64,
    pub referees: u64,
    pub roster_entries: u64,
}
