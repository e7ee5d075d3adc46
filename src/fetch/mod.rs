//! HTTP fetching for both external sources
//!
//! This module defines the source contracts (`CitySource`, `FederationSource`),
//! the tri-state fetch outcome, and the production `reqwest` + `scraper`
//! implementations. Jobs never talk to the network directly; they depend on the
//! traits so tests can substitute scripted fakes.

mod city;
mod client;
mod federation;
mod html;
mod pacer;
mod records;

pub use city::HttpCitySource;
pub use client::{build_http_client, PacedClient};
pub use federation::HttpFederationSource;
pub use pacer::Pacer;
pub use records::{
    BestPlayerLine, MatchDetail, MatchRecord, PlayerRecord, RefereeRecord, RefereeRef,
    RosterPlayer, RosterRecord, ScheduleEntry, SeasonInfo, StatLine, TeamRecord, TeamRef,
};

use crate::storage::Tournament;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from talking to an external source
///
/// All variants are transient from the caller's point of view: the identifier
/// stays unresolved and a later pass retries it. "Definitely absent" is not an
/// error, it is [`Outcome::NotFound`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Malformed page at {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// The tri-state outcome of resolving one identifier
///
/// `NotFound` is an authoritative negative answer from the source and is safe
/// to cache; a [`FetchError`] is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Found(T),
    NotFound,
}

impl<T> Outcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// The flat city archive: match pages addressed by numeric id
#[async_trait]
pub trait CitySource: Send + Sync {
    /// Resolves one match identifier
    ///
    /// A page that parses but has no home team is reported as `NotFound`; the
    /// site renders a skeleton page for unused identifiers.
    async fn fetch_match(&self, site_id: u32) -> FetchResult<Outcome<MatchRecord>>;

    /// Resolves one roster page identifier
    ///
    /// Roster pages carry one team's lineup for a tournament draw. Like match
    /// pages, a skeleton page (no team link) is `NotFound`.
    async fn fetch_roster(&self, roster_id: u32) -> FetchResult<Outcome<RosterRecord>>;
}

/// The season-structured federation site
#[async_trait]
pub trait FederationSource: Send + Sync {
    /// Season existence probe; `Found` carries the display name
    async fn season_info(&self, number: u32) -> FetchResult<Outcome<SeasonInfo>>;

    /// Full schedule of one tournament draw for a season
    async fn schedule(&self, number: u32, tournament: Tournament)
        -> FetchResult<Vec<ScheduleEntry>>;

    /// All teams registered for a season
    async fn teams(&self, number: u32) -> FetchResult<Vec<TeamRecord>>;

    /// Detailed match page with statistics, best players and referees
    async fn match_detail(&self, number: u32, site_id: u32) -> FetchResult<Outcome<MatchDetail>>;

    /// One player's profile page within a season
    async fn player(&self, number: u32, site_id: u32) -> FetchResult<Outcome<PlayerRecord>>;

    /// The referee roster for a season
    async fn referees(&self, number: u32) -> FetchResult<Vec<RefereeRecord>>;
}
