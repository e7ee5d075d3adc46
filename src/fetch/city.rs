//! City archive source
//!
//! Match pages live at `{base}/match.php?id={n}`. The archive renders a
//! skeleton page for unused identifiers, so "parses but has no home team" is
//! an authoritative negative answer, not an error.

use crate::fetch::client::PacedClient;
use crate::fetch::html::{
    element_text, id_from_href, parse_date_time, parse_score_pair, select_first, select_number,
    select_text, split_name, team_ref,
};
use crate::fetch::{
    BestPlayerLine, CitySource, FetchError, FetchResult, MatchRecord, Outcome, RosterPlayer,
    RosterRecord, StatLine,
};
use crate::storage::MatchStatus;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

/// Production implementation of [`CitySource`]
pub struct HttpCitySource {
    client: PacedClient,
    base_url: Url,
}

impl HttpCitySource {
    pub fn new(client: Client, base_url: Url, min_interval: Duration) -> Self {
        Self {
            client: PacedClient::new(client, min_interval),
            base_url,
        }
    }
}

#[async_trait]
impl CitySource for HttpCitySource {
    async fn fetch_match(&self, site_id: u32) -> FetchResult<Outcome<MatchRecord>> {
        let url = self.base_url.join(&format!("match.php?id={}", site_id))?;
        let body = match self.client.get(&url).await? {
            Outcome::Found(body) => body,
            Outcome::NotFound => return Ok(Outcome::NotFound),
        };

        match parse_match_page(&body, &url)? {
            Some(record) => Ok(Outcome::Found(record)),
            None => Ok(Outcome::NotFound),
        }
    }

    async fn fetch_roster(&self, roster_id: u32) -> FetchResult<Outcome<RosterRecord>> {
        let url = self.base_url.join(&format!("members.php?id={}", roster_id))?;
        let body = match self.client.get(&url).await? {
            Outcome::Found(body) => body,
            Outcome::NotFound => return Ok(Outcome::NotFound),
        };

        match parse_roster_page(&body, &url)? {
            Some(record) => Ok(Outcome::Found(record)),
            None => Ok(Outcome::NotFound),
        }
    }
}

/// Parses a city match page
///
/// Returns `Ok(None)` for a skeleton page (no home team). A page without the
/// match container at all is malformed: the site changed shape and caching
/// the identifier as empty would be wrong.
fn parse_match_page(body: &str, url: &Url) -> FetchResult<Option<MatchRecord>> {
    let document = Html::parse_document(body);
    let root = document.root_element();

    let container = select_first(root, "div.match").ok_or_else(|| FetchError::Malformed {
        url: url.to_string(),
        reason: "missing match container".to_string(),
    })?;

    let home_team = match select_first(container, ".team-home").and_then(team_ref) {
        Some(team) => team,
        None => return Ok(None),
    };
    let away_team = select_first(container, ".team-away").and_then(team_ref);

    let date_time = select_text(container, ".match-date").and_then(|t| parse_date_time(&t));
    let venue = select_text(container, ".match-venue");
    let score = select_text(container, ".match-score").and_then(|t| parse_score_pair(&t));
    let set_scores = select_text(container, ".match-sets");

    let status = if select_first(container, ".match-cancelled").is_some() {
        MatchStatus::Cancelled
    } else if score.is_some() {
        MatchStatus::Played
    } else if date_time.is_some() {
        MatchStatus::Scheduled
    } else {
        MatchStatus::Unknown
    };

    Ok(Some(MatchRecord {
        status,
        date_time,
        venue,
        home_team,
        away_team,
        home_score: score.map(|(h, _)| h),
        away_score: score.map(|(_, a)| a),
        set_scores,
        stats: parse_stat_lines(container),
        best_players: parse_best_players(container),
    }))
}

/// Parses a roster page (`members.php`)
///
/// Returns `Ok(None)` for a skeleton page (no team link).
fn parse_roster_page(body: &str, url: &Url) -> FetchResult<Option<RosterRecord>> {
    let document = Html::parse_document(body);
    let root = document.root_element();

    let container = select_first(root, "div.roster").ok_or_else(|| FetchError::Malformed {
        url: url.to_string(),
        reason: "missing roster container".to_string(),
    })?;

    let team = match select_first(container, ".roster-team").and_then(team_ref) {
        Some(team) => team,
        None => return Ok(None),
    };

    Ok(Some(RosterRecord {
        team,
        season_label: select_text(container, ".roster-season"),
        players: parse_roster_players(container),
    }))
}

fn parse_roster_players(scope: ElementRef<'_>) -> Vec<RosterPlayer> {
    let mut players = Vec::new();

    let row_sel = match Selector::parse("table.members tr.member") {
        Ok(sel) => sel,
        Err(_) => return players,
    };

    for row in scope.select(&row_sel) {
        let anchor = match select_first(row, "td.player a") {
            Some(anchor) => anchor,
            None => continue,
        };
        let site_id = match anchor.value().attr("href").and_then(id_from_href) {
            Some(id) => id,
            None => continue,
        };
        let (last_name, first_name) = split_name(&element_text(anchor));
        if last_name.is_empty() {
            continue;
        }

        let photo_url = select_first(row, "td.photo img")
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string);

        players.push(RosterPlayer {
            site_id,
            last_name,
            first_name,
            jersey_number: select_number(row, "td.num"),
            height: select_number(row, "td.height"),
            position: select_text(row, "td.position"),
            photo_url,
        });
    }
    players
}

/// Statistics lines grouped by team under `table.protocol tbody[data-team-id]`
pub(crate) fn parse_stat_lines(scope: ElementRef<'_>) -> Vec<StatLine> {
    let mut lines = Vec::new();

    let body_sel = match Selector::parse("table.protocol tbody") {
        Ok(sel) => sel,
        Err(_) => return lines,
    };
    let row_sel = match Selector::parse("tr") {
        Ok(sel) => sel,
        Err(_) => return lines,
    };

    for tbody in scope.select(&body_sel) {
        let team_site_id = tbody
            .value()
            .attr("data-team-id")
            .and_then(|v| v.parse().ok());

        for row in tbody.select(&row_sel) {
            if let Some(line) = parse_stat_row(row, team_site_id) {
                lines.push(line);
            }
        }
    }
    lines
}

fn parse_stat_row(row: ElementRef<'_>, team_site_id: Option<u32>) -> Option<StatLine> {
    let anchor = select_first(row, "td.player a")?;
    let player_site_id = id_from_href(anchor.value().attr("href")?)?;
    let (last_name, first_name) = split_name(&element_text(anchor));
    if last_name.is_empty() {
        return None;
    }

    Some(StatLine {
        player_site_id,
        last_name,
        first_name,
        team_site_id,
        jersey_number: select_number(row, "td.num"),
        points: select_number(row, "td.points"),
        attacks: select_number(row, "td.attacks"),
        serves: select_number(row, "td.serves"),
        blocks: select_number(row, "td.blocks"),
    })
}

pub(crate) fn parse_best_players(scope: ElementRef<'_>) -> Vec<BestPlayerLine> {
    let mut lines = Vec::new();

    let item_sel = match Selector::parse("ul.best-players li") {
        Ok(sel) => sel,
        Err(_) => return lines,
    };

    for item in scope.select(&item_sel) {
        let (player_site_id, name) = match select_first(item, "a") {
            Some(anchor) => (
                anchor.value().attr("href").and_then(id_from_href),
                element_text(anchor),
            ),
            None => (None, select_text(item, ".name").unwrap_or_default()),
        };
        if name.is_empty() {
            continue;
        }

        lines.push(BestPlayerLine {
            player_site_id,
            name,
            points: select_number(item, ".points"),
            attacks: select_number(item, ".attacks"),
            serves: select_number(item, ".serves"),
            blocks: select_number(item, ".blocks"),
        });
    }
    lines
}
