//! Federation source
//!
//! The federation site is season-structured: every page lives under
//! `{base}/season/{n}/...`. Schedule pages address matches by path
//! (`/season/{n}/match/{id}`) and the same protocol markup as the city
//! archive is used for statistics and best players.

use crate::fetch::city::{parse_best_players, parse_stat_lines};
use crate::fetch::client::PacedClient;
use crate::fetch::html::{
    element_text, id_from_href, parse_date, parse_date_time, parse_score_pair, select_first,
    select_number, select_text, split_name, team_ref,
};
use crate::fetch::{
    FederationSource, FetchError, FetchResult, MatchDetail, Outcome, PlayerRecord, RefereeRecord,
    RefereeRef, ScheduleEntry, SeasonInfo, TeamRecord,
};
use crate::storage::{MatchStatus, Tournament};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

/// Production implementation of [`FederationSource`]
pub struct HttpFederationSource {
    client: PacedClient,
    base_url: Url,
}

impl HttpFederationSource {
    pub fn new(client: Client, base_url: Url, min_interval: Duration) -> Self {
        Self {
            client: PacedClient::new(client, min_interval),
            base_url,
        }
    }

    fn season_url(&self, number: u32, tail: &str) -> FetchResult<Url> {
        Ok(self.base_url.join(&format!("season/{}/{}", number, tail))?)
    }

    /// Fetches a page, propagating 404 as `NotFound`
    async fn page(&self, url: &Url) -> FetchResult<Outcome<Html>> {
        Ok(match self.client.get(url).await? {
            Outcome::Found(body) => Outcome::Found(Html::parse_document(&body)),
            Outcome::NotFound => Outcome::NotFound,
        })
    }
}

#[async_trait]
impl FederationSource for HttpFederationSource {
    async fn season_info(&self, number: u32) -> FetchResult<Outcome<SeasonInfo>> {
        let url = self.base_url.join(&format!("season/{}", number))?;
        let body = match self.client.get(&url).await? {
            Outcome::Found(body) => body,
            Outcome::NotFound => return Ok(Outcome::NotFound),
        };

        let document = Html::parse_document(&body);
        let name = select_text(document.root_element(), "h1.season-name").ok_or_else(|| {
            FetchError::Malformed {
                url: url.to_string(),
                reason: "missing season name".to_string(),
            }
        })?;
        Ok(Outcome::Found(SeasonInfo { number, name }))
    }

    async fn schedule(
        &self,
        number: u32,
        tournament: Tournament,
    ) -> FetchResult<Vec<ScheduleEntry>> {
        let url = self.season_url(
            number,
            &format!("schedule?tournament={}", tournament.to_db_string()),
        )?;
        let document = match self.page(&url).await? {
            Outcome::Found(document) => document,
            // A draw that was never held for this season
            Outcome::NotFound => return Ok(Vec::new()),
        };

        Ok(parse_schedule(&document, tournament))
    }

    async fn teams(&self, number: u32) -> FetchResult<Vec<TeamRecord>> {
        let url = self.season_url(number, "teams")?;
        let document = match self.page(&url).await? {
            Outcome::Found(document) => document,
            Outcome::NotFound => return Ok(Vec::new()),
        };

        Ok(parse_teams(&document, &url))
    }

    async fn match_detail(&self, number: u32, site_id: u32) -> FetchResult<Outcome<MatchDetail>> {
        let url = self.season_url(number, &format!("match/{}", site_id))?;
        let document = match self.page(&url).await? {
            Outcome::Found(document) => document,
            Outcome::NotFound => return Ok(Outcome::NotFound),
        };

        parse_match_detail(&document, &url).map(Outcome::Found)
    }

    async fn player(&self, number: u32, site_id: u32) -> FetchResult<Outcome<PlayerRecord>> {
        let url = self.season_url(number, &format!("player/{}", site_id))?;
        let document = match self.page(&url).await? {
            Outcome::Found(document) => document,
            Outcome::NotFound => return Ok(Outcome::NotFound),
        };

        parse_player(&document, &url, site_id).map(Outcome::Found)
    }

    async fn referees(&self, number: u32) -> FetchResult<Vec<RefereeRecord>> {
        let url = self.season_url(number, "referees")?;
        let document = match self.page(&url).await? {
            Outcome::Found(document) => document,
            Outcome::NotFound => return Ok(Vec::new()),
        };

        Ok(parse_referees(&document, &url))
    }
}

fn parse_schedule(document: &Html, tournament: Tournament) -> Vec<ScheduleEntry> {
    let mut entries = Vec::new();

    let row_sel = match Selector::parse("table.schedule tr") {
        Ok(sel) => sel,
        Err(_) => return entries,
    };

    for row in document.select(&row_sel) {
        if let Some(entry) = parse_schedule_row(row, tournament) {
            entries.push(entry);
        }
    }
    entries
}

fn parse_schedule_row(row: ElementRef<'_>, tournament: Tournament) -> Option<ScheduleEntry> {
    let match_link = select_first(row, "td.match a")?;
    let match_site_id = id_from_href(match_link.value().attr("href")?)?;

    let date_time = select_text(row, "td.date").and_then(|t| parse_date_time(&t));
    let score = select_text(row, "td.score").and_then(|t| parse_score_pair(&t));

    let cancelled = row
        .value()
        .attr("class")
        .map(|c| c.split_whitespace().any(|token| token == "cancelled"))
        .unwrap_or(false);
    let status = if cancelled {
        MatchStatus::Cancelled
    } else if score.is_some() {
        MatchStatus::Played
    } else {
        MatchStatus::Scheduled
    };

    Some(ScheduleEntry {
        match_site_id,
        tournament,
        status,
        date_time,
        division_name: select_text(row, "td.division"),
        round_name: select_text(row, "td.round"),
        home_team: select_first(row, "td.home").and_then(team_ref),
        away_team: select_first(row, "td.away").and_then(team_ref),
        home_score: score.map(|(h, _)| h),
        away_score: score.map(|(_, a)| a),
    })
}

fn parse_teams(document: &Html, url: &Url) -> Vec<TeamRecord> {
    let mut teams = Vec::new();

    let card_sel = match Selector::parse("div.team-card") {
        Ok(sel) => sel,
        Err(_) => return teams,
    };

    for card in document.select(&card_sel) {
        let Some(team) = team_ref(card) else {
            continue;
        };

        let logo_url = select_first(card, "img")
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| url.join(src).ok())
            .map(|u| u.to_string());
        let is_women = card
            .value()
            .attr("data-gender")
            .map(|g| g.eq_ignore_ascii_case("w"))
            .unwrap_or(false);

        teams.push(TeamRecord {
            site_id: team.site_id,
            name: team.name,
            logo_url,
            is_women,
        });
    }
    teams
}

fn parse_match_detail(document: &Html, url: &Url) -> FetchResult<MatchDetail> {
    let root = document.root_element();
    let container = select_first(root, "div.match").ok_or_else(|| FetchError::Malformed {
        url: url.to_string(),
        reason: "missing match container".to_string(),
    })?;

    let date_time = select_text(container, ".match-date").and_then(|t| parse_date_time(&t));
    let score = select_text(container, ".match-score").and_then(|t| parse_score_pair(&t));
    let tournament = select_text(container, ".match-tournament").map(|t| {
        if t.to_lowercase().contains("cup") {
            Tournament::Cup
        } else {
            Tournament::Championship
        }
    });

    let status = if select_first(container, ".match-cancelled").is_some() {
        MatchStatus::Cancelled
    } else if score.is_some() {
        MatchStatus::Played
    } else if date_time.is_some() {
        MatchStatus::Scheduled
    } else {
        MatchStatus::Unknown
    };

    Ok(MatchDetail {
        status,
        date_time,
        venue: select_text(container, ".match-venue"),
        tournament,
        division_name: select_text(container, ".match-division"),
        round_name: select_text(container, ".match-round"),
        home_team: select_first(container, ".team-home").and_then(team_ref),
        away_team: select_first(container, ".team-away").and_then(team_ref),
        home_score: score.map(|(h, _)| h),
        away_score: score.map(|(_, a)| a),
        set_scores: select_text(container, ".match-sets"),
        stats: parse_stat_lines(container),
        best_players: parse_best_players(container),
        referees: parse_match_referees(container),
    })
}

fn parse_match_referees(scope: ElementRef<'_>) -> Vec<RefereeRef> {
    let mut referees = Vec::new();

    let link_sel = match Selector::parse("div.referees a") {
        Ok(sel) => sel,
        Err(_) => return referees,
    };

    for anchor in scope.select(&link_sel) {
        let Some(site_id) = anchor.value().attr("href").and_then(id_from_href) else {
            continue;
        };
        let (last_name, first_name) = split_name(&element_text(anchor));
        if last_name.is_empty() {
            continue;
        }
        referees.push(RefereeRef {
            site_id,
            last_name,
            first_name,
        });
    }
    referees
}

fn parse_player(document: &Html, url: &Url, site_id: u32) -> FetchResult<PlayerRecord> {
    let root = document.root_element();
    let profile =
        select_first(root, "div.player-profile").ok_or_else(|| FetchError::Malformed {
            url: url.to_string(),
            reason: "missing player profile".to_string(),
        })?;

    let name = select_text(profile, "h1.player-name").ok_or_else(|| FetchError::Malformed {
        url: url.to_string(),
        reason: "missing player name".to_string(),
    })?;
    let (last_name, first_name) = split_name(&name);

    let photo_url = select_first(profile, "img.photo")
        .and_then(|img| img.value().attr("src"))
        .and_then(|src| url.join(src).ok())
        .map(|u| u.to_string());

    Ok(PlayerRecord {
        site_id,
        last_name,
        first_name,
        birth_date: select_text(profile, "dd.birth-date").and_then(|t| parse_date(&t)),
        height: select_number(profile, "dd.height"),
        weight: select_number(profile, "dd.weight"),
        position: select_text(profile, "dd.position"),
        photo_url,
    })
}

fn parse_referees(document: &Html, url: &Url) -> Vec<RefereeRecord> {
    let mut referees = Vec::new();

    let item_sel = match Selector::parse("ul.referee-list li") {
        Ok(sel) => sel,
        Err(_) => return referees,
    };

    for item in document.select(&item_sel) {
        let Some(anchor) = select_first(item, "a") else {
            continue;
        };
        let Some(site_id) = anchor.value().attr("href").and_then(id_from_href) else {
            continue;
        };
        let (last_name, first_name) = split_name(&element_text(anchor));
        if last_name.is_empty() {
            continue;
        }

        let photo_url = select_first(item, "img")
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| url.join(src).ok())
            .map(|u| u.to_string());

        referees.push(RefereeRecord {
            site_id,
            last_name,
            first_name,
            photo_url,
        });
    }
    referees
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn test_url() -> Url {
        Url::parse("http://federation.test/season/5/").unwrap()
    }

    #[test]
    fn test_parse_schedule_rows() {
        let page = r#"
            <table class="schedule">
                <tr>
                    <td class="match"><a href="/season/5/match/301">301</a></td>
                    <td class="date">01.11.2024 18:00</td>
                    <td class="division">Division A</td>
                    <td class="round">Round 3</td>
                    <td class="home"><a href="/season/5/team/11">Start</a></td>
                    <td class="away"><a href="/season/5/team/12">Impuls</a></td>
                    <td class="score">3:2</td>
                </tr>
                <tr class="cancelled">
                    <td class="match"><a href="/season/5/match/302">302</a></td>
                    <td class="date">02.11.2024 18:00</td>
                    <td class="home"><a href="/season/5/team/13">Vympel</a></td>
                    <td class="away"><a href="/season/5/team/11">Start</a></td>
                    <td class="score"></td>
                </tr>
            </table>
        "#;
        let document = Html::parse_document(page);
        let entries = parse_schedule(&document, Tournament::Championship);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].match_site_id, 301);
        assert_eq!(entries[0].status, MatchStatus::Played);
        assert_eq!(entries[0].home_score, Some(3));
        assert_eq!(entries[0].division_name.as_deref(), Some("Division A"));
        assert_eq!(entries[0].home_team.as_ref().map(|t| t.site_id), Some(11));

        assert_eq!(entries[1].status, MatchStatus::Cancelled);
        assert_eq!(entries[1].home_score, None);
    }

    #[test]
    fn test_parse_teams_with_gender_flag() {
        let page = r#"
            <div class="team-card" data-gender="w">
                <a href="/season/5/team/21">Vityaz</a>
                <img src="/logos/21.png">
            </div>
            <div class="team-card">
                <a href="/season/5/team/22">Fakel</a>
            </div>
        "#;
        let document = Html::parse_document(page);
        let teams = parse_teams(&document, &test_url());

        assert_eq!(teams.len(), 2);
        assert!(teams[0].is_women);
        assert_eq!(
            teams[0].logo_url.as_deref(),
            Some("http://federation.test/logos/21.png")
        );
        assert!(!teams[1].is_women);
        assert_eq!(teams[1].logo_url, None);
    }

    #[test]
    fn test_parse_match_detail_with_referees() {
        let page = r#"
            <div class="match">
                <div class="match-tournament">Cup</div>
                <div class="match-division">Division B</div>
                <div class="match-round">Final</div>
                <div class="match-date">2024-12-20 17:00</div>
                <div class="team-home"><a href="/season/5/team/11">Start</a></div>
                <div class="team-away"><a href="/season/5/team/13">Vympel</a></div>
                <div class="match-score">3:0</div>
                <div class="referees">
                    <a href="/season/5/referee/9">Smirnov Oleg</a>
                    <a href="/season/5/referee/14">Kuzmin Artur</a>
                </div>
            </div>
        "#;
        let document = Html::parse_document(page);
        let detail = parse_match_detail(&document, &test_url()).unwrap();

        assert_eq!(detail.tournament, Some(Tournament::Cup));
        assert_eq!(detail.status, MatchStatus::Played);
        assert_eq!(detail.round_name.as_deref(), Some("Final"));
        assert_eq!(detail.referees.len(), 2);
        assert_eq!(detail.referees[0].site_id, 9);
        assert_eq!(detail.referees[0].last_name, "Smirnov");
    }

    #[test]
    fn test_parse_player_profile() {
        let page = r#"
            <div class="player-profile">
                <h1 class="player-name">Orlova Anna</h1>
                <dl>
                    <dd class="birth-date">12.03.1994</dd>
                    <dd class="height">182 cm</dd>
                    <dd class="weight">68 kg</dd>
                    <dd class="position">Setter</dd>
                </dl>
                <img class="photo" src="/photos/77.jpg">
            </div>
        "#;
        let document = Html::parse_document(page);
        let player = parse_player(&document, &test_url(), 77).unwrap();

        assert_eq!(player.site_id, 77);
        assert_eq!(player.last_name, "Orlova");
        assert_eq!(player.first_name, "Anna");
        assert_eq!(player.birth_date, NaiveDate::from_ymd_opt(1994, 3, 12));
        assert_eq!(player.height, Some(182));
        assert_eq!(player.position.as_deref(), Some("Setter"));
    }

    #[test]
    fn test_player_without_profile_is_malformed() {
        let document = Html::parse_document("<html><body></body></html>");
        let result = parse_player(&document, &test_url(), 1);
        assert!(matches!(result, Err(FetchError::Malformed { .. })));
    }

    #[test]
    fn test_parse_referee_roster() {
        let page = r#"
            <ul class="referee-list">
                <li><a href="/season/5/referee/9">Smirnov Oleg</a>
                    <img src="/photos/ref9.jpg"></li>
                <li><a href="/season/5/referee/14">Kuzmin Artur</a></li>
            </ul>
        "#;
        let document = Html::parse_document(page);
        let referees = parse_referees(&document, &test_url());

        assert_eq!(referees.len(), 2);
        assert_eq!(referees[0].site_id, 9);
        assert_eq!(
            referees[0].photo_url.as_deref(),
            Some("http://federation.test/photos/ref9.jpg")
        );
        assert_eq!(referees[1].photo_url, None);
    }
}
