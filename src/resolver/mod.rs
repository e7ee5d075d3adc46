//! Entity resolution: parsed page contents to storage rows
//!
//! The resolver owns the identity rules: external `(source, site_id)` is the
//! lookup key everywhere, players additionally dedup on the person identity
//! key (last name + first name + birth date) within one source. Attribute
//! updates fill only fields that are currently unset, except names, which are
//! refreshed to the latest non-empty observation.

use crate::fetch::{MatchDetail, MatchRecord, PlayerRecord, RefereeRecord, RosterRecord,
    ScheduleEntry, StatLine, TeamRecord};
use crate::storage::{
    BestPlayerRow, MatchRow, PlayerRow, PlayerStatRow, RefereeRow, Source, Store, StoreResult,
    TeamRosterRow, TeamRow,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of a duplicate-player merge pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub dry_run: bool,
    /// Identity keys shared by more than one row
    pub groups: u32,
    pub duplicates_removed: u32,
    pub stats_moved: u32,
    /// Statistics lines dropped because the primary already had a line for
    /// the same match
    pub stats_dropped: u32,
}

/// Wraps a store borrow for one logical write scope
pub struct EntityResolver<'a, S: Store> {
    store: &'a mut S,
}

impl<'a, S: Store> EntityResolver<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Team lookup-or-insert; refreshes the name, fills missing attributes
    pub fn get_or_create_team(
        &mut self,
        source: Source,
        site_id: u32,
        name: &str,
        logo_url: Option<&str>,
        is_women: Option<bool>,
    ) -> StoreResult<i64> {
        match self.store.team_by_site(source, site_id)? {
            Some(mut team) => {
                let mut changed = false;
                if !name.is_empty() && team.name != name {
                    team.name = name.to_string();
                    changed = true;
                }
                if team.logo_url.is_none() && logo_url.is_some() {
                    team.logo_url = logo_url.map(str::to_string);
                    changed = true;
                }
                if let Some(women) = is_women {
                    if team.is_women != women {
                        team.is_women = women;
                        changed = true;
                    }
                }
                if changed {
                    self.store.update_team(&team)?;
                }
                Ok(team.id)
            }
            None => self.store.insert_team(&TeamRow {
                id: 0,
                source,
                site_id,
                name: name.to_string(),
                logo_url: logo_url.map(str::to_string),
                is_women: is_women.unwrap_or(false),
            }),
        }
    }

    /// Player lookup-or-insert
    ///
    /// Lookup order: `(source, site_id)`, then the person identity key when a
    /// birth date is available. An identity hit reuses the existing row; its
    /// stored site id is left alone so references stay stable.
    pub fn save_player(&mut self, source: Source, record: &PlayerRecord) -> StoreResult<i64> {
        if let Some(existing) = self.store.player_by_site(source, record.site_id)? {
            return self.fill_player(existing, record);
        }

        let row = PlayerRow {
            id: 0,
            source,
            site_id: record.site_id,
            last_name: record.last_name.clone(),
            first_name: record.first_name.clone(),
            birth_date: record.birth_date,
            height: record.height,
            weight: record.weight,
            position: record.position.clone(),
            photo_url: record.photo_url.clone(),
        };

        if let Some(key) = row.identity() {
            if let Some(existing) = self.store.player_by_identity(source, &key)? {
                debug!(
                    site_id = record.site_id,
                    existing_id = existing.id,
                    "player matched by identity key"
                );
                return self.fill_player(existing, record);
            }
        }

        self.store.insert_player(&row)
    }

    fn fill_player(&mut self, mut row: PlayerRow, record: &PlayerRecord) -> StoreResult<i64> {
        let mut changed = false;
        if !record.last_name.is_empty() && row.last_name != record.last_name {
            row.last_name = record.last_name.clone();
            changed = true;
        }
        if !record.first_name.is_empty() && row.first_name != record.first_name {
            row.first_name = record.first_name.clone();
            changed = true;
        }
        if row.birth_date.is_none() && record.birth_date.is_some() {
            row.birth_date = record.birth_date;
            changed = true;
        }
        if row.height.is_none() && record.height.is_some() {
            row.height = record.height;
            changed = true;
        }
        if row.weight.is_none() && record.weight.is_some() {
            row.weight = record.weight;
            changed = true;
        }
        if row.position.is_none() && record.position.is_some() {
            row.position = record.position.clone();
            changed = true;
        }
        if row.photo_url.is_none() && record.photo_url.is_some() {
            row.photo_url = record.photo_url.clone();
            changed = true;
        }
        if changed {
            self.store.update_player(&row)?;
        }
        Ok(row.id)
    }

    pub fn save_referee(&mut self, source: Source, record: &RefereeRecord) -> StoreResult<i64> {
        match self.store.referee_by_site(source, record.site_id)? {
            Some(mut referee) => {
                let mut changed = false;
                if !record.last_name.is_empty() && referee.last_name != record.last_name {
                    referee.last_name = record.last_name.clone();
                    changed = true;
                }
                if !record.first_name.is_empty() && referee.first_name != record.first_name {
                    referee.first_name = record.first_name.clone();
                    changed = true;
                }
                if referee.photo_url.is_none() && record.photo_url.is_some() {
                    referee.photo_url = record.photo_url.clone();
                    changed = true;
                }
                if changed {
                    self.store.update_referee(&referee)?;
                }
                Ok(referee.id)
            }
            None => self.store.insert_referee(&RefereeRow {
                id: 0,
                source,
                site_id: record.site_id,
                last_name: record.last_name.clone(),
                first_name: record.first_name.clone(),
                photo_url: record.photo_url.clone(),
            }),
        }
    }

    pub fn save_team(&mut self, source: Source, record: &TeamRecord) -> StoreResult<i64> {
        self.get_or_create_team(
            source,
            record.site_id,
            &record.name,
            record.logo_url.as_deref(),
            Some(record.is_women),
        )
    }

    /// Persists a parsed city match page; returns whether the row is new
    pub fn save_city_match(&mut self, site_id: u32, record: &MatchRecord) -> StoreResult<bool> {
        let source = Source::City;
        let home_team_id = self.get_or_create_team(
            source,
            record.home_team.site_id,
            &record.home_team.name,
            None,
            None,
        )?;
        let away_team_id = match &record.away_team {
            Some(team) => Some(self.get_or_create_team(source, team.site_id, &team.name, None, None)?),
            None => None,
        };

        let mut row = MatchRow::stub(source, site_id);
        row.status = record.status;
        row.date_time = record.date_time;
        row.venue = record.venue.clone();
        row.home_team_id = Some(home_team_id);
        row.away_team_id = away_team_id;
        row.home_score = record.home_score;
        row.away_score = record.away_score;
        row.set_scores = record.set_scores.clone();
        row.parsed_at = Some(now_stamp());

        let (match_id, created) = self.store.upsert_match(&row)?;
        self.attach_protocol(source, match_id, &record.stats, &record.best_players)?;
        Ok(created)
    }

    /// Persists a parsed roster page; returns the number of new entries
    ///
    /// Re-parsing the same page is a no-op for the roster links; player and
    /// team attributes still go through the usual fill rules.
    pub fn save_roster(&mut self, roster_site_id: u32, record: &RosterRecord) -> StoreResult<u32> {
        let source = Source::City;
        let team_id = self.get_or_create_team(
            source,
            record.team.site_id,
            &record.team.name,
            None,
            None,
        )?;

        let mut created = 0;
        for player in &record.players {
            let player_id = self.save_player(
                source,
                &PlayerRecord {
                    site_id: player.site_id,
                    last_name: player.last_name.clone(),
                    first_name: player.first_name.clone(),
                    birth_date: None,
                    height: player.height,
                    weight: None,
                    position: player.position.clone(),
                    photo_url: player.photo_url.clone(),
                },
            )?;
            let new = self.store.insert_roster_entry(&TeamRosterRow {
                id: 0,
                team_id,
                player_id,
                roster_site_id,
                season_label: record.season_label.clone(),
                jersey_number: player.jersey_number,
            })?;
            if new {
                created += 1;
            }
        }
        Ok(created)
    }

    /// Inserts a schedule stub; an existing row is never overwritten
    pub fn save_schedule_entry(
        &mut self,
        season_id: i64,
        entry: &ScheduleEntry,
    ) -> StoreResult<bool> {
        let source = Source::Federation;
        if self.store.match_exists(source, entry.match_site_id)? {
            return Ok(false);
        }

        let home_team_id = match &entry.home_team {
            Some(team) => Some(self.get_or_create_team(source, team.site_id, &team.name, None, None)?),
            None => None,
        };
        let away_team_id = match &entry.away_team {
            Some(team) => Some(self.get_or_create_team(source, team.site_id, &team.name, None, None)?),
            None => None,
        };

        let mut row = MatchRow::stub(source, entry.match_site_id);
        row.season_id = Some(season_id);
        row.status = entry.status;
        row.date_time = entry.date_time;
        row.tournament = Some(entry.tournament);
        row.division_name = entry.division_name.clone();
        row.round_name = entry.round_name.clone();
        row.home_team_id = home_team_id;
        row.away_team_id = away_team_id;
        row.home_score = entry.home_score;
        row.away_score = entry.away_score;

        self.store.upsert_match(&row)?;
        Ok(true)
    }

    /// Persists a parsed federation match page; returns whether the row is new
    pub fn save_match_detail(
        &mut self,
        season_id: i64,
        site_id: u32,
        detail: &MatchDetail,
    ) -> StoreResult<bool> {
        let source = Source::Federation;
        let home_team_id = match &detail.home_team {
            Some(team) => Some(self.get_or_create_team(source, team.site_id, &team.name, None, None)?),
            None => None,
        };
        let away_team_id = match &detail.away_team {
            Some(team) => Some(self.get_or_create_team(source, team.site_id, &team.name, None, None)?),
            None => None,
        };

        let mut row = MatchRow::stub(source, site_id);
        row.season_id = Some(season_id);
        row.status = detail.status;
        row.date_time = detail.date_time;
        row.venue = detail.venue.clone();
        row.tournament = detail.tournament;
        row.division_name = detail.division_name.clone();
        row.round_name = detail.round_name.clone();
        row.home_team_id = home_team_id;
        row.away_team_id = away_team_id;
        row.home_score = detail.home_score;
        row.away_score = detail.away_score;
        row.set_scores = detail.set_scores.clone();
        row.parsed_at = Some(now_stamp());

        let (match_id, created) = self.store.upsert_match(&row)?;
        self.attach_protocol(source, match_id, &detail.stats, &detail.best_players)?;

        let mut referee_ids = Vec::with_capacity(detail.referees.len());
        for referee in &detail.referees {
            let id = self.save_referee(
                source,
                &RefereeRecord {
                    site_id: referee.site_id,
                    last_name: referee.last_name.clone(),
                    first_name: referee.first_name.clone(),
                    photo_url: None,
                },
            )?;
            referee_ids.push(id);
        }
        self.store.replace_match_referees(match_id, &referee_ids)?;

        Ok(created)
    }

    /// Replaces a match's statistics lines and best-player citations
    fn attach_protocol(
        &mut self,
        source: Source,
        match_id: i64,
        stats: &[StatLine],
        best_players: &[crate::fetch::BestPlayerLine],
    ) -> StoreResult<()> {
        let mut stat_rows = Vec::with_capacity(stats.len());
        for line in stats {
            let player_id = self.save_player(
                source,
                &PlayerRecord {
                    site_id: line.player_site_id,
                    last_name: line.last_name.clone(),
                    first_name: line.first_name.clone(),
                    birth_date: None,
                    height: None,
                    weight: None,
                    position: None,
                    photo_url: None,
                },
            )?;
            let team_id = match line.team_site_id {
                Some(team_site_id) => self
                    .store
                    .team_by_site(source, team_site_id)?
                    .map(|team| team.id),
                None => None,
            };
            stat_rows.push(PlayerStatRow {
                id: 0,
                match_id,
                player_id,
                team_id,
                jersey_number: line.jersey_number,
                points: line.points,
                attacks: line.attacks,
                serves: line.serves,
                blocks: line.blocks,
            });
        }
        self.store.replace_player_stats(match_id, &stat_rows)?;

        let mut best_rows = Vec::with_capacity(best_players.len());
        for citation in best_players {
            let player_id = match citation.player_site_id {
                Some(player_site_id) => self
                    .store
                    .player_by_site(source, player_site_id)?
                    .map(|player| player.id),
                None => None,
            };
            best_rows.push(BestPlayerRow {
                id: 0,
                match_id,
                player_id,
                player_name: citation.name.clone(),
                points: citation.points,
                attacks: citation.attacks,
                serves: citation.serves,
                blocks: citation.blocks,
            });
        }
        self.store.replace_best_players(match_id, &best_rows)?;
        Ok(())
    }

    /// Merges player rows that share an identity key
    ///
    /// Primary = the row with the most statistics lines, ties broken by the
    /// lowest internal id. Conflicting statistics (primary already has a line
    /// for the match) are dropped, best-player citations reassigned, bio
    /// fields merged into unset slots. Running it twice is a no-op.
    pub fn merge_duplicate_players(
        &mut self,
        source: Source,
        dry_run: bool,
    ) -> StoreResult<MergeReport> {
        let mut report = MergeReport {
            dry_run,
            ..MergeReport::default()
        };

        for key in self.store.duplicate_identity_groups(source)? {
            let members = self.store.players_by_identity(source, &key)?;
            if members.len() < 2 {
                continue;
            }
            report.groups += 1;

            // members are id-ascending, so ">" keeps the lowest id on ties
            let mut primary = members[0].clone();
            let mut primary_count = self.store.player_stat_count(primary.id)?;
            for member in &members[1..] {
                let count = self.store.player_stat_count(member.id)?;
                if count > primary_count {
                    primary = member.clone();
                    primary_count = count;
                }
            }

            info!(
                last_name = %key.last_name,
                first_name = %key.first_name,
                primary_id = primary.id,
                duplicates = members.len() - 1,
                dry_run,
                "merging duplicate players"
            );

            let primary_id = primary.id;
            for duplicate in members.iter().filter(|m| m.id != primary_id) {
                for (stat_id, match_id) in self.store.player_stat_refs(duplicate.id)? {
                    if self.store.stat_exists(match_id, primary.id)? {
                        report.stats_dropped += 1;
                        if !dry_run {
                            self.store.delete_stat(stat_id)?;
                        }
                    } else {
                        report.stats_moved += 1;
                        if !dry_run {
                            self.store.set_stat_player(stat_id, primary.id)?;
                        }
                    }
                }

                if !dry_run {
                    self.store.reassign_best_players(duplicate.id, primary.id)?;
                    if fill_missing(&mut primary, duplicate) {
                        self.store.update_player(&primary)?;
                    }
                    self.store.delete_player(duplicate.id)?;
                }
                report.duplicates_removed += 1;
            }
        }
        Ok(report)
    }
}

/// Copies `other`'s bio fields into `row`'s unset slots
fn fill_missing(row: &mut PlayerRow, other: &PlayerRow) -> bool {
    let mut changed = false;
    if row.height.is_none() && other.height.is_some() {
        row.height = other.height;
        changed = true;
    }
    if row.weight.is_none() && other.weight.is_some() {
        row.weight = other.weight;
        changed = true;
    }
    if row.position.is_none() && other.position.is_some() {
        row.position = other.position.clone();
        changed = true;
    }
    if row.photo_url.is_none() && other.photo_url.is_some() {
        row.photo_url = other.photo_url.clone();
        changed = true;
    }
    changed
}

fn now_stamp() -> String {
    Utc::now().naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()
}
