//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the [`Store`] trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Store, StoreResult};
use crate::storage::{
    BestPlayerRow, IdentityKey, MatchRow, MatchStatus, PlayerRow, PlayerStatRow, RefereeRow,
    SeasonRow, Source, StoreCounts, TeamRosterRow, TeamRow, Tournament,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens or creates a database at the given path
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database, used by tests
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn date_to_db(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FMT).to_string())
}

fn date_from_db(text: Option<String>) -> Option<NaiveDate> {
    text.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok())
}

fn datetime_to_db(dt: Option<NaiveDateTime>) -> Option<String> {
    dt.map(|d| d.format(DATETIME_FMT).to_string())
}

fn datetime_from_db(text: Option<String>) -> Option<NaiveDateTime> {
    text.and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FMT).ok())
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<TeamRow> {
    Ok(TeamRow {
        id: row.get(0)?,
        source: Source::from_db_string(&row.get::<_, String>(1)?).unwrap_or(Source::City),
        site_id: row.get(2)?,
        name: row.get(3)?,
        logo_url: row.get(4)?,
        is_women: row.get(5)?,
    })
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<PlayerRow> {
    Ok(PlayerRow {
        id: row.get(0)?,
        source: Source::from_db_string(&row.get::<_, String>(1)?).unwrap_or(Source::City),
        site_id: row.get(2)?,
        last_name: row.get(3)?,
        first_name: row.get(4)?,
        birth_date: date_from_db(row.get(5)?),
        height: row.get(6)?,
        weight: row.get(7)?,
        position: row.get(8)?,
        photo_url: row.get(9)?,
    })
}

fn referee_from_row(row: &Row<'_>) -> rusqlite::Result<RefereeRow> {
    Ok(RefereeRow {
        id: row.get(0)?,
        source: Source::from_db_string(&row.get::<_, String>(1)?).unwrap_or(Source::City),
        site_id: row.get(2)?,
        last_name: row.get(3)?,
        first_name: row.get(4)?,
        photo_url: row.get(5)?,
    })
}

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        id: row.get(0)?,
        source: Source::from_db_string(&row.get::<_, String>(1)?).unwrap_or(Source::City),
        site_id: row.get(2)?,
        season_id: row.get(3)?,
        status: MatchStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(MatchStatus::Unknown),
        date_time: datetime_from_db(row.get(5)?),
        venue: row.get(6)?,
        tournament: row
            .get::<_, Option<String>>(7)?
            .and_then(|s| Tournament::from_db_string(&s)),
        division_name: row.get(8)?,
        round_name: row.get(9)?,
        home_team_id: row.get(10)?,
        away_team_id: row.get(11)?,
        home_score: row.get(12)?,
        away_score: row.get(13)?,
        set_scores: row.get(14)?,
        parsed_at: row.get(15)?,
    })
}

const MATCH_COLS: &str = "id, source, site_id, season_id, status, date_time, venue, tournament,
     division_name, round_name, home_team_id, away_team_id, home_score, away_score,
     set_scores, parsed_at";

impl Store for SqliteStore {
    // ===== Seasons =====

    fn season_by_number(&self, number: u32) -> StoreResult<Option<SeasonRow>> {
        let season = self
            .conn
            .query_row(
                "SELECT id, number, name FROM seasons WHERE number = ?1",
                params![number],
                |row| {
                    Ok(SeasonRow {
                        id: row.get(0)?,
                        number: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(season)
    }

    fn insert_season(&mut self, number: u32, name: &str) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO seasons (number, name) VALUES (?1, ?2)",
            params![number, name],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn set_season_name(&mut self, season_id: i64, name: &str) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE seasons SET name = ?1 WHERE id = ?2",
            params![name, season_id],
        )?;
        Ok(())
    }

    fn max_season_number(&self) -> StoreResult<Option<u32>> {
        let max: Option<u32> =
            self.conn
                .query_row("SELECT MAX(number) FROM seasons", [], |row| row.get(0))?;
        Ok(max)
    }

    // ===== Teams =====

    fn team_by_site(&self, source: Source, site_id: u32) -> StoreResult<Option<TeamRow>> {
        let team = self
            .conn
            .query_row(
                "SELECT id, source, site_id, name, logo_url, is_women
                 FROM teams WHERE source = ?1 AND site_id = ?2",
                params![source.to_db_string(), site_id],
                team_from_row,
            )
            .optional()?;
        Ok(team)
    }

    fn insert_team(&mut self, row: &TeamRow) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO teams (source, site_id, name, logo_url, is_women)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.source.to_db_string(),
                row.site_id,
                row.name,
                row.logo_url,
                row.is_women
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_team(&mut self, row: &TeamRow) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE teams SET name = ?1, logo_url = ?2, is_women = ?3 WHERE id = ?4",
            params![row.name, row.logo_url, row.is_women, row.id],
        )?;
        Ok(())
    }

    // ===== Players =====

    fn player_by_site(&self, source: Source, site_id: u32) -> StoreResult<Option<PlayerRow>> {
        let player = self
            .conn
            .query_row(
                "SELECT id, source, site_id, last_name, first_name, birth_date, height,
                        weight, position, photo_url
                 FROM players WHERE source = ?1 AND site_id = ?2",
                params![source.to_db_string(), site_id],
                player_from_row,
            )
            .optional()?;
        Ok(player)
    }

    fn player_by_identity(
        &self,
        source: Source,
        key: &IdentityKey,
    ) -> StoreResult<Option<PlayerRow>> {
        let player = self
            .conn
            .query_row(
                "SELECT id, source, site_id, last_name, first_name, birth_date, height,
                        weight, position, photo_url
                 FROM players
                 WHERE source = ?1 AND last_name = ?2 AND first_name = ?3 AND birth_date = ?4
                 ORDER BY id LIMIT 1",
                params![
                    source.to_db_string(),
                    key.last_name,
                    key.first_name,
                    key.birth_date.format(DATE_FMT).to_string()
                ],
                player_from_row,
            )
            .optional()?;
        Ok(player)
    }

    fn insert_player(&mut self, row: &PlayerRow) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO players (source, site_id, last_name, first_name, birth_date,
                                  height, weight, position, photo_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.source.to_db_string(),
                row.site_id,
                row.last_name,
                row.first_name,
                date_to_db(row.birth_date),
                row.height,
                row.weight,
                row.position,
                row.photo_url
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_player(&mut self, row: &PlayerRow) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE players SET last_name = ?1, first_name = ?2, birth_date = ?3,
                    height = ?4, weight = ?5, position = ?6, photo_url = ?7
             WHERE id = ?8",
            params![
                row.last_name,
                row.first_name,
                date_to_db(row.birth_date),
                row.height,
                row.weight,
                row.position,
                row.photo_url,
                row.id
            ],
        )?;
        Ok(())
    }

    fn delete_player(&mut self, player_id: i64) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM players WHERE id = ?1", params![player_id])?;
        Ok(())
    }

    fn duplicate_identity_groups(&self, source: Source) -> StoreResult<Vec<IdentityKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT last_name, first_name, birth_date FROM players
             WHERE source = ?1 AND birth_date IS NOT NULL AND birth_date != ''
             GROUP BY last_name, first_name, birth_date
             HAVING COUNT(id) > 1",
        )?;

        let rows = stmt.query_map(params![source.to_db_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut groups = Vec::new();
        for row in rows {
            let (last_name, first_name, birth) = row?;
            if let Some(birth_date) = date_from_db(Some(birth)) {
                groups.push(IdentityKey {
                    last_name,
                    first_name,
                    birth_date,
                });
            }
        }
        Ok(groups)
    }

    fn players_by_identity(
        &self,
        source: Source,
        key: &IdentityKey,
    ) -> StoreResult<Vec<PlayerRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source, site_id, last_name, first_name, birth_date, height,
                    weight, position, photo_url
             FROM players
             WHERE source = ?1 AND last_name = ?2 AND first_name = ?3 AND birth_date = ?4
             ORDER BY id",
        )?;

        let rows = stmt.query_map(
            params![
                source.to_db_string(),
                key.last_name,
                key.first_name,
                key.birth_date.format(DATE_FMT).to_string()
            ],
            player_from_row,
        )?;

        let mut players = Vec::new();
        for row in rows {
            players.push(row?);
        }
        Ok(players)
    }

    // ===== Referees =====

    fn referee_by_site(&self, source: Source, site_id: u32) -> StoreResult<Option<RefereeRow>> {
        let referee = self
            .conn
            .query_row(
                "SELECT id, source, site_id, last_name, first_name, photo_url
                 FROM referees WHERE source = ?1 AND site_id = ?2",
                params![source.to_db_string(), site_id],
                referee_from_row,
            )
            .optional()?;
        Ok(referee)
    }

    fn insert_referee(&mut self, row: &RefereeRow) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO referees (source, site_id, last_name, first_name, photo_url)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.source.to_db_string(),
                row.site_id,
                row.last_name,
                row.first_name,
                row.photo_url
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_referee(&mut self, row: &RefereeRow) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE referees SET last_name = ?1, first_name = ?2, photo_url = ?3 WHERE id = ?4",
            params![row.last_name, row.first_name, row.photo_url, row.id],
        )?;
        Ok(())
    }

    // ===== Matches =====

    fn match_by_site(&self, source: Source, site_id: u32) -> StoreResult<Option<MatchRow>> {
        let sql = format!(
            "SELECT {} FROM matches WHERE source = ?1 AND site_id = ?2",
            MATCH_COLS
        );
        let m = self
            .conn
            .query_row(
                &sql,
                params![source.to_db_string(), site_id],
                match_from_row,
            )
            .optional()?;
        Ok(m)
    }

    fn match_exists(&self, source: Source, site_id: u32) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM matches WHERE source = ?1 AND site_id = ?2",
            params![source.to_db_string(), site_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn upsert_match(&mut self, row: &MatchRow) -> StoreResult<(i64, bool)> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM matches WHERE source = ?1 AND site_id = ?2",
                params![row.source.to_db_string(), row.site_id],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            // COALESCE keeps an existing season link when the caller has none
            self.conn.execute(
                "UPDATE matches SET season_id = COALESCE(?1, season_id), status = ?2,
                        date_time = ?3, venue = ?4, tournament = ?5, division_name = ?6,
                        round_name = ?7, home_team_id = ?8, away_team_id = ?9,
                        home_score = ?10, away_score = ?11, set_scores = ?12, parsed_at = ?13
                 WHERE id = ?14",
                params![
                    row.season_id,
                    row.status.to_db_string(),
                    datetime_to_db(row.date_time),
                    row.venue,
                    row.tournament.map(|t| t.to_db_string()),
                    row.division_name,
                    row.round_name,
                    row.home_team_id,
                    row.away_team_id,
                    row.home_score,
                    row.away_score,
                    row.set_scores,
                    row.parsed_at,
                    id
                ],
            )?;
            Ok((id, false))
        } else {
            self.conn.execute(
                "INSERT INTO matches (source, site_id, season_id, status, date_time, venue,
                        tournament, division_name, round_name, home_team_id, away_team_id,
                        home_score, away_score, set_scores, parsed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    row.source.to_db_string(),
                    row.site_id,
                    row.season_id,
                    row.status.to_db_string(),
                    datetime_to_db(row.date_time),
                    row.venue,
                    row.tournament.map(|t| t.to_db_string()),
                    row.division_name,
                    row.round_name,
                    row.home_team_id,
                    row.away_team_id,
                    row.home_score,
                    row.away_score,
                    row.set_scores,
                    row.parsed_at
                ],
            )?;
            Ok((self.conn.last_insert_rowid(), true))
        }
    }

    fn insert_empty_match(&mut self, source: Source, site_id: u32) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO matches (source, site_id, status) VALUES (?1, ?2, ?3)",
            params![
                source.to_db_string(),
                site_id,
                MatchStatus::Empty.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn match_site_ids(&self, source: Source) -> StoreResult<BTreeSet<u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT site_id FROM matches WHERE source = ?1")?;
        let rows = stmt.query_map(params![source.to_db_string()], |row| row.get::<_, u32>(0))?;

        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    fn max_confirmed_site_id(&self, source: Source) -> StoreResult<u32> {
        let max: Option<u32> = self.conn.query_row(
            "SELECT MAX(site_id) FROM matches
             WHERE source = ?1 AND status != 'empty' AND home_team_id IS NOT NULL",
            params![source.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    fn match_has_player_stats(&self, source: Source, site_id: u32) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM match_player_stats s
             JOIN matches m ON m.id = s.match_id
             WHERE m.source = ?1 AND m.site_id = ?2",
            params![source.to_db_string(), site_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ===== Match references =====

    fn replace_player_stats(&mut self, match_id: i64, stats: &[PlayerStatRow]) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM match_player_stats WHERE match_id = ?1",
            params![match_id],
        )?;
        for stat in stats {
            tx.execute(
                "INSERT OR IGNORE INTO match_player_stats
                     (match_id, player_id, team_id, jersey_number, points, attacks, serves, blocks)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    match_id,
                    stat.player_id,
                    stat.team_id,
                    stat.jersey_number,
                    stat.points,
                    stat.attacks,
                    stat.serves,
                    stat.blocks
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_best_players(&mut self, match_id: i64, rows: &[BestPlayerRow]) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM best_players WHERE match_id = ?1",
            params![match_id],
        )?;
        for bp in rows {
            tx.execute(
                "INSERT INTO best_players
                     (match_id, player_id, player_name, points, attacks, serves, blocks)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    match_id,
                    bp.player_id,
                    bp.player_name,
                    bp.points,
                    bp.attacks,
                    bp.serves,
                    bp.blocks
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_match_referees(&mut self, match_id: i64, referee_ids: &[i64]) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM match_referees WHERE match_id = ?1",
            params![match_id],
        )?;
        for referee_id in referee_ids {
            tx.execute(
                "INSERT OR IGNORE INTO match_referees (match_id, referee_id) VALUES (?1, ?2)",
                params![match_id, referee_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn player_stat_count(&self, player_id: i64) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM match_player_stats WHERE player_id = ?1",
            params![player_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn player_stat_refs(&self, player_id: i64) -> StoreResult<Vec<(i64, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, match_id FROM match_player_stats WHERE player_id = ?1")?;
        let rows = stmt.query_map(params![player_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut refs = Vec::new();
        for row in rows {
            refs.push(row?);
        }
        Ok(refs)
    }

    fn stat_exists(&self, match_id: i64, player_id: i64) -> StoreResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM match_player_stats WHERE match_id = ?1 AND player_id = ?2",
            params![match_id, player_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn set_stat_player(&mut self, stat_id: i64, player_id: i64) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE match_player_stats SET player_id = ?1 WHERE id = ?2",
            params![player_id, stat_id],
        )?;
        Ok(())
    }

    fn delete_stat(&mut self, stat_id: i64) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM match_player_stats WHERE id = ?1",
            params![stat_id],
        )?;
        Ok(())
    }

    fn reassign_best_players(&mut self, from_player: i64, to_player: i64) -> StoreResult<()> {
        self.conn.execute(
            "UPDATE best_players SET player_id = ?1 WHERE player_id = ?2",
            params![to_player, from_player],
        )?;
        Ok(())
    }

    // ===== Team rosters =====

    fn insert_roster_entry(&mut self, row: &TeamRosterRow) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO team_rosters
                 (team_id, player_id, roster_site_id, season_label, jersey_number)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.team_id,
                row.player_id,
                row.roster_site_id,
                row.season_label,
                row.jersey_number
            ],
        )?;
        Ok(changed > 0)
    }

    fn roster_entries_for_team(&self, team_id: i64) -> StoreResult<Vec<TeamRosterRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, team_id, player_id, roster_site_id, season_label, jersey_number
             FROM team_rosters WHERE team_id = ?1 ORDER BY roster_site_id, player_id",
        )?;
        let rows = stmt.query_map(params![team_id], |row| {
            Ok(TeamRosterRow {
                id: row.get(0)?,
                team_id: row.get(1)?,
                player_id: row.get(2)?,
                roster_site_id: row.get(3)?,
                season_label: row.get(4)?,
                jersey_number: row.get(5)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    // ===== Season-derived candidate sets =====

    fn season_match_site_ids(&self, season_id: i64) -> StoreResult<Vec<u32>> {
        let mut stmt = self.conn.prepare(
            "SELECT site_id FROM matches
             WHERE season_id = ?1 AND status != 'empty'
             ORDER BY site_id",
        )?;
        let rows = stmt.query_map(params![season_id], |row| row.get::<_, u32>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn season_player_site_ids(&self, season_id: i64) -> StoreResult<Vec<u32>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT p.site_id FROM players p
             JOIN match_player_stats s ON s.player_id = p.id
             JOIN matches m ON m.id = s.match_id
             WHERE m.season_id = ?1
             ORDER BY p.site_id",
        )?;
        let rows = stmt.query_map(params![season_id], |row| row.get::<_, u32>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    // ===== Statistics =====

    fn counts(&self) -> StoreResult<StoreCounts> {
        let count = |sql: &str| -> StoreResult<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        Ok(StoreCounts {
            seasons: count("SELECT COUNT(*) FROM seasons")?,
            city_matches: count(
                "SELECT COUNT(*) FROM matches WHERE source = 'city' AND status != 'empty'",
            )?,
            federation_matches: count(
                "SELECT COUNT(*) FROM matches WHERE source = 'federation' AND status != 'empty'",
            )?,
            empty_matches: count("SELECT COUNT(*) FROM matches WHERE status = 'empty'")?,
            teams: count("SELECT COUNT(*) FROM teams")?,
            players: count("SELECT COUNT(*) FROM players")?,
            referees: count("SELECT COUNT(*) FROM referees")?,
            roster_entries: count("SELECT COUNT(*) FROM team_rosters")?,
        })
    }
}
