//! Storage trait and error types

use crate::storage::{
    BestPlayerRow, IdentityKey, MatchRow, PlayerRow, PlayerStatRow, RefereeRow, SeasonRow, Source,
    StoreCounts, TeamRosterRow, TeamRow,
};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Trait for storage backend implementations
///
/// All write operations are idempotent under repeated identical input; the
/// external identifier `(source, site_id)` is the natural key for upserts.
pub trait Store {
    // ===== Seasons =====

    fn season_by_number(&self, number: u32) -> StoreResult<Option<SeasonRow>>;

    fn insert_season(&mut self, number: u32, name: &str) -> StoreResult<i64>;

    fn set_season_name(&mut self, season_id: i64, name: &str) -> StoreResult<()>;

    /// Highest season number present, if any
    fn max_season_number(&self) -> StoreResult<Option<u32>>;

    // ===== Teams =====

    fn team_by_site(&self, source: Source, site_id: u32) -> StoreResult<Option<TeamRow>>;

    fn insert_team(&mut self, row: &TeamRow) -> StoreResult<i64>;

    fn update_team(&mut self, row: &TeamRow) -> StoreResult<()>;

    // ===== Players =====

    fn player_by_site(&self, source: Source, site_id: u32) -> StoreResult<Option<PlayerRow>>;

    /// Looks up a player by the person identity key within one source
    fn player_by_identity(
        &self,
        source: Source,
        key: &IdentityKey,
    ) -> StoreResult<Option<PlayerRow>>;

    fn insert_player(&mut self, row: &PlayerRow) -> StoreResult<i64>;

    fn update_player(&mut self, row: &PlayerRow) -> StoreResult<()>;

    fn delete_player(&mut self, player_id: i64) -> StoreResult<()>;

    /// Identity keys (birth date present) shared by more than one row
    fn duplicate_identity_groups(&self, source: Source) -> StoreResult<Vec<IdentityKey>>;

    fn players_by_identity(&self, source: Source, key: &IdentityKey)
        -> StoreResult<Vec<PlayerRow>>;

    // ===== Referees =====

    fn referee_by_site(&self, source: Source, site_id: u32) -> StoreResult<Option<RefereeRow>>;

    fn insert_referee(&mut self, row: &RefereeRow) -> StoreResult<i64>;

    fn update_referee(&mut self, row: &RefereeRow) -> StoreResult<()>;

    // ===== Matches =====

    fn match_by_site(&self, source: Source, site_id: u32) -> StoreResult<Option<MatchRow>>;

    fn match_exists(&self, source: Source, site_id: u32) -> StoreResult<bool>;

    /// Inserts or updates a match keyed by `(source, site_id)`
    ///
    /// Returns the internal id and whether a new row was created.
    fn upsert_match(&mut self, row: &MatchRow) -> StoreResult<(i64, bool)>;

    /// Records a negative result for an identifier, if no row exists yet
    fn insert_empty_match(&mut self, source: Source, site_id: u32) -> StoreResult<()>;

    /// Every site id present for the source, including `empty` sentinels
    fn match_site_ids(&self, source: Source) -> StoreResult<BTreeSet<u32>>;

    /// Greatest site id among confirmed matches (home team set, not `empty`)
    fn max_confirmed_site_id(&self, source: Source) -> StoreResult<u32>;

    fn match_has_player_stats(&self, source: Source, site_id: u32) -> StoreResult<bool>;

    // ===== Match references =====

    /// Replaces all statistics lines for a match
    fn replace_player_stats(&mut self, match_id: i64, stats: &[PlayerStatRow]) -> StoreResult<()>;

    fn replace_best_players(&mut self, match_id: i64, rows: &[BestPlayerRow]) -> StoreResult<()>;

    fn replace_match_referees(&mut self, match_id: i64, referee_ids: &[i64]) -> StoreResult<()>;

    fn player_stat_count(&self, player_id: i64) -> StoreResult<u64>;

    /// `(stat id, match id)` pairs for a player's statistics lines
    fn player_stat_refs(&self, player_id: i64) -> StoreResult<Vec<(i64, i64)>>;

    fn stat_exists(&self, match_id: i64, player_id: i64) -> StoreResult<bool>;

    fn set_stat_player(&mut self, stat_id: i64, player_id: i64) -> StoreResult<()>;

    fn delete_stat(&mut self, stat_id: i64) -> StoreResult<()>;

    fn reassign_best_players(&mut self, from_player: i64, to_player: i64) -> StoreResult<()>;

    // ===== Team rosters =====

    /// Records one roster membership; returns false when the
    /// `(roster_site_id, player_id)` pair is already present
    fn insert_roster_entry(&mut self, row: &TeamRosterRow) -> StoreResult<bool>;

    fn roster_entries_for_team(&self, team_id: i64) -> StoreResult<Vec<TeamRosterRow>>;

    // ===== Season-derived candidate sets =====

    /// Site ids of all matches attached to a season
    fn season_match_site_ids(&self, season_id: i64) -> StoreResult<Vec<u32>>;

    /// Distinct player site ids appearing in a season's match statistics
    fn season_player_site_ids(&self, season_id: i64) -> StoreResult<Vec<u32>>;

    // ===== Statistics =====

    fn counts(&self) -> StoreResult<StoreCounts>;
}
