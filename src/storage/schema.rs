//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the volleysync
//! database. External identifiers are unique per (source, kind); internal ids
//! are SQLite rowids and are never reused for references.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Federation seasons
CREATE TABLE IF NOT EXISTS seasons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    number INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS teams (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    site_id INTEGER NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    logo_url TEXT,
    is_women INTEGER NOT NULL DEFAULT 0,
    UNIQUE(source, site_id)
);

CREATE TABLE IF NOT EXISTS players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    site_id INTEGER NOT NULL,
    last_name TEXT NOT NULL DEFAULT '',
    first_name TEXT NOT NULL DEFAULT '',
    birth_date TEXT,
    height INTEGER,
    weight INTEGER,
    position TEXT,
    photo_url TEXT,
    UNIQUE(source, site_id)
);

CREATE INDEX IF NOT EXISTS idx_players_identity
    ON players(source, last_name, first_name, birth_date);

CREATE TABLE IF NOT EXISTS referees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    site_id INTEGER NOT NULL,
    last_name TEXT NOT NULL DEFAULT '',
    first_name TEXT NOT NULL DEFAULT '',
    photo_url TEXT,
    UNIQUE(source, site_id)
);

-- Matches from both sources; status 'empty' rows are a negative-result cache
-- and never carry references
CREATE TABLE IF NOT EXISTS matches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    site_id INTEGER NOT NULL,
    season_id INTEGER REFERENCES seasons(id),
    status TEXT NOT NULL DEFAULT 'unknown',
    date_time TEXT,
    venue TEXT,
    tournament TEXT,
    division_name TEXT,
    round_name TEXT,
    home_team_id INTEGER REFERENCES teams(id),
    away_team_id INTEGER REFERENCES teams(id),
    home_score INTEGER,
    away_score INTEGER,
    set_scores TEXT,
    parsed_at TEXT,
    UNIQUE(source, site_id)
);

CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season_id);
CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(source, status);

CREATE TABLE IF NOT EXISTS match_player_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    match_id INTEGER NOT NULL REFERENCES matches(id),
    player_id INTEGER NOT NULL REFERENCES players(id),
    team_id INTEGER REFERENCES teams(id),
    jersey_number INTEGER,
    points INTEGER,
    attacks INTEGER,
    serves INTEGER,
    blocks INTEGER,
    UNIQUE(match_id, player_id)
);

CREATE INDEX IF NOT EXISTS idx_stats_player ON match_player_stats(player_id);

CREATE TABLE IF NOT EXISTS best_players (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    match_id INTEGER NOT NULL REFERENCES matches(id),
    player_id INTEGER REFERENCES players(id),
    player_name TEXT NOT NULL DEFAULT '',
    points INTEGER,
    attacks INTEGER,
    serves INTEGER,
    blocks INTEGER
);

CREATE INDEX IF NOT EXISTS idx_best_players_player ON best_players(player_id);

CREATE TABLE IF NOT EXISTS match_referees (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    match_id INTEGER NOT NULL REFERENCES matches(id),
    referee_id INTEGER NOT NULL REFERENCES referees(id),
    UNIQUE(match_id, referee_id)
);

-- Historical team lineups from roster pages; one page per (team, draw)
CREATE TABLE IF NOT EXISTS team_rosters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id INTEGER NOT NULL REFERENCES teams(id),
    player_id INTEGER NOT NULL REFERENCES players(id),
    roster_site_id INTEGER NOT NULL,
    season_label TEXT,
    jersey_number INTEGER,
    UNIQUE(roster_site_id, player_id)
);

CREATE INDEX IF NOT EXISTS idx_rosters_team ON team_rosters(team_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
