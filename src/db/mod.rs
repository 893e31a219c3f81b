use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub mod models;
use models::*;

use crate::engine::repository::GameLogRepository;

/// Thread-safe SQLite game-log store (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Load a JSON seed document in a single transaction.
    /// Returns the number of stat lines written.
    pub fn import_seed(&self, path: &str) -> Result<usize> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path))?;
        let doc: SeedDocument =
            serde_json::from_str(&raw).context("Failed to parse seed document")?;
        self.import_document(&doc)
    }

    pub fn import_document(&self, doc: &SeedDocument) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for team in &doc.teams {
            insert_team(&tx, team)?;
        }
        for player in &doc.players {
            insert_player(&tx, player)?;
        }
        for game in &doc.games {
            insert_game(&tx, game)?;
        }
        for line in &doc.player_stats {
            insert_player_line(&tx, line)?;
        }
        for line in &doc.team_stats {
            insert_team_line(&tx, line)?;
        }
        tx.commit()?;
        Ok(doc.player_stats.len() + doc.team_stats.len())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Synchronous rusqlite work runs on the blocking pool, never on an async
    /// worker.
    async fn blocking<T, F>(&self, query: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || query(&db))
            .await
            .context("database query task failed")?
    }

    fn query_observations(
        &self,
        entity: EntityRef,
        filter: &FetchFilter,
    ) -> Result<Vec<GameObservation>> {
        let (sql, values) = observation_query(entity, filter);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), map_observation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn query_player(&self, player_id: i64) -> Result<Option<Player>> {
        let conn = self.conn()?;
        let player = conn
            .query_row(
                "SELECT id, name, team_id, position, sport FROM players WHERE id = ?1",
                params![player_id],
                map_player,
            )
            .optional()?;
        Ok(player)
    }

    fn query_team(&self, team_id: i64) -> Result<Option<Team>> {
        let conn = self.conn()?;
        let team = conn
            .query_row(
                "SELECT id, abbreviation, name, sport FROM teams WHERE id = ?1",
                params![team_id],
                map_team,
            )
            .optional()?;
        Ok(team)
    }

    fn query_latest_season(&self, sport: Sport) -> Result<Option<i32>> {
        let conn = self.conn()?;
        let season: Option<i32> = conn.query_row(
            "SELECT MAX(season) FROM games WHERE sport = ?1",
            params![sport.as_str()],
            |row| row.get(0),
        )?;
        Ok(season)
    }
}

#[async_trait]
impl GameLogRepository for Database {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn fetch_observations(
        &self,
        entity: EntityRef,
        filter: &FetchFilter,
    ) -> Result<Vec<GameObservation>> {
        let owned = filter.clone();
        let rows = self
            .blocking(move |db| db.query_observations(entity, &owned))
            .await?;
        debug!("Fetched {} observation(s) for {:?} ({:?})", rows.len(), entity, filter);
        Ok(rows)
    }

    async fn find_player(&self, player_id: i64) -> Result<Option<Player>> {
        self.blocking(move |db| db.query_player(player_id)).await
    }

    async fn find_team(&self, team_id: i64) -> Result<Option<Team>> {
        self.blocking(move |db| db.query_team(team_id)).await
    }

    async fn latest_season(&self, sport: Sport) -> Result<Option<i32>> {
        self.blocking(move |db| db.query_latest_season(sport)).await
    }
}

// ── Seed document ──────────────────────────────────────────────────────────────

/// Bulk-import format accepted by `--seed-file`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub games: Vec<SeedGame>,
    #[serde(default)]
    pub player_stats: Vec<SeedPlayerLine>,
    #[serde(default)]
    pub team_stats: Vec<SeedTeamLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedGame {
    pub id: i64,
    pub sport: Sport,
    pub season: i32,
    pub game_date: NaiveDate,
    pub home_team_id: i64,
    pub away_team_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedPlayerLine {
    pub player_id: i64,
    pub team_id: i64,
    pub game_id: i64,
    pub season: i32,
    pub sport: Sport,
    pub participation: Option<String>,
    pub position: Option<String>,
    #[serde(default)]
    pub stats: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedTeamLine {
    pub team_id: i64,
    pub game_id: i64,
    pub season: i32,
    pub sport: Sport,
    #[serde(default)]
    pub stats: BTreeMap<String, Option<f64>>,
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn insert_team(conn: &Connection, team: &Team) -> Result<()> {
    conn.execute(
        "INSERT INTO teams (id, abbreviation, name, sport) VALUES (?1,?2,?3,?4)
         ON CONFLICT(id) DO UPDATE SET
            abbreviation=excluded.abbreviation,
            name=excluded.name,
            sport=excluded.sport",
        params![team.id, team.abbreviation, team.name, team.sport.as_str()],
    )?;
    Ok(())
}

fn insert_player(conn: &Connection, player: &Player) -> Result<()> {
    conn.execute(
        "INSERT INTO players (id, name, team_id, position, sport) VALUES (?1,?2,?3,?4,?5)
         ON CONFLICT(id) DO UPDATE SET
            name=excluded.name,
            team_id=excluded.team_id,
            position=excluded.position,
            sport=excluded.sport",
        params![
            player.id,
            player.name,
            player.team_id,
            player.position,
            player.sport.as_str(),
        ],
    )?;
    Ok(())
}

fn insert_game(conn: &Connection, game: &SeedGame) -> Result<()> {
    conn.execute(
        "INSERT INTO games (id, sport, season, game_date, home_team_id, away_team_id)
         VALUES (?1,?2,?3,?4,?5,?6)
         ON CONFLICT(id) DO UPDATE SET
            season=excluded.season,
            game_date=excluded.game_date,
            home_team_id=excluded.home_team_id,
            away_team_id=excluded.away_team_id",
        params![
            game.id,
            game.sport.as_str(),
            game.season,
            game.game_date,
            game.home_team_id,
            game.away_team_id,
        ],
    )?;
    Ok(())
}

fn insert_player_line(conn: &Connection, line: &SeedPlayerLine) -> Result<()> {
    let stats = serde_json::to_string(&line.stats)?;
    conn.execute(
        "INSERT INTO player_game_stats (
            player_id, team_id, game_id, season, sport, participation, position, stats
         ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
         ON CONFLICT(player_id, game_id) DO UPDATE SET
            participation=excluded.participation,
            position=excluded.position,
            stats=excluded.stats",
        params![
            line.player_id,
            line.team_id,
            line.game_id,
            line.season,
            line.sport.as_str(),
            line.participation,
            line.position,
            stats,
        ],
    )?;
    Ok(())
}

fn insert_team_line(conn: &Connection, line: &SeedTeamLine) -> Result<()> {
    let stats = serde_json::to_string(&line.stats)?;
    conn.execute(
        "INSERT INTO team_game_stats (team_id, game_id, season, sport, stats)
         VALUES (?1,?2,?3,?4,?5)
         ON CONFLICT(team_id, game_id) DO UPDATE SET stats=excluded.stats",
        params![line.team_id, line.game_id, line.season, line.sport.as_str(), stats],
    )?;
    Ok(())
}

/// Build the SELECT for an observation fetch. Stat rows are LEFT JOINed to
/// the schedule so unmatched rows come back without date or home/away context.
fn observation_query(entity: EntityRef, filter: &FetchFilter) -> (String, Vec<Value>) {
    let mut values: Vec<Value> = Vec::new();
    let mut sql = if entity.is_team() {
        String::from(
            "SELECT s.game_id, s.team_id, s.team_id, s.season, g.game_date,
                    g.home_team_id, g.away_team_id, NULL, NULL, s.stats
             FROM team_game_stats s LEFT JOIN games g ON g.id = s.game_id",
        )
    } else {
        String::from(
            "SELECT s.game_id, s.player_id, s.team_id, s.season, g.game_date,
                    g.home_team_id, g.away_team_id, s.participation, s.position, s.stats
             FROM player_game_stats s LEFT JOIN games g ON g.id = s.game_id",
        )
    };

    match entity {
        EntityRef::Player(id) => {
            sql.push_str(" WHERE s.player_id = ?");
            values.push(Value::Integer(id));
        }
        EntityRef::Team(id) => {
            sql.push_str(" WHERE s.team_id = ?");
            values.push(Value::Integer(id));
        }
        EntityRef::LeaguePlayers(sport) | EntityRef::LeagueTeams(sport) => {
            sql.push_str(" WHERE s.sport = ?");
            values.push(Value::Text(sport.as_str().to_string()));
        }
    }

    if let Some(season) = filter.season {
        sql.push_str(" AND s.season = ?");
        values.push(Value::Integer(season as i64));
    }
    if let Some(opponent) = filter.opponent_id {
        sql.push_str(" AND (g.home_team_id = ? OR g.away_team_id = ?) AND s.team_id != ?");
        values.extend([
            Value::Integer(opponent),
            Value::Integer(opponent),
            Value::Integer(opponent),
        ]);
    }
    if let Some(position) = &filter.position {
        if !entity.is_team() {
            sql.push_str(" AND UPPER(s.position) = UPPER(?)");
            values.push(Value::Text(position.clone()));
        }
    }

    sql.push_str(" ORDER BY g.game_date IS NULL, g.game_date DESC, s.game_id DESC");

    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(limit as i64));
    }

    (sql, values)
}

fn map_observation(row: &rusqlite::Row) -> rusqlite::Result<GameObservation> {
    let raw_stats: String = row.get(9)?;
    let parsed: BTreeMap<String, Option<f64>> = serde_json::from_str(&raw_stats)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;
    let stats = parsed
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, v)))
        .collect();
    Ok(GameObservation {
        game_id: row.get(0)?,
        entity_id: row.get(1)?,
        team_id: row.get(2)?,
        season: row.get(3)?,
        game_date: row.get(4)?,
        home_team_id: row.get(5)?,
        away_team_id: row.get(6)?,
        participation: row.get(7)?,
        position: row.get(8)?,
        stats,
    })
}

fn map_sport(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Sport> {
    let raw: String = row.get(idx)?;
    Sport::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown sport '{}'", raw).into(),
        )
    })
}

fn map_player(row: &rusqlite::Row) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        name: row.get(1)?,
        team_id: row.get(2)?,
        position: row.get(3)?,
        sport: map_sport(row, 4)?,
    })
}

fn map_team(row: &rusqlite::Row) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        abbreviation: row.get(1)?,
        name: row.get(2)?,
        sport: map_sport(row, 3)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS).
/// Stat rows carry their own season so a row whose game is missing is still
/// attributable to a season.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS teams (
    id           INTEGER PRIMARY KEY,
    abbreviation TEXT    NOT NULL,
    name         TEXT    NOT NULL,
    sport        TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS players (
    id        INTEGER PRIMARY KEY,
    name      TEXT    NOT NULL,
    team_id   INTEGER NOT NULL,
    position  TEXT,
    sport     TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS games (
    id           INTEGER PRIMARY KEY,
    sport        TEXT    NOT NULL,
    season       INTEGER NOT NULL,
    game_date    TEXT    NOT NULL,
    home_team_id INTEGER NOT NULL,
    away_team_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS player_game_stats (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    player_id     INTEGER NOT NULL,
    team_id       INTEGER NOT NULL,
    game_id       INTEGER NOT NULL,
    season        INTEGER NOT NULL,
    sport         TEXT    NOT NULL,
    participation TEXT,
    position      TEXT,
    stats         TEXT    NOT NULL DEFAULT '{}',
    UNIQUE (player_id, game_id)
);

CREATE TABLE IF NOT EXISTS team_game_stats (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    team_id   INTEGER NOT NULL,
    game_id   INTEGER NOT NULL,
    season    INTEGER NOT NULL,
    sport     TEXT    NOT NULL,
    stats     TEXT    NOT NULL DEFAULT '{}',
    UNIQUE (team_id, game_id)
);

CREATE INDEX IF NOT EXISTS idx_games_sport_season ON games(sport, season);
CREATE INDEX IF NOT EXISTS idx_player_stats_player ON player_game_stats(player_id, season);
CREATE INDEX IF NOT EXISTS idx_player_stats_sport ON player_game_stats(sport, season);
CREATE INDEX IF NOT EXISTS idx_team_stats_team ON team_game_stats(team_id, season);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        let doc: SeedDocument = serde_json::from_str(
            r#"{
              "teams": [
                {"id": 1, "abbreviation": "BOS", "name": "Boston", "sport": "basketball"},
                {"id": 2, "abbreviation": "NYK", "name": "New York", "sport": "basketball"}
              ],
              "players": [
                {"id": 100, "name": "Guard One", "team_id": 1, "position": "G", "sport": "basketball"}
              ],
              "games": [
                {"id": 10, "sport": "basketball", "season": 2024, "game_date": "2024-11-01", "home_team_id": 1, "away_team_id": 2},
                {"id": 11, "sport": "basketball", "season": 2024, "game_date": "2024-11-03", "home_team_id": 2, "away_team_id": 1},
                {"id": 5, "sport": "basketball", "season": 2023, "game_date": "2023-12-01", "home_team_id": 1, "away_team_id": 2}
              ],
              "player_stats": [
                {"player_id": 100, "team_id": 1, "game_id": 10, "season": 2024, "sport": "basketball", "participation": "34:10", "position": "G", "stats": {"pts": 20, "reb": null}},
                {"player_id": 100, "team_id": 1, "game_id": 11, "season": 2024, "sport": "basketball", "participation": "30", "position": "G", "stats": {"pts": 28, "reb": 4}},
                {"player_id": 100, "team_id": 1, "game_id": 5, "season": 2023, "sport": "basketball", "participation": "31", "position": "G", "stats": {"pts": 12}},
                {"player_id": 100, "team_id": 1, "game_id": 99, "season": 2024, "sport": "basketball", "participation": "31", "position": "G", "stats": {"pts": 40}}
              ],
              "team_stats": [
                {"team_id": 1, "game_id": 10, "season": 2024, "sport": "basketball", "stats": {"fga": 88, "fta": 20, "oreb": 10, "tov": 12}}
              ]
            }"#,
        )
        .unwrap();
        assert_eq!(db.import_document(&doc).unwrap(), 5);
        db
    }

    #[tokio::test]
    async fn test_fetch_orders_most_recent_first_with_unlinked_last() {
        let db = seeded();
        let rows = db
            .fetch_observations(EntityRef::Player(100), &FetchFilter::season(2024))
            .await
            .unwrap();
        let ids: Vec<i64> = rows.iter().map(|o| o.game_id).collect();
        assert_eq!(ids, vec![11, 10, 99]);
        assert!(!rows[2].is_linked());
        assert_eq!(rows[0].is_home(), Some(false));
        assert_eq!(rows[0].opponent_id(), Some(2));
    }

    #[tokio::test]
    async fn test_null_stats_are_absent() {
        let db = seeded();
        let rows = db
            .fetch_observations(EntityRef::Player(100), &FetchFilter::season(2024).limit(2))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        let game_10 = rows.iter().find(|o| o.game_id == 10).unwrap();
        assert_eq!(game_10.stat("pts"), Some(20.0));
        assert_eq!(game_10.stat("reb"), None);
        assert_eq!(game_10.participation.as_deref(), Some("34:10"));
    }

    #[tokio::test]
    async fn test_opponent_filter_spans_seasons() {
        let db = seeded();
        let rows = db
            .fetch_observations(EntityRef::Player(100), &FetchFilter::all_seasons().against(2))
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|o| o.opponent_id() == Some(2)));
    }

    #[tokio::test]
    async fn test_position_filter_on_league_cohort() {
        let db = seeded();
        let guards = db
            .fetch_observations(
                EntityRef::LeaguePlayers(Sport::Basketball),
                &FetchFilter::season(2024).position(Some("g")),
            )
            .await
            .unwrap();
        assert_eq!(guards.len(), 3);
        let centers = db
            .fetch_observations(
                EntityRef::LeaguePlayers(Sport::Basketball),
                &FetchFilter::season(2024).position(Some("C")),
            )
            .await
            .unwrap();
        assert!(centers.is_empty());
    }

    #[tokio::test]
    async fn test_team_lines_and_lookups() {
        let db = seeded();
        let rows = db
            .fetch_observations(EntityRef::LeagueTeams(Sport::Basketball), &FetchFilter::season(2024))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_id, 1);
        assert_eq!(rows[0].participation, None);

        assert_eq!(db.latest_season(Sport::Basketball).await.unwrap(), Some(2024));
        assert_eq!(db.latest_season(Sport::Football).await.unwrap(), None);
        let player = db.find_player(100).await.unwrap().unwrap();
        assert_eq!(player.sport, Sport::Basketball);
        assert!(db.find_player(404).await.unwrap().is_none());
        assert_eq!(db.find_team(2).await.unwrap().unwrap().abbreviation, "NYK");
    }
}
