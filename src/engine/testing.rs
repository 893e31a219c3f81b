//! In-memory repository and observation builders for engine tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use super::repository::GameLogRepository;
use crate::db::models::{
    sort_most_recent_first, EntityRef, FetchFilter, GameObservation, Player, Sport, Team,
};

/// Player line for team 1 in `season`; later game ids are later dates.
/// Even game ids are home games against team 2, odd ids away at team 2.
pub fn player_obs(
    game_id: i64,
    season: i32,
    participation: &str,
    stats: &[(&str, f64)],
) -> GameObservation {
    let opening = NaiveDate::from_ymd_opt(season, 10, 1).unwrap_or_default();
    let (home, away) = if game_id % 2 == 0 { (1, 2) } else { (2, 1) };
    GameObservation {
        game_id,
        entity_id: 7,
        team_id: 1,
        season,
        game_date: Some(opening + chrono::Duration::days(game_id)),
        home_team_id: Some(home),
        away_team_id: Some(away),
        participation: Some(participation.to_string()),
        position: Some("G".to_string()),
        stats: stats
            .iter()
            .map(|(c, v)| (c.to_string(), *v))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Team line for `team_id` against `opponent_id`.
pub fn team_obs(
    game_id: i64,
    season: i32,
    team_id: i64,
    opponent_id: i64,
    stats: &[(&str, f64)],
) -> GameObservation {
    let mut obs = player_obs(game_id, season, "0", stats);
    obs.entity_id = team_id;
    obs.team_id = team_id;
    obs.home_team_id = Some(team_id);
    obs.away_team_id = Some(opponent_id);
    obs.participation = None;
    obs.position = None;
    obs
}

/// Test double for `GameLogRepository` with injectable failures and delays
#[derive(Default)]
pub struct MemoryRepository {
    players: HashMap<i64, Player>,
    teams: HashMap<i64, Team>,
    player_rows: Vec<GameObservation>,
    team_rows: Vec<GameObservation>,
    latest: HashMap<Sport, i32>,
    /// Fetches for these entities fail
    failing: Vec<EntityRef>,
    /// Fetches for these entities sleep first
    slow: Vec<(EntityRef, Duration)>,
    /// Fetches for these entities block their thread, like a slow SQLite query
    blocking: Vec<(EntityRef, Duration)>,
    fetch_log: Mutex<Vec<(EntityRef, FetchFilter)>>,
}

impl MemoryRepository {
    pub fn add_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub fn add_team(&mut self, team: Team) {
        self.teams.insert(team.id, team);
    }

    pub fn set_latest_season(&mut self, sport: Sport, season: i32) {
        self.latest.insert(sport, season);
    }

    pub fn push_player(&mut self, player_id: i64, mut obs: GameObservation) {
        obs.entity_id = player_id;
        self.player_rows.push(obs);
    }

    pub fn push_team(&mut self, obs: GameObservation) {
        self.team_rows.push(obs);
    }

    pub fn fail_for(&mut self, entity: EntityRef) {
        self.failing.push(entity);
    }

    pub fn delay_for(&mut self, entity: EntityRef, delay: Duration) {
        self.slow.push((entity, delay));
    }

    pub fn block_for(&mut self, entity: EntityRef, delay: Duration) {
        self.blocking.push((entity, delay));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_log.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn seasons_fetched(&self) -> Vec<Option<i32>> {
        self.fetch_log
            .lock()
            .map(|log| log.iter().map(|(_, f)| f.season).collect())
            .unwrap_or_default()
    }

    fn matches(entity: EntityRef, filter: &FetchFilter, obs: &GameObservation) -> bool {
        let entity_ok = match entity {
            EntityRef::Player(id) | EntityRef::Team(id) => obs.entity_id == id,
            EntityRef::LeaguePlayers(_) | EntityRef::LeagueTeams(_) => true,
        };
        let season_ok = filter.season.map_or(true, |s| obs.season == s);
        let opponent_ok = filter
            .opponent_id
            .map_or(true, |opp| obs.opponent_id() == Some(opp));
        let position_ok = filter.position.as_deref().map_or(true, |p| {
            obs.position
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(p))
        });
        entity_ok && season_ok && opponent_ok && position_ok
    }
}

#[async_trait]
impl GameLogRepository for MemoryRepository {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_observations(
        &self,
        entity: EntityRef,
        filter: &FetchFilter,
    ) -> Result<Vec<GameObservation>> {
        if let Ok(mut log) = self.fetch_log.lock() {
            log.push((entity, filter.clone()));
        }
        if let Some((_, delay)) = self.slow.iter().find(|(e, _)| *e == entity) {
            tokio::time::sleep(*delay).await;
        }
        if let Some((_, delay)) = self.blocking.iter().find(|(e, _)| *e == entity) {
            std::thread::sleep(*delay);
        }
        if self.failing.contains(&entity) {
            return Err(anyhow!("connection reset while fetching {:?}", entity));
        }
        let source = if entity.is_team() {
            &self.team_rows
        } else {
            &self.player_rows
        };
        let mut rows: Vec<GameObservation> = source
            .iter()
            .filter(|o| Self::matches(entity, filter, o))
            .cloned()
            .collect();
        sort_most_recent_first(&mut rows);
        if let Some(limit) = filter.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn find_player(&self, player_id: i64) -> Result<Option<Player>> {
        Ok(self.players.get(&player_id).cloned())
    }

    async fn find_team(&self, team_id: i64) -> Result<Option<Team>> {
        Ok(self.teams.get(&team_id).cloned())
    }

    async fn latest_season(&self, sport: Sport) -> Result<Option<i32>> {
        Ok(self.latest.get(&sport).copied())
    }
}
