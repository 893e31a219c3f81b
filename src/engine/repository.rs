use anyhow::Result;
use async_trait::async_trait;

use crate::db::models::{EntityRef, FetchFilter, GameObservation, Player, Sport, Team};

/// Narrow read-only contract the engine has on the game-log store.
///
/// Observations come back most recent first and already carry the schedule
/// context (date, season, home/away team ids) the engine needs.
#[async_trait]
pub trait GameLogRepository: Send + Sync {
    async fn fetch_observations(
        &self,
        entity: EntityRef,
        filter: &FetchFilter,
    ) -> Result<Vec<GameObservation>>;

    async fn find_player(&self, player_id: i64) -> Result<Option<Player>>;

    async fn find_team(&self, team_id: i64) -> Result<Option<Team>>;

    /// Most recent season with scheduled games for the sport.
    async fn latest_season(&self, sport: Sport) -> Result<Option<i32>>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
