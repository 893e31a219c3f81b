use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sport a team, player or stat catalog belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Basketball,
    Football,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Basketball => "basketball",
            Sport::Football => "football",
        }
    }

    /// Accepts the stored name plus the league shorthands providers use.
    pub fn parse(s: &str) -> Option<Sport> {
        match s.trim().to_lowercase().as_str() {
            "basketball" | "nba" => Some(Sport::Basketball),
            "football" | "nfl" | "american_football" => Some(Sport::Football),
            _ => None,
        }
    }
}

/// A franchise row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    /// e.g. "BOS", "KC"
    pub abbreviation: String,
    pub name: String,
    pub sport: Sport,
}

/// A player row with the team they currently play for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub team_id: i64,
    /// "G", "F", "C" for basketball; "QB", "RB", "WR", "TE" for football
    pub position: Option<String>,
    pub sport: Sport,
}

/// Whose game logs a fetch is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Player(i64),
    Team(i64),
    /// Every player stat line in a sport (defense-allowed cohorts)
    LeaguePlayers(Sport),
    /// Every team stat line in a sport (pace cohorts)
    LeagueTeams(Sport),
}

impl EntityRef {
    pub fn is_team(&self) -> bool {
        matches!(self, EntityRef::Team(_) | EntityRef::LeagueTeams(_))
    }
}

/// Narrowing applied by the repository; ordering is always most recent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchFilter {
    pub season: Option<i32>,
    pub opponent_id: Option<i64>,
    pub position: Option<String>,
    pub limit: Option<usize>,
}

impl FetchFilter {
    pub fn season(season: i32) -> Self {
        FetchFilter {
            season: Some(season),
            ..Default::default()
        }
    }

    pub fn all_seasons() -> Self {
        FetchFilter::default()
    }

    pub fn against(mut self, opponent_id: i64) -> Self {
        self.opponent_id = Some(opponent_id);
        self
    }

    pub fn position(mut self, position: Option<&str>) -> Self {
        self.position = position.map(str::to_string);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One entity's line for one game, joined with the schedule row when it exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObservation {
    pub game_id: i64,
    /// Player id for player lines, team id for team lines
    pub entity_id: i64,
    /// Team the entity played for in this game
    pub team_id: i64,
    pub season: i32,
    /// Schedule context; `None` when the stat row has no matching game
    pub game_date: Option<NaiveDate>,
    pub home_team_id: Option<i64>,
    pub away_team_id: Option<i64>,
    /// Raw minutes ("34", "34:12") or snap count; absent for team lines
    pub participation: Option<String>,
    pub position: Option<String>,
    /// column → value; null columns are simply absent
    pub stats: BTreeMap<String, f64>,
}

impl GameObservation {
    pub fn stat(&self, column: &str) -> Option<f64> {
        self.stats.get(column).copied()
    }

    /// True when the row could be matched to a schedule row.
    pub fn is_linked(&self) -> bool {
        self.home_team_id.is_some() && self.away_team_id.is_some()
    }

    pub fn is_home(&self) -> Option<bool> {
        self.home_team_id.map(|home| home == self.team_id)
    }

    pub fn opponent_id(&self) -> Option<i64> {
        match (self.home_team_id, self.away_team_id) {
            (Some(home), Some(away)) if home == self.team_id => Some(away),
            (Some(home), Some(away)) if away == self.team_id => Some(home),
            _ => None,
        }
    }
}

/// Orders observations most recent first; undated rows sink to the end.
pub fn sort_most_recent_first(observations: &mut [GameObservation]) {
    observations.sort_by(|a, b| {
        b.game_date
            .cmp(&a.game_date)
            .then_with(|| b.game_id.cmp(&a.game_id))
    });
}
