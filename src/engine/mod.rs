pub mod catalog;
pub mod combo;
pub mod composer;
pub mod eligibility;
pub mod error;
pub mod insights;
pub mod line;
pub mod rank;
pub mod rates;
pub mod repository;
pub mod result;
pub mod season;

#[cfg(test)]
pub mod testing;

pub use catalog::{StatCatalog, StatSpec};
pub use composer::{InsightBundle, InsightComposer, InsightRequest};
pub use error::EngineError;
pub use repository::GameLogRepository;
pub use result::{InsightResult, Status};

use std::time::Duration;

/// Tunables for one composer instance
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Games considered by the recent hit-rate
    pub hit_rate_window: usize,
    /// Games in the recent-form window
    pub recent_window: usize,
    /// Eligible games a season needs before older seasons are consulted
    pub min_season_samples: usize,
    /// Basketball minutes needed for a game to count
    pub min_minutes: u32,
    /// How many older seasons fallback may reach
    pub fallback_seasons: usize,
    /// Bound on each insight's computation
    pub insight_timeout: Duration,
    /// Overrides the repository's latest season
    pub current_season: Option<i32>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            hit_rate_window: 10,
            recent_window: 3,
            min_season_samples: 10,
            min_minutes: 10,
            fallback_seasons: 2,
            insight_timeout: Duration::from_secs(3),
            current_season: None,
        }
    }
}
