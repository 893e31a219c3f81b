use clap::Parser;
use std::time::Duration;

use crate::engine::season::MAX_FALLBACK_SEASONS;
use crate::engine::EngineSettings;

/// Player and team prop insight service
#[derive(Parser, Debug, Clone)]
#[command(name = "prop-insights", version, about)]
pub struct Config {
    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "insights.db")]
    pub database_path: String,

    /// API listen address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8080")]
    pub api_addr: String,

    /// JSON seed document imported at startup (teams, players, games, stat lines)
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<String>,

    /// Per-insight computation timeout in milliseconds
    #[arg(long, env = "INSIGHT_TIMEOUT_MS", default_value = "3000")]
    pub insight_timeout_ms: u64,

    /// Games considered by the recent hit-rate
    #[arg(long, env = "HIT_RATE_WINDOW", default_value = "10")]
    pub hit_rate_window: usize,

    /// Games in the recent-form window
    #[arg(long, env = "RECENT_WINDOW", default_value = "3")]
    pub recent_window: usize,

    /// Eligible current-season games needed before older seasons are used
    #[arg(long, env = "MIN_SEASON_SAMPLES", default_value = "10")]
    pub min_season_samples: usize,

    /// Minutes a basketball player needs for a game to count
    #[arg(long, env = "MIN_MINUTES", default_value = "10")]
    pub min_minutes: u32,

    /// How many prior seasons fallback may reach
    #[arg(long, env = "FALLBACK_SEASONS", default_value = "2")]
    pub fallback_seasons: usize,

    /// Current season start year; defaults to the latest season in the store
    #[arg(long, env = "CURRENT_SEASON")]
    pub current_season: Option<i32>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.insight_timeout_ms == 0 {
            anyhow::bail!("insight_timeout_ms must be positive");
        }
        if self.hit_rate_window == 0 {
            anyhow::bail!("hit_rate_window must be at least 1");
        }
        if self.recent_window == 0 {
            anyhow::bail!("recent_window must be at least 1");
        }
        if self.min_season_samples == 0 {
            anyhow::bail!("min_season_samples must be at least 1");
        }
        if self.fallback_seasons > MAX_FALLBACK_SEASONS {
            anyhow::bail!("fallback_seasons must be at most {}", MAX_FALLBACK_SEASONS);
        }
        if let Some(season) = self.current_season {
            if !(1900..=2100).contains(&season) {
                anyhow::bail!("current_season {} is not a plausible season year", season);
            }
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            hit_rate_window: self.hit_rate_window,
            recent_window: self.recent_window,
            min_season_samples: self.min_season_samples,
            min_minutes: self.min_minutes,
            fallback_seasons: self.fallback_seasons,
            insight_timeout: Duration::from_millis(self.insight_timeout_ms),
            current_season: self.current_season,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_engine_defaults() {
        let config = Config::try_parse_from(["prop-insights"]).unwrap();
        config.validate().unwrap();
        assert_eq!(config.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn test_rejects_zero_window() {
        let config = Config::try_parse_from(["prop-insights", "--hit-rate-window", "0"]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_deep_fallback() {
        let config =
            Config::try_parse_from(["prop-insights", "--fallback-seasons", "5000000000"]).unwrap();
        assert!(config.validate().is_err());
        let config = Config::try_parse_from(["prop-insights", "--fallback-seasons", "10"]).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "prop-insights",
            "--insight-timeout-ms",
            "250",
            "--current-season",
            "2023",
        ])
        .unwrap();
        let settings = config.engine_settings();
        assert_eq!(settings.insight_timeout, Duration::from_millis(250));
        assert_eq!(settings.current_season, Some(2023));
    }
}
