//! Season selection with fallback to prior seasons.
//!
//! The current season is always consulted first. Only when it has fewer
//! eligible games than the window's threshold are older seasons fetched:
//!
//! - zero current-season games → the first older season with data replaces it
//!   entirely (`Substituted`)
//! - some current-season games → older seasons fill the remaining slots, most
//!   recent first (`Supplemented`)
//!
//! The returned `Provenance` travels with every sample so narratives can say
//! where the numbers came from.

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use super::catalog::StatSpec;
use super::eligibility::{filter_eligible, EligibilityPolicy};
use super::repository::GameLogRepository;
use crate::db::models::{EntityRef, FetchFilter, GameObservation, Sport};

/// Deepest fallback a season context will build
pub const MAX_FALLBACK_SEASONS: usize = 10;

/// Request-scoped season facts, computed once and threaded through every insight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonContext {
    pub sport: Sport,
    pub current: i32,
    /// Older seasons in preference order
    pub fallbacks: Vec<i32>,
}

impl SeasonContext {
    pub fn new(sport: Sport, current: i32, fallback_depth: usize) -> Self {
        SeasonContext {
            sport,
            current,
            fallbacks: (1..=fallback_depth.min(MAX_FALLBACK_SEASONS))
                .map(|k| current - k as i32)
                .collect(),
        }
    }

    pub fn previous(&self) -> Option<i32> {
        self.fallbacks.first().copied()
    }

    /// Current season first, then the fallbacks.
    pub fn window(&self, min_samples: usize) -> SeasonWindow {
        SeasonWindow {
            seasons: std::iter::once(self.current)
                .chain(self.fallbacks.iter().copied())
                .collect(),
            min_samples,
        }
    }
}

/// Ordered season preference plus the sample size that stops the walk
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonWindow {
    pub seasons: Vec<i32>,
    pub min_samples: usize,
}

impl SeasonWindow {
    /// One season, no fallback.
    pub fn single(season: i32) -> Self {
        SeasonWindow {
            seasons: vec![season],
            min_samples: 0,
        }
    }
}

/// Which fallback policy produced a sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Provenance {
    CurrentSeason,
    /// Current-season games topped up with `borrowed` older games
    Supplemented { borrowed: usize },
    /// No current-season games; everything comes from `season`
    Substituted { season: i32 },
}

/// Eligible observations, most recent first, with their provenance
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonSample {
    pub provenance: Provenance,
    pub seasons_used: Vec<i32>,
    pub observations: Vec<GameObservation>,
}

impl SeasonSample {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Narrative suffix disclosing non-current data; empty for pure current season.
    pub fn disclosure(&self) -> String {
        match &self.provenance {
            Provenance::CurrentSeason => String::new(),
            Provenance::Supplemented { borrowed } => format!(
                " (includes {} game{} from {})",
                borrowed,
                if *borrowed == 1 { "" } else { "s" },
                join_seasons(&self.seasons_used[1..])
            ),
            Provenance::Substituted { season } => {
                format!(" (no current-season games; using {} season)", season)
            }
        }
    }
}

fn join_seasons(seasons: &[i32]) -> String {
    seasons
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Season-aware fetcher shared by every insight
pub struct SeasonFallbackResolver<'a> {
    repo: &'a dyn GameLogRepository,
    policy: EligibilityPolicy,
}

impl<'a> SeasonFallbackResolver<'a> {
    pub fn new(repo: &'a dyn GameLogRepository, policy: EligibilityPolicy) -> Self {
        SeasonFallbackResolver { repo, policy }
    }

    /// Resolve with no extra narrowing beyond the season.
    pub async fn resolve(
        &self,
        entity: EntityRef,
        spec: &StatSpec,
        window: &SeasonWindow,
    ) -> Result<SeasonSample> {
        self.resolve_filtered(entity, spec, window, &FetchFilter::default())
            .await
    }

    /// `base` supplies any opponent/position narrowing; its season is
    /// replaced per fetch.
    pub async fn resolve_filtered(
        &self,
        entity: EntityRef,
        spec: &StatSpec,
        window: &SeasonWindow,
        base: &FetchFilter,
    ) -> Result<SeasonSample> {
        let Some((&current, older)) = window.seasons.split_first() else {
            return Ok(SeasonSample {
                provenance: Provenance::CurrentSeason,
                seasons_used: vec![],
                observations: vec![],
            });
        };

        let mut observations = self.eligible_for(entity, spec, current, base).await?;
        if observations.len() >= window.min_samples {
            return Ok(SeasonSample {
                provenance: Provenance::CurrentSeason,
                seasons_used: vec![current],
                observations,
            });
        }

        if observations.is_empty() {
            for &season in older {
                let prior = self.eligible_for(entity, spec, season, base).await?;
                if !prior.is_empty() {
                    debug!(
                        "{:?} {}: no {} games, substituting {} ({} games)",
                        entity, spec.id, current, season, prior.len()
                    );
                    return Ok(SeasonSample {
                        provenance: Provenance::Substituted { season },
                        seasons_used: vec![season],
                        observations: prior,
                    });
                }
            }
            return Ok(SeasonSample {
                provenance: Provenance::CurrentSeason,
                seasons_used: vec![current],
                observations,
            });
        }

        let mut seasons_used = vec![current];
        let mut borrowed = 0;
        for &season in older {
            let needed = window.min_samples - observations.len();
            if needed == 0 {
                break;
            }
            let prior = self.eligible_for(entity, spec, season, base).await?;
            if prior.is_empty() {
                continue;
            }
            let take = needed.min(prior.len());
            observations.extend(prior.into_iter().take(take));
            borrowed += take;
            seasons_used.push(season);
        }

        let provenance = if borrowed > 0 {
            debug!(
                "{:?} {}: supplemented {} games from {:?}",
                entity, spec.id, borrowed, &seasons_used[1..]
            );
            Provenance::Supplemented { borrowed }
        } else {
            Provenance::CurrentSeason
        };
        Ok(SeasonSample {
            provenance,
            seasons_used,
            observations,
        })
    }

    async fn eligible_for(
        &self,
        entity: EntityRef,
        spec: &StatSpec,
        season: i32,
        base: &FetchFilter,
    ) -> Result<Vec<GameObservation>> {
        let filter = FetchFilter {
            season: Some(season),
            ..base.clone()
        };
        let rows = self.repo.fetch_observations(entity, &filter).await?;
        Ok(filter_eligible(rows, spec, &self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::StatCatalog;
    use crate::engine::testing::{player_obs, MemoryRepository};

    fn pts() -> StatSpec {
        StatCatalog::for_sport(Sport::Basketball).resolve("pts").unwrap()
    }

    fn games(repo: &mut MemoryRepository, season: i32, count: usize, start_id: i64) {
        for i in 0..count {
            repo.push_player(7, player_obs(start_id + i as i64, season, "30", &[("pts", 10.0)]));
        }
    }

    fn resolver(repo: &MemoryRepository) -> SeasonFallbackResolver<'_> {
        SeasonFallbackResolver::new(repo, EligibilityPolicy::minutes(10))
    }

    #[test]
    fn test_fallback_depth_is_bounded() {
        let ctx = SeasonContext::new(Sport::Basketball, 2024, usize::MAX);
        assert_eq!(ctx.fallbacks.len(), MAX_FALLBACK_SEASONS);
        assert_eq!(ctx.fallbacks.first(), Some(&2023));
        assert_eq!(ctx.fallbacks.last(), Some(&2014));
    }

    #[tokio::test]
    async fn test_enough_current_games_never_touches_prior_season() {
        let mut repo = MemoryRepository::default();
        games(&mut repo, 2024, 12, 100);
        games(&mut repo, 2023, 20, 1);
        let ctx = SeasonContext::new(Sport::Basketball, 2024, 2);
        let sample = resolver(&repo)
            .resolve(EntityRef::Player(7), &pts(), &ctx.window(10))
            .await
            .unwrap();
        assert_eq!(sample.provenance, Provenance::CurrentSeason);
        assert_eq!(sample.len(), 12);
        assert_eq!(sample.seasons_used, vec![2024]);
        assert_eq!(repo.seasons_fetched(), vec![Some(2024)]);
    }

    #[tokio::test]
    async fn test_zero_current_games_substitutes_entirely() {
        let mut repo = MemoryRepository::default();
        games(&mut repo, 2023, 5, 1);
        let ctx = SeasonContext::new(Sport::Basketball, 2024, 2);
        let sample = resolver(&repo)
            .resolve(EntityRef::Player(7), &pts(), &ctx.window(10))
            .await
            .unwrap();
        assert_eq!(sample.provenance, Provenance::Substituted { season: 2023 });
        assert_eq!(sample.len(), 5);
        assert!(sample.observations.iter().all(|o| o.season == 2023));
        assert!(sample.disclosure().contains("2023"));
    }

    #[tokio::test]
    async fn test_partial_current_is_topped_up_to_threshold() {
        let mut repo = MemoryRepository::default();
        games(&mut repo, 2024, 2, 100);
        games(&mut repo, 2023, 5, 1);
        let ctx = SeasonContext::new(Sport::Basketball, 2024, 2);
        let sample = resolver(&repo)
            .resolve(EntityRef::Player(7), &pts(), &ctx.window(3))
            .await
            .unwrap();
        assert_eq!(sample.provenance, Provenance::Supplemented { borrowed: 1 });
        assert_eq!(sample.seasons_used, vec![2024, 2023]);
        let seasons: Vec<i32> = sample.observations.iter().map(|o| o.season).collect();
        assert_eq!(seasons, vec![2024, 2024, 2023]);
        // the borrowed game is the most recent one of the older season
        assert_eq!(sample.observations[2].game_id, 5);
        assert_eq!(sample.disclosure(), " (includes 1 game from 2023)");
    }

    #[tokio::test]
    async fn test_walks_several_seasons_when_needed() {
        let mut repo = MemoryRepository::default();
        games(&mut repo, 2024, 1, 100);
        games(&mut repo, 2023, 1, 50);
        games(&mut repo, 2022, 4, 1);
        let ctx = SeasonContext::new(Sport::Basketball, 2024, 2);
        let sample = resolver(&repo)
            .resolve(EntityRef::Player(7), &pts(), &ctx.window(4))
            .await
            .unwrap();
        assert_eq!(sample.provenance, Provenance::Supplemented { borrowed: 3 });
        assert_eq!(sample.seasons_used, vec![2024, 2023, 2022]);
        assert_eq!(sample.len(), 4);
    }

    #[tokio::test]
    async fn test_ineligible_games_do_not_count_toward_threshold() {
        let mut repo = MemoryRepository::default();
        games(&mut repo, 2024, 2, 100);
        repo.push_player(7, player_obs(200, 2024, "4", &[("pts", 2.0)]));
        games(&mut repo, 2023, 5, 1);
        let ctx = SeasonContext::new(Sport::Basketball, 2024, 1);
        let sample = resolver(&repo)
            .resolve(EntityRef::Player(7), &pts(), &ctx.window(3))
            .await
            .unwrap();
        assert_eq!(sample.provenance, Provenance::Supplemented { borrowed: 1 });
        assert!(sample.observations.iter().all(|o| o.game_id != 200));
    }

    #[tokio::test]
    async fn test_no_data_anywhere_is_an_empty_current_sample() {
        let repo = MemoryRepository::default();
        let ctx = SeasonContext::new(Sport::Basketball, 2024, 2);
        let sample = resolver(&repo)
            .resolve(EntityRef::Player(7), &pts(), &ctx.window(3))
            .await
            .unwrap();
        assert_eq!(sample.provenance, Provenance::CurrentSeason);
        assert!(sample.is_empty());
        assert_eq!(sample.disclosure(), "");
    }

    #[test]
    fn test_context_window_order() {
        let ctx = SeasonContext::new(Sport::Football, 2024, 2);
        assert_eq!(ctx.fallbacks, vec![2023, 2022]);
        assert_eq!(ctx.previous(), Some(2023));
        assert_eq!(ctx.window(3).seasons, vec![2024, 2023, 2022]);
    }
}
