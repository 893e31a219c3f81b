//! Averages, hit-rates against a line, and recent-versus-baseline trends.

use serde::Serialize;

use super::catalog::StatSpec;
use super::combo::value_of;
use super::eligibility::{is_eligible, EligibilityPolicy};
use super::line::{Comparison, LineQuery};
use super::season::{Provenance, SeasonSample};
use crate::db::models::GameObservation;

/// Hits out of games considered; `hit_rate` is `None` when no games qualified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HitRate {
    pub hit_count: usize,
    pub total_games: usize,
    pub hit_rate: Option<f64>,
}

/// Recent window against the whole sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub recent_average: Option<f64>,
    pub baseline_average: Option<f64>,
    /// recent − baseline
    pub difference: Option<f64>,
    /// Relative to the baseline, in percent; `None` when the baseline is zero
    pub percent_change: Option<f64>,
    pub recent_games: usize,
    pub baseline_games: usize,
    /// Seasons the recent window drew from, most recent first
    pub recent_seasons: Vec<i32>,
    pub provenance: Provenance,
}

/// Eligible values, most recent first, capped at `window` when given.
pub fn recent_values(
    observations: &[GameObservation],
    spec: &StatSpec,
    policy: &EligibilityPolicy,
    window: Option<usize>,
) -> Vec<f64> {
    let mut eligible: Vec<&GameObservation> = observations
        .iter()
        .filter(|o| is_eligible(o, spec, policy))
        .collect();
    eligible.sort_by(|a, b| {
        b.game_date
            .cmp(&a.game_date)
            .then_with(|| b.game_id.cmp(&a.game_id))
    });
    eligible
        .into_iter()
        .filter_map(|o| value_of(o, spec))
        .take(window.unwrap_or(usize::MAX))
        .collect()
}

/// Hit-rate over the most recent `window` eligible games (all when `None`).
pub fn hit_rate(
    observations: &[GameObservation],
    spec: &StatSpec,
    policy: &EligibilityPolicy,
    query: &LineQuery,
    comparison: Comparison,
    window: Option<usize>,
) -> HitRate {
    let values = recent_values(observations, spec, policy, window);
    hit_rate_of(&values, query, comparison)
}

pub fn hit_rate_of(values: &[f64], query: &LineQuery, comparison: Comparison) -> HitRate {
    let hit_count = values.iter().filter(|&&v| query.hits(v, comparison)).count();
    let total_games = values.len();
    HitRate {
        hit_count,
        total_games,
        hit_rate: ratio(hit_count, total_games),
    }
}

/// Consecutive hits counting back from the most recent value.
pub fn streak(values: &[f64], query: &LineQuery, comparison: Comparison) -> usize {
    values
        .iter()
        .take_while(|&&v| query.hits(v, comparison))
        .count()
}

/// Recent `window` games against the full sample, keeping provenance.
pub fn recent_vs_baseline(sample: &SeasonSample, spec: &StatSpec, window: usize) -> Trend {
    let recent: Vec<&GameObservation> = sample.observations.iter().take(window).collect();
    let recent_values: Vec<f64> = recent.iter().filter_map(|o| value_of(o, spec)).collect();
    let baseline_values: Vec<f64> = sample
        .observations
        .iter()
        .filter_map(|o| value_of(o, spec))
        .collect();

    let mut recent_seasons: Vec<i32> = Vec::new();
    for obs in &recent {
        if !recent_seasons.contains(&obs.season) {
            recent_seasons.push(obs.season);
        }
    }

    let recent_average = mean(&recent_values);
    let baseline_average = mean(&baseline_values);
    let difference = match (recent_average, baseline_average) {
        (Some(r), Some(b)) => Some(r - b),
        _ => None,
    };
    let percent_change = match (difference, baseline_average) {
        (Some(d), Some(b)) if b != 0.0 => Some(d / b.abs() * 100.0),
        _ => None,
    };

    Trend {
        recent_average,
        baseline_average,
        difference,
        percent_change,
        recent_games: recent_values.len(),
        baseline_games: baseline_values.len(),
        recent_seasons,
        provenance: sample.provenance.clone(),
    }
}

pub fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation; needs at least two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let var = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Sport;
    use crate::engine::catalog::StatCatalog;
    use crate::engine::line::{Direction, HIT_COMPARISON};
    use crate::engine::testing::player_obs;
    use approx::assert_relative_eq;

    fn pts() -> StatSpec {
        StatCatalog::for_sport(Sport::Basketball).resolve("pts").unwrap()
    }

    fn series(values: &[f64]) -> Vec<GameObservation> {
        // game id 1 is the oldest
        values
            .iter()
            .enumerate()
            .map(|(i, v)| player_obs(i as i64 + 1, 2024, "32", &[("pts", *v)]))
            .collect()
    }

    #[test]
    fn test_hit_rate_over_last_ten_of_twelve() {
        // oldest two are hits that fall outside the window
        let obs = series(&[30.0, 30.0, 20.0, 26.0, 27.0, 18.0, 25.0, 31.0, 22.0, 28.0, 29.0, 24.5]);
        let query = LineQuery::new(24.5, Direction::Over).unwrap();
        let hr = hit_rate(&obs, &pts(), &EligibilityPolicy::minutes(10), &query, HIT_COMPARISON, Some(10));
        assert_eq!(hr.total_games, 10);
        assert_eq!(hr.hit_count, 6);
        assert_relative_eq!(hr.hit_rate.unwrap(), 0.6, epsilon = 1e-9);
    }

    #[test]
    fn test_hit_rate_seventy_percent() {
        let obs = series(&[0.0, 0.0, 30.0, 30.0, 30.0, 30.0, 30.0, 30.0, 30.0, 10.0, 10.0, 10.0]);
        let query = LineQuery::new(24.5, Direction::Over).unwrap();
        let hr = hit_rate(&obs, &pts(), &EligibilityPolicy::minutes(10), &query, HIT_COMPARISON, Some(10));
        assert_eq!((hr.hit_count, hr.total_games), (7, 10));
        assert_relative_eq!(hr.hit_rate.unwrap(), 0.7, epsilon = 1e-9);
    }

    #[test]
    fn test_hit_rate_skips_ineligible_and_never_divides_by_zero() {
        let mut obs = series(&[30.0, 30.0]);
        for o in &mut obs {
            o.participation = Some("3".into());
        }
        let query = LineQuery::new(10.5, Direction::Under).unwrap();
        let hr = hit_rate(&obs, &pts(), &EligibilityPolicy::minutes(10), &query, HIT_COMPARISON, Some(10));
        assert_eq!(hr, HitRate { hit_count: 0, total_games: 0, hit_rate: None });
    }

    #[test]
    fn test_hit_rate_bounds_hold() {
        let query = LineQuery::new(5.0, Direction::Under).unwrap();
        for values in [vec![], vec![1.0], vec![5.0, 6.0, 4.0], vec![1.0; 30]] {
            let hr = hit_rate_of(&values, &query, HIT_COMPARISON);
            assert!(hr.hit_count <= hr.total_games);
            match hr.hit_rate {
                Some(r) => assert!((0.0..=1.0).contains(&r)),
                None => assert_eq!(hr.total_games, 0),
            }
        }
    }

    #[test]
    fn test_streak_stops_at_first_miss() {
        let query = LineQuery::new(20.5, Direction::Over).unwrap();
        assert_eq!(streak(&[25.0, 21.0, 19.0, 30.0], &query, HIT_COMPARISON), 2);
        assert_eq!(streak(&[20.5], &query, HIT_COMPARISON), 0);
    }

    #[test]
    fn test_recent_vs_baseline() {
        let mut obs = series(&[10.0, 10.0, 10.0, 20.0, 20.0, 20.0]);
        obs.reverse();
        let sample = SeasonSample {
            provenance: Provenance::CurrentSeason,
            seasons_used: vec![2024],
            observations: obs,
        };
        let trend = recent_vs_baseline(&sample, &pts(), 3);
        assert_relative_eq!(trend.recent_average.unwrap(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(trend.baseline_average.unwrap(), 15.0, epsilon = 1e-9);
        assert_relative_eq!(trend.difference.unwrap(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(trend.percent_change.unwrap(), 100.0 / 3.0, epsilon = 1e-9);
        assert_eq!(trend.recent_seasons, vec![2024]);
    }

    #[test]
    fn test_zero_baseline_has_no_percent_change() {
        let sample = SeasonSample {
            provenance: Provenance::CurrentSeason,
            seasons_used: vec![2024],
            observations: series(&[0.0, 0.0]),
        };
        let trend = recent_vs_baseline(&sample, &pts(), 3);
        assert_eq!(trend.difference, Some(0.0));
        assert_eq!(trend.percent_change, None);
    }

    #[test]
    fn test_summary_stats() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(std_dev(&[5.0]), None);
        assert_relative_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), 2.138089935, epsilon = 1e-6);
        assert_eq!(ratio(1, 0), None);
    }
}
