//! League-relative ranking.
//!
//! One ranking routine, two metrics: team pace (estimated possessions per
//! game) and stat allowed per game by each defense. Rows that cannot be
//! matched to a schedule row are dropped before either metric is computed.

use serde::Serialize;
use std::collections::BTreeMap;

use super::catalog::StatSpec;
use super::combo::value_of;
use crate::db::models::GameObservation;

/// Relative band around the league average used for labels (±10%)
pub const LABEL_THRESHOLD: f64 = 0.10;

/// Which end of the cohort gets rank 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RankOrder {
    /// Smallest value ranks first
    Ascending,
    /// Largest value ranks first
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankResult {
    pub value: f64,
    /// 1-based; tied values share a rank
    pub rank: usize,
    pub cohort_size: usize,
    pub league_average: f64,
}

/// Where a value sits relative to the league average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeTier {
    Above,
    Near,
    Below,
}

/// Matchup quality for the offensive player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefenseLabel {
    /// Allows clearly more than league average
    Favorable,
    Neutral,
    /// Allows clearly less than league average
    Tough,
}

impl DefenseLabel {
    pub fn from_allowed(value: f64, league_average: f64) -> Self {
        match classify(value, league_average, LABEL_THRESHOLD) {
            RelativeTier::Above => DefenseLabel::Favorable,
            RelativeTier::Near => DefenseLabel::Neutral,
            RelativeTier::Below => DefenseLabel::Tough,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DefenseLabel::Favorable => "favorable",
            DefenseLabel::Neutral => "neutral",
            DefenseLabel::Tough => "tough",
        }
    }
}

pub fn classify(value: f64, league_average: f64, threshold: f64) -> RelativeTier {
    if league_average == 0.0 {
        return RelativeTier::Near;
    }
    if value >= league_average * (1.0 + threshold) {
        RelativeTier::Above
    } else if value <= league_average * (1.0 - threshold) {
        RelativeTier::Below
    } else {
        RelativeTier::Near
    }
}

/// Rank `entity_id` within a cohort of `(id, value)` pairs.
/// `None` when the entity is not in the cohort.
pub fn rank_within(entity_id: i64, cohort: &[(i64, f64)], order: RankOrder) -> Option<RankResult> {
    let value = cohort.iter().find(|(id, _)| *id == entity_id)?.1;
    let better = cohort
        .iter()
        .filter(|(_, other)| match order {
            RankOrder::Ascending => *other < value,
            RankOrder::Descending => *other > value,
        })
        .count();
    let league_average = cohort.iter().map(|(_, v)| v).sum::<f64>() / cohort.len() as f64;
    Some(RankResult {
        value,
        rank: better + 1,
        cohort_size: cohort.len(),
        league_average,
    })
}

/// Derive a cohort from raw observations with `metric`, then rank within it.
pub fn rank<F>(
    entity_id: i64,
    observations: &[GameObservation],
    metric: F,
    order: RankOrder,
) -> Option<RankResult>
where
    F: Fn(&[GameObservation]) -> Vec<(i64, f64)>,
{
    let cohort = metric(observations);
    rank_within(entity_id, &cohort, order)
}

/// possessions ≈ FGA + 0.44·FTA − OREB + TOV for one team game
pub fn possessions(obs: &GameObservation) -> Option<f64> {
    let fga = obs.stat("fga")?;
    let fta = obs.stat("fta")?;
    let oreb = obs.stat("oreb")?;
    let tov = obs.stat("tov")?;
    Some(fga + 0.44 * fta - oreb + tov)
}

/// Average possessions per game for every team with linked box scores.
pub fn pace_by_team(observations: &[GameObservation]) -> Vec<(i64, f64)> {
    let mut per_team: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.is_linked()) {
        if let Some(p) = possessions(obs) {
            let entry = per_team.entry(obs.team_id).or_insert((0.0, 0));
            entry.0 += p;
            entry.1 += 1;
        }
    }
    averages(per_team)
}

/// Per defense: the stat opponents produced against it, summed per game and
/// averaged over games. Feed it player lines, already position-filtered when
/// a positional view is wanted.
pub fn allowed_by_defense(observations: &[GameObservation], spec: &StatSpec) -> Vec<(i64, f64)> {
    let mut per_game: BTreeMap<(i64, i64), f64> = BTreeMap::new();
    for obs in observations {
        let (Some(defense), Some(value)) = (obs.opponent_id(), value_of(obs, spec)) else {
            continue;
        };
        *per_game.entry((defense, obs.game_id)).or_insert(0.0) += value;
    }
    let mut per_defense: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for ((defense, _), total) in per_game {
        let entry = per_defense.entry(defense).or_insert((0.0, 0));
        entry.0 += total;
        entry.1 += 1;
    }
    averages(per_defense)
}

fn averages(totals: BTreeMap<i64, (f64, usize)>) -> Vec<(i64, f64)> {
    totals
        .into_iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(id, (sum, n))| (id, sum / n as f64))
        .collect()
}
