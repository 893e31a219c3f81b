//! Single entry point for turning an observation into the requested stat's
//! value. Every calculator goes through here, so combos need no special
//! casing anywhere else.

use super::catalog::{Aggregation, StatSpec};
use crate::db::models::GameObservation;

/// Value of the stat for one game. `None` only when a component is missing,
/// which cannot happen for observations that passed eligibility.
pub fn value_of(obs: &GameObservation, spec: &StatSpec) -> Option<f64> {
    match spec.aggregation {
        Aggregation::Sum => spec
            .columns
            .iter()
            .map(|c| obs.stat(c))
            .sum::<Option<f64>>(),
    }
}

/// Values for a run of observations, order preserved, gaps skipped.
pub fn values(observations: &[GameObservation], spec: &StatSpec) -> Vec<f64> {
    observations
        .iter()
        .filter_map(|o| value_of(o, spec))
        .collect()
}
