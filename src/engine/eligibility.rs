use super::catalog::StatSpec;
use crate::db::models::{GameObservation, Sport};

/// Which games count toward averages and hit-rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EligibilityPolicy {
    /// Minimum whole minutes (or snaps) played; `None` skips the check,
    /// which is how team lines are treated.
    pub min_participation: Option<u32>,
}

impl EligibilityPolicy {
    pub fn minutes(min: u32) -> Self {
        EligibilityPolicy {
            min_participation: Some(min),
        }
    }

    /// Any nonzero participation.
    pub fn any_participation() -> Self {
        Self::minutes(1)
    }

    pub fn teams() -> Self {
        EligibilityPolicy {
            min_participation: None,
        }
    }

    /// Basketball players need real minutes; a football player counts as
    /// soon as they took a snap.
    pub fn for_player(sport: Sport, min_minutes: u32) -> Self {
        match sport {
            Sport::Basketball => Self::minutes(min_minutes),
            Sport::Football => Self::any_participation(),
        }
    }
}

/// Whole minutes from "34", "34:12" or "34.5"; anything else is unparseable.
pub fn parse_participation(raw: &str) -> Option<u32> {
    let whole = raw.trim().split([':', '.']).next()?;
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    whole.parse().ok()
}

/// A game counts when participation meets the policy and every column the
/// stat needs is present. Combos with any missing component are excluded
/// outright.
pub fn is_eligible(obs: &GameObservation, spec: &StatSpec, policy: &EligibilityPolicy) -> bool {
    if let Some(min) = policy.min_participation {
        match obs.participation.as_deref().and_then(parse_participation) {
            Some(played) if played >= min => {}
            _ => return false,
        }
    }
    spec.columns.iter().all(|c| obs.stats.contains_key(c))
}

/// Keep only eligible observations, preserving order.
pub fn filter_eligible(
    observations: Vec<GameObservation>,
    spec: &StatSpec,
    policy: &EligibilityPolicy,
) -> Vec<GameObservation> {
    observations
        .into_iter()
        .filter(|o| is_eligible(o, spec, policy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::catalog::StatCatalog;
    use crate::engine::testing::player_obs;

    #[test]
    fn test_parse_participation() {
        assert_eq!(parse_participation("34"), Some(34));
        assert_eq!(parse_participation(" 34:12 "), Some(34));
        assert_eq!(parse_participation("9.8"), Some(9));
        assert_eq!(parse_participation("0"), Some(0));
        assert_eq!(parse_participation("-3"), None);
        assert_eq!(parse_participation("DNP"), None);
        assert_eq!(parse_participation(""), None);
    }

    #[test]
    fn test_minutes_threshold() {
        let spec = StatCatalog::for_sport(Sport::Basketball).resolve("pts").unwrap();
        let policy = EligibilityPolicy::minutes(10);
        let played = player_obs(1, 2024, "10:00", &[("pts", 4.0)]);
        let cameo = player_obs(2, 2024, "9:59", &[("pts", 4.0)]);
        let dnp = player_obs(3, 2024, "DNP", &[("pts", 0.0)]);
        assert!(is_eligible(&played, &spec, &policy));
        assert!(!is_eligible(&cameo, &spec, &policy));
        assert!(!is_eligible(&dnp, &spec, &policy));
    }

    #[test]
    fn test_combo_requires_every_component() {
        let spec = StatCatalog::for_sport(Sport::Basketball).resolve("pra").unwrap();
        let policy = EligibilityPolicy::minutes(10);
        let full = player_obs(1, 2024, "30", &[("pts", 20.0), ("reb", 5.0), ("ast", 4.0)]);
        let partial = player_obs(2, 2024, "30", &[("pts", 20.0), ("reb", 5.0)]);
        assert!(is_eligible(&full, &spec, &policy));
        assert!(!is_eligible(&partial, &spec, &policy));
        let kept = filter_eligible(vec![full, partial], &spec, &policy);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].game_id, 1);
    }

    #[test]
    fn test_team_policy_ignores_participation() {
        let spec = StatSpec::column(Sport::Basketball, "fga", "field goal attempts");
        let mut obs = player_obs(1, 2024, "0", &[("fga", 88.0)]);
        obs.participation = None;
        assert!(is_eligible(&obs, &spec, &EligibilityPolicy::teams()));
        assert!(!is_eligible(&obs, &spec, &EligibilityPolicy::any_participation()));
    }

    #[test]
    fn test_football_counts_any_snap() {
        let policy = EligibilityPolicy::for_player(Sport::Football, 10);
        let spec = StatCatalog::for_sport(Sport::Football).resolve("rec yds").unwrap();
        let obs = player_obs(1, 2024, "3", &[("receiving_yards", 12.0)]);
        assert!(is_eligible(&obs, &spec, &policy));
    }
}
