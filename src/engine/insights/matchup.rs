use anyhow::Result;
use tracing::debug;

use super::{num, InsightContext, InsightKind};
use crate::db::models::{EntityRef, FetchFilter};
use crate::engine::line::Direction;
use crate::engine::rank::{
    allowed_by_defense, classify, pace_by_team, rank, DefenseLabel, RankOrder, RankResult,
    RelativeTier,
};
use crate::engine::result::{InsightResult, Status};

/// Pace differences are small in relative terms; ±3% already matters.
const PACE_THRESHOLD: f64 = 0.03;

/// How much the opponent allows of the stat, league-ranked (1 = stingiest).
/// Players are compared against opponents' production at their position.
pub async fn opponent_defense(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::OpponentDefense.id();
    let opponent = ctx.require_opponent()?;
    let (cohort_entity, position) = if ctx.is_player() {
        (EntityRef::LeaguePlayers(ctx.sport()), ctx.position.as_deref())
    } else {
        (EntityRef::LeagueTeams(ctx.sport()), None)
    };

    let mut ranked: Option<(i32, RankResult)> = None;
    for season in std::iter::once(ctx.seasons.current).chain(ctx.seasons.fallbacks.iter().copied()) {
        let filter = FetchFilter::season(season).position(position);
        let rows = ctx.repo.fetch_observations(cohort_entity, &filter).await?;
        let spec = &ctx.spec;
        if let Some(result) = rank(
            opponent.id,
            &rows,
            |obs| allowed_by_defense(obs, spec),
            RankOrder::Ascending,
        ) {
            ranked = Some((season, result));
            break;
        }
        debug!("{} has no defensive sample in {}", opponent.abbreviation, season);
    }

    let Some((season, result)) = ranked else {
        return Ok(InsightResult::insufficient(
            id,
            0,
            1,
            &["allowed", "rank", "cohort_size", "league_average"],
        ));
    };
    let label = DefenseLabel::from_allowed(result.value, result.league_average);
    let status = match (label, ctx.direction) {
        (DefenseLabel::Neutral, _) => Status::Info,
        (DefenseLabel::Favorable, Direction::Over) | (DefenseLabel::Tough, Direction::Under) => {
            Status::Success
        }
        _ => Status::Danger,
    };
    let audience = match position {
        Some(p) => format!(" to {}", p.to_uppercase()),
        None => String::new(),
    };
    let mut narrative = format!(
        "{} allows {} {} per game{} (rank {} of {}, league average {}): {} matchup",
        opponent.abbreviation,
        num(result.value),
        ctx.spec.label,
        audience,
        result.rank,
        result.cohort_size,
        num(result.league_average),
        label.as_str()
    );
    if season != ctx.seasons.current {
        narrative.push_str(&format!(" (based on {} season)", season));
    }
    Ok(InsightResult::new(id, narrative, status)
        .value("allowed", Some(result.value))
        .count("rank", result.rank)
        .count("cohort_size", result.cohort_size)
        .value("league_average", Some(result.league_average))
        .seasons(vec![season]))
}

pub async fn opponent_pace(ctx: &InsightContext) -> Result<InsightResult> {
    let opponent = ctx.require_opponent()?;
    pace(ctx, InsightKind::OpponentPace, opponent.id, &opponent.abbreviation, true).await
}

pub async fn team_pace(ctx: &InsightContext) -> Result<InsightResult> {
    let name = if ctx.is_player() {
        format!("{}'s team", ctx.entity_name)
    } else {
        ctx.entity_name.clone()
    };
    pace(ctx, InsightKind::TeamPace, ctx.team_id, &name, false).await
}

/// Possessions per game ranked across the league (1 = fastest). Only the
/// opponent's pace is read as a lean on the line.
async fn pace(
    ctx: &InsightContext,
    kind: InsightKind,
    team_id: i64,
    name: &str,
    leans: bool,
) -> Result<InsightResult> {
    let id = kind.id();
    let season = ctx.seasons.current;
    let rows = ctx
        .repo
        .fetch_observations(EntityRef::LeagueTeams(ctx.sport()), &FetchFilter::season(season))
        .await?;
    let Some(result) = rank(team_id, &rows, pace_by_team, RankOrder::Descending) else {
        return Ok(InsightResult::insufficient(
            id,
            0,
            1,
            &["pace", "rank", "cohort_size", "league_average"],
        )
        .seasons(vec![season]));
    };

    let tier = classify(result.value, result.league_average, PACE_THRESHOLD);
    let word = match tier {
        RelativeTier::Above => "fast",
        RelativeTier::Near => "average",
        RelativeTier::Below => "slow",
    };
    let status = if !leans {
        Status::Info
    } else {
        match (tier, ctx.direction) {
            (RelativeTier::Near, _) => Status::Info,
            (RelativeTier::Above, Direction::Over) | (RelativeTier::Below, Direction::Under) => {
                Status::Success
            }
            _ => Status::Warning,
        }
    };
    let narrative = format!(
        "{} plays at a {} pace: {} possessions per game (rank {} of {}, league average {})",
        name,
        word,
        num(result.value),
        result.rank,
        result.cohort_size,
        num(result.league_average)
    );
    Ok(InsightResult::new(id, narrative, status)
        .value("pace", Some(result.value))
        .count("rank", result.rank)
        .count("cohort_size", result.cohort_size)
        .value("league_average", Some(result.league_average))
        .seasons(vec![season]))
}
