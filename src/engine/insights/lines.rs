use anyhow::Result;

use super::{line_phrase, pct, InsightContext, InsightKind};
use crate::engine::line::HIT_COMPARISON;
use crate::engine::rates::{hit_rate, recent_values, streak};
use crate::engine::result::{InsightResult, Status};

const HIT_KEYS: &[&str] = &["hit_count", "total_games", "hit_rate", "line"];

/// Hit-rate over the last K eligible games, topped up from older seasons.
pub async fn recent_hit_rate(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::RecentHitRate.id();
    let query = ctx.require_line()?;
    let window = ctx.settings.hit_rate_window;
    let sample = ctx.sample(window).await?;
    let hr = hit_rate(
        &sample.observations,
        &ctx.spec,
        &ctx.policy,
        &query,
        HIT_COMPARISON,
        Some(window),
    );
    if hr.total_games == 0 {
        return Ok(InsightResult::insufficient(id, 0, 1, HIT_KEYS).sample(&sample));
    }

    let narrative = format!(
        "{} went {} in {} of the last {} games ({}){}",
        ctx.entity_name,
        line_phrase(&query, &ctx.spec),
        hr.hit_count,
        hr.total_games,
        pct(hr.hit_rate.unwrap_or(0.0)),
        sample.disclosure()
    );
    Ok(InsightResult::new(id, narrative, Status::from_hit_rate(hr.hit_rate))
        .count("hit_count", hr.hit_count)
        .count("total_games", hr.total_games)
        .value("hit_rate", hr.hit_rate)
        .value("line", Some(query.line))
        .sample(&sample))
}

/// Hit-rate over every eligible game of the season sample.
pub async fn season_hit_rate(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::SeasonHitRate.id();
    let query = ctx.require_line()?;
    let sample = ctx.sample(ctx.settings.min_season_samples).await?;
    let hr = hit_rate(
        &sample.observations,
        &ctx.spec,
        &ctx.policy,
        &query,
        HIT_COMPARISON,
        None,
    );
    if hr.total_games == 0 {
        return Ok(
            InsightResult::insufficient(id, 0, ctx.settings.min_season_samples, HIT_KEYS)
                .sample(&sample),
        );
    }

    let narrative = format!(
        "{} has gone {} in {} of {} games this season ({}){}",
        ctx.entity_name,
        line_phrase(&query, &ctx.spec),
        hr.hit_count,
        hr.total_games,
        pct(hr.hit_rate.unwrap_or(0.0)),
        sample.disclosure()
    );
    Ok(InsightResult::new(id, narrative, Status::from_hit_rate(hr.hit_rate))
        .count("hit_count", hr.hit_count)
        .count("total_games", hr.total_games)
        .value("hit_rate", hr.hit_rate)
        .value("line", Some(query.line))
        .sample(&sample))
}

/// Consecutive hits counting back from the most recent game.
pub async fn hit_streak(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::HitStreak.id();
    let query = ctx.require_line()?;
    let sample = ctx.sample(ctx.settings.hit_rate_window).await?;
    let values = recent_values(&sample.observations, &ctx.spec, &ctx.policy, None);
    if values.is_empty() {
        return Ok(InsightResult::insufficient(id, 0, 1, &["streak", "games_checked"]).sample(&sample));
    }

    let run = streak(&values, &query, HIT_COMPARISON);
    let (narrative, status) = match run {
        0 => (
            format!(
                "{} missed {} in the most recent game",
                ctx.entity_name,
                line_phrase(&query, &ctx.spec)
            ),
            Status::Warning,
        ),
        n if n == values.len() => (
            format!(
                "{} has gone {} in all {} games checked",
                ctx.entity_name,
                line_phrase(&query, &ctx.spec),
                n
            ),
            Status::Success,
        ),
        n => (
            format!(
                "{} has gone {} in {} straight game{}",
                ctx.entity_name,
                line_phrase(&query, &ctx.spec),
                n,
                if n == 1 { "" } else { "s" }
            ),
            if n >= 3 { Status::Success } else { Status::Info },
        ),
    };
    Ok(InsightResult::new(id, format!("{}{}", narrative, sample.disclosure()), status)
        .count("streak", run)
        .count("games_checked", values.len())
        .sample(&sample))
}
