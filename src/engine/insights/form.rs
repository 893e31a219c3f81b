use anyhow::Result;

use super::{num, signed_pct, InsightContext, InsightKind};
use crate::engine::catalog::StatSpec;
use crate::engine::combo::values;
use crate::engine::eligibility::parse_participation;
use crate::engine::rates::{mean, median, recent_vs_baseline, std_dev};
use crate::engine::result::{InsightResult, Status};
use crate::engine::season::SeasonWindow;

/// Recent window used by the minutes and shot-volume trends
const VOLUME_WINDOW: usize = 5;

/// Coefficient of variation at or below which a stat reads as steady
const STEADY_CV: f64 = 0.20;
/// ...and above which it reads as volatile
const VOLATILE_CV: f64 = 0.35;

pub async fn season_average(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::SeasonAverage.id();
    let sample = ctx.sample(ctx.settings.min_season_samples).await?;
    let vals = values(&sample.observations, &ctx.spec);
    let Some(avg) = mean(&vals) else {
        return Ok(InsightResult::insufficient(
            id,
            0,
            1,
            &["average", "median", "high", "low", "games", "margin"],
        )
        .sample(&sample));
    };
    let high = vals.iter().copied().fold(f64::MIN, f64::max);
    let low = vals.iter().copied().fold(f64::MAX, f64::min);
    let med = median(&vals);

    let mut narrative = format!(
        "{} is averaging {} {} over {} games (median {}, high {}, low {})",
        ctx.entity_name,
        num(avg),
        ctx.spec.label,
        vals.len(),
        med.map(num).unwrap_or_default(),
        num(high),
        num(low)
    );
    let margin = ctx.line.map(|q| q.margin(avg));
    if let (Some(query), Some(m)) = (ctx.line, margin) {
        narrative.push_str(&format!(
            "; {} {} the {} line",
            num(m.abs()),
            if m >= 0.0 { "clear of" } else { "short of" },
            query.line
        ));
    }
    narrative.push_str(&sample.disclosure());

    Ok(InsightResult::new(id, narrative, Status::from_lean(margin))
        .value("average", Some(avg))
        .value("median", med)
        .value("high", Some(high))
        .value("low", Some(low))
        .count("games", vals.len())
        .value("margin", margin)
        .sample(&sample))
}

/// Last N games against the sample baseline. Borrowed games are disclosed.
pub async fn recent_form(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::RecentForm.id();
    let window = ctx.settings.recent_window;
    let sample = ctx.sample(window).await?;
    let trend = recent_vs_baseline(&sample, &ctx.spec, window);
    let keys = &["recent_average", "baseline_average", "difference", "percent_change"];
    let (Some(recent), Some(baseline)) = (trend.recent_average, trend.baseline_average) else {
        return Ok(InsightResult::insufficient(id, trend.recent_games, window, keys).sample(&sample));
    };

    let mut narrative = format!(
        "{} is averaging {} {} over the last {} games vs {} across {} games{}",
        ctx.entity_name,
        num(recent),
        ctx.spec.label,
        trend.recent_games,
        num(baseline),
        trend.baseline_games,
        signed_pct(trend.percent_change)
    );
    if trend.recent_seasons.len() > 1 {
        let spanned: Vec<String> = trend.recent_seasons.iter().map(|s| s.to_string()).collect();
        narrative.push_str(&format!("; recent window spans {}", spanned.join(" and ")));
    }
    narrative.push_str(&sample.disclosure());

    let lean = match ctx.line {
        Some(query) => Some(query.margin(recent)),
        None => ctx.lean(trend.difference),
    };
    let status = if trend.recent_games < window {
        Status::Info
    } else {
        Status::from_lean(lean)
    };
    Ok(InsightResult::new(id, narrative, status)
        .value("recent_average", Some(recent))
        .value("baseline_average", Some(baseline))
        .value("difference", trend.difference)
        .value("percent_change", trend.percent_change)
        .count("recent_games", trend.recent_games)
        .sample(&sample))
}

/// Minutes over the last few eligible games against the season.
pub async fn minutes_trend(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::MinutesTrend.id();
    let sample = ctx.sample(ctx.settings.min_season_samples).await?;
    let minutes: Vec<f64> = sample
        .observations
        .iter()
        .filter_map(|o| o.participation.as_deref().and_then(parse_participation))
        .map(f64::from)
        .collect();
    let keys = &["recent_minutes", "season_minutes", "difference"];
    if minutes.len() < VOLUME_WINDOW {
        return Ok(InsightResult::insufficient(id, minutes.len(), VOLUME_WINDOW, keys).sample(&sample));
    }
    let recent = mean(&minutes[..VOLUME_WINDOW]);
    let season = mean(&minutes);
    let difference = match (recent, season) {
        (Some(r), Some(s)) => Some(r - s),
        _ => None,
    };
    let narrative = format!(
        "{} has played {} minutes over the last {} games vs {} on the season{}",
        ctx.entity_name,
        recent.map(num).unwrap_or_default(),
        VOLUME_WINDOW,
        season.map(num).unwrap_or_default(),
        sample.disclosure()
    );
    // more minutes help an over and hurt an under
    Ok(InsightResult::new(id, narrative, Status::from_lean(ctx.lean(difference)))
        .value("recent_minutes", recent)
        .value("season_minutes", season)
        .value("difference", difference)
        .sample(&sample))
}

/// Field-goal attempts trend, for stats driven by shooting.
pub async fn shooting_volume(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::ShootingVolume.id();
    let fga = StatSpec::column(ctx.sport(), "fga", "field goal attempts");
    let sample = ctx.sample_of(&fga, ctx.settings.min_season_samples).await?;
    let trend = recent_vs_baseline(&sample, &fga, VOLUME_WINDOW);
    let keys = &["recent_fga", "season_fga", "difference", "percent_change"];
    if trend.recent_games < VOLUME_WINDOW {
        return Ok(InsightResult::insufficient(id, trend.recent_games, VOLUME_WINDOW, keys)
            .sample(&sample));
    }
    let narrative = format!(
        "{} is taking {} shots over the last {} games vs {} on the season{}{}",
        ctx.entity_name,
        trend.recent_average.map(num).unwrap_or_default(),
        VOLUME_WINDOW,
        trend.baseline_average.map(num).unwrap_or_default(),
        signed_pct(trend.percent_change),
        sample.disclosure()
    );
    Ok(
        InsightResult::new(id, narrative, Status::from_lean(ctx.lean(trend.difference)))
            .value("recent_fga", trend.recent_average)
            .value("season_fga", trend.baseline_average)
            .value("difference", trend.difference)
            .value("percent_change", trend.percent_change)
            .sample(&sample),
    )
}

/// Spread of the stat across the season sample.
pub async fn consistency(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::Consistency.id();
    let sample = ctx.sample(ctx.settings.min_season_samples).await?;
    let vals = values(&sample.observations, &ctx.spec);
    let (Some(sd), Some(avg)) = (std_dev(&vals), mean(&vals)) else {
        return Ok(InsightResult::insufficient(id, vals.len(), 2, &["std_dev", "cv"]).sample(&sample));
    };
    let cv = if avg != 0.0 { Some(sd / avg.abs()) } else { None };
    let (word, status) = match cv {
        Some(c) if c <= STEADY_CV => ("steady", Status::Success),
        Some(c) if c > VOLATILE_CV => ("volatile", Status::Warning),
        _ => ("moderately variable", Status::Info),
    };
    let narrative = format!(
        "{}'s {} are {}: standard deviation {} around a {} average{}",
        ctx.entity_name,
        ctx.spec.label,
        word,
        num(sd),
        num(avg),
        sample.disclosure()
    );
    Ok(InsightResult::new(id, narrative, status)
        .value("std_dev", Some(sd))
        .value("cv", cv)
        .value("average", Some(avg))
        .count("games", vals.len())
        .sample(&sample))
}

/// This season's average against last season's. Both seasons are fetched
/// concurrently and never blended.
pub async fn season_over_season(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::SeasonOverSeason.id();
    let keys = &["current_average", "previous_average", "difference", "percent_change"];
    let Some(previous) = ctx.seasons.previous() else {
        return Ok(InsightResult::insufficient(id, 0, 1, keys));
    };
    let resolver = ctx.resolver();
    let current_window = SeasonWindow::single(ctx.seasons.current);
    let previous_window = SeasonWindow::single(previous);
    let (current_sample, previous_sample) = futures_util::future::try_join(
        resolver.resolve(ctx.entity, &ctx.spec, &current_window),
        resolver.resolve(ctx.entity, &ctx.spec, &previous_window),
    )
    .await?;

    let current_vals = values(&current_sample.observations, &ctx.spec);
    let previous_vals = values(&previous_sample.observations, &ctx.spec);
    let (Some(now), Some(then)) = (mean(&current_vals), mean(&previous_vals)) else {
        return Ok(InsightResult::insufficient(
            id,
            current_vals.len().min(previous_vals.len()),
            1,
            keys,
        )
        .seasons(vec![ctx.seasons.current, previous]));
    };
    let difference = now - then;
    let percent_change = if then != 0.0 {
        Some(difference / then.abs() * 100.0)
    } else {
        None
    };
    let narrative = format!(
        "{} is averaging {} {} this season ({} games) vs {} in {} ({} games){}",
        ctx.entity_name,
        num(now),
        ctx.spec.label,
        current_vals.len(),
        num(then),
        previous,
        previous_vals.len(),
        signed_pct(percent_change)
    );
    Ok(
        InsightResult::new(id, narrative, Status::from_lean(ctx.lean(Some(difference))))
            .value("current_average", Some(now))
            .value("previous_average", Some(then))
            .value("difference", Some(difference))
            .value("percent_change", percent_change)
            .seasons(vec![ctx.seasons.current, previous]),
    )
}
