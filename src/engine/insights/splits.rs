use anyhow::Result;

use super::{line_phrase, num, pct, InsightContext, InsightKind};
use crate::db::models::{FetchFilter, GameObservation};
use crate::engine::combo::values;
use crate::engine::eligibility::filter_eligible;
use crate::engine::line::HIT_COMPARISON;
use crate::engine::rates::{hit_rate_of, mean, HitRate};
use crate::engine::result::{InsightResult, Status};

struct Split {
    average: Option<f64>,
    games: usize,
    hits: Option<HitRate>,
}

fn split(ctx: &InsightContext, rows: &[GameObservation]) -> Split {
    let vals = values(rows, &ctx.spec);
    Split {
        average: mean(&vals),
        games: vals.len(),
        hits: ctx.line.map(|q| hit_rate_of(&vals, &q, HIT_COMPARISON)),
    }
}

fn describe(label: &str, s: &Split) -> String {
    match s.average {
        None => format!("{}: no games", label),
        Some(avg) => {
            let mut text = format!("{}: {} over {} games", label, num(avg), s.games);
            if let Some(rate) = s.hits.and_then(|h| h.hit_rate) {
                text.push_str(&format!(" ({} hit)", pct(rate)));
            }
            text
        }
    }
}

pub async fn home_away_split(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::HomeAwaySplit.id();
    let sample = ctx.sample(ctx.settings.min_season_samples).await?;
    let (home, away): (Vec<GameObservation>, Vec<GameObservation>) = sample
        .observations
        .iter()
        .filter(|o| o.is_home().is_some())
        .cloned()
        .partition(|o| o.is_home() == Some(true));
    let home = split(ctx, &home);
    let away = split(ctx, &away);
    if home.games == 0 && away.games == 0 {
        return Ok(InsightResult::insufficient(
            id,
            0,
            1,
            &["home_average", "away_average", "home_games", "away_games"],
        )
        .sample(&sample));
    }

    let narrative = format!(
        "{} {} by venue. {}; {}{}",
        ctx.entity_name,
        ctx.spec.label,
        describe("Home", &home),
        describe("Away", &away),
        sample.disclosure()
    );
    Ok(InsightResult::new(id, narrative, Status::Info)
        .value("home_average", home.average)
        .value("away_average", away.average)
        .count("home_games", home.games)
        .count("away_games", away.games)
        .value("home_hit_rate", home.hits.and_then(|h| h.hit_rate))
        .value("away_hit_rate", away.hits.and_then(|h| h.hit_rate))
        .sample(&sample))
}

/// Games against the requested opponent: this season and all-time, fetched
/// concurrently.
pub async fn matchup_history(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::MatchupHistory.id();
    let opponent = ctx.require_opponent()?;
    let season_filter = FetchFilter::season(ctx.seasons.current).against(opponent.id);
    let career_filter = FetchFilter::all_seasons().against(opponent.id);
    let (season_rows, career_rows) = futures_util::future::try_join(
        ctx.repo.fetch_observations(ctx.entity, &season_filter),
        ctx.repo.fetch_observations(ctx.entity, &career_filter),
    )
    .await?;
    let season_rows = filter_eligible(season_rows, &ctx.spec, &ctx.policy);
    let career_rows = filter_eligible(career_rows, &ctx.spec, &ctx.policy);

    let season = split(ctx, &season_rows);
    let career = split(ctx, &career_rows);
    if career.games == 0 {
        return Ok(InsightResult::insufficient(
            id,
            0,
            1,
            &["season_average", "career_average", "hit_rate"],
        ));
    }

    let mut seasons_used: Vec<i32> = Vec::new();
    for obs in &career_rows {
        if !seasons_used.contains(&obs.season) {
            seasons_used.push(obs.season);
        }
    }

    let mut narrative = format!(
        "{} vs {}: {} {} across {} meeting{}",
        ctx.entity_name,
        opponent.abbreviation,
        career.average.map(num).unwrap_or_default(),
        ctx.spec.label,
        career.games,
        if career.games == 1 { "" } else { "s" }
    );
    if let Some(avg) = season.average {
        narrative.push_str(&format!(
            ", {} in {} game{} this season",
            num(avg),
            season.games,
            if season.games == 1 { "" } else { "s" }
        ));
    }
    if let (Some(query), Some(hr)) = (ctx.line, career.hits) {
        narrative.push_str(&format!(
            "; {} in {} of {}",
            line_phrase(&query, &ctx.spec),
            hr.hit_count,
            hr.total_games
        ));
    }

    let hit_rate = career.hits.and_then(|h| h.hit_rate);
    let status = match ctx.line {
        Some(query) => match hit_rate {
            Some(_) => Status::from_hit_rate(hit_rate),
            None => Status::from_lean(career.average.map(|a| query.margin(a))),
        },
        None => Status::Info,
    };
    Ok(InsightResult::new(id, narrative, status)
        .value("season_average", season.average)
        .count("season_games", season.games)
        .value("career_average", career.average)
        .count("career_games", career.games)
        .value("hit_rate", hit_rate)
        .seasons(seasons_used))
}

/// Zero days of rest (second night of a back-to-back) against rested games.
pub async fn rest_split(ctx: &InsightContext) -> Result<InsightResult> {
    let id = InsightKind::RestSplit.id();
    let sample = ctx.sample(ctx.settings.min_season_samples).await?;
    let mut back_to_back = Vec::new();
    let mut rested = Vec::new();
    // observations are most recent first, so the previous game is the next row
    for pair in sample.observations.windows(2) {
        let (game, previous) = (&pair[0], &pair[1]);
        if game.season != previous.season {
            continue;
        }
        let (Some(day), Some(prev_day)) = (game.game_date, previous.game_date) else {
            continue;
        };
        if (day - prev_day).num_days() <= 1 {
            back_to_back.push(game.clone());
        } else {
            rested.push(game.clone());
        }
    }
    let b2b = split(ctx, &back_to_back);
    let fresh = split(ctx, &rested);
    let keys = &["back_to_back_average", "rested_average", "back_to_back_games", "rested_games"];
    if b2b.games == 0 && fresh.games == 0 {
        return Ok(InsightResult::insufficient(id, sample.len(), 2, keys).sample(&sample));
    }

    let difference = match (b2b.average, fresh.average) {
        (Some(tired), Some(rest)) => Some(tired - rest),
        _ => None,
    };
    let narrative = format!(
        "{} {} by rest. {}; {}{}",
        ctx.entity_name,
        ctx.spec.label,
        describe("Back-to-back", &b2b),
        describe("Rested", &fresh),
        sample.disclosure()
    );
    Ok(InsightResult::new(id, narrative, Status::Info)
        .value("back_to_back_average", b2b.average)
        .value("rested_average", fresh.average)
        .count("back_to_back_games", b2b.games)
        .count("rested_games", fresh.games)
        .value("difference", difference)
        .sample(&sample))
}
