//! The insight library.
//!
//! Every insight is a pure async function of an `InsightContext`: it fetches
//! its own inputs through the shared season resolver and calculators and
//! returns one `InsightResult`. `applicable` is the static routing table.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

mod form;
mod lines;
mod matchup;
mod splits;

use super::catalog::StatSpec;
use super::eligibility::EligibilityPolicy;
use super::line::{Direction, LineQuery};
use super::repository::GameLogRepository;
use super::season::{SeasonContext, SeasonFallbackResolver, SeasonSample};
use super::EngineSettings;
use crate::db::models::{EntityRef, Sport, Team};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    RecentHitRate,
    SeasonHitRate,
    HitStreak,
    SeasonAverage,
    RecentForm,
    HomeAwaySplit,
    MatchupHistory,
    OpponentDefense,
    OpponentPace,
    TeamPace,
    MinutesTrend,
    ShootingVolume,
    RestSplit,
    Consistency,
    SeasonOverSeason,
}

impl InsightKind {
    pub const ALL: [InsightKind; 15] = [
        InsightKind::RecentHitRate,
        InsightKind::SeasonHitRate,
        InsightKind::HitStreak,
        InsightKind::SeasonAverage,
        InsightKind::RecentForm,
        InsightKind::HomeAwaySplit,
        InsightKind::MatchupHistory,
        InsightKind::OpponentDefense,
        InsightKind::OpponentPace,
        InsightKind::TeamPace,
        InsightKind::MinutesTrend,
        InsightKind::ShootingVolume,
        InsightKind::RestSplit,
        InsightKind::Consistency,
        InsightKind::SeasonOverSeason,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            InsightKind::RecentHitRate => "recent_hit_rate",
            InsightKind::SeasonHitRate => "season_hit_rate",
            InsightKind::HitStreak => "hit_streak",
            InsightKind::SeasonAverage => "season_average",
            InsightKind::RecentForm => "recent_form",
            InsightKind::HomeAwaySplit => "home_away_split",
            InsightKind::MatchupHistory => "matchup_history",
            InsightKind::OpponentDefense => "opponent_defense",
            InsightKind::OpponentPace => "opponent_pace",
            InsightKind::TeamPace => "team_pace",
            InsightKind::MinutesTrend => "minutes_trend",
            InsightKind::ShootingVolume => "shooting_volume",
            InsightKind::RestSplit => "rest_split",
            InsightKind::Consistency => "consistency",
            InsightKind::SeasonOverSeason => "season_over_season",
        }
    }

    pub fn needs_line(&self) -> bool {
        matches!(
            self,
            InsightKind::RecentHitRate | InsightKind::SeasonHitRate | InsightKind::HitStreak
        )
    }

    pub fn needs_opponent(&self) -> bool {
        matches!(
            self,
            InsightKind::MatchupHistory | InsightKind::OpponentDefense | InsightKind::OpponentPace
        )
    }
}

/// Everything an insight may read, resolved once per request
pub struct InsightContext {
    pub repo: Arc<dyn GameLogRepository>,
    /// `EntityRef::Player` or `EntityRef::Team`
    pub entity: EntityRef,
    pub entity_name: String,
    /// The entity's own team (the team itself for team requests)
    pub team_id: i64,
    pub position: Option<String>,
    pub spec: StatSpec,
    pub line: Option<LineQuery>,
    /// Side being evaluated; defaults to over when no line was given
    pub direction: Direction,
    pub opponent: Option<Team>,
    pub seasons: SeasonContext,
    pub policy: EligibilityPolicy,
    pub settings: EngineSettings,
}

impl InsightContext {
    pub fn sport(&self) -> Sport {
        self.seasons.sport
    }

    pub fn is_player(&self) -> bool {
        matches!(self.entity, EntityRef::Player(_))
    }

    pub fn resolver(&self) -> SeasonFallbackResolver<'_> {
        SeasonFallbackResolver::new(self.repo.as_ref(), self.policy)
    }

    /// Eligible sample of the requested stat, falling back until `min_samples`.
    pub async fn sample(&self, min_samples: usize) -> Result<SeasonSample> {
        self.sample_of(&self.spec, min_samples).await
    }

    pub async fn sample_of(&self, spec: &StatSpec, min_samples: usize) -> Result<SeasonSample> {
        self.resolver()
            .resolve(self.entity, spec, &self.seasons.window(min_samples))
            .await
    }

    pub fn require_line(&self) -> Result<LineQuery> {
        self.line.context("insight requires a line")
    }

    pub fn require_opponent(&self) -> Result<&Team> {
        self.opponent.as_ref().context("insight requires an opponent")
    }

    /// Orient a signed difference so positive favours the requested side.
    pub fn lean(&self, difference: Option<f64>) -> Option<f64> {
        difference.map(|d| match self.direction {
            Direction::Over => d,
            Direction::Under => -d,
        })
    }
}

/// Static routing: which insights apply to this entity, sport, stat and request.
pub fn applicable(ctx: &InsightContext) -> Vec<InsightKind> {
    let basketball = ctx.sport() == Sport::Basketball;
    InsightKind::ALL
        .into_iter()
        .filter(|kind| !kind.needs_line() || ctx.line.is_some())
        .filter(|kind| !kind.needs_opponent() || ctx.opponent.is_some())
        .filter(|kind| match kind {
            InsightKind::OpponentPace | InsightKind::TeamPace | InsightKind::RestSplit => basketball,
            InsightKind::MinutesTrend => basketball && ctx.is_player(),
            InsightKind::ShootingVolume => basketball && ctx.is_player() && ctx.spec.is_scoring(),
            _ => true,
        })
        .collect()
}

/// Run one insight.
pub async fn run(kind: InsightKind, ctx: &InsightContext) -> Result<super::InsightResult> {
    match kind {
        InsightKind::RecentHitRate => lines::recent_hit_rate(ctx).await,
        InsightKind::SeasonHitRate => lines::season_hit_rate(ctx).await,
        InsightKind::HitStreak => lines::hit_streak(ctx).await,
        InsightKind::SeasonAverage => form::season_average(ctx).await,
        InsightKind::RecentForm => form::recent_form(ctx).await,
        InsightKind::HomeAwaySplit => splits::home_away_split(ctx).await,
        InsightKind::MatchupHistory => splits::matchup_history(ctx).await,
        InsightKind::OpponentDefense => matchup::opponent_defense(ctx).await,
        InsightKind::OpponentPace => matchup::opponent_pace(ctx).await,
        InsightKind::TeamPace => matchup::team_pace(ctx).await,
        InsightKind::MinutesTrend => form::minutes_trend(ctx).await,
        InsightKind::ShootingVolume => form::shooting_volume(ctx).await,
        InsightKind::RestSplit => splits::rest_split(ctx).await,
        InsightKind::Consistency => form::consistency(ctx).await,
        InsightKind::SeasonOverSeason => form::season_over_season(ctx).await,
    }
}

fn num(v: f64) -> String {
    format!("{:.1}", v)
}

fn pct(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

fn signed_pct(change: Option<f64>) -> String {
    match change {
        Some(c) => format!(" ({:+.0}%)", c),
        None => String::new(),
    }
}

fn line_phrase(query: &LineQuery, spec: &StatSpec) -> String {
    format!("{} {} {}", query.direction, query.line, spec.label)
}
