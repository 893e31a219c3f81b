//! Request orchestration: validate, resolve once, fan out, collect.

use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::catalog::{StatCatalog, StatSpec};
use super::eligibility::EligibilityPolicy;
use super::error::EngineError;
use super::insights::{self, InsightContext, InsightKind};
use super::line::{Direction, LineQuery};
use super::repository::GameLogRepository;
use super::result::InsightResult;
use super::season::SeasonContext;
use super::EngineSettings;
use crate::db::models::{EntityRef, Sport, Team};

/// One insight request. A player id takes precedence over a team id.
#[derive(Debug, Clone, Default)]
pub struct InsightRequest {
    pub player_id: Option<i64>,
    pub team_id: Option<i64>,
    pub stat: String,
    pub line: Option<f64>,
    pub direction: Option<String>,
    pub opponent_id: Option<i64>,
}

/// Who the bundle describes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    /// "player" or "team"
    pub kind: &'static str,
    pub id: i64,
    pub name: String,
    pub team_id: i64,
    pub position: Option<String>,
    pub sport: Sport,
}

/// Every applicable insight for one request, keyed by insight id
#[derive(Debug, Clone, Serialize)]
pub struct InsightBundle {
    pub entity: EntitySummary,
    pub stat: StatSpec,
    pub line: Option<LineQuery>,
    pub direction: Direction,
    pub opponent: Option<Team>,
    pub season: SeasonContext,
    pub insights: BTreeMap<&'static str, InsightResult>,
}

impl InsightBundle {
    pub fn error_count(&self) -> usize {
        self.insights.values().filter(|r| r.is_error()).count()
    }
}

pub struct InsightComposer {
    repo: Arc<dyn GameLogRepository>,
    settings: EngineSettings,
}

impl InsightComposer {
    pub fn new(repo: Arc<dyn GameLogRepository>, settings: EngineSettings) -> Self {
        InsightComposer { repo, settings }
    }

    /// Build the bundle. Only request-level problems (bad input, unknown
    /// entity, failed lookups) return `Err`; a failing insight becomes an
    /// error-flagged entry and the rest of the bundle is still returned.
    pub async fn compose(&self, request: &InsightRequest) -> Result<InsightBundle, EngineError> {
        let ctx = Arc::new(self.context(request).await?);
        let kinds = insights::applicable(&ctx);
        let results = self.run_all(&ctx, &kinds).await;

        let bundle = InsightBundle {
            entity: EntitySummary {
                kind: if ctx.is_player() { "player" } else { "team" },
                id: match ctx.entity {
                    EntityRef::Player(id) | EntityRef::Team(id) => id,
                    _ => ctx.team_id,
                },
                name: ctx.entity_name.clone(),
                team_id: ctx.team_id,
                position: ctx.position.clone(),
                sport: ctx.sport(),
            },
            stat: ctx.spec.clone(),
            line: ctx.line,
            direction: ctx.direction,
            opponent: ctx.opponent.clone(),
            season: ctx.seasons.clone(),
            insights: results,
        };
        info!(
            "Composed {} insights for {} ({}), {} failed",
            bundle.insights.len(),
            bundle.entity.name,
            bundle.stat.id,
            bundle.error_count()
        );
        Ok(bundle)
    }

    /// Validate the request and resolve everything the insights share.
    /// The stat is resolved before any game log is read.
    async fn context(&self, request: &InsightRequest) -> Result<InsightContext, EngineError> {
        if request.stat.trim().is_empty() {
            return Err(EngineError::MissingIdentifier("stat"));
        }
        let direction = match request.direction.as_deref() {
            Some(raw) => raw.parse::<Direction>()?,
            None => Direction::default(),
        };
        let line = request
            .line
            .map(|l| LineQuery::new(l, direction))
            .transpose()?;

        let (entity, name, team_id, position, sport) = match (request.player_id, request.team_id) {
            (Some(player_id), _) => {
                let player = self
                    .repo
                    .find_player(player_id)
                    .await?
                    .ok_or(EngineError::PlayerNotFound(player_id))?;
                (
                    EntityRef::Player(player.id),
                    player.name,
                    player.team_id,
                    player.position,
                    player.sport,
                )
            }
            (None, Some(team_id)) => {
                let team = self
                    .repo
                    .find_team(team_id)
                    .await?
                    .ok_or(EngineError::TeamNotFound(team_id))?;
                (EntityRef::Team(team.id), team.name, team.id, None, team.sport)
            }
            (None, None) => return Err(EngineError::MissingIdentifier("player_id or team_id")),
        };

        let spec = StatCatalog::for_sport(sport).resolve(&request.stat)?;
        if spec.is_combo() {
            debug!("'{}' resolved to combo {}", request.stat, spec.columns.join("+"));
        }

        let opponent = match request.opponent_id {
            Some(opponent_id) => Some(
                self.repo
                    .find_team(opponent_id)
                    .await?
                    .ok_or(EngineError::TeamNotFound(opponent_id))?,
            ),
            None => None,
        };

        let current = match self.settings.current_season {
            Some(season) => season,
            None => match self.repo.latest_season(sport).await? {
                Some(season) => season,
                None => {
                    warn!("No seasons recorded for {}; using calendar year", sport.as_str());
                    chrono::Utc::now().year()
                }
            },
        };
        let seasons = SeasonContext::new(sport, current, self.settings.fallback_seasons);
        let policy = match entity {
            EntityRef::Player(_) => EligibilityPolicy::for_player(sport, self.settings.min_minutes),
            _ => EligibilityPolicy::teams(),
        };

        Ok(InsightContext {
            repo: Arc::clone(&self.repo),
            entity,
            entity_name: name,
            team_id,
            position,
            spec,
            line,
            direction,
            opponent,
            seasons,
            policy,
            settings: self.settings.clone(),
        })
    }

    /// Run every kind as its own task, each under its own timeout. The bound
    /// is enforced from this task, so an insight stuck in synchronous work is
    /// still cut off. A failing or panicking insight only affects its own
    /// result.
    async fn run_all(
        &self,
        ctx: &Arc<InsightContext>,
        kinds: &[InsightKind],
    ) -> BTreeMap<&'static str, InsightResult> {
        let limit = self.settings.insight_timeout;
        let futures: Vec<_> = kinds
            .iter()
            .map(|&kind| {
                let ctx = Arc::clone(ctx);
                let mut handle = tokio::spawn(async move { insights::run(kind, &ctx).await });
                async move {
                    let result = match tokio::time::timeout(limit, &mut handle).await {
                        Ok(Ok(Ok(result))) => result,
                        Ok(Ok(Err(e))) => {
                            warn!("Insight '{}' failed: {:#}", kind.id(), e);
                            InsightResult::failed(kind.id(), format!("{:#}", e))
                        }
                        Ok(Err(e)) => {
                            warn!("Insight '{}' task failed: {}", kind.id(), e);
                            InsightResult::failed(kind.id(), "internal error")
                        }
                        Err(_) => {
                            handle.abort();
                            warn!("Insight '{}' timed out after {:?}", kind.id(), limit);
                            InsightResult::failed(kind.id(), format!("timed out after {:?}", limit))
                        }
                    };
                    (kind.id(), result)
                }
            })
            .collect();

        futures_util::future::join_all(futures)
            .await
            .into_iter()
            .collect()
    }
}
