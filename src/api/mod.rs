use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::db::models::Sport;
use crate::engine::line::{parse_line, Direction};
use crate::engine::{EngineError, InsightComposer, InsightRequest, StatCatalog};

pub struct AppState {
    pub composer: InsightComposer,
}

/// Build the Axum router for the insight API.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/insights", get(insights_handler))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Raw query string; every field arrives as text and is validated here so
/// malformed values surface as engine input errors.
#[derive(Debug, Default, Deserialize)]
pub struct InsightQuery {
    pub player_id: Option<String>,
    pub team_id: Option<String>,
    pub stat: Option<String>,
    pub line: Option<String>,
    pub direction: Option<String>,
    pub opponent_id: Option<String>,
}

impl InsightQuery {
    fn into_request(self) -> Result<InsightRequest, EngineError> {
        Ok(InsightRequest {
            player_id: parse_id("player_id", self.player_id.as_deref())?,
            team_id: parse_id("team_id", self.team_id.as_deref())?,
            stat: present(self.stat.as_deref())
                .ok_or(EngineError::MissingIdentifier("stat"))?
                .to_string(),
            line: present(self.line.as_deref()).map(parse_line).transpose()?,
            direction: present(self.direction.as_deref())
                .map(Direction::normalize)
                .transpose()?
                .map(str::to_string),
            opponent_id: parse_id("opponent_id", self.opponent_id.as_deref())?,
        })
    }
}

/// `?line=` counts as absent.
fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_id(field: &'static str, raw: Option<&str>) -> Result<Option<i64>, EngineError> {
    present(raw)
        .map(|s| {
            s.parse::<i64>().map_err(|_| EngineError::InvalidIdentifier {
                field,
                value: s.to_string(),
            })
        })
        .transpose()
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub sport: Option<String>,
}

fn error_response(err: EngineError) -> (StatusCode, String) {
    let status = if err.is_input_error() {
        StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        error!("Insight request failed: {}", err);
        StatusCode::BAD_GATEWAY
    };
    (status, err.to_string())
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/stats?sport=basketball
async fn stats_handler(
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let raw = present(query.sport.as_deref())
        .ok_or(EngineError::MissingIdentifier("sport"))
        .map_err(error_response)?;
    let sport = Sport::parse(raw)
        .ok_or_else(|| EngineError::UnknownSport(raw.to_string()))
        .map_err(error_response)?;
    Ok(Json(StatCatalog::for_sport(sport).list()))
}

/// GET /api/insights?player_id=7&stat=pts&line=24.5&direction=over&opponent_id=2
async fn insights_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InsightQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let request = query.into_request().map_err(error_response)?;
    info!(
        "Insight request: player={:?} team={:?} stat='{}' line={:?}",
        request.player_id, request.team_id, request.stat, request.line
    );
    state
        .composer
        .compose(&request)
        .await
        .map(Json)
        .map_err(error_response)
}
