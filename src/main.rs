use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod api;
mod config;
mod db;
mod engine;

use api::AppState;
use config::Config;
use db::Database;
use engine::{GameLogRepository, InsightComposer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    if let Some(seed) = &config.seed_file {
        let lines = db.import_seed(seed)?;
        info!("Imported {} stat lines from {}", lines, seed);
    }

    let settings = config.engine_settings();
    info!(
        "Engine settings: hit-rate window {}, recent window {}, min season samples {}, timeout {:?}",
        settings.hit_rate_window,
        settings.recent_window,
        settings.min_season_samples,
        settings.insight_timeout
    );
    let repo: Arc<dyn GameLogRepository> = Arc::new(db);
    info!("Game logs served by '{}' repository", repo.name());
    let composer = InsightComposer::new(repo, settings);

    let app = api::router(AppState { composer });
    let addr: SocketAddr = config.api_addr.parse()?;
    info!("Insight API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
