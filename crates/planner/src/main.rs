mod catalog;
mod config;
mod db;
mod export;
mod grouping;
mod plant;
mod selection;
mod state;
mod watering;
mod web;
mod zones;

use anyhow::Result;
use std::{env, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use catalog::CatalogClient;
use db::Db;
use state::Planner;
use web::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config file + env overrides ─────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "planner.toml".to_string());
    let cfg = config::load(&config_path)?;

    // ── Database ────────────────────────────────────────────────────
    let db = Db::connect(&cfg.storage.db_url).await?;
    db.migrate().await?;

    // ── Planner state (persisted selection + zones) ─────────────────
    let mut planner = Planner::load(&db).await;
    let seeded = config::apply(&cfg, &mut planner.zones).await;
    if seeded > 0 {
        info!(seeded, "seeded zones from config");
    }

    info!(
        species = planner.selection.unique_count(),
        zones = planner.zones.zones().len(),
        "planner ready"
    );
    planner.record_system("planner started".to_string());

    // ── Plant catalog ───────────────────────────────────────────────
    let settings = cfg.catalog.settings();
    if settings.token.is_none() {
        warn!("TREFLE_TOKEN not set, plant browsing will be unavailable");
    }
    let catalog = Arc::new(CatalogClient::new(settings));

    // ── Web server ──────────────────────────────────────────────────
    let state = AppState {
        planner: planner.shared(),
        catalog,
    };
    web::serve(state, cfg.server.port).await
}
