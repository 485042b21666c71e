use anyhow::{Context, Result};
use axum::Router;
use tracing::{info, Level};

mod models;
mod routes;
mod state;
mod utils;

use crate::state::app_state::AppState;
use crate::utils::conf_helper::{get_cached_config, init_config_and_bind};
use sensor_feed::{Dashboard, HttpFetcher};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    // === CONFIG + LISTENER ===
    let listener = init_config_and_bind()
        .await
        .context("Initialization failed")?;

    let config = get_cached_config().context("Config not initialized")?;

    info!(
        "{} serving on {}:{}",
        config.name, config.connection.ip, config.connection.port
    );

    // === ENGINE ===
    let fetcher = HttpFetcher::new(&config.feed)?;
    for source in fetcher.sources() {
        info!("Source {}: {}", source.label, source.url);
    }
    let (dashboard, engine) = Dashboard::spawn(config.feed.clone(), fetcher)?;

    let state = AppState::new(dashboard.clone());
    let app = Router::new()
        .merge(routes::info_routes::health_routes(state.clone()))
        .merge(routes::view_routes::view_routes(state));

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("Server error")?;

    dashboard.dispose()?;
    engine.await.context("Engine task failed")?;
    Ok(())
}
