use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use serde::Serialize;
use tracing::{debug, warn};

use crate::state::app_state::AppState;
use sensor_feed::{ConnectionStatus, ViewUpdate};

pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(info_check))
        .with_state(state)
}

pub async fn info_check() -> Response {
    match crate::utils::conf_helper::get_cached_config() {
        Some(config) => {
            debug!("{} requested", config.name);
            Json(config).into_response()
        }
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

fn source_down(view: &ViewUpdate) -> bool {
    view.status == ConnectionStatus::Disconnected
        && view.stats.error_streak >= view.stats.error_threshold
}

async fn health_check(State(state): State<AppState>) -> Response {
    let view = state.dashboard.current();
    let down = source_down(&view);

    let health = HealthStatus {
        status: if down { "down" } else { "ok" },
        connection: view.status,
        error_streak: view.stats.error_streak,
        last_error: view.last_error,
    };

    if down {
        warn!("Health check: source down ({} failures)", health.error_streak);
        (StatusCode::SERVICE_UNAVAILABLE, Json(health)).into_response()
    } else {
        Json(health).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    status: &'static str,
    connection: ConnectionStatus,
    error_streak: u32,
    last_error: Option<String>,
}
