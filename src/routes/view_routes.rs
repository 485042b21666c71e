use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::routes::ws_handler::handle_ws_updates;
use crate::state::app_state::AppState;
use sensor_feed::{Command, FeedError};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IntervalRequest {
    pub interval_ms: u64,
}

/// =======================
/// ROUTER
/// =======================

pub fn view_routes(state: AppState) -> Router {
    Router::new()
        .route("/view", get(current_view))
        .route("/ws", get(ws_view))
        .route("/control/interval", post(set_interval))
        .route("/control/page/{index}", post(select_page))
        .route("/control/{action}", post(control))
        .with_state(state)
}

/// =======================
/// HANDLERS
/// =======================

async fn current_view(State(state): State<AppState>) -> Response {
    Json(state.dashboard.current()).into_response()
}

async fn ws_view(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let updates = state.dashboard.subscribe();
    ws.on_upgrade(move |socket| handle_ws_updates(socket, updates))
}

fn parse_action(action: &str) -> Option<Command> {
    match action {
        "start" => Some(Command::Start(None)),
        "stop" => Some(Command::Stop),
        "toggle" => Some(Command::Toggle),
        "refresh" => Some(Command::TriggerNow),
        "reset" => Some(Command::Reset),
        _ => None,
    }
}

async fn control(State(state): State<AppState>, Path(action): Path<String>) -> Response {
    let Some(command) = parse_action(&action) else {
        debug!("Unknown control action: {}", action);
        return StatusCode::NOT_FOUND.into_response();
    };
    info!("Control request: {}", action);
    dispatch(&state, command)
}

async fn set_interval(
    State(state): State<AppState>,
    Json(request): Json<IntervalRequest>,
) -> Response {
    info!("Interval change requested: {} ms", request.interval_ms);
    dispatch(&state, Command::SetInterval(Duration::from_millis(request.interval_ms)))
}

async fn select_page(State(state): State<AppState>, Path(index): Path<usize>) -> Response {
    dispatch(&state, Command::SelectPage(index))
}

fn dispatch(state: &AppState, command: Command) -> Response {
    match state.dashboard.send(command) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e @ FeedError::EngineClosed) => {
            error!("Control rejected: {}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        Err(e) => {
            error!("Control failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
