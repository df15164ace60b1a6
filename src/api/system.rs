//! System-level status and event log endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::platform::events::PlatformEvent;
use crate::types::ApiResult;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub paused: bool,
    pub registered_modules: usize,
    pub active_modules: usize,
    pub implementations: usize,
    pub events: usize,
    pub tracked_tokens: usize,
    pub rate_source_wired: bool,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<PlatformEvent>,
    /// Pass as `since` to fetch only newer events
    pub next: u64,
}

/// GET /api/status - Platform overview
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let platform = state.platform.read().await;
    let modules = platform.get_registered_modules();
    let active_modules = modules.iter().filter(|id| platform.module_active(id)).count();

    Ok(Json(StatusResponse {
        paused: platform.is_paused(),
        registered_modules: modules.len(),
        active_modules,
        implementations: platform.implementations().len(),
        events: platform.events().len(),
        tracked_tokens: platform.conversion().tracked_tokens().len(),
        rate_source_wired: platform.conversion().has_rate_source(),
    }))
}

/// GET /api/events?since=N - Events with sequence >= N
pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let platform = state.platform.read().await;
    let log = platform.events();
    Ok(Json(EventsResponse {
        events: log.since(query.since).to_vec(),
        next: log.len() as u64,
    }))
}
