//! Role management and pause endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{parse_address, tx_from, AppState};
use crate::types::{Address, ApiResult};

#[derive(Debug, Serialize)]
pub struct RoleNamesResponse {
    pub default_admin_role: &'static str,
    pub admin_role: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RoleCheckQuery {
    pub role: String,
    pub account: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleMembersQuery {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct RoleMembersResponse {
    pub role: String,
    pub members: Vec<Address>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub caller: String,
    pub role: String,
    pub account: String,
}

#[derive(Debug, Deserialize)]
pub struct RenounceRequest {
    pub caller: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct RoleStatusResponse {
    pub role: String,
    pub account: Address,
    pub has_role: bool,
}

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    pub caller: String,
    pub paused: bool,
}

#[derive(Debug, Serialize)]
pub struct PauseResponse {
    pub paused: bool,
}

/// GET /api/roles/default-admin - Role identifiers
pub async fn get_default_admin_role(
    State(state): State<AppState>,
) -> ApiResult<Json<RoleNamesResponse>> {
    let platform = state.platform.read().await;
    Ok(Json(RoleNamesResponse {
        default_admin_role: platform.default_admin_role(),
        admin_role: platform.admin_role(),
    }))
}

/// GET /api/roles/check?role=..&account=..
pub async fn check_role(
    State(state): State<AppState>,
    Query(query): Query<RoleCheckQuery>,
) -> ApiResult<Json<RoleStatusResponse>> {
    let account = parse_address(&query.account, "account")?;
    let has_role = state.platform.read().await.has_role(&query.role, &account);
    Ok(Json(RoleStatusResponse {
        role: query.role,
        account,
        has_role,
    }))
}

/// GET /api/roles/members?role=..
pub async fn get_role_members(
    State(state): State<AppState>,
    Query(query): Query<RoleMembersQuery>,
) -> ApiResult<Json<RoleMembersResponse>> {
    let members = state.platform.read().await.role_members(&query.role);
    Ok(Json(RoleMembersResponse {
        role: query.role,
        members,
    }))
}

/// POST /api/roles/grant
pub async fn grant_role(
    State(state): State<AppState>,
    Json(req): Json<RoleChangeRequest>,
) -> ApiResult<Json<RoleStatusResponse>> {
    let tx = tx_from(&req.caller, None)?;
    let account = parse_address(&req.account, "account")?;

    let mut platform = state.platform.write().await;
    platform.grant_role(&tx, &req.role, account)?;
    Ok(Json(RoleStatusResponse {
        has_role: platform.has_role(&req.role, &account),
        role: req.role,
        account,
    }))
}

/// POST /api/roles/revoke
pub async fn revoke_role(
    State(state): State<AppState>,
    Json(req): Json<RoleChangeRequest>,
) -> ApiResult<Json<RoleStatusResponse>> {
    let tx = tx_from(&req.caller, None)?;
    let account = parse_address(&req.account, "account")?;

    let mut platform = state.platform.write().await;
    platform.revoke_role(&tx, &req.role, account)?;
    Ok(Json(RoleStatusResponse {
        has_role: platform.has_role(&req.role, &account),
        role: req.role,
        account,
    }))
}

/// POST /api/roles/renounce - Caller drops one of its own roles
pub async fn renounce_role(
    State(state): State<AppState>,
    Json(req): Json<RenounceRequest>,
) -> ApiResult<Json<RoleStatusResponse>> {
    let tx = tx_from(&req.caller, None)?;

    let mut platform = state.platform.write().await;
    platform.renounce_role(&tx, &req.role);
    Ok(Json(RoleStatusResponse {
        has_role: platform.has_role(&req.role, &tx.caller),
        role: req.role,
        account: tx.caller,
    }))
}

/// GET /api/pause
pub async fn get_pause(State(state): State<AppState>) -> ApiResult<Json<PauseResponse>> {
    Ok(Json(PauseResponse {
        paused: state.platform.read().await.is_paused(),
    }))
}

/// POST /api/pause - Set or clear the pause flag (admin)
pub async fn set_pause(
    State(state): State<AppState>,
    Json(req): Json<PauseRequest>,
) -> ApiResult<Json<PauseResponse>> {
    let tx = tx_from(&req.caller, None)?;
    let mut platform = state.platform.write().await;
    platform.set_paused(&tx, req.paused)?;
    if req.paused {
        tracing::warn!("Platform paused by {}", tx.caller);
    } else {
        tracing::info!("Platform unpaused by {}", tx.caller);
    }
    Ok(Json(PauseResponse {
        paused: platform.is_paused(),
    }))
}
