//! Token conversion endpoints
//!
//! Amounts and rates travel as decimal strings in smallest units (rates are
//! 18-decimal fixed point); `_human` companions are floats for display only.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{parse_address, parse_amount, to_human, tx_from, AppState};
use crate::platform::conversion::{Conversion, ConversionPath, HealthStatus};
use crate::platform::Platform;
use crate::types::{Address, ApiResult};

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub caller: String,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub token: Address,
    pub amount: String,
    pub amount_human: f64,
    pub native_amount: String,
    pub native_amount_human: f64,
    pub rate: String,
    pub rate_human: f64,
    pub path: ConversionPath,
}

impl ConversionResponse {
    fn new(token: Address, amount: u128, conversion: Conversion) -> Self {
        Self {
            token,
            amount: amount.to_string(),
            amount_human: to_human(amount),
            native_amount: conversion.amount.to_string(),
            native_amount_human: to_human(conversion.amount),
            rate: conversion.rate.to_string(),
            rate_human: to_human(conversion.rate),
            path: conversion.path,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenInfoResponse {
    pub token: Address,
    pub has_primary_source: bool,
    pub has_manual_rate: bool,
    pub manual_rate: String,
    pub manual_rate_human: f64,
    pub primary_failure_count: u64,
    pub manual_usage_count: u64,
    pub last_primary_attempt_time: u64,
}

impl TokenInfoResponse {
    fn load(platform: &Platform, token: Address) -> Self {
        let info = platform.get_token_conversion_info(&token);
        Self {
            token,
            has_primary_source: info.has_primary_source,
            has_manual_rate: info.has_manual_rate,
            manual_rate: info.manual_rate.to_string(),
            manual_rate_human: to_human(info.manual_rate),
            primary_failure_count: info.primary_failure_count,
            manual_usage_count: info.manual_usage_count,
            last_primary_attempt_time: info.last_primary_attempt_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub token: Address,
    pub is_healthy: bool,
    pub status: HealthStatus,
    pub failure_rate_bps: u32,
    pub failure_rate_pct: f64,
    pub threshold_bps: u32,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub caller: String,
    pub rate: String,
}

#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    pub caller: String,
}

#[derive(Debug, Deserialize)]
pub struct PrimarySourceRequest {
    pub caller: String,
    pub enabled: bool,
}

/// GET /api/tokens/:token/quote?amount=.. - Native equivalent, no telemetry
pub async fn get_quote(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<Json<ConversionResponse>> {
    let token = parse_address(&token, "token")?;
    let amount = parse_amount(&query.amount, "amount")?;

    let conversion = state.platform.read().await.quote_token(&token, amount)?;
    Ok(Json(ConversionResponse::new(token, amount, conversion)))
}

/// POST /api/tokens/:token/convert - Native equivalent, recording telemetry
pub async fn convert(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<ConvertRequest>,
) -> ApiResult<Json<ConversionResponse>> {
    let token = parse_address(&token, "token")?;
    let amount = parse_amount(&req.amount, "amount")?;
    let tx = tx_from(&req.caller, None)?;

    let conversion = state
        .platform
        .write()
        .await
        .convert_token_with_logging(&tx, &token, amount)?;
    Ok(Json(ConversionResponse::new(token, amount, conversion)))
}

/// GET /api/tokens/:token/info
pub async fn get_info(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<TokenInfoResponse>> {
    let token = parse_address(&token, "token")?;
    let platform = state.platform.read().await;
    Ok(Json(TokenInfoResponse::load(&platform, token)))
}

/// GET /api/tokens/:token/health
pub async fn get_health(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<HealthResponse>> {
    let token = parse_address(&token, "token")?;
    let platform = state.platform.read().await;
    let health = platform.get_conversion_health(&token);
    Ok(Json(HealthResponse {
        token,
        is_healthy: health.is_healthy,
        status: health.status,
        failure_rate_bps: health.failure_rate_bps,
        failure_rate_pct: f64::from(health.failure_rate_bps) / 100.0,
        threshold_bps: platform.conversion().failure_threshold_bps(),
    }))
}

/// POST /api/tokens/:token/manual-rate
pub async fn set_manual_rate(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<RateRequest>,
) -> ApiResult<Json<TokenInfoResponse>> {
    let token = parse_address(&token, "token")?;
    let rate = parse_amount(&req.rate, "rate")?;
    let tx = tx_from(&req.caller, None)?;

    let mut platform = state.platform.write().await;
    platform.set_manual_token_rate(&tx, token, rate)?;
    Ok(Json(TokenInfoResponse::load(&platform, token)))
}

/// POST /api/tokens/:token/manual-rate/remove
pub async fn remove_manual_rate(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<Json<TokenInfoResponse>> {
    let token = parse_address(&token, "token")?;
    let tx = tx_from(&req.caller, None)?;

    let mut platform = state.platform.write().await;
    platform.remove_manual_token_rate(&tx, token)?;
    Ok(Json(TokenInfoResponse::load(&platform, token)))
}

/// POST /api/tokens/:token/emergency-rate - Immediate manual rate override
pub async fn emergency_set_rate(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<RateRequest>,
) -> ApiResult<Json<TokenInfoResponse>> {
    let token = parse_address(&token, "token")?;
    let rate = parse_amount(&req.rate, "rate")?;
    let tx = tx_from(&req.caller, None)?;

    let mut platform = state.platform.write().await;
    platform.emergency_set_token_rate(&tx, token, rate)?;
    Ok(Json(TokenInfoResponse::load(&platform, token)))
}

/// POST /api/tokens/:token/primary-source - Enable or disable the primary source
pub async fn configure_primary_source(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<PrimarySourceRequest>,
) -> ApiResult<Json<TokenInfoResponse>> {
    let token = parse_address(&token, "token")?;
    let tx = tx_from(&req.caller, None)?;

    let mut platform = state.platform.write().await;
    platform.configure_primary_source(&tx, token, req.enabled)?;
    Ok(Json(TokenInfoResponse::load(&platform, token)))
}
