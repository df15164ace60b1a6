//! Simulated oracle control endpoints.
//!
//! Drive the primary rate source directly: quote a token, make it fail, or
//! remove its quote. Platform-side configuration (primary source enabled,
//! manual rates) is untouched.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::{parse_address, parse_amount, AppState};
use crate::platform::oracle::OracleQuote;
use crate::types::{Address, ApiError, ApiResult};

#[derive(Debug, Serialize)]
pub struct OracleQuoteEntry {
    pub token: Address,
    #[serde(flatten)]
    pub quote: QuoteView,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuoteView {
    Rate { rate: String },
    Failing { reason: String },
}

impl From<OracleQuote> for QuoteView {
    fn from(quote: OracleQuote) -> Self {
        match quote {
            OracleQuote::Rate { rate } => QuoteView::Rate {
                rate: rate.to_string(),
            },
            OracleQuote::Failing { reason } => QuoteView::Failing { reason },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OracleListResponse {
    pub quotes: Vec<OracleQuoteEntry>,
}

/// Exactly one of `rate` or `failing` must be set.
#[derive(Debug, Deserialize)]
pub struct SetQuoteRequest {
    pub rate: Option<String>,
    /// Failure reason to report for this token
    pub failing: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearQuoteResponse {
    pub token: Address,
    pub cleared: bool,
}

/// GET /api/debug/oracle - Current simulated quotes
pub async fn list_quotes(State(state): State<AppState>) -> ApiResult<Json<OracleListResponse>> {
    let quotes = state
        .oracle
        .quotes()
        .into_iter()
        .map(|(token, quote)| OracleQuoteEntry {
            token,
            quote: quote.into(),
        })
        .collect();
    Ok(Json(OracleListResponse { quotes }))
}

/// POST /api/debug/oracle/:token - Set a quote or force a failure
pub async fn set_quote(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(req): Json<SetQuoteRequest>,
) -> ApiResult<Json<OracleQuoteEntry>> {
    let token = parse_address(&token, "token")?;

    match (req.rate, req.failing) {
        (Some(rate), None) => {
            let rate = parse_amount(&rate, "rate")?;
            state.oracle.set_rate(token, rate);
            tracing::info!("Oracle quote for {} set to {}", token, rate);
        }
        (None, Some(reason)) => {
            tracing::info!("Oracle for {} forced to fail: {}", token, reason);
            state.oracle.set_failing(token, reason);
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Provide exactly one of rate or failing".into(),
            ))
        }
    }

    let quote = state
        .oracle
        .quote(&token)
        .ok_or_else(|| ApiError::Internal(format!("Quote for {} vanished", token)))?;
    Ok(Json(OracleQuoteEntry {
        token,
        quote: quote.into(),
    }))
}

/// POST /api/debug/oracle/:token/clear - Remove the token's quote
pub async fn clear_quote(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<ClearQuoteResponse>> {
    let token = parse_address(&token, "token")?;
    let cleared = state.oracle.clear(&token);
    Ok(Json(ClearQuoteResponse { token, cleared }))
}
