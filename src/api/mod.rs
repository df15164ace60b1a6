//! API endpoints for the platform service

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;

mod access;
mod conversion;
mod debug;
mod modules;
mod system;

use crate::platform::conversion::RATE_PRECISION;
use crate::platform::oracle::SimulatedOracle;
use crate::platform::{Platform, TxContext};
use crate::types::{Address, ApiError, ApiResult};

/// Platform shared across handlers: writers are exclusive, readers concurrent
pub type SharedPlatform = Arc<RwLock<Platform>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub platform: SharedPlatform,
    /// Handle onto the rate source wired into the platform's resolver
    pub oracle: SimulatedOracle,
}

impl AppState {
    pub fn new(platform: SharedPlatform, oracle: SimulatedOracle) -> Self {
        Self { platform, oracle }
    }
}

/// Create the API router with all endpoints
pub fn router(platform: SharedPlatform, oracle: SimulatedOracle) -> Router {
    let app_state = AppState::new(platform, oracle);

    Router::new()
        // System
        .route("/status", get(system::get_status))
        .route("/events", get(system::get_events))
        // Registry
        .route("/implementations", get(modules::list_implementations))
        .route(
            "/modules",
            get(modules::list_modules).post(modules::register_module),
        )
        .route("/modules/:id", get(modules::get_module))
        .route("/modules/:id/dependencies", get(modules::get_dependencies))
        .route("/modules/:id/deactivate", post(modules::deactivate_module))
        .route("/modules/:id/reactivate", post(modules::reactivate_module))
        .route("/modules/:id/upgrade", post(modules::upgrade_module))
        // Initialization
        .route("/modules/:id/initialize", post(modules::initialize_module))
        .route("/batch/initialize", post(modules::initialize_batch))
        .route("/batch/status", post(modules::batch_status))
        // Routing
        .route("/modules/:id/call", post(modules::call_module))
        .route("/modules/:id/static-call", post(modules::static_call_module))
        // Access control
        .route("/roles/default-admin", get(access::get_default_admin_role))
        .route("/roles/check", get(access::check_role))
        .route("/roles/members", get(access::get_role_members))
        .route("/roles/grant", post(access::grant_role))
        .route("/roles/revoke", post(access::revoke_role))
        .route("/roles/renounce", post(access::renounce_role))
        .route("/pause", get(access::get_pause).post(access::set_pause))
        // Conversion
        .route("/tokens/:token/quote", get(conversion::get_quote))
        .route("/tokens/:token/convert", post(conversion::convert))
        .route("/tokens/:token/info", get(conversion::get_info))
        .route("/tokens/:token/health", get(conversion::get_health))
        .route("/tokens/:token/manual-rate", post(conversion::set_manual_rate))
        .route(
            "/tokens/:token/manual-rate/remove",
            post(conversion::remove_manual_rate),
        )
        .route(
            "/tokens/:token/emergency-rate",
            post(conversion::emergency_set_rate),
        )
        .route(
            "/tokens/:token/primary-source",
            post(conversion::configure_primary_source),
        )
        // Simulated oracle
        .route("/debug/oracle", get(debug::list_quotes))
        .route("/debug/oracle/:token", post(debug::set_quote))
        .route("/debug/oracle/:token/clear", post(debug::clear_quote))
        .with_state(app_state)
}

fn parse_address(raw: &str, field: &str) -> ApiResult<Address> {
    raw.parse::<Address>()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {}: {}", field, e)))
}

fn parse_amount(raw: &str, field: &str) -> ApiResult<u128> {
    raw.trim()
        .parse::<u128>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {}: {:?}", field, raw)))
}

/// `0x`-prefixed (or bare) hex; empty string and `0x` are the empty payload.
fn parse_hex(raw: &str, field: &str) -> ApiResult<Vec<u8>> {
    let digits = raw
        .trim()
        .strip_prefix("0x")
        .unwrap_or_else(|| raw.trim());
    hex::decode(digits).map_err(|e| ApiError::BadRequest(format!("Invalid {}: {}", field, e)))
}

fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// 18-decimal fixed point to float, for the `_human` response fields.
fn to_human(value: u128) -> f64 {
    value as f64 / RATE_PRECISION as f64
}

/// Transaction context for a request made by `caller`, optionally carrying value.
fn tx_from(caller: &str, value: Option<&str>) -> ApiResult<TxContext> {
    let caller = parse_address(caller, "caller")?;
    let value = match value {
        Some(raw) => parse_amount(raw, "value")?,
        None => 0,
    };
    Ok(TxContext::new(caller).with_value(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_accepts_empty_payloads() {
        assert!(parse_hex("0x", "data").unwrap().is_empty());
        assert!(parse_hex("", "data").unwrap().is_empty());
        assert_eq!(parse_hex("0x0a0b", "data").unwrap(), vec![0x0a, 0x0b]);
        assert!(parse_hex("0xzz", "data").is_err());
    }

    #[test]
    fn test_tx_from() {
        let caller = Address::from_low_u64(9).to_string();
        let tx = tx_from(&caller, Some("15")).unwrap();
        assert_eq!(tx.caller, Address::from_low_u64(9));
        assert_eq!(tx.value, 15);
        assert!(tx_from("bob", None).is_err());
        assert!(tx_from(&caller, Some("-1")).is_err());
    }

    #[test]
    fn test_to_human() {
        assert_eq!(to_human(RATE_PRECISION / 4), 0.25);
        assert_eq!(to_hex(&[0xab]), "0xab");
    }
}
