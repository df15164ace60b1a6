//! Shared types and error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for platform entry points
pub type PlatformResult<T> = Result<T, PlatformError>;

/// 20-byte account / contract address, rendered as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address whose low 8 bytes hold `value` (big-endian).
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex in address: {0}")]
    InvalidHex(String),

    #[error("address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let array: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Every failure the platform core can surface to a caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("Unauthorized: {account} lacks role {role}")]
    Unauthorized { account: Address, role: String },

    #[error("Module not registered: {0}")]
    NotRegistered(String),

    #[error("Module already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Module {module} depends on unregistered module {dependency}")]
    UnknownDependency { module: String, dependency: String },

    #[error("Module already active: {0}")]
    AlreadyActive(String),

    #[error("Module not initialized: {0}")]
    NotInitialized(String),

    #[error("Module inactive: {0}")]
    ModuleInactive(String),

    #[error("System paused")]
    SystemPaused,

    #[error("No module implementation deployed at {0}")]
    UnknownImplementation(Address),

    #[error("Invalid module id: {0:?}")]
    InvalidModuleId(String),

    #[error("Batch length mismatch: {ids} ids, {payloads} payloads")]
    LengthMismatch { ids: usize, payloads: usize },

    #[error("Invalid rate for token {0}: rate must be greater than zero")]
    InvalidRate(Address),

    #[error("No conversion path available for token {0}")]
    NoConversionPathAvailable(Address),

    #[error("Conversion overflow for token {0}")]
    ConversionOverflow(Address),

    #[error("Module {module} reverted: {reason}")]
    ModuleReverted { module: String, reason: String },
}

impl PlatformError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            PlatformError::Unauthorized { .. } => "UNAUTHORIZED",
            PlatformError::NotRegistered(_) => "NOT_REGISTERED",
            PlatformError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            PlatformError::UnknownDependency { .. } => "UNKNOWN_DEPENDENCY",
            PlatformError::AlreadyActive(_) => "ALREADY_ACTIVE",
            PlatformError::NotInitialized(_) => "NOT_INITIALIZED",
            PlatformError::ModuleInactive(_) => "MODULE_INACTIVE",
            PlatformError::SystemPaused => "SYSTEM_PAUSED",
            PlatformError::UnknownImplementation(_) => "UNKNOWN_IMPLEMENTATION",
            PlatformError::InvalidModuleId(_) => "INVALID_MODULE_ID",
            PlatformError::LengthMismatch { .. } => "LENGTH_MISMATCH",
            PlatformError::InvalidRate(_) => "INVALID_RATE",
            PlatformError::NoConversionPathAvailable(_) => "NO_CONVERSION_PATH_AVAILABLE",
            PlatformError::ConversionOverflow(_) => "CONVERSION_OVERFLOW",
            PlatformError::ModuleReverted { .. } => "MODULE_REVERTED",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            PlatformError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            PlatformError::NotRegistered(_) => StatusCode::NOT_FOUND,
            PlatformError::AlreadyRegistered(_)
            | PlatformError::AlreadyActive(_)
            | PlatformError::NotInitialized(_) => StatusCode::CONFLICT,
            PlatformError::SystemPaused | PlatformError::ModuleInactive(_) => StatusCode::LOCKED,
            PlatformError::UnknownDependency { .. }
            | PlatformError::UnknownImplementation(_)
            | PlatformError::InvalidModuleId(_)
            | PlatformError::LengthMismatch { .. } => StatusCode::BAD_REQUEST,
            PlatformError::InvalidRate(_)
            | PlatformError::NoConversionPathAvailable(_)
            | PlatformError::ConversionOverflow(_)
            | PlatformError::ModuleReverted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

/// API error types
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Platform(e) => (e.status(), e.code()),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_display() {
        let addr: Address = "0x00000000000000000000000000000000000000ff".parse().unwrap();
        assert_eq!(addr, Address::from_low_u64(255));
        assert_eq!(addr.to_string(), "0x00000000000000000000000000000000000000ff");
    }

    #[test]
    fn test_address_accepts_unprefixed_hex() {
        let addr: Address = "00000000000000000000000000000000000000aa".parse().unwrap();
        assert_eq!(addr, Address::from_low_u64(0xaa));
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert_eq!(
            "0x1234".parse::<Address>(),
            Err(AddressParseError::InvalidLength(2))
        );
        assert!(matches!(
            "0xzz".parse::<Address>(),
            Err(AddressParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_address_json_is_hex_string() {
        let addr = Address::from_low_u64(1);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000000000000001\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_platform_error_codes_are_stable() {
        assert_eq!(PlatformError::SystemPaused.code(), "SYSTEM_PAUSED");
        assert_eq!(
            PlatformError::ModuleInactive("voting".into()).code(),
            "MODULE_INACTIVE"
        );
        assert_eq!(
            PlatformError::SystemPaused.status(),
            StatusCode::LOCKED
        );
    }
}
