//! Token → native (CELO) value conversion.
//!
//! Resolution order for a token:
//! 1. the primary rate source, if one is wired and configured for the token and
//!    it answers with a nonzero rate;
//! 2. the manual rate, if set;
//! 3. otherwise `NoConversionPathAvailable`.
//!
//! Rates are 18-decimal fixed point (native per token). The resolver never
//! caches primary quotes.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Address, PlatformError, PlatformResult};

/// Fixed-point scale for rates: `1.0 == RATE_PRECISION`.
pub const RATE_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Failure rate (bps) at or above which a primary source is no longer healthy.
pub const DEFAULT_HEALTH_FAILURE_BPS: u32 = 2_000;

const BPS_DENOMINATOR: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RateSourceError(pub String);

/// External price provider. Returns the native-per-token rate for `amount` of
/// `token`, or fails.
pub trait RateSource: Send + Sync {
    fn rate(&self, token: &Address, amount: u128) -> Result<u128, RateSourceError>;
}

/// Per-token conversion state. Created lazily, never deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenConversionRecord {
    pub primary_configured: bool,
    /// 0 means unset.
    pub manual_rate: u128,
    pub primary_attempt_count: u64,
    pub primary_failure_count: u64,
    pub manual_usage_count: u64,
    pub last_primary_attempt_time: u64,
}

/// Observability snapshot for one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenConversionInfo {
    pub has_primary_source: bool,
    pub has_manual_rate: bool,
    pub manual_rate: u128,
    pub primary_failure_count: u64,
    pub manual_usage_count: u64,
    pub last_primary_attempt_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    ManualOnly,
    Unavailable,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::ManualOnly => "manual-only",
            HealthStatus::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversionHealth {
    pub is_healthy: bool,
    pub status: HealthStatus,
    /// primary failures / primary attempts, in basis points
    pub failure_rate_bps: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionPath {
    Primary,
    Manual,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Conversion {
    pub amount: u128,
    pub rate: u128,
    pub path: ConversionPath,
}

/// Saved resolver state, used to undo telemetry written by a failed call.
#[derive(Debug, Clone)]
pub struct ConversionSnapshot {
    records: HashMap<Address, TokenConversionRecord>,
}

pub struct ConversionResolver {
    source: Option<Arc<dyn RateSource>>,
    records: HashMap<Address, TokenConversionRecord>,
    failure_threshold_bps: u32,
}

impl ConversionResolver {
    pub fn new(source: Option<Arc<dyn RateSource>>, failure_threshold_bps: u32) -> Self {
        Self {
            source,
            records: HashMap::new(),
            failure_threshold_bps: failure_threshold_bps.min(BPS_DENOMINATOR as u32),
        }
    }

    pub fn has_rate_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn failure_threshold_bps(&self) -> u32 {
        self.failure_threshold_bps
    }

    pub fn record(&self, token: &Address) -> Option<&TokenConversionRecord> {
        self.records.get(token)
    }

    /// Tokens with a conversion record, in address order.
    pub fn tracked_tokens(&self) -> Vec<Address> {
        let mut tokens: Vec<Address> = self.records.keys().copied().collect();
        tokens.sort();
        tokens
    }

    pub(crate) fn configure_primary_source(&mut self, token: Address, enabled: bool) {
        self.records.entry(token).or_default().primary_configured = enabled;
    }

    pub(crate) fn set_manual_rate(&mut self, token: Address, rate: u128) -> PlatformResult<()> {
        if rate == 0 {
            return Err(PlatformError::InvalidRate(token));
        }
        self.records.entry(token).or_default().manual_rate = rate;
        Ok(())
    }

    /// Clear the manual rate; returns the previous rate (0 if none).
    pub(crate) fn remove_manual_rate(&mut self, token: Address) -> u128 {
        let record = self.records.entry(token).or_default();
        std::mem::take(&mut record.manual_rate)
    }

    /// Same validation as [`set_manual_rate`](Self::set_manual_rate); returns
    /// the rate it replaced (0 if none).
    pub(crate) fn emergency_set_rate(&mut self, token: Address, rate: u128) -> PlatformResult<u128> {
        if rate == 0 {
            return Err(PlatformError::InvalidRate(token));
        }
        let record = self.records.entry(token).or_default();
        Ok(std::mem::replace(&mut record.manual_rate, rate))
    }

    /// Pure resolution; records nothing.
    pub fn quote(&self, token: &Address, amount: u128) -> PlatformResult<Conversion> {
        let record = self.records.get(token).cloned().unwrap_or_default();

        if let Some(Ok(rate)) = self.try_primary(&record, token, amount) {
            return Ok(Conversion {
                amount: apply_rate(token, amount, rate)?,
                rate,
                path: ConversionPath::Primary,
            });
        }

        manual_conversion(&record, token, amount)
    }

    pub fn get_token_to_celo_equivalent(&self, token: &Address, amount: u128) -> PlatformResult<u128> {
        self.quote(token, amount).map(|c| c.amount)
    }

    /// Resolution with telemetry. Counters are committed only when the
    /// conversion succeeds.
    pub fn convert_with_logging(
        &mut self,
        token: &Address,
        amount: u128,
        now: u64,
    ) -> PlatformResult<Conversion> {
        let mut record = self.records.get(token).cloned().unwrap_or_default();

        let result = match self.try_primary(&record, token, amount) {
            Some(primary) => {
                record.primary_attempt_count += 1;
                record.last_primary_attempt_time = now;
                match primary {
                    Ok(rate) => apply_rate(token, amount, rate).map(|converted| Conversion {
                        amount: converted,
                        rate,
                        path: ConversionPath::Primary,
                    }),
                    Err(e) => {
                        record.primary_failure_count += 1;
                        tracing::warn!(
                            "Primary rate source failed for {}: {} - trying manual rate",
                            token,
                            e
                        );
                        manual_conversion(&record, token, amount)
                    }
                }
            }
            None => manual_conversion(&record, token, amount),
        }?;

        if result.path == ConversionPath::Manual {
            record.manual_usage_count += 1;
            tracing::debug!("Manual rate used for {} (rate {})", token, result.rate);
        }
        self.records.insert(*token, record);

        Ok(result)
    }

    pub fn get_token_to_celo_equivalent_with_logging(
        &mut self,
        token: &Address,
        amount: u128,
        now: u64,
    ) -> PlatformResult<u128> {
        self.convert_with_logging(token, amount, now).map(|c| c.amount)
    }

    pub fn token_info(&self, token: &Address) -> TokenConversionInfo {
        let record = self.records.get(token).cloned().unwrap_or_default();
        TokenConversionInfo {
            has_primary_source: self.primary_usable(&record),
            has_manual_rate: record.manual_rate > 0,
            manual_rate: record.manual_rate,
            primary_failure_count: record.primary_failure_count,
            manual_usage_count: record.manual_usage_count,
            last_primary_attempt_time: record.last_primary_attempt_time,
        }
    }

    pub fn health(&self, token: &Address) -> ConversionHealth {
        let record = self.records.get(token).cloned().unwrap_or_default();
        let failure_rate_bps = if record.primary_attempt_count == 0 {
            0
        } else {
            (record.primary_failure_count.min(record.primary_attempt_count) * BPS_DENOMINATOR
                / record.primary_attempt_count) as u32
        };
        let has_manual = record.manual_rate > 0;
        // Failed resolutions record nothing, so a source that is down right
        // now may still show a clean history.
        let primary_down = matches!(
            self.try_primary(&record, token, RATE_PRECISION),
            Some(Err(_))
        );

        let status = if !self.primary_usable(&record) {
            if has_manual {
                HealthStatus::ManualOnly
            } else {
                HealthStatus::Unavailable
            }
        } else if failure_rate_bps < self.failure_threshold_bps && !primary_down {
            HealthStatus::Healthy
        } else if has_manual {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unavailable
        };

        ConversionHealth {
            is_healthy: matches!(status, HealthStatus::Healthy | HealthStatus::ManualOnly),
            status,
            failure_rate_bps,
        }
    }

    pub(crate) fn snapshot(&self) -> ConversionSnapshot {
        ConversionSnapshot {
            records: self.records.clone(),
        }
    }

    pub(crate) fn restore(&mut self, snapshot: ConversionSnapshot) {
        self.records = snapshot.records;
    }

    fn primary_usable(&self, record: &TokenConversionRecord) -> bool {
        record.primary_configured && self.source.is_some()
    }

    /// `None` when no primary source applies to the token.
    fn try_primary(
        &self,
        record: &TokenConversionRecord,
        token: &Address,
        amount: u128,
    ) -> Option<Result<u128, RateSourceError>> {
        if !record.primary_configured {
            return None;
        }
        let source = self.source.as_ref()?;
        Some(match source.rate(token, amount) {
            Ok(0) => Err(RateSourceError("primary source returned a zero rate".into())),
            other => other,
        })
    }
}

fn manual_conversion(
    record: &TokenConversionRecord,
    token: &Address,
    amount: u128,
) -> PlatformResult<Conversion> {
    if record.manual_rate == 0 {
        return Err(PlatformError::NoConversionPathAvailable(*token));
    }
    Ok(Conversion {
        amount: apply_rate(token, amount, record.manual_rate)?,
        rate: record.manual_rate,
        path: ConversionPath::Manual,
    })
}

/// `amount * rate / RATE_PRECISION` without overflowing on the intermediate product.
pub fn apply_rate(token: &Address, amount: u128, rate: u128) -> PlatformResult<u128> {
    let overflow = || PlatformError::ConversionOverflow(*token);
    let whole = (amount / RATE_PRECISION).checked_mul(rate).ok_or_else(overflow)?;
    let fraction = (amount % RATE_PRECISION)
        .checked_mul(rate)
        .ok_or_else(overflow)?
        / RATE_PRECISION;
    whole.checked_add(fraction).ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::oracle::SimulatedOracle;

    const ONE: u128 = RATE_PRECISION;

    fn token() -> Address {
        Address::from_low_u64(0x7001)
    }

    fn resolver_with(oracle: &SimulatedOracle) -> ConversionResolver {
        ConversionResolver::new(Some(Arc::new(oracle.clone())), DEFAULT_HEALTH_FAILURE_BPS)
    }

    #[test]
    fn test_apply_rate() {
        assert_eq!(apply_rate(&token(), 100 * ONE, ONE / 100).unwrap(), ONE);
        assert_eq!(apply_rate(&token(), 3, ONE / 2).unwrap(), 1);
        assert_eq!(apply_rate(&token(), u128::MAX, ONE).unwrap(), u128::MAX);
        assert_eq!(
            apply_rate(&token(), u128::MAX, 2 * ONE),
            Err(PlatformError::ConversionOverflow(token()))
        );
    }

    #[test]
    fn test_primary_source_preferred_and_pure() {
        let oracle = SimulatedOracle::new();
        oracle.set_rate(token(), 2 * ONE);
        let mut resolver = resolver_with(&oracle);
        resolver.configure_primary_source(token(), true);
        resolver.set_manual_rate(token(), ONE).unwrap();

        let conversion = resolver.quote(&token(), 5 * ONE).unwrap();
        assert_eq!(conversion.path, ConversionPath::Primary);
        assert_eq!(conversion.amount, 10 * ONE);

        let info = resolver.token_info(&token());
        assert_eq!(info.primary_failure_count, 0);
        assert_eq!(info.manual_usage_count, 0);
        assert_eq!(info.last_primary_attempt_time, 0);
    }

    #[test]
    fn test_unconfigured_primary_is_skipped() {
        let oracle = SimulatedOracle::new();
        oracle.set_rate(token(), 2 * ONE);
        let mut resolver = resolver_with(&oracle);
        resolver.set_manual_rate(token(), ONE).unwrap();

        let conversion = resolver.convert_with_logging(&token(), ONE, 50).unwrap();
        assert_eq!(conversion.path, ConversionPath::Manual);
        let record = resolver.record(&token()).unwrap();
        assert_eq!(record.primary_attempt_count, 0);
        assert_eq!(record.last_primary_attempt_time, 0);
        assert_eq!(record.manual_usage_count, 1);
    }

    #[test]
    fn test_fallback_with_logging_counts_once() {
        let oracle = SimulatedOracle::new();
        oracle.set_failing(token(), "exchange paused");
        let mut resolver = resolver_with(&oracle);
        resolver.configure_primary_source(token(), true);
        resolver.set_manual_rate(token(), ONE / 4).unwrap();

        let amount = resolver
            .get_token_to_celo_equivalent_with_logging(&token(), 8 * ONE, 1_700)
            .unwrap();
        assert_eq!(amount, 2 * ONE);

        let info = resolver.token_info(&token());
        assert_eq!(info.primary_failure_count, 1);
        assert_eq!(info.manual_usage_count, 1);
        assert_eq!(info.last_primary_attempt_time, 1_700);
    }

    #[test]
    fn test_zero_primary_rate_counts_as_failure() {
        let oracle = SimulatedOracle::new();
        oracle.set_rate(token(), 0);
        let mut resolver = resolver_with(&oracle);
        resolver.configure_primary_source(token(), true);
        resolver.set_manual_rate(token(), ONE).unwrap();

        let conversion = resolver.convert_with_logging(&token(), ONE, 1).unwrap();
        assert_eq!(conversion.path, ConversionPath::Manual);
        assert_eq!(resolver.token_info(&token()).primary_failure_count, 1);
    }

    #[test]
    fn test_zero_manual_rate_is_rejected() {
        let mut resolver = ConversionResolver::new(None, DEFAULT_HEALTH_FAILURE_BPS);
        assert_eq!(
            resolver.set_manual_rate(token(), 0),
            Err(PlatformError::InvalidRate(token()))
        );
        assert_eq!(
            resolver.emergency_set_rate(token(), 0),
            Err(PlatformError::InvalidRate(token()))
        );
        assert!(!resolver.token_info(&token()).has_manual_rate);
    }

    #[test]
    fn test_no_path_fails_and_records_nothing() {
        let oracle = SimulatedOracle::new();
        oracle.set_failing(token(), "no liquidity");
        let mut resolver = resolver_with(&oracle);
        resolver.configure_primary_source(token(), true);

        assert_eq!(
            resolver.get_token_to_celo_equivalent(&token(), 100 * ONE),
            Err(PlatformError::NoConversionPathAvailable(token()))
        );
        assert_eq!(
            resolver.convert_with_logging(&token(), 100 * ONE, 9),
            Err(PlatformError::NoConversionPathAvailable(token()))
        );
        assert_eq!(resolver.record(&token()).unwrap().primary_attempt_count, 0);
    }

    #[test]
    fn test_manual_rate_recovers_failed_token() {
        let oracle = SimulatedOracle::new();
        oracle.set_failing(token(), "oracle down");
        let mut resolver = resolver_with(&oracle);
        resolver.configure_primary_source(token(), true);

        assert!(resolver.get_token_to_celo_equivalent(&token(), 100 * ONE).is_err());
        resolver.set_manual_rate(token(), ONE / 100).unwrap();
        assert_eq!(
            resolver.get_token_to_celo_equivalent(&token(), 100 * ONE).unwrap(),
            ONE
        );
    }

    #[test]
    fn test_remove_and_emergency_rate() {
        let mut resolver = ConversionResolver::new(None, DEFAULT_HEALTH_FAILURE_BPS);
        resolver.set_manual_rate(token(), ONE).unwrap();
        assert_eq!(resolver.remove_manual_rate(token()), ONE);
        assert_eq!(
            resolver.quote(&token(), ONE),
            Err(PlatformError::NoConversionPathAvailable(token()))
        );

        assert_eq!(resolver.emergency_set_rate(token(), 3 * ONE).unwrap(), 0);
        assert_eq!(resolver.emergency_set_rate(token(), 4 * ONE).unwrap(), 3 * ONE);
        assert_eq!(resolver.quote(&token(), ONE).unwrap().amount, 4 * ONE);
    }

    #[test]
    fn test_health_classification() {
        let oracle = SimulatedOracle::new();
        let mut resolver = resolver_with(&oracle);

        let health = resolver.health(&token());
        assert_eq!(health.status, HealthStatus::Unavailable);
        assert!(!health.is_healthy);

        resolver.set_manual_rate(token(), ONE).unwrap();
        assert_eq!(resolver.health(&token()).status, HealthStatus::ManualOnly);
        assert!(resolver.health(&token()).is_healthy);

        resolver.configure_primary_source(token(), true);
        oracle.set_rate(token(), ONE);
        for t in 0..4 {
            resolver.convert_with_logging(&token(), ONE, t).unwrap();
        }
        let health = resolver.health(&token());
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.failure_rate_bps, 0);

        oracle.set_failing(token(), "stale");
        resolver.convert_with_logging(&token(), ONE, 10).unwrap();
        let health = resolver.health(&token());
        assert_eq!(health.failure_rate_bps, 2_000);
        assert_eq!(health.status, HealthStatus::Degraded);
        assert!(!health.is_healthy);

        resolver.remove_manual_rate(token());
        assert_eq!(resolver.health(&token()).status, HealthStatus::Unavailable);
    }

    #[test]
    fn test_health_of_dead_primary_without_fallback() {
        let oracle = SimulatedOracle::new();
        oracle.set_failing(token(), "exchange halted");
        let mut resolver = resolver_with(&oracle);
        resolver.configure_primary_source(token(), true);

        for t in 0..5 {
            assert_eq!(
                resolver.get_token_to_celo_equivalent_with_logging(&token(), ONE, t),
                Err(PlatformError::NoConversionPathAvailable(token()))
            );
        }
        let health = resolver.health(&token());
        assert_eq!(health.status, HealthStatus::Unavailable);
        assert!(!health.is_healthy);
        assert_eq!(health.failure_rate_bps, 0);

        resolver.set_manual_rate(token(), ONE).unwrap();
        assert_eq!(resolver.health(&token()).status, HealthStatus::Degraded);

        oracle.set_rate(token(), ONE);
        assert_eq!(resolver.health(&token()).status, HealthStatus::Healthy);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut resolver = ConversionResolver::new(None, DEFAULT_HEALTH_FAILURE_BPS);
        resolver.set_manual_rate(token(), ONE).unwrap();
        let snapshot = resolver.snapshot();
        resolver.convert_with_logging(&token(), ONE, 1).unwrap();
        assert_eq!(resolver.token_info(&token()).manual_usage_count, 1);
        resolver.restore(snapshot);
        assert_eq!(resolver.token_info(&token()).manual_usage_count, 0);
    }
}
