//! Treasury module: platform fee and deposits valued in native currency.

use serde::{Deserialize, Serialize};

use crate::platform::module::{
    decode, decode_or_default, encode, revert, CallContext, Module, ModuleError, StaticContext,
};
use crate::types::Address;

pub const MODULE_ID: &str = "treasury";

/// Fees are in basis points of the deposited value.
const MAX_FEE_BPS: u16 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryConfig {
    pub platform_fee_bps: u16,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            platform_fee_bps: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreasuryCall {
    /// `token: None` is a native deposit and must attach exactly `amount`.
    /// Returns the native value credited.
    Deposit { token: Option<Address>, amount: u128 },
    /// Operator only.
    SetFee { platform_fee_bps: u16 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreasuryQuery {
    /// Native equivalent without recording conversion telemetry.
    Quote { token: Address, amount: u128 },
    TotalNative,
    DepositedBy { account: Address },
    FeeFor { amount: u128 },
}

fn deposit_key(account: &Address) -> String {
    format!("deposit:{}", account)
}

pub struct TreasuryModule;

impl Module for TreasuryModule {
    fn name(&self) -> &'static str {
        "TreasuryModule"
    }

    fn initialize(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), ModuleError> {
        let config: TreasuryConfig = decode_or_default(data)?;
        if config.platform_fee_bps > MAX_FEE_BPS {
            return Err(revert("platform fee above 100%"));
        }
        ctx.storage.put("config", &config)?;
        ctx.storage.put("operator", &ctx.caller)?;
        ctx.storage.put("total_native", &0u128)?;
        Ok(())
    }

    fn handle_call(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<Vec<u8>, ModuleError> {
        match decode::<TreasuryCall>(data)? {
            TreasuryCall::Deposit { token, amount } => {
                if amount == 0 {
                    return Err(revert("deposit amount is zero"));
                }
                let native = match token {
                    None => {
                        if ctx.value != amount {
                            return Err(revert(format!(
                                "attached value {} does not match amount {}",
                                ctx.value, amount
                            )));
                        }
                        amount
                    }
                    Some(token) => ctx
                        .conversion
                        .get_token_to_celo_equivalent_with_logging(&token, amount)?,
                };

                let total: u128 = ctx.storage.get("total_native")?.unwrap_or(0);
                let key = deposit_key(&ctx.caller);
                let mine: u128 = ctx.storage.get(&key)?.unwrap_or(0);
                ctx.storage
                    .put("total_native", &total.saturating_add(native))?;
                ctx.storage.put(&key, &mine.saturating_add(native))?;
                encode(&native)
            }
            TreasuryCall::SetFee { platform_fee_bps } => {
                let operator: Option<Address> = ctx.storage.get("operator")?;
                if operator != Some(ctx.caller) {
                    return Err(revert("only the treasury operator can change fees"));
                }
                if platform_fee_bps > MAX_FEE_BPS {
                    return Err(revert("platform fee above 100%"));
                }
                ctx.storage
                    .put("config", &TreasuryConfig { platform_fee_bps })?;
                encode(&platform_fee_bps)
            }
        }
    }

    fn handle_static_call(
        &self,
        ctx: &StaticContext<'_>,
        data: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        match decode::<TreasuryQuery>(data)? {
            TreasuryQuery::Quote { token, amount } => {
                encode(&ctx.conversion.get_token_to_celo_equivalent(&token, amount)?)
            }
            TreasuryQuery::TotalNative => {
                let total: u128 = ctx.storage.get("total_native")?.unwrap_or(0);
                encode(&total)
            }
            TreasuryQuery::DepositedBy { account } => {
                let amount: u128 = ctx.storage.get(&deposit_key(&account))?.unwrap_or(0);
                encode(&amount)
            }
            TreasuryQuery::FeeFor { amount } => {
                let config: TreasuryConfig = ctx.storage.get("config")?.unwrap_or_default();
                let fee = amount / u128::from(MAX_FEE_BPS) * u128::from(config.platform_fee_bps)
                    + amount % u128::from(MAX_FEE_BPS) * u128::from(config.platform_fee_bps)
                        / u128::from(MAX_FEE_BPS);
                encode(&fee)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::platform::conversion::RATE_PRECISION;
    use crate::platform::testing::{admin, outsider, platform, tx};
    use crate::platform::Platform;
    use crate::types::PlatformError;

    const ONE: u128 = RATE_PRECISION;

    fn setup() -> Platform {
        let mut platform = platform();
        let address = platform.deploy_implementation(Arc::new(TreasuryModule));
        platform
            .register_module(&tx(admin()), MODULE_ID, address, &[])
            .unwrap();
        platform
            .initialize_module(&tx(admin()), MODULE_ID, &[])
            .unwrap();
        platform
    }

    fn query(platform: &Platform, q: TreasuryQuery) -> Result<u128, PlatformError> {
        platform
            .static_call_module(&tx(outsider()), MODULE_ID, &encode(&q).unwrap())
            .map(|out| decode(&out).unwrap())
    }

    #[test]
    fn test_native_deposit_requires_matching_value() {
        let mut platform = setup();
        let deposit = encode(&TreasuryCall::Deposit {
            token: None,
            amount: 5,
        })
        .unwrap();

        assert!(platform
            .call_module(&tx(outsider()).with_value(4), MODULE_ID, &deposit)
            .is_err());
        platform
            .call_module(&tx(outsider()).with_value(5), MODULE_ID, &deposit)
            .unwrap();
        assert_eq!(query(&platform, TreasuryQuery::TotalNative).unwrap(), 5);
        assert_eq!(
            query(&platform, TreasuryQuery::DepositedBy { account: outsider() }).unwrap(),
            5
        );
    }

    #[test]
    fn test_token_deposit_uses_manual_rate_and_logs() {
        let mut platform = setup();
        let token = Address::from_low_u64(0xcafe);
        platform
            .set_manual_token_rate(&tx(admin()), token, ONE / 2)
            .unwrap();

        let deposit = encode(&TreasuryCall::Deposit {
            token: Some(token),
            amount: 10 * ONE,
        })
        .unwrap();
        let out = platform.call_module(&tx(outsider()), MODULE_ID, &deposit).unwrap();
        assert_eq!(decode::<u128>(&out).unwrap(), 5 * ONE);
        assert_eq!(platform.get_token_conversion_info(&token).manual_usage_count, 1);
    }

    #[test]
    fn test_unpriced_token_passes_platform_error_through() {
        let mut platform = setup();
        let token = Address::from_low_u64(0xbeef);
        let deposit = encode(&TreasuryCall::Deposit {
            token: Some(token),
            amount: ONE,
        })
        .unwrap();
        assert_eq!(
            platform.call_module(&tx(outsider()), MODULE_ID, &deposit),
            Err(PlatformError::NoConversionPathAvailable(token))
        );
        assert_eq!(
            query(&platform, TreasuryQuery::Quote { token, amount: ONE }),
            Err(PlatformError::NoConversionPathAvailable(token))
        );
        assert_eq!(query(&platform, TreasuryQuery::TotalNative).unwrap(), 0);
    }

    #[test]
    fn test_fee_management() {
        let mut platform = setup();
        assert_eq!(
            query(&platform, TreasuryQuery::FeeFor { amount: 1_000 }).unwrap(),
            50
        );
        let set = encode(&TreasuryCall::SetFee {
            platform_fee_bps: 250,
        })
        .unwrap();
        assert!(platform.call_module(&tx(outsider()), MODULE_ID, &set).is_err());
        platform.call_module(&tx(admin()), MODULE_ID, &set).unwrap();
        assert_eq!(
            query(&platform, TreasuryQuery::FeeFor { amount: 1_000 }).unwrap(),
            25
        );
    }
}
