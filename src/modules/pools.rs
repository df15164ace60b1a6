//! Pools module: per-campaign prize pools, valued in native currency.

use serde::{Deserialize, Serialize};

use super::campaigns::{self, Campaign};
use super::treasury;
use crate::platform::module::{
    decode, encode, revert, CallContext, Module, ModuleError, StaticContext,
};
use crate::types::Address;

pub const MODULE_ID: &str = "pools";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PoolsCall {
    /// `token: None` funds with native value, which must be attached in full.
    /// Returns the pool balance after funding.
    Fund {
        campaign_id: u64,
        token: Option<Address>,
        amount: u128,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PoolsQuery {
    PoolBalance { campaign_id: u64 },
    FundedBy { campaign_id: u64, account: Address },
}

fn pool_key(campaign_id: u64) -> String {
    format!("pool:{}", campaign_id)
}

fn funder_key(campaign_id: u64, account: &Address) -> String {
    format!("funder:{}:{}", campaign_id, account)
}

pub struct PoolsModule;

impl Module for PoolsModule {
    fn name(&self) -> &'static str {
        "PoolsModule"
    }

    fn initialize(&self, ctx: &mut CallContext<'_>, _data: &[u8]) -> Result<(), ModuleError> {
        for dependency in [campaigns::MODULE_ID, treasury::MODULE_ID] {
            if !ctx.module_active(dependency) {
                return Err(revert(format!("{} module must be active before pools", dependency)));
            }
        }
        ctx.storage.put("pool_count", &0u64)?;
        Ok(())
    }

    fn handle_call(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let PoolsCall::Fund {
            campaign_id,
            token,
            amount,
        } = decode(data)?;

        if amount == 0 {
            return Err(revert("funding amount is zero"));
        }
        let campaign: Campaign = ctx
            .read_peer(campaigns::MODULE_ID, &campaigns::campaign_key(campaign_id))?
            .ok_or_else(|| revert(format!("unknown campaign {}", campaign_id)))?;
        if ctx.timestamp >= campaign.end_time {
            return Err(revert(format!("campaign {} has ended", campaign_id)));
        }

        let native = match token {
            None if ctx.value != amount => {
                return Err(revert(format!(
                    "attached value {} does not match amount {}",
                    ctx.value, amount
                )));
            }
            None => amount,
            Some(token) => ctx
                .conversion
                .get_token_to_celo_equivalent_with_logging(&token, amount)?,
        };

        let balance: Option<u128> = ctx.storage.get(&pool_key(campaign_id))?;
        if balance.is_none() {
            let count: u64 = ctx.storage.get("pool_count")?.unwrap_or(0);
            ctx.storage.put("pool_count", &(count + 1))?;
        }
        let balance = balance.unwrap_or(0).saturating_add(native);
        ctx.storage.put(&pool_key(campaign_id), &balance)?;

        let key = funder_key(campaign_id, &ctx.caller);
        let mine: u128 = ctx.storage.get(&key)?.unwrap_or(0);
        ctx.storage.put(&key, &mine.saturating_add(native))?;
        encode(&balance)
    }

    fn handle_static_call(
        &self,
        ctx: &StaticContext<'_>,
        data: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let amount: u128 = match decode::<PoolsQuery>(data)? {
            PoolsQuery::PoolBalance { campaign_id } => ctx.storage.get(&pool_key(campaign_id))?,
            PoolsQuery::FundedBy {
                campaign_id,
                account,
            } => ctx.storage.get(&funder_key(campaign_id, &account))?,
        }
        .unwrap_or(0);
        encode(&amount)
    }
}
