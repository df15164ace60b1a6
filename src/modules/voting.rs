//! Voting module: votes on campaign projects, weighted by native value.

use serde::{Deserialize, Serialize};

use super::campaigns::{self, Campaign};
use super::{projects, treasury};
use crate::platform::module::{
    decode, encode, revert, CallContext, Module, ModuleError, StaticContext,
};
use crate::types::Address;

pub const MODULE_ID: &str = "voting";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VotingCall {
    /// `token: None` votes with native value, which must be attached in full.
    /// Returns the vote weight in native units.
    Vote {
        campaign_id: u64,
        project_id: u64,
        token: Option<Address>,
        amount: u128,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VotingQuery {
    ProjectVotes { campaign_id: u64, project_id: u64 },
    VoterWeight { campaign_id: u64, voter: Address },
}

fn tally_key(campaign_id: u64, project_id: u64) -> String {
    format!("tally:{}:{}", campaign_id, project_id)
}

fn voter_key(campaign_id: u64, voter: &Address) -> String {
    format!("voter:{}:{}", campaign_id, voter)
}

pub struct VotingModule;

impl Module for VotingModule {
    fn name(&self) -> &'static str {
        "VotingModule"
    }

    fn initialize(&self, ctx: &mut CallContext<'_>, _data: &[u8]) -> Result<(), ModuleError> {
        for dependency in [projects::MODULE_ID, campaigns::MODULE_ID, treasury::MODULE_ID] {
            if !ctx.module_active(dependency) {
                return Err(revert(format!("{} module must be active before voting", dependency)));
            }
        }
        ctx.storage.put("total_votes", &0u128)?;
        Ok(())
    }

    fn handle_call(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let VotingCall::Vote {
            campaign_id,
            project_id,
            token,
            amount,
        } = decode(data)?;

        if amount == 0 {
            return Err(revert("vote amount is zero"));
        }
        let campaign: Campaign = ctx
            .read_peer(campaigns::MODULE_ID, &campaigns::campaign_key(campaign_id))?
            .ok_or_else(|| revert(format!("unknown campaign {}", campaign_id)))?;
        if !campaign.is_open(ctx.timestamp) {
            return Err(revert(format!("campaign {} is not open", campaign_id)));
        }
        if !campaign.project_ids.contains(&project_id) {
            return Err(revert(format!(
                "project {} is not part of campaign {}",
                project_id, campaign_id
            )));
        }

        let weight = match token {
            None if ctx.value != amount => {
                return Err(revert(format!(
                    "attached value {} does not match vote amount {}",
                    ctx.value, amount
                )));
            }
            None => amount,
            Some(token) => ctx
                .conversion
                .get_token_to_celo_equivalent_with_logging(&token, amount)?,
        };

        let tally: u128 = ctx.storage.get(&tally_key(campaign_id, project_id))?.unwrap_or(0);
        ctx.storage
            .put(&tally_key(campaign_id, project_id), &tally.saturating_add(weight))?;
        let key = voter_key(campaign_id, &ctx.caller);
        let mine: u128 = ctx.storage.get(&key)?.unwrap_or(0);
        ctx.storage.put(&key, &mine.saturating_add(weight))?;
        let total: u128 = ctx.storage.get("total_votes")?.unwrap_or(0);
        ctx.storage.put("total_votes", &total.saturating_add(weight))?;

        tracing::debug!(
            "vote: campaign {} project {} weight {} from {}",
            campaign_id,
            project_id,
            weight,
            ctx.caller
        );
        encode(&weight)
    }

    fn handle_static_call(
        &self,
        ctx: &StaticContext<'_>,
        data: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        let weight: u128 = match decode::<VotingQuery>(data)? {
            VotingQuery::ProjectVotes {
                campaign_id,
                project_id,
            } => ctx.storage.get(&tally_key(campaign_id, project_id))?,
            VotingQuery::VoterWeight { campaign_id, voter } => {
                ctx.storage.get(&voter_key(campaign_id, &voter))?
            }
        }
        .unwrap_or(0);
        encode(&weight)
    }
}
