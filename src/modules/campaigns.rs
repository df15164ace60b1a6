//! Campaigns module: time-boxed funding rounds over registered projects.

use serde::{Deserialize, Serialize};

use super::projects::{self, Project};
use crate::platform::module::{
    decode, decode_or_default, encode, revert, CallContext, Module, ModuleError, StaticContext,
};
use crate::types::Address;

pub const MODULE_ID: &str = "campaigns";

const DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignsConfig {
    /// Seconds
    pub min_duration: u64,
    /// Seconds
    pub max_duration: u64,
}

impl Default for CampaignsConfig {
    fn default() -> Self {
        Self {
            min_duration: 60,
            max_duration: 90 * DAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: u64,
    pub admin: Address,
    pub name: String,
    pub start_time: u64,
    pub end_time: u64,
    pub project_ids: Vec<u64>,
}

impl Campaign {
    /// Voting window is `[start_time, end_time)`.
    pub fn is_open(&self, now: u64) -> bool {
        now >= self.start_time && now < self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CampaignsCall {
    /// Returns the new campaign id.
    CreateCampaign {
        name: String,
        start_time: u64,
        end_time: u64,
    },
    /// Campaign admin only; the project must exist and be active.
    AddProject { campaign_id: u64, project_id: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CampaignsQuery {
    GetCampaign { campaign_id: u64 },
    IsOpen { campaign_id: u64 },
}

pub fn campaign_key(campaign_id: u64) -> String {
    format!("campaign:{}", campaign_id)
}

pub struct CampaignsModule;

impl Module for CampaignsModule {
    fn name(&self) -> &'static str {
        "CampaignsModule"
    }

    fn initialize(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), ModuleError> {
        if !ctx.module_active(projects::MODULE_ID) {
            return Err(revert("projects module must be active before campaigns"));
        }
        let config: CampaignsConfig = decode_or_default(data)?;
        if config.min_duration > config.max_duration {
            return Err(revert(format!(
                "min_duration {} exceeds max_duration {}",
                config.min_duration, config.max_duration
            )));
        }
        ctx.storage.put("config", &config)?;
        ctx.storage.put("next_id", &0u64)?;
        Ok(())
    }

    fn handle_call(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<Vec<u8>, ModuleError> {
        match decode::<CampaignsCall>(data)? {
            CampaignsCall::CreateCampaign {
                name,
                start_time,
                end_time,
            } => {
                let config: CampaignsConfig = ctx.storage.get("config")?.unwrap_or_default();
                let duration = end_time
                    .checked_sub(start_time)
                    .ok_or_else(|| revert("campaign ends before it starts"))?;
                if duration < config.min_duration || duration > config.max_duration {
                    return Err(revert(format!(
                        "campaign duration {}s outside [{}, {}]",
                        duration, config.min_duration, config.max_duration
                    )));
                }
                let id: u64 = ctx.storage.get("next_id")?.unwrap_or(0);
                let campaign = Campaign {
                    id,
                    admin: ctx.caller,
                    name,
                    start_time,
                    end_time,
                    project_ids: Vec::new(),
                };
                ctx.storage.put(&campaign_key(id), &campaign)?;
                ctx.storage.put("next_id", &(id + 1))?;
                encode(&id)
            }
            CampaignsCall::AddProject {
                campaign_id,
                project_id,
            } => {
                let key = campaign_key(campaign_id);
                let mut campaign: Campaign = ctx
                    .storage
                    .get(&key)?
                    .ok_or_else(|| revert(format!("unknown campaign {}", campaign_id)))?;
                if campaign.admin != ctx.caller {
                    return Err(revert("only the campaign admin can add projects"));
                }
                let project: Project = ctx
                    .read_peer(projects::MODULE_ID, &projects::project_key(project_id))?
                    .ok_or_else(|| revert(format!("unknown project {}", project_id)))?;
                if !project.active {
                    return Err(revert(format!("project {} is not active", project_id)));
                }
                if !campaign.project_ids.contains(&project_id) {
                    campaign.project_ids.push(project_id);
                }
                ctx.storage.put(&key, &campaign)?;
                encode(&campaign.project_ids.len())
            }
        }
    }

    fn handle_static_call(
        &self,
        ctx: &StaticContext<'_>,
        data: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        match decode::<CampaignsQuery>(data)? {
            CampaignsQuery::GetCampaign { campaign_id } => {
                let campaign: Option<Campaign> = ctx.storage.get(&campaign_key(campaign_id))?;
                encode(&campaign)
            }
            CampaignsQuery::IsOpen { campaign_id } => {
                let campaign: Option<Campaign> = ctx.storage.get(&campaign_key(campaign_id))?;
                encode(&campaign.is_some_and(|c| c.is_open(ctx.timestamp)))
            }
        }
    }
}
