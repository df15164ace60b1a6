//! SovereignSeas platform flow runner (no HTTP server).
//!
//! Walks the platform in-process:
//! 1. Deploy and register the reference modules in dependency order
//! 2. Batch-initialize them with one deliberately bad payload
//! 3. Inspect initialization status and retry the failed module
//! 4. Route calls into projects, campaigns and voting
//! 5. Vote with a token whose primary price source fails, falling back to a manual rate
//!
//! Run with:
//! `cargo run --example platform_flow`

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

use sovereign_seas_backend::config::DEFAULT_DEPLOYER;
use sovereign_seas_backend::modules::campaigns::{CampaignsCall, CampaignsConfig};
use sovereign_seas_backend::modules::projects::ProjectsCall;
use sovereign_seas_backend::modules::voting::{VotingCall, VotingQuery};
use sovereign_seas_backend::modules::{self, campaigns, projects, voting};
use sovereign_seas_backend::platform::conversion::{
    ConversionResolver, DEFAULT_HEALTH_FAILURE_BPS, RATE_PRECISION,
};
use sovereign_seas_backend::platform::module::{decode, encode};
use sovereign_seas_backend::platform::oracle::SimulatedOracle;
use sovereign_seas_backend::platform::{Platform, TxContext};
use sovereign_seas_backend::types::Address;

const VOTE_TOKEN_AMOUNT: u128 = 250 * RATE_PRECISION;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let oracle = SimulatedOracle::new();
    let resolver = ConversionResolver::new(
        Some(Arc::new(oracle.clone())),
        DEFAULT_HEALTH_FAILURE_BPS,
    );
    let mut platform = Platform::new(DEFAULT_DEPLOYER, resolver);
    let admin = TxContext::new(DEFAULT_DEPLOYER);
    let voter = TxContext::new(Address::from_low_u64(0xf00d));

    // 1. Registration
    let mut ids = Vec::new();
    for (id, logic, dependencies) in modules::reference_modules() {
        let address = platform.deploy_implementation(logic);
        platform.register_module(&admin, id, address, &dependencies)?;
        println!("Registered {:<10} at {} deps={:?}", id, address, dependencies);
        ids.push(id.to_string());
    }

    // 2. Batch initialization; campaigns gets an inconsistent config
    let bad_campaigns = encode(&CampaignsConfig {
        min_duration: 10,
        max_duration: 1,
    })?;
    let payloads: Vec<Vec<u8>> = ids
        .iter()
        .map(|id| {
            if id == campaigns::MODULE_ID {
                bad_campaigns.clone()
            } else {
                Vec::new()
            }
        })
        .collect();
    let results = platform.initialize_modules_batch(&admin, &ids, &payloads)?;

    println!();
    println!("Batch initialization:");
    for (id, ok) in ids.iter().zip(&results) {
        println!("  {:<10} {}", id, if *ok { "ok" } else { "FAILED" });
    }

    // 3. Retry whatever is still inactive, in registration order
    let status = platform.get_modules_initialization_status(&ids);
    for (id, active) in ids.iter().zip(status) {
        if !active {
            platform
                .initialize_module(&admin, id, &[])
                .with_context(|| format!("retrying {}", id))?;
            println!("  {:<10} retried -> active", id);
        }
    }

    // 4. Routed calls
    let project_id: u64 = decode(&platform.call_module(
        &admin,
        projects::MODULE_ID,
        &encode(&ProjectsCall::CreateProject {
            name: "Coral nursery".into(),
            description: "Restoring reef habitat".into(),
        })?,
    )?)?;
    let campaign_id: u64 = decode(&platform.call_module(
        &admin,
        campaigns::MODULE_ID,
        &encode(&CampaignsCall::CreateCampaign {
            name: "Ocean round".into(),
            start_time: admin.timestamp,
            end_time: admin.timestamp + 7 * 24 * 60 * 60,
        })?,
    )?)?;
    platform.call_module(
        &admin,
        campaigns::MODULE_ID,
        &encode(&CampaignsCall::AddProject {
            campaign_id,
            project_id,
        })?,
    )?;
    println!();
    println!("Project {} added to campaign {}", project_id, campaign_id);

    // 5. Conversion fallback
    let token = Address::from_low_u64(0xc05d);
    oracle.set_failing(token, "exchange halted");
    platform.configure_primary_source(&admin, token, true)?;

    let vote = encode(&VotingCall::Vote {
        campaign_id,
        project_id,
        token: Some(token),
        amount: VOTE_TOKEN_AMOUNT,
    })?;
    match platform.call_module(&voter, voting::MODULE_ID, &vote) {
        Ok(_) => return Err(anyhow!("vote should fail without any conversion path")),
        Err(e) => println!("Vote without a rate: {}", e),
    }

    platform.set_manual_token_rate(&admin, token, RATE_PRECISION / 100)?;
    let weight: u128 = decode(&platform.call_module(&voter, voting::MODULE_ID, &vote)?)?;
    println!(
        "Vote of {} tokens weighted {} native",
        VOTE_TOKEN_AMOUNT / RATE_PRECISION,
        weight as f64 / RATE_PRECISION as f64
    );

    let tally: u128 = decode(&platform.static_call_module(
        &voter,
        voting::MODULE_ID,
        &encode(&VotingQuery::ProjectVotes {
            campaign_id,
            project_id,
        })?,
    )?)?;
    let info = platform.get_token_conversion_info(&token);
    let health = platform.get_conversion_health(&token);
    println!(
        "Tally {} | primary failures {} | manual uses {} | health {} ({} bps)",
        tally,
        info.primary_failure_count,
        info.manual_usage_count,
        health.status.as_str(),
        health.failure_rate_bps
    );
    println!("{} events recorded", platform.events().len());

    Ok(())
}
