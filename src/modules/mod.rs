//! Reference modules hosted by the platform.
//!
//! Business logic is deliberately thin; these exist so that registration,
//! dependency ordering, batch initialization, routing and conversion can be
//! exercised end to end.

pub mod campaigns;
pub mod migration;
pub mod pools;
pub mod projects;
pub mod treasury;
pub mod voting;

use std::sync::Arc;

use crate::platform::module::Module;
use crate::platform::{Platform, TxContext};
use crate::types::{PlatformError, PlatformResult};

/// Reference module ids with their dependencies, in registration order.
pub fn reference_modules() -> Vec<(&'static str, Arc<dyn Module>, Vec<String>)> {
    vec![
        (projects::MODULE_ID, Arc::new(projects::ProjectsModule) as Arc<dyn Module>, vec![]),
        (treasury::MODULE_ID, Arc::new(treasury::TreasuryModule) as Arc<dyn Module>, vec![]),
        (
            campaigns::MODULE_ID,
            Arc::new(campaigns::CampaignsModule) as Arc<dyn Module>,
            vec![projects::MODULE_ID.to_string()],
        ),
        (
            voting::MODULE_ID,
            Arc::new(voting::VotingModule) as Arc<dyn Module>,
            vec![
                projects::MODULE_ID.to_string(),
                campaigns::MODULE_ID.to_string(),
                treasury::MODULE_ID.to_string(),
            ],
        ),
        (
            pools::MODULE_ID,
            Arc::new(pools::PoolsModule) as Arc<dyn Module>,
            vec![campaigns::MODULE_ID.to_string(), treasury::MODULE_ID.to_string()],
        ),
        (
            migration::MODULE_ID,
            Arc::new(migration::MigrationModule) as Arc<dyn Module>,
            vec![projects::MODULE_ID.to_string()],
        ),
    ]
}

/// Deploy, register and batch-initialize the reference modules with default
/// configuration. Returns the per-module initialization result; entries that
/// come back `false` can be retried with `initialize_module`.
pub fn bootstrap(platform: &mut Platform, tx: &TxContext) -> PlatformResult<Vec<(String, bool)>> {
    platform.check_admin(&tx.caller)?;
    let modules = reference_modules();
    if let Some((id, _, _)) = modules.iter().find(|(id, _, _)| platform.is_module_registered(id)) {
        return Err(PlatformError::AlreadyRegistered(id.to_string()));
    }

    let mut ids = Vec::new();
    for (id, logic, dependencies) in modules {
        let address = platform.deploy_implementation(logic);
        platform.register_module(tx, id, address, &dependencies)?;
        ids.push(id.to_string());
    }

    let payloads = vec![Vec::new(); ids.len()];
    let results = platform.initialize_modules_batch(tx, &ids, &payloads)?;
    Ok(ids.into_iter().zip(results).collect())
}
