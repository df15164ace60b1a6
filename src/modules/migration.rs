//! Migration module: maps records from a previous platform version onto
//! projects registered here. The operator closes the migration with
//! `Finalize`, after which the mapping is frozen.

use serde::{Deserialize, Serialize};

use super::projects::{self, Project};
use crate::platform::module::{
    decode, decode_or_default, encode, revert, CallContext, Module, ModuleError, StaticContext,
};
use crate::types::Address;

pub const MODULE_ID: &str = "migration";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Platform version the legacy ids come from.
    pub source_version: u32,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self { source_version: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MigrationCall {
    /// Operator only. Returns the number of migrated records.
    MarkMigrated { legacy_id: u64, project_id: u64 },
    /// Operator only.
    Finalize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MigrationQuery {
    /// `Option<u64>`
    ProjectFor { legacy_id: u64 },
    /// `u64`
    MigratedCount,
    /// `bool`
    Finalized,
}

fn legacy_key(legacy_id: u64) -> String {
    format!("legacy:{}", legacy_id)
}

pub struct MigrationModule;

impl Module for MigrationModule {
    fn name(&self) -> &'static str {
        "MigrationModule"
    }

    fn initialize(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), ModuleError> {
        if !ctx.module_active(projects::MODULE_ID) {
            return Err(revert("projects module must be active before migration"));
        }
        let config: MigrationConfig = decode_or_default(data)?;
        ctx.storage.put("config", &config)?;
        ctx.storage.put("operator", &ctx.caller)?;
        ctx.storage.put("migrated", &0u64)?;
        ctx.storage.put("finalized", &false)?;
        Ok(())
    }

    fn handle_call(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let operator: Option<Address> = ctx.storage.get("operator")?;
        if operator != Some(ctx.caller) {
            return Err(revert("only the migration operator can change migration state"));
        }
        if ctx.storage.get::<bool>("finalized")?.unwrap_or(false) {
            return Err(revert("migration is finalized"));
        }

        match decode::<MigrationCall>(data)? {
            MigrationCall::MarkMigrated {
                legacy_id,
                project_id,
            } => {
                if ctx.storage.contains(&legacy_key(legacy_id)) {
                    return Err(revert(format!("legacy record {} already migrated", legacy_id)));
                }
                let _project: Project = ctx
                    .read_peer(projects::MODULE_ID, &projects::project_key(project_id))?
                    .ok_or_else(|| revert(format!("unknown project {}", project_id)))?;

                ctx.storage.put(&legacy_key(legacy_id), &project_id)?;
                let migrated: u64 = ctx.storage.get("migrated")?.unwrap_or(0);
                ctx.storage.put("migrated", &(migrated + 1))?;
                encode(&(migrated + 1))
            }
            MigrationCall::Finalize => {
                ctx.storage.put("finalized", &true)?;
                let migrated: u64 = ctx.storage.get("migrated")?.unwrap_or(0);
                tracing::info!("Migration finalized with {} records", migrated);
                encode(&migrated)
            }
        }
    }

    fn handle_static_call(
        &self,
        ctx: &StaticContext<'_>,
        data: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        match decode::<MigrationQuery>(data)? {
            MigrationQuery::ProjectFor { legacy_id } => {
                encode(&ctx.storage.get::<u64>(&legacy_key(legacy_id))?)
            }
            MigrationQuery::MigratedCount => {
                encode(&ctx.storage.get::<u64>("migrated")?.unwrap_or(0))
            }
            MigrationQuery::Finalized => {
                encode(&ctx.storage.get::<bool>("finalized")?.unwrap_or(false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::bootstrap;
    use crate::modules::projects::ProjectsCall;
    use crate::platform::testing::{admin, outsider, platform, tx};
    use crate::platform::Platform;
    use crate::types::PlatformError;

    fn setup() -> Platform {
        let mut platform = platform();
        let admin_tx = tx(admin());
        bootstrap(&mut platform, &admin_tx).unwrap();
        let create = encode(&ProjectsCall::CreateProject {
            name: "Kelp forest".into(),
            description: String::new(),
        })
        .unwrap();
        platform
            .call_module(&admin_tx, projects::MODULE_ID, &create)
            .unwrap();
        platform
    }

    fn mark(legacy_id: u64, project_id: u64) -> Vec<u8> {
        encode(&MigrationCall::MarkMigrated {
            legacy_id,
            project_id,
        })
        .unwrap()
    }

    fn query<T: serde::de::DeserializeOwned>(platform: &Platform, q: MigrationQuery) -> T {
        let out = platform
            .static_call_module(&tx(outsider()), MODULE_ID, &encode(&q).unwrap())
            .unwrap();
        decode(&out).unwrap()
    }

    #[test]
    fn test_mark_and_finalize() {
        let mut platform = setup();
        let admin_tx = tx(admin());

        let out = platform.call_module(&admin_tx, MODULE_ID, &mark(17, 0)).unwrap();
        assert_eq!(decode::<u64>(&out).unwrap(), 1);
        assert_eq!(
            query::<Option<u64>>(&platform, MigrationQuery::ProjectFor { legacy_id: 17 }),
            Some(0)
        );
        assert!(platform.call_module(&admin_tx, MODULE_ID, &mark(17, 0)).is_err());

        let finalize = encode(&MigrationCall::Finalize).unwrap();
        platform.call_module(&admin_tx, MODULE_ID, &finalize).unwrap();
        assert!(query::<bool>(&platform, MigrationQuery::Finalized));
        assert!(platform.call_module(&admin_tx, MODULE_ID, &mark(18, 0)).is_err());
        assert_eq!(query::<u64>(&platform, MigrationQuery::MigratedCount), 1);
    }

    #[test]
    fn test_only_operator_and_known_projects() {
        let mut platform = setup();
        let err = platform
            .call_module(&tx(outsider()), MODULE_ID, &mark(1, 0))
            .unwrap_err();
        assert!(matches!(err, PlatformError::ModuleReverted { .. }));
        assert!(platform
            .call_module(&tx(admin()), MODULE_ID, &mark(1, 42))
            .is_err());
        assert_eq!(query::<u64>(&platform, MigrationQuery::MigratedCount), 0);
    }
}
