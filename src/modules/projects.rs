//! Projects module: project records owned by their creators.

use serde::{Deserialize, Serialize};

use crate::platform::module::{
    decode, decode_or_default, encode, revert, CallContext, Module, ModuleError, StaticContext,
};
use crate::types::Address;

pub const MODULE_ID: &str = "projects";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsConfig {
    pub max_name_length: u32,
}

impl Default for ProjectsConfig {
    fn default() -> Self {
        Self { max_name_length: 64 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub owner: Address,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProjectsCall {
    /// Returns the new project id.
    CreateProject { name: String, description: String },
    /// Owner only.
    SetProjectActive { project_id: u64, active: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProjectsQuery {
    GetProject { project_id: u64 },
    ProjectCount,
}

/// Storage key of a project record; also read by dependent modules.
pub fn project_key(project_id: u64) -> String {
    format!("project:{}", project_id)
}

pub struct ProjectsModule;

impl Module for ProjectsModule {
    fn name(&self) -> &'static str {
        "ProjectsModule"
    }

    fn initialize(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), ModuleError> {
        let config: ProjectsConfig = decode_or_default(data)?;
        if config.max_name_length == 0 {
            return Err(revert("max_name_length must be positive"));
        }
        ctx.storage.put("config", &config)?;
        ctx.storage.put("next_id", &0u64)?;
        Ok(())
    }

    fn handle_call(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<Vec<u8>, ModuleError> {
        let config: ProjectsConfig = ctx.storage.get("config")?.unwrap_or_default();
        match decode::<ProjectsCall>(data)? {
            ProjectsCall::CreateProject { name, description } => {
                if name.trim().is_empty() {
                    return Err(revert("project name is empty"));
                }
                if name.chars().count() > config.max_name_length as usize {
                    return Err(revert(format!(
                        "project name longer than {} characters",
                        config.max_name_length
                    )));
                }
                let id: u64 = ctx.storage.get("next_id")?.unwrap_or(0);
                let project = Project {
                    id,
                    owner: ctx.caller,
                    name,
                    description,
                    active: true,
                    created_at: ctx.timestamp,
                };
                ctx.storage.put(&project_key(id), &project)?;
                ctx.storage.put("next_id", &(id + 1))?;
                tracing::debug!("project {} created by {}", id, ctx.caller);
                encode(&id)
            }
            ProjectsCall::SetProjectActive { project_id, active } => {
                let key = project_key(project_id);
                let mut project: Project = ctx
                    .storage
                    .get(&key)?
                    .ok_or_else(|| revert(format!("unknown project {}", project_id)))?;
                if project.owner != ctx.caller {
                    return Err(revert("only the project owner can change its status"));
                }
                project.active = active;
                ctx.storage.put(&key, &project)?;
                encode(&active)
            }
        }
    }

    fn handle_static_call(
        &self,
        ctx: &StaticContext<'_>,
        data: &[u8],
    ) -> Result<Vec<u8>, ModuleError> {
        match decode::<ProjectsQuery>(data)? {
            ProjectsQuery::GetProject { project_id } => {
                let project: Option<Project> = ctx.storage.get(&project_key(project_id))?;
                encode(&project)
            }
            ProjectsQuery::ProjectCount => {
                let count: u64 = ctx.storage.get("next_id")?.unwrap_or(0);
                encode(&count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::platform::testing::{admin, platform, tx};
    use crate::platform::Platform;
    use crate::types::PlatformError;

    fn setup() -> Platform {
        let mut platform = platform();
        let address = platform.deploy_implementation(Arc::new(ProjectsModule));
        platform
            .register_module(&tx(admin()), MODULE_ID, address, &[])
            .unwrap();
        platform
            .initialize_module(&tx(admin()), MODULE_ID, &[])
            .unwrap();
        platform
    }

    fn create(platform: &mut Platform, owner: Address, name: &str) -> Result<u64, PlatformError> {
        let call = encode(&ProjectsCall::CreateProject {
            name: name.to_string(),
            description: String::new(),
        })
        .unwrap();
        platform
            .call_module(&tx(owner), MODULE_ID, &call)
            .map(|out| decode(&out).unwrap())
    }

    #[test]
    fn test_create_and_query_project() {
        let mut platform = setup();
        let owner = Address::from_low_u64(0x01);
        assert_eq!(create(&mut platform, owner, "Reef cleanup").unwrap(), 0);
        assert_eq!(create(&mut platform, owner, "Tide gauge").unwrap(), 1);

        let query = encode(&ProjectsQuery::GetProject { project_id: 1 }).unwrap();
        let out = platform.static_call_module(&tx(owner), MODULE_ID, &query).unwrap();
        let project: Option<Project> = decode(&out).unwrap();
        let project = project.unwrap();
        assert_eq!(project.name, "Tide gauge");
        assert_eq!(project.owner, owner);
        assert!(project.active);

        let count = encode(&ProjectsQuery::ProjectCount).unwrap();
        let out = platform.static_call_module(&tx(owner), MODULE_ID, &count).unwrap();
        assert_eq!(decode::<u64>(&out).unwrap(), 2);
    }

    #[test]
    fn test_name_validation_reverts() {
        let mut platform = setup();
        let err = create(&mut platform, admin(), &"x".repeat(65)).unwrap_err();
        assert!(matches!(err, PlatformError::ModuleReverted { .. }));
        assert!(create(&mut platform, admin(), "  ").is_err());
    }

    #[test]
    fn test_only_owner_toggles_status() {
        let mut platform = setup();
        let owner = Address::from_low_u64(0x01);
        create(&mut platform, owner, "Mangroves").unwrap();

        let call = encode(&ProjectsCall::SetProjectActive {
            project_id: 0,
            active: false,
        })
        .unwrap();
        assert!(platform
            .call_module(&tx(Address::from_low_u64(0x02)), MODULE_ID, &call)
            .is_err());
        platform.call_module(&tx(owner), MODULE_ID, &call).unwrap();

        let storage = platform.module_storage(MODULE_ID).unwrap();
        let project: Project = storage.get(&project_key(0)).unwrap().unwrap();
        assert!(!project.active);
    }
}
