//! Module registry and implementation store.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::module::Module;
use crate::types::{Address, PlatformError, PlatformResult};

/// Prefix byte for addresses handed out by [`ModuleRegistry::deploy`].
const DEPLOYMENT_ADDRESS_PREFIX: u8 = 0x5e;

/// Registry entry for one module id.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRecord {
    pub id: String,
    pub address: Address,
    pub dependencies: Vec<String>,
    pub active: bool,
    pub initialized: bool,
    pub registered_at: u64,
    /// Starts at 1, bumped by every implementation upgrade.
    pub version: u32,
}

/// Deployed implementation, as listed by the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ImplementationInfo {
    pub address: Address,
    pub name: String,
}

/// Mapping from module id to record, plus the implementations records point at.
#[derive(Default)]
pub struct ModuleRegistry {
    records: HashMap<String, ModuleRecord>,
    /// Registration order
    order: Vec<String>,
    implementations: HashMap<Address, Arc<dyn Module>>,
    deployments: u64,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store module logic and assign it a fresh address.
    pub fn deploy(&mut self, logic: Arc<dyn Module>) -> Address {
        self.deployments += 1;
        let mut bytes = *Address::from_low_u64(self.deployments).as_bytes();
        bytes[0] = DEPLOYMENT_ADDRESS_PREFIX;
        let address = Address::new(bytes);
        tracing::info!("Deployed implementation {} at {}", logic.name(), address);
        self.implementations.insert(address, logic);
        address
    }

    pub fn implementation(&self, address: &Address) -> Option<Arc<dyn Module>> {
        self.implementations.get(address).cloned()
    }

    /// Deployed implementations, in address order.
    pub fn implementations(&self) -> Vec<ImplementationInfo> {
        let mut list: Vec<ImplementationInfo> = self
            .implementations
            .iter()
            .map(|(address, logic)| ImplementationInfo {
                address: *address,
                name: logic.name().to_string(),
            })
            .collect();
        list.sort_by_key(|info| info.address);
        list
    }

    /// Create a record for `id`. Every dependency must already be registered,
    /// which also rules out dependency cycles.
    pub fn register(
        &mut self,
        id: &str,
        address: Address,
        dependencies: &[String],
        now: u64,
    ) -> PlatformResult<&ModuleRecord> {
        if id.trim().is_empty() || id.chars().any(char::is_whitespace) {
            return Err(PlatformError::InvalidModuleId(id.to_string()));
        }
        if self.records.contains_key(id) {
            return Err(PlatformError::AlreadyRegistered(id.to_string()));
        }

        let mut deps: Vec<String> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !self.records.contains_key(dep) {
                return Err(PlatformError::UnknownDependency {
                    module: id.to_string(),
                    dependency: dep.clone(),
                });
            }
            if !deps.contains(dep) {
                deps.push(dep.clone());
            }
        }

        if !self.implementations.contains_key(&address) {
            return Err(PlatformError::UnknownImplementation(address));
        }

        let record = ModuleRecord {
            id: id.to_string(),
            address,
            dependencies: deps,
            active: false,
            initialized: false,
            registered_at: now,
            version: 1,
        };
        self.order.push(id.to_string());
        Ok(self.records.entry(id.to_string()).or_insert(record))
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn record(&self, id: &str) -> PlatformResult<&ModuleRecord> {
        self.records
            .get(id)
            .ok_or_else(|| PlatformError::NotRegistered(id.to_string()))
    }

    pub fn address_of(&self, id: &str) -> PlatformResult<Address> {
        self.record(id).map(|r| r.address)
    }

    pub fn dependencies(&self, id: &str) -> PlatformResult<&[String]> {
        self.record(id).map(|r| r.dependencies.as_slice())
    }

    /// Module ids in registration order.
    pub fn registered_modules(&self) -> &[String] {
        &self.order
    }

    /// Records in registration order.
    pub fn records(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.records.get(id).is_some_and(|r| r.active)
    }

    pub fn is_initialized(&self, id: &str) -> bool {
        self.records.get(id).is_some_and(|r| r.initialized)
    }

    /// Logic currently behind `id`.
    pub fn logic(&self, id: &str) -> PlatformResult<Arc<dyn Module>> {
        let address = self.address_of(id)?;
        self.implementation(&address)
            .ok_or(PlatformError::UnknownImplementation(address))
    }

    /// Record a successful initialization.
    pub(crate) fn mark_initialized(&mut self, id: &str) -> PlatformResult<()> {
        let record = self.record_mut(id)?;
        record.initialized = true;
        record.active = true;
        Ok(())
    }

    /// Toggle the active flag without touching `initialized`. Returns `true`
    /// if the flag changed.
    pub fn set_active(&mut self, id: &str, active: bool) -> PlatformResult<bool> {
        let record = self.record_mut(id)?;
        if active && !record.initialized {
            return Err(PlatformError::NotInitialized(id.to_string()));
        }
        let changed = record.active != active;
        record.active = active;
        Ok(changed)
    }

    /// Point `id` at a different deployed implementation; returns the previous address.
    pub fn replace_address(&mut self, id: &str, address: Address) -> PlatformResult<Address> {
        if !self.implementations.contains_key(&address) {
            // NotRegistered wins over UnknownImplementation.
            self.record(id)?;
            return Err(PlatformError::UnknownImplementation(address));
        }
        let record = self.record_mut(id)?;
        let previous = record.address;
        record.address = address;
        record.version += 1;
        Ok(previous)
    }

    fn record_mut(&mut self, id: &str) -> PlatformResult<&mut ModuleRecord> {
        self.records
            .get_mut(id)
            .ok_or_else(|| PlatformError::NotRegistered(id.to_string()))
    }
}
