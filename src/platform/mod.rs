//! SovereignSeas module platform
//!
//! Simulates the long-lived proxy contract and everything it owns:
//! - role-based access control and the pause flag
//! - the module registry and implementation store
//! - routed calls into module logic (state-changing and read-only)
//! - module initialization, single and batched
//! - token → native value conversion with manual-rate fallback
//!
//! All mutable state lives in [`Platform`]. State-changing entry points take
//! `&mut self` and either complete or leave state untouched; read-only entry
//! points take `&self`.

pub mod access;
pub mod conversion;
pub mod events;
pub mod module;
pub mod oracle;
pub mod orchestrator;
pub mod registry;
pub mod router;

use std::collections::HashMap;
use std::sync::Arc;

use access::{AccessController, PauseGate, ADMIN_ROLE, DEFAULT_ADMIN_ROLE};
use conversion::{Conversion, ConversionHealth, ConversionResolver, TokenConversionInfo};
use events::{EventKind, EventLog};
use module::{CallContext, ConversionTelemetry, Module, ModuleError, ModuleStorage};
use registry::{ImplementationInfo, ModuleRecord, ModuleRegistry};

use crate::types::{Address, PlatformResult};

/// Transaction envelope for a platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxContext {
    pub caller: Address,
    /// Native value attached to the call
    pub value: u128,
    /// Unix seconds
    pub timestamp: u64,
}

impl TxContext {
    /// Call from `caller` at the current wall-clock time, with no value attached.
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            value: 0,
            timestamp: now_unix_secs(),
        }
    }

    pub fn with_value(mut self, value: u128) -> Self {
        self.value = value;
        self
    }

    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

pub fn now_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Owner of all platform state.
pub struct Platform {
    access: AccessController,
    pause: PauseGate,
    registry: ModuleRegistry,
    storage: HashMap<String, ModuleStorage>,
    conversion: ConversionResolver,
    events: EventLog,
}

impl Platform {
    pub fn new(deployer: Address, conversion: ConversionResolver) -> Self {
        tracing::info!("Platform created, deployer {}", deployer);
        Self {
            access: AccessController::new(deployer),
            pause: PauseGate::new(),
            registry: ModuleRegistry::new(),
            storage: HashMap::new(),
            conversion,
            events: EventLog::new(),
        }
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn conversion(&self) -> &ConversionResolver {
        &self.conversion
    }

    /// Storage held on behalf of module `id`, if it has written anything.
    pub fn module_storage(&self, id: &str) -> Option<&ModuleStorage> {
        self.storage.get(id)
    }

    // === Access control ===

    pub fn default_admin_role(&self) -> &'static str {
        DEFAULT_ADMIN_ROLE
    }

    pub fn admin_role(&self) -> &'static str {
        ADMIN_ROLE
    }

    pub fn has_role(&self, role: &str, account: &Address) -> bool {
        self.access.has_role(role, account)
    }

    /// `Unauthorized` unless `account` holds `ADMIN_ROLE`.
    pub fn check_admin(&self, account: &Address) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, account)
    }

    pub fn role_members(&self, role: &str) -> Vec<Address> {
        self.access.members(role)
    }

    pub fn grant_role(&mut self, tx: &TxContext, role: &str, account: Address) -> PlatformResult<()> {
        if self.access.grant_role(&tx.caller, role, account)? {
            self.events.emit(
                tx.timestamp,
                EventKind::RoleGranted {
                    role: role.to_string(),
                    account,
                    sender: tx.caller,
                },
            );
        }
        Ok(())
    }

    pub fn revoke_role(&mut self, tx: &TxContext, role: &str, account: Address) -> PlatformResult<()> {
        if self.access.revoke_role(&tx.caller, role, &account)? {
            self.events.emit(
                tx.timestamp,
                EventKind::RoleRevoked {
                    role: role.to_string(),
                    account,
                    sender: tx.caller,
                },
            );
        }
        Ok(())
    }

    pub fn renounce_role(&mut self, tx: &TxContext, role: &str) {
        if self.access.renounce_role(&tx.caller, role) {
            self.events.emit(
                tx.timestamp,
                EventKind::RoleRevoked {
                    role: role.to_string(),
                    account: tx.caller,
                    sender: tx.caller,
                },
            );
        }
    }

    pub fn set_role_admin(&mut self, tx: &TxContext, role: &str, admin_role: &str) -> PlatformResult<()> {
        self.access.set_role_admin(&tx.caller, role, admin_role)
    }

    // === Pause ===

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn set_paused(&mut self, tx: &TxContext, paused: bool) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        if self.pause.set_paused(paused) {
            let kind = if paused {
                EventKind::Paused { account: tx.caller }
            } else {
                EventKind::Unpaused { account: tx.caller }
            };
            self.events.emit(tx.timestamp, kind);
        }
        Ok(())
    }

    // === Registry ===

    /// Store module logic; anyone may deploy, only admins may register.
    pub fn deploy_implementation(&mut self, logic: Arc<dyn Module>) -> Address {
        self.registry.deploy(logic)
    }

    pub fn implementations(&self) -> Vec<ImplementationInfo> {
        self.registry.implementations()
    }

    pub fn register_module(
        &mut self,
        tx: &TxContext,
        id: &str,
        address: Address,
        dependencies: &[String],
    ) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        let record = self
            .registry
            .register(id, address, dependencies, tx.timestamp)?;
        let kind = EventKind::ModuleRegistered {
            module_id: record.id.clone(),
            address: record.address,
            dependencies: record.dependencies.clone(),
        };
        self.events.emit(tx.timestamp, kind);
        Ok(())
    }

    pub fn is_module_registered(&self, id: &str) -> bool {
        self.registry.is_registered(id)
    }

    pub fn get_module_address(&self, id: &str) -> PlatformResult<Address> {
        self.registry.address_of(id)
    }

    pub fn get_registered_modules(&self) -> Vec<String> {
        self.registry.registered_modules().to_vec()
    }

    pub fn get_module_dependencies(&self, id: &str) -> PlatformResult<Vec<String>> {
        self.registry.dependencies(id).map(<[String]>::to_vec)
    }

    pub fn module_active(&self, id: &str) -> bool {
        self.registry.is_active(id)
    }

    pub fn get_module_info(&self, id: &str) -> PlatformResult<ModuleRecord> {
        self.registry.record(id).cloned()
    }

    /// Records in registration order.
    pub fn module_records(&self) -> Vec<ModuleRecord> {
        self.registry.records().cloned().collect()
    }

    pub fn deactivate_module(&mut self, tx: &TxContext, id: &str) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        if self.registry.set_active(id, false)? {
            self.events.emit(
                tx.timestamp,
                EventKind::ModuleDeactivated {
                    module_id: id.to_string(),
                },
            );
        }
        Ok(())
    }

    pub fn reactivate_module(&mut self, tx: &TxContext, id: &str) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        if self.registry.set_active(id, true)? {
            self.events.emit(
                tx.timestamp,
                EventKind::ModuleReactivated {
                    module_id: id.to_string(),
                },
            );
        }
        Ok(())
    }

    /// Swap the implementation behind `id`; storage and flags are kept.
    pub fn upgrade_module(&mut self, tx: &TxContext, id: &str, address: Address) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        let previous = self.registry.replace_address(id, address)?;
        self.events.emit(
            tx.timestamp,
            EventKind::ModuleUpgraded {
                module_id: id.to_string(),
                previous,
                current: address,
            },
        );
        Ok(())
    }

    // === Conversion ===

    pub fn configure_primary_source(
        &mut self,
        tx: &TxContext,
        token: Address,
        enabled: bool,
    ) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        self.conversion.configure_primary_source(token, enabled);
        self.events
            .emit(tx.timestamp, EventKind::PrimarySourceConfigured { token, enabled });
        Ok(())
    }

    pub fn set_manual_token_rate(&mut self, tx: &TxContext, token: Address, rate: u128) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        self.conversion.set_manual_rate(token, rate)?;
        self.events
            .emit(tx.timestamp, EventKind::ManualRateSet { token, rate });
        Ok(())
    }

    pub fn remove_manual_token_rate(&mut self, tx: &TxContext, token: Address) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        let previous = self.conversion.remove_manual_rate(token);
        if previous > 0 {
            self.events
                .emit(tx.timestamp, EventKind::ManualRateRemoved { token });
        }
        Ok(())
    }

    pub fn emergency_set_token_rate(
        &mut self,
        tx: &TxContext,
        token: Address,
        rate: u128,
    ) -> PlatformResult<()> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        let previous = self.conversion.emergency_set_rate(token, rate)?;
        tracing::warn!(
            "Emergency rate override for {} by {}: {} -> {}",
            token,
            tx.caller,
            previous,
            rate
        );
        self.events.emit(
            tx.timestamp,
            EventKind::EmergencyRateSet {
                token,
                rate,
                account: tx.caller,
            },
        );
        Ok(())
    }

    pub fn get_token_to_celo_equivalent(&self, token: &Address, amount: u128) -> PlatformResult<u128> {
        self.conversion.get_token_to_celo_equivalent(token, amount)
    }

    pub fn get_token_to_celo_equivalent_with_logging(
        &mut self,
        tx: &TxContext,
        token: &Address,
        amount: u128,
    ) -> PlatformResult<u128> {
        self.conversion
            .get_token_to_celo_equivalent_with_logging(token, amount, tx.timestamp)
    }

    /// Like [`get_token_to_celo_equivalent`](Self::get_token_to_celo_equivalent),
    /// also reporting the rate and path used.
    pub fn quote_token(&self, token: &Address, amount: u128) -> PlatformResult<Conversion> {
        self.conversion.quote(token, amount)
    }

    pub fn convert_token_with_logging(
        &mut self,
        tx: &TxContext,
        token: &Address,
        amount: u128,
    ) -> PlatformResult<Conversion> {
        self.conversion
            .convert_with_logging(token, amount, tx.timestamp)
    }

    pub fn get_token_conversion_info(&self, token: &Address) -> TokenConversionInfo {
        self.conversion.token_info(token)
    }

    pub fn get_conversion_health(&self, token: &Address) -> ConversionHealth {
        self.conversion.health(token)
    }

    /// Run state-changing module logic for `id` against a borrowed context.
    ///
    /// The module's storage is lent out of the storage map for the duration of
    /// the call, so the module can still read its peers. On failure the
    /// module's storage and the conversion telemetry are restored.
    fn execute<F>(&mut self, tx: &TxContext, id: &str, f: F) -> PlatformResult<Vec<u8>>
    where
        F: FnOnce(&mut CallContext<'_>) -> Result<Vec<u8>, ModuleError>,
    {
        let original = self.storage.remove(id);
        let conversion_backup = self.conversion.snapshot();
        let mut working = original.clone().unwrap_or_default();

        let mut ctx = CallContext {
            caller: tx.caller,
            value: tx.value,
            timestamp: tx.timestamp,
            storage: &mut working,
            conversion: ConversionTelemetry::new(&mut self.conversion, tx.timestamp),
            registry: &self.registry,
            peers: &self.storage,
        };
        let result = f(&mut ctx);

        match result {
            Ok(output) => {
                self.storage.insert(id.to_string(), working);
                Ok(output)
            }
            Err(err) => {
                if let Some(original) = original {
                    self.storage.insert(id.to_string(), original);
                }
                self.conversion.restore(conversion_backup);
                Err(err.into_platform(id))
            }
        }
    }
}
