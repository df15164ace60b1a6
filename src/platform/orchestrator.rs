//! Module initialization, single and batched.
//!
//! Lifecycle per module id:
//!
//! ```text
//! Unregistered --register--> Registered --initialize--> Active <--> Deactivated
//!                               ^   |
//!                               +---+ failed initialize (retryable)
//! ```
//!
//! Initialization order is not enforced here. A module that needs an
//! initialized dependency checks for it in its own `initialize`.

use serde::Serialize;

use super::access::ADMIN_ROLE;
use super::events::EventKind;
use super::{Platform, TxContext};
use crate::types::{PlatformError, PlatformResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleLifecycle {
    Unregistered,
    /// Registered, initialization not yet succeeded
    Registered,
    Active,
    /// Initialized, then deactivated by an admin
    Deactivated,
}

impl Platform {
    /// Run the module's setup with `data` and mark it active.
    ///
    /// All-or-nothing: a module revert leaves the record and the module's
    /// storage exactly as they were, so the call can be retried.
    pub fn initialize_module(&mut self, tx: &TxContext, id: &str, data: &[u8]) -> PlatformResult<bool> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        let record = self.registry.record(id)?;
        if record.initialized {
            return Err(PlatformError::AlreadyActive(id.to_string()));
        }
        let logic = self.registry.logic(id)?;

        self.execute(tx, id, |ctx| logic.initialize(ctx, data).map(|()| Vec::new()))?;
        self.registry.mark_initialized(id)?;

        tracing::info!("Module {} initialized ({} bytes of setup data)", id, data.len());
        self.events.emit(
            tx.timestamp,
            EventKind::ModuleInitialized {
                module_id: id.to_string(),
            },
        );
        Ok(true)
    }

    /// Initialize each `ids[i]` with `data[i]`, isolating failures.
    ///
    /// The batch itself fails only on `Unauthorized` or `LengthMismatch`.
    /// Per entry: already initialized is skipped and reported `true`; an
    /// unknown id or a module revert is reported `false`.
    pub fn initialize_modules_batch(
        &mut self,
        tx: &TxContext,
        ids: &[String],
        data: &[Vec<u8>],
    ) -> PlatformResult<Vec<bool>> {
        self.access.check_role(ADMIN_ROLE, &tx.caller)?;
        if ids.len() != data.len() {
            return Err(PlatformError::LengthMismatch {
                ids: ids.len(),
                payloads: data.len(),
            });
        }

        let mut results = Vec::with_capacity(ids.len());
        for (id, payload) in ids.iter().zip(data) {
            if self.registry.is_initialized(id) {
                tracing::debug!("Batch: {} already initialized, skipping", id);
                results.push(true);
                continue;
            }
            match self.initialize_module(tx, id, payload) {
                Ok(ok) => results.push(ok),
                Err(e) => {
                    tracing::warn!("Batch: failed to initialize {}: {}", id, e);
                    results.push(false);
                }
            }
        }

        let succeeded = results.iter().filter(|ok| **ok).count();
        tracing::info!("Batch initialization: {}/{} succeeded", succeeded, results.len());
        Ok(results)
    }

    /// `active` flag per id; unknown ids read as `false`.
    pub fn get_modules_initialization_status(&self, ids: &[String]) -> Vec<bool> {
        ids.iter().map(|id| self.registry.is_active(id)).collect()
    }

    pub fn get_module_lifecycle(&self, id: &str) -> ModuleLifecycle {
        match self.registry.record(id) {
            Err(_) => ModuleLifecycle::Unregistered,
            Ok(r) if r.active => ModuleLifecycle::Active,
            Ok(r) if r.initialized => ModuleLifecycle::Deactivated,
            Ok(_) => ModuleLifecycle::Registered,
        }
    }
}
