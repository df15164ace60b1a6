//! Module capability, per-module storage and call contexts.
//!
//! Module logic is stateless: everything a module persists lives in the
//! [`ModuleStorage`] the platform lends it for the duration of a call. That is
//! what lets an implementation be swapped by `upgrade_module` without losing
//! state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::conversion::ConversionResolver;
use super::registry::ModuleRegistry;
use crate::types::{Address, PlatformError, PlatformResult};

/// Failure raised by module logic.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("{0}")]
    Revert(String),

    #[error("malformed payload: {0}")]
    Decode(#[from] bcs::Error),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl ModuleError {
    /// Conversion failures raised inside a module pass through unchanged;
    /// everything else becomes `ModuleReverted`.
    pub fn into_platform(self, module: &str) -> PlatformError {
        match self {
            ModuleError::Platform(
                e @ (PlatformError::NoConversionPathAvailable(_)
                | PlatformError::ConversionOverflow(_)
                | PlatformError::InvalidRate(_)),
            ) => e,
            other => PlatformError::ModuleReverted {
                module: module.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

pub fn revert(reason: impl Into<String>) -> ModuleError {
    ModuleError::Revert(reason.into())
}

/// Encode a module request or response.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ModuleError> {
    Ok(bcs::to_bytes(value)?)
}

/// Decode a module request or response.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ModuleError> {
    Ok(bcs::from_bytes(bytes)?)
}

/// Decode an initialization payload, falling back to `T::default()` for an
/// empty payload (`0x`).
pub fn decode_or_default<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, ModuleError> {
    if bytes.is_empty() {
        Ok(T::default())
    } else {
        decode(bytes)
    }
}

/// Key/value storage slot area owned by the platform on behalf of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleStorage {
    slots: BTreeMap<String, Vec<u8>>,
}

impl ModuleStorage {
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ModuleError> {
        self.slots
            .get(key)
            .map(|bytes| decode(bytes))
            .transpose()
    }

    pub fn put<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), ModuleError> {
        self.slots.insert(key.to_string(), encode(value)?);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Conversion access lent to module logic during a state-changing call.
///
/// Only resolution is exposed. Rate management stays behind the admin-gated
/// `Platform` entry points:
///
/// ```compile_fail
/// use sovereign_seas_backend::platform::module::CallContext;
/// use sovereign_seas_backend::types::Address;
///
/// fn set_rate(ctx: &mut CallContext<'_>) {
///     let _ = ctx.conversion.set_manual_rate(Address::from_low_u64(1), 999);
/// }
/// ```
pub struct ConversionTelemetry<'a> {
    resolver: &'a mut ConversionResolver,
    now: u64,
}

impl<'a> ConversionTelemetry<'a> {
    pub(crate) fn new(resolver: &'a mut ConversionResolver, now: u64) -> Self {
        Self { resolver, now }
    }

    /// Pure resolution; records nothing.
    pub fn get_token_to_celo_equivalent(&self, token: &Address, amount: u128) -> PlatformResult<u128> {
        self.resolver.get_token_to_celo_equivalent(token, amount)
    }

    /// Resolution with telemetry stamped at the call's timestamp.
    pub fn get_token_to_celo_equivalent_with_logging(
        &mut self,
        token: &Address,
        amount: u128,
    ) -> PlatformResult<u128> {
        self.resolver
            .get_token_to_celo_equivalent_with_logging(token, amount, self.now)
    }
}

/// Context for a state-changing dispatch (`initialize` or `handle_call`).
pub struct CallContext<'a> {
    /// Original caller of the routed call.
    pub caller: Address,
    /// Native value attached to the call.
    pub value: u128,
    pub timestamp: u64,
    /// This module's own storage.
    pub storage: &'a mut ModuleStorage,
    pub conversion: ConversionTelemetry<'a>,
    pub(crate) registry: &'a ModuleRegistry,
    pub(crate) peers: &'a HashMap<String, ModuleStorage>,
}

impl CallContext<'_> {
    pub fn module_active(&self, id: &str) -> bool {
        self.registry.is_active(id)
    }

    /// Read a value from another module's storage.
    pub fn read_peer<T: DeserializeOwned>(
        &self,
        module: &str,
        key: &str,
    ) -> Result<Option<T>, ModuleError> {
        read_peer(self.peers, module, key)
    }
}

/// Context for a read-only dispatch. Everything is borrowed shared, so a
/// static call cannot mutate platform state.
pub struct StaticContext<'a> {
    pub caller: Address,
    pub timestamp: u64,
    pub storage: &'a ModuleStorage,
    pub conversion: &'a ConversionResolver,
    pub(crate) registry: &'a ModuleRegistry,
    pub(crate) peers: &'a HashMap<String, ModuleStorage>,
}

impl StaticContext<'_> {
    pub fn module_active(&self, id: &str) -> bool {
        self.registry.is_active(id)
    }

    pub fn read_peer<T: DeserializeOwned>(
        &self,
        module: &str,
        key: &str,
    ) -> Result<Option<T>, ModuleError> {
        read_peer(self.peers, module, key)
    }
}

fn read_peer<T: DeserializeOwned>(
    peers: &HashMap<String, ModuleStorage>,
    module: &str,
    key: &str,
) -> Result<Option<T>, ModuleError> {
    match peers.get(module) {
        Some(storage) => storage.get(key),
        None => Ok(None),
    }
}

/// Logic unit hosted by the platform.
pub trait Module: Send + Sync {
    /// Implementation name shown in the implementation catalog.
    fn name(&self) -> &'static str;

    /// One-time setup with an opaque, module-defined payload.
    fn initialize(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<(), ModuleError>;

    fn handle_call(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<Vec<u8>, ModuleError>;

    fn handle_static_call(
        &self,
        ctx: &StaticContext<'_>,
        data: &[u8],
    ) -> Result<Vec<u8>, ModuleError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_put_get() {
        let mut storage = ModuleStorage::default();
        storage.put("count", &7u64).unwrap();
        assert_eq!(storage.get::<u64>("count").unwrap(), Some(7));
        assert_eq!(storage.get::<u64>("missing").unwrap(), None);
        assert!(storage.remove("count"));
        assert!(storage.is_empty());
    }

    #[test]
    fn test_decode_or_default_on_empty_payload() {
        let value: u32 = decode_or_default(&[]).unwrap();
        assert_eq!(value, 0);
        assert!(decode_or_default::<u32>(&[1]).is_err());
    }

    #[test]
    fn test_module_error_mapping() {
        let reverted = revert("name too long").into_platform("projects");
        assert_eq!(
            reverted,
            PlatformError::ModuleReverted {
                module: "projects".into(),
                reason: "name too long".into(),
            }
        );

        let token = Address::from_low_u64(0x70);
        let passthrough = ModuleError::Platform(PlatformError::NoConversionPathAvailable(token))
            .into_platform("treasury");
        assert_eq!(passthrough, PlatformError::NoConversionPathAvailable(token));
    }

    #[test]
    fn test_guard_errors_from_modules_are_wrapped() {
        for raised in [
            PlatformError::SystemPaused,
            PlatformError::ModuleInactive("voting".into()),
            PlatformError::NotRegistered("ghost".into()),
        ] {
            let mapped = ModuleError::Platform(raised.clone()).into_platform("projects");
            assert_eq!(
                mapped,
                PlatformError::ModuleReverted {
                    module: "projects".into(),
                    reason: raised.to_string(),
                }
            );
        }
    }
}
