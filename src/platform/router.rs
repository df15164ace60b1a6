//! Call routing into registered modules.

use super::module::{ModuleStorage, StaticContext};
use super::{Platform, TxContext};
use crate::types::{PlatformError, PlatformResult};

impl Platform {
    /// Route a state-changing call to module `id`.
    ///
    /// Guards run before any module code: paused, then registered, then active.
    pub fn call_module(&mut self, tx: &TxContext, id: &str, data: &[u8]) -> PlatformResult<Vec<u8>> {
        self.check_routable(id)?;
        let logic = self.registry.logic(id)?;
        tracing::debug!(
            "call {} ({} bytes, value {}) from {}",
            id,
            data.len(),
            tx.value,
            tx.caller
        );
        self.execute(tx, id, |ctx| logic.handle_call(ctx, data))
    }

    /// Route a read-only call to module `id`. Same guards as [`call_module`](Self::call_module).
    pub fn static_call_module(&self, tx: &TxContext, id: &str, data: &[u8]) -> PlatformResult<Vec<u8>> {
        self.check_routable(id)?;
        let logic = self.registry.logic(id)?;
        tracing::debug!("static call {} ({} bytes) from {}", id, data.len(), tx.caller);

        let empty = ModuleStorage::default();
        let ctx = StaticContext {
            caller: tx.caller,
            timestamp: tx.timestamp,
            storage: self.storage.get(id).unwrap_or(&empty),
            conversion: &self.conversion,
            registry: &self.registry,
            peers: &self.storage,
        };
        logic
            .handle_static_call(&ctx, data)
            .map_err(|e| e.into_platform(id))
    }

    fn check_routable(&self, id: &str) -> PlatformResult<()> {
        self.pause.ensure_not_paused()?;
        let record = self.registry.record(id)?;
        if !record.active {
            return Err(PlatformError::ModuleInactive(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::platform::conversion::RATE_PRECISION;
    use crate::platform::module::{
        decode, encode, revert, CallContext, Module, ModuleError, StaticContext,
    };
    use crate::platform::testing::*;
    use crate::types::{Address, PlatformError};

    const PRICED: u64 = 0x70;

    /// Converts one whole `PRICED` token through the lent conversion handle.
    /// A payload of `[1]` then fails with a router guard error.
    struct ConvertingModule;

    impl Module for ConvertingModule {
        fn name(&self) -> &'static str {
            "converting"
        }

        fn initialize(&self, _ctx: &mut CallContext<'_>, _data: &[u8]) -> Result<(), ModuleError> {
            Ok(())
        }

        fn handle_call(&self, ctx: &mut CallContext<'_>, data: &[u8]) -> Result<Vec<u8>, ModuleError> {
            let token = Address::from_low_u64(PRICED);
            let native = ctx
                .conversion
                .get_token_to_celo_equivalent_with_logging(&token, RATE_PRECISION)?;
            if data == [1] {
                return Err(PlatformError::SystemPaused.into());
            }
            encode(&native)
        }

        fn handle_static_call(
            &self,
            _ctx: &StaticContext<'_>,
            _data: &[u8],
        ) -> Result<Vec<u8>, ModuleError> {
            Err(revert("no views"))
        }
    }

    fn platform_with_converter() -> crate::platform::Platform {
        let mut platform = platform();
        let admin_tx = tx(admin());
        let address = platform.deploy_implementation(Arc::new(ConvertingModule));
        platform
            .register_module(&admin_tx, "converting", address, &[])
            .unwrap();
        platform
            .initialize_module(&admin_tx, "converting", &[])
            .unwrap();
        platform
            .set_manual_token_rate(&admin_tx, Address::from_low_u64(PRICED), RATE_PRECISION / 2)
            .unwrap();
        platform
    }

    fn platform_with_echo() -> crate::platform::Platform {
        let mut platform = platform();
        let address = platform.deploy_implementation(Arc::new(EchoModule));
        let admin_tx = tx(admin());
        platform.register_module(&admin_tx, "echo", address, &[]).unwrap();
        platform
            .initialize_module(&admin_tx, "echo", &encode(&"hi".to_string()).unwrap())
            .unwrap();
        platform
    }

    fn call_count(platform: &crate::platform::Platform) -> u64 {
        let out = platform
            .static_call_module(&tx(outsider()), "echo", &[])
            .unwrap();
        decode(&out).unwrap()
    }

    #[test]
    fn test_call_reaches_module_with_caller_and_value() {
        let mut platform = platform_with_echo();
        let user = Address::from_low_u64(0x42);
        let out = platform
            .call_module(&tx(user).with_value(7), "echo", &[1, 2, 3])
            .unwrap();
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(call_count(&platform), 1);

        let storage = platform.module_storage("echo").unwrap();
        assert_eq!(storage.get::<Address>("last_caller").unwrap(), Some(user));
        assert_eq!(storage.get::<u128>("last_value").unwrap(), Some(7));
    }

    #[test]
    fn test_paused_blocks_everything_without_side_effects() {
        let mut platform = platform_with_echo();
        platform.set_paused(&tx(admin()), true).unwrap();
        let before = platform.module_storage("echo").cloned();

        assert_eq!(
            platform.call_module(&tx(outsider()), "echo", &[1]),
            Err(PlatformError::SystemPaused)
        );
        assert_eq!(
            platform.static_call_module(&tx(outsider()), "echo", &[]),
            Err(PlatformError::SystemPaused)
        );
        // Paused outranks NotRegistered.
        assert_eq!(
            platform.call_module(&tx(outsider()), "ghost", &[]),
            Err(PlatformError::SystemPaused)
        );
        assert_eq!(platform.module_storage("echo").cloned(), before);

        platform.set_paused(&tx(admin()), false).unwrap();
        assert_eq!(call_count(&platform), 0);
    }

    #[test]
    fn test_unregistered_and_inactive_guards() {
        let mut platform = platform_with_echo();
        assert_eq!(
            platform.call_module(&tx(outsider()), "ghost", &[]),
            Err(PlatformError::NotRegistered("ghost".into()))
        );

        platform.deactivate_module(&tx(admin()), "echo").unwrap();
        assert_eq!(
            platform.call_module(&tx(outsider()), "echo", &[]),
            Err(PlatformError::ModuleInactive("echo".into()))
        );
        assert_eq!(
            platform.static_call_module(&tx(outsider()), "echo", &[]),
            Err(PlatformError::ModuleInactive("echo".into()))
        );

        platform.reactivate_module(&tx(admin()), "echo").unwrap();
        assert!(platform.call_module(&tx(outsider()), "echo", &[]).is_ok());
    }

    #[test]
    fn test_registered_but_uninitialized_is_inactive() {
        let mut platform = platform();
        let address = platform.deploy_implementation(Arc::new(EchoModule));
        platform
            .register_module(&tx(admin()), "echo", address, &[])
            .unwrap();
        assert_eq!(
            platform.call_module(&tx(outsider()), "echo", &[]),
            Err(PlatformError::ModuleInactive("echo".into()))
        );
    }

    #[test]
    fn test_module_revert_rolls_back_storage() {
        let mut platform = platform_with_echo();
        platform.call_module(&tx(outsider()), "echo", &[1]).unwrap();

        let err = platform
            .call_module(&tx(outsider()), "echo", &[0xff])
            .unwrap_err();
        assert_eq!(
            err,
            PlatformError::ModuleReverted {
                module: "echo".into(),
                reason: "echo call rejected".into(),
            }
        );
        assert_eq!(call_count(&platform), 1);
    }

    #[test]
    fn test_module_conversion_leaves_rates_to_admins() {
        let mut platform = platform_with_converter();
        let token = Address::from_low_u64(PRICED);

        let out = platform.call_module(&tx(outsider()), "converting", &[]).unwrap();
        assert_eq!(decode::<u128>(&out).unwrap(), RATE_PRECISION / 2);

        let info = platform.get_token_conversion_info(&token);
        assert_eq!(info.manual_rate, RATE_PRECISION / 2);
        assert_eq!(info.manual_usage_count, 1);
        assert!(matches!(
            platform.set_manual_token_rate(&tx(outsider()), token, 999),
            Err(PlatformError::Unauthorized { .. })
        ));
        assert_eq!(
            platform.get_token_conversion_info(&token).manual_rate,
            RATE_PRECISION / 2
        );
    }

    #[test]
    fn test_guard_error_from_module_is_a_revert() {
        let mut platform = platform_with_converter();
        let token = Address::from_low_u64(PRICED);

        assert_eq!(
            platform.call_module(&tx(outsider()), "converting", &[1]),
            Err(PlatformError::ModuleReverted {
                module: "converting".into(),
                reason: PlatformError::SystemPaused.to_string(),
            })
        );
        assert!(!platform.is_paused());
        assert_eq!(platform.get_token_conversion_info(&token).manual_usage_count, 0);
    }
}
