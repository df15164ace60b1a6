//! Role-based access control and the process-wide pause flag.

use std::collections::{BTreeSet, HashMap};

use crate::types::{Address, PlatformError, PlatformResult};

/// Role that administers every other role.
pub const DEFAULT_ADMIN_ROLE: &str = "DEFAULT_ADMIN_ROLE";

/// Role required by every mutating platform entry point.
pub const ADMIN_ROLE: &str = "ADMIN_ROLE";

/// Role membership table.
///
/// Each role has an admin role whose holders may grant and revoke it; unless
/// configured otherwise that is [`DEFAULT_ADMIN_ROLE`].
#[derive(Debug, Clone)]
pub struct AccessController {
    members: HashMap<String, BTreeSet<Address>>,
    role_admins: HashMap<String, String>,
}

impl AccessController {
    /// The deployer starts out holding both the default-admin and admin roles.
    pub fn new(deployer: Address) -> Self {
        let mut members: HashMap<String, BTreeSet<Address>> = HashMap::new();
        members
            .entry(DEFAULT_ADMIN_ROLE.to_string())
            .or_default()
            .insert(deployer);
        members
            .entry(ADMIN_ROLE.to_string())
            .or_default()
            .insert(deployer);

        Self {
            members,
            role_admins: HashMap::new(),
        }
    }

    pub fn has_role(&self, role: &str, account: &Address) -> bool {
        self.members
            .get(role)
            .is_some_and(|holders| holders.contains(account))
    }

    /// Fail with `Unauthorized` unless `account` holds `role`.
    pub fn check_role(&self, role: &str, account: &Address) -> PlatformResult<()> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(PlatformError::Unauthorized {
                account: *account,
                role: role.to_string(),
            })
        }
    }

    /// Role whose holders administer `role`.
    pub fn role_admin(&self, role: &str) -> &str {
        self.role_admins
            .get(role)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ADMIN_ROLE)
    }

    /// Change the admin role of `role`. Only holders of the current admin role may do so.
    pub fn set_role_admin(
        &mut self,
        caller: &Address,
        role: &str,
        admin_role: &str,
    ) -> PlatformResult<()> {
        let current = self.role_admin(role).to_string();
        self.check_role(&current, caller)?;
        self.role_admins
            .insert(role.to_string(), admin_role.to_string());
        Ok(())
    }

    /// Returns `true` if the account did not already hold the role.
    pub fn grant_role(
        &mut self,
        caller: &Address,
        role: &str,
        account: Address,
    ) -> PlatformResult<bool> {
        let admin = self.role_admin(role).to_string();
        self.check_role(&admin, caller)?;
        Ok(self
            .members
            .entry(role.to_string())
            .or_default()
            .insert(account))
    }

    /// Returns `true` if the account held the role.
    pub fn revoke_role(
        &mut self,
        caller: &Address,
        role: &str,
        account: &Address,
    ) -> PlatformResult<bool> {
        let admin = self.role_admin(role).to_string();
        self.check_role(&admin, caller)?;
        Ok(self.remove_member(role, account))
    }

    /// Give up a role held by the caller itself.
    pub fn renounce_role(&mut self, caller: &Address, role: &str) -> bool {
        self.remove_member(role, caller)
    }

    /// Holders of `role`, in address order.
    pub fn members(&self, role: &str) -> Vec<Address> {
        self.members
            .get(role)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default()
    }

    fn remove_member(&mut self, role: &str, account: &Address) -> bool {
        self.members
            .get_mut(role)
            .is_some_and(|holders| holders.remove(account))
    }
}

/// Single process-wide switch; when set, every routed module call is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PauseGate {
    paused: bool,
}

impl PauseGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn ensure_not_paused(&self) -> PlatformResult<()> {
        if self.paused {
            Err(PlatformError::SystemPaused)
        } else {
            Ok(())
        }
    }

    /// Returns `true` if the flag actually changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        let changed = self.paused != paused;
        self.paused = paused;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployer() -> Address {
        Address::from_low_u64(1)
    }

    #[test]
    fn test_deployer_holds_both_admin_roles() {
        let access = AccessController::new(deployer());
        assert!(access.has_role(DEFAULT_ADMIN_ROLE, &deployer()));
        assert!(access.has_role(ADMIN_ROLE, &deployer()));
        assert!(!access.has_role(ADMIN_ROLE, &Address::from_low_u64(2)));
    }

    #[test]
    fn test_grant_requires_role_admin() {
        let mut access = AccessController::new(deployer());
        let outsider = Address::from_low_u64(2);
        let err = access
            .grant_role(&outsider, ADMIN_ROLE, outsider)
            .unwrap_err();
        assert!(matches!(err, PlatformError::Unauthorized { .. }));

        assert!(access.grant_role(&deployer(), ADMIN_ROLE, outsider).unwrap());
        assert!(!access.grant_role(&deployer(), ADMIN_ROLE, outsider).unwrap());
        assert!(access.has_role(ADMIN_ROLE, &outsider));
    }

    #[test]
    fn test_admin_role_cannot_grant_without_default_admin() {
        let mut access = AccessController::new(deployer());
        let operator = Address::from_low_u64(2);
        access.grant_role(&deployer(), ADMIN_ROLE, operator).unwrap();

        let err = access
            .grant_role(&operator, ADMIN_ROLE, Address::from_low_u64(3))
            .unwrap_err();
        assert_eq!(
            err,
            PlatformError::Unauthorized {
                account: operator,
                role: DEFAULT_ADMIN_ROLE.to_string(),
            }
        );
    }

    #[test]
    fn test_revoke_and_renounce() {
        let mut access = AccessController::new(deployer());
        let operator = Address::from_low_u64(2);
        access.grant_role(&deployer(), ADMIN_ROLE, operator).unwrap();

        assert!(access.revoke_role(&deployer(), ADMIN_ROLE, &operator).unwrap());
        assert!(!access.has_role(ADMIN_ROLE, &operator));

        assert!(access.renounce_role(&deployer(), ADMIN_ROLE));
        assert!(!access.has_role(ADMIN_ROLE, &deployer()));
        assert!(access.has_role(DEFAULT_ADMIN_ROLE, &deployer()));
    }

    #[test]
    fn test_custom_role_admin() {
        let mut access = AccessController::new(deployer());
        let operator = Address::from_low_u64(2);
        access.grant_role(&deployer(), ADMIN_ROLE, operator).unwrap();
        access
            .set_role_admin(&deployer(), "VOTE_AUDITOR", ADMIN_ROLE)
            .unwrap();

        assert_eq!(access.role_admin("VOTE_AUDITOR"), ADMIN_ROLE);
        assert!(access
            .grant_role(&operator, "VOTE_AUDITOR", Address::from_low_u64(9))
            .unwrap());
        assert_eq!(access.members("VOTE_AUDITOR"), vec![Address::from_low_u64(9)]);
    }

    #[test]
    fn test_pause_gate() {
        let mut gate = PauseGate::new();
        assert!(gate.ensure_not_paused().is_ok());
        assert!(gate.set_paused(true));
        assert!(!gate.set_paused(true));
        assert_eq!(gate.ensure_not_paused(), Err(PlatformError::SystemPaused));
        assert!(gate.set_paused(false));
        assert!(!gate.is_paused());
    }
}
