//! Vault configuration record.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::policy::{DeviceSecurityType, LockPolicy, VaultType};

/// Configuration a platform vault is opened and updated with.
///
/// Configurations are values: a policy change builds a new one with
/// [`VaultConfig::with_policy`] and hands it to the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct VaultConfig {
    /// Identifier of the vault on the platform.
    pub key: String,
    /// Storage backing.
    pub vault_type: VaultType,
    /// Device security used by [`VaultType::DeviceSecurity`].
    pub device_security_type: DeviceSecurityType,
    /// Time in the background after which the vault locks, in milliseconds.
    pub lock_after_backgrounded_ms: u64,
    /// Erase the vault once the custom passcode attempts run out.
    pub should_clear_vault_after_too_many_failed_attempts: bool,
    /// Failed custom passcode attempts allowed.
    pub custom_passcode_invalid_unlock_attempts: u32,
    /// Unlock the vault as soon as it is loaded.
    pub unlock_vault_on_load: bool,
}

impl VaultConfig {
    /// Returns the lock policy of this configuration.
    #[must_use]
    pub const fn policy(&self) -> LockPolicy {
        LockPolicy {
            vault_type: self.vault_type,
            device_security_type: self.device_security_type,
        }
    }

    /// Returns a copy of this configuration with `policy` applied.
    #[must_use]
    pub fn with_policy(&self, policy: LockPolicy) -> Self {
        Self {
            vault_type: policy.vault_type,
            device_security_type: policy.device_security_type,
            ..self.clone()
        }
    }

    /// Background delay as a [`Duration`].
    #[must_use]
    pub const fn lock_after_backgrounded(&self) -> Duration {
        Duration::from_millis(self.lock_after_backgrounded_ms)
    }

    /// Checks the configuration can be applied to a vault.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] for an empty identifier or when no
    /// custom passcode attempt is allowed.
    pub fn validate(&self) -> VaultResult<()> {
        if self.key.trim().is_empty() {
            return Err(VaultError::InvalidConfig(
                "vault identifier must not be empty".to_string(),
            ));
        }
        if self.custom_passcode_invalid_unlock_attempts == 0 {
            return Err(VaultError::InvalidConfig(
                "at least one custom passcode attempt must be allowed".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        crate::defaults::default_vault_config()
    }
}
