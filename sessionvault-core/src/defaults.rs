//! Compile-time configuration of the session vault.

use crate::config::VaultConfig;
use crate::policy::LockPolicy;

/// Identifier of the platform vault holding the session.
pub const VAULT_IDENTIFIER: &str = "io.sessionvault.demo.session";

/// Key the session value is stored under.
pub const SESSION_KEY: &str = "sessionData";

/// Delay after which a backgrounded app relocks the vault.
pub const LOCK_AFTER_BACKGROUNDED_MS: u64 = 2000;

/// Failed custom passcode attempts allowed before the vault gives up.
pub const CUSTOM_PASSCODE_INVALID_UNLOCK_ATTEMPTS: u32 = 2;

/// Whether the vault is erased once the custom passcode attempts run out.
pub const CLEAR_VAULT_AFTER_TOO_MANY_FAILED_ATTEMPTS: bool = true;

/// Whether [`crate::SessionVault::initialize`] unlocks a locked vault.
pub const UNLOCK_VAULT_ON_LOAD: bool = false;

/// Policy a new or cleared vault starts with.
pub const DEFAULT_POLICY: LockPolicy = LockPolicy::NO_LOCKING;

/// Returns the vault configuration the app opens its vault with.
#[must_use]
#[uniffi::export]
pub fn default_vault_config() -> VaultConfig {
    VaultConfig {
        key: VAULT_IDENTIFIER.to_string(),
        vault_type: DEFAULT_POLICY.vault_type,
        device_security_type: DEFAULT_POLICY.device_security_type,
        lock_after_backgrounded_ms: LOCK_AFTER_BACKGROUNDED_MS,
        should_clear_vault_after_too_many_failed_attempts:
            CLEAR_VAULT_AFTER_TOO_MANY_FAILED_ATTEMPTS,
        custom_passcode_invalid_unlock_attempts: CUSTOM_PASSCODE_INVALID_UNLOCK_ATTEMPTS,
        unlock_vault_on_load: UNLOCK_VAULT_ON_LOAD,
    }
}
