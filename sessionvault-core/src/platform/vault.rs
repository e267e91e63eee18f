//! The platform vault handle.

use std::sync::Arc;

use crate::config::VaultConfig;
use crate::error::VaultResult;

use super::events::{PasscodeResponse, VaultEvents};

/// Opens platform vaults.
#[uniffi::export(with_foreign)]
pub trait VaultProvider: Send + Sync {
    /// Opens (or creates) the vault identified by `config.key`.
    ///
    /// Opening the same identifier twice must return the same vault: there is
    /// exactly one handle per identifier for the lifetime of the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform cannot provide the vault.
    fn open(&self, config: VaultConfig) -> VaultResult<Arc<dyn IdentityVault>>;
}

/// Encrypted key/value vault provided by the platform.
///
/// # Locking
///
/// A locked vault keeps its data encrypted and drops the key. Reads and writes
/// against a locked vault run the unlock challenge of the active
/// configuration first, so callers never see plaintext without it.
///
/// # Single flight
///
/// Implementations MUST allow at most one unlock challenge at a time. A second
/// [`IdentityVault::unlock`] issued while a challenge is outstanding waits for
/// it instead of raising its own prompt.
///
/// # Events
///
/// State changes that can originate inside the vault (relock after
/// backgrounding, failed attempt limits, passcode requests) are reported
/// through the [`VaultEvents`] handler installed with
/// [`IdentityVault::set_event_handler`]. Implementations MUST NOT hold internal
/// locks while calling the handler: handlers call back into the vault.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait IdentityVault: Send + Sync {
    /// Returns the configuration currently in effect.
    ///
    /// This may differ from the last configuration requested when the vault
    /// coerced it.
    fn config(&self) -> VaultConfig;

    /// Installs the handler receiving vault events, replacing any previous one.
    fn set_event_handler(&self, handler: Arc<dyn VaultEvents>);

    /// Replaces the configuration of the vault.
    ///
    /// Existing data is re-sealed under the new configuration. Switching to a
    /// custom passcode vault that holds data requests a new passcode.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the vault is locked.
    async fn update_config(&self, config: VaultConfig) -> VaultResult<()>;

    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault cannot be unlocked or read.
    async fn get_value(&self, key: String) -> VaultResult<Option<String>>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault cannot be unlocked or the device refuses
    /// the write.
    async fn set_value(&self, key: String, value: String) -> VaultResult<()>;

    /// Locks the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault cannot be locked.
    async fn lock(&self) -> VaultResult<()>;

    /// Unlocks the vault, running the challenge of the active configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the challenge fails or is cancelled.
    async fn unlock(&self) -> VaultResult<()>;

    /// Returns whether the vault is locked.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined.
    async fn is_locked(&self) -> VaultResult<bool>;

    /// Returns whether the vault holds any data.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined.
    async fn does_vault_exist(&self) -> VaultResult<bool>;

    /// Erases all data and the persisted configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be erased.
    async fn clear(&self) -> VaultResult<()>;

    /// Answers the pending custom passcode request.
    ///
    /// Called from [`VaultEvents::on_passcode_requested`] before it returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault does not accept the answer.
    async fn set_custom_passcode(&self, response: PasscodeResponse) -> VaultResult<()>;
}
