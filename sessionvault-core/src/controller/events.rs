//! The controller's side of the vault event channel.

use std::sync::{Arc, Weak};

use log::{debug, error, info, warn};

use crate::error::{VaultError, VaultErrorCode, VaultResult};
use crate::platform::{IdentityVault, PasscodeMode, PasscodeResponse, VaultEvents};
use crate::policy::LockPolicy;

use super::Shared;

/// Handler registered on the vault by [`SessionVault::initialize`](super::SessionVault::initialize).
///
/// Holds the vault and the controller weakly: the vault owns its handler and
/// outlives the controller. Once the controller is gone, events are ignored
/// and passcode requests are answered with a cancellation.
pub(super) struct ControllerEvents {
    vault: Weak<dyn IdentityVault>,
    shared: Weak<Shared>,
}

impl ControllerEvents {
    pub(super) fn new(vault: Weak<dyn IdentityVault>, shared: Weak<Shared>) -> Self {
        Self { vault, shared }
    }

    fn shared(&self) -> VaultResult<Arc<Shared>> {
        self.shared
            .upgrade()
            .ok_or_else(|| VaultError::StorageUnavailable("session vault dropped".to_string()))
    }

    fn vault(&self) -> VaultResult<Arc<dyn IdentityVault>> {
        self.vault
            .upgrade()
            .ok_or_else(|| VaultError::StorageUnavailable("vault handle dropped".to_string()))
    }

    /// Falls back to plain secure storage.
    async fn downgrade(&self) -> VaultResult<()> {
        let vault = self.vault()?;
        vault
            .update_config(vault.config().with_policy(LockPolicy::NO_LOCKING))
            .await?;
        self.shared()?
            .state
            .publish_policy(vault.config().policy());
        Ok(())
    }

    /// The vault erased itself after too many wrong passcodes.
    async fn reset_after_failed_attempts(&self) -> VaultResult<()> {
        let vault = self.vault()?;
        vault
            .update_config(vault.config().with_policy(LockPolicy::NO_LOCKING))
            .await?;
        let policy = vault.config().policy();
        let vault_exists = vault.does_vault_exist().await?;
        let is_locked = vault.is_locked().await?;
        self.shared()?.state.update(|state| {
            state.session = None;
            state.policy = policy;
            state.vault_exists = vault_exists;
            state.is_locked = is_locked;
        });
        Ok(())
    }
}

#[async_trait::async_trait]
impl VaultEvents for ControllerEvents {
    fn on_lock(&self, timeout: bool) {
        debug!("vault locked (timeout: {timeout})");
        if let Some(shared) = self.shared.upgrade() {
            shared.state.update(|state| {
                state.is_locked = true;
                state.session = None;
            });
        }
    }

    fn on_unlock(&self) {
        debug!("vault unlocked");
        if let Some(shared) = self.shared.upgrade() {
            shared.state.update(|state| state.is_locked = false);
        }
    }

    async fn on_error(&self, code: VaultErrorCode, detail: String) {
        match code {
            VaultErrorCode::UnsupportedSecurityClass => {
                info!("security class unavailable ({detail}), using secure storage");
                if let Err(err) = self.downgrade().await {
                    error!("failed to fall back to secure storage: {err}");
                }
            }
            VaultErrorCode::TooManyFailedAttempts => {
                warn!("vault cleared after too many failed attempts");
                if let Err(err) = self.reset_after_failed_attempts().await {
                    error!("failed to reset after vault clear: {err}");
                }
            }
            _ => error!("vault error {code}: {detail}"),
        }
    }

    async fn on_passcode_requested(&self, mode: PasscodeMode) -> VaultResult<()> {
        let vault = self.vault()?;
        let Some(shared) = self.shared.upgrade() else {
            debug!("custom passcode prompt ({mode}) with no session vault, cancelling");
            return vault.set_custom_passcode(PasscodeResponse::Cancelled).await;
        };
        let answer = shared.prompt.open(mode).inspect_err(|err| {
            error!("custom passcode request ({mode}) refused: {err}");
        })?;
        shared
            .state
            .update(|state| state.passcode_prompt = Some(mode));
        drop(shared);

        let response = answer.await.unwrap_or(PasscodeResponse::Cancelled);
        if let Some(shared) = self.shared.upgrade() {
            shared.state.update(|state| state.passcode_prompt = None);
        }
        debug!("custom passcode prompt ({mode}) answered: {response:?}");

        vault.set_custom_passcode(response).await
    }
}
