//! The session vault controller.
//!
//! [`SessionVault`] owns the one vault handle of the app, keeps the session
//! value under [`SESSION_KEY`], applies lock policies, and publishes a
//! [`VaultState`] the presentation layer renders from.

mod events;
mod prompt;
mod state;

use std::sync::Arc;

use log::info;
use tokio::sync::{watch, OnceCell};

use crate::config::VaultConfig;
use crate::defaults::{default_vault_config, SESSION_KEY};
use crate::error::{VaultError, VaultErrorCode, VaultResult};
use crate::platform::{IdentityVault, PasscodeResponse, VaultProvider};
use crate::policy::{LockPolicy, LockType};

use events::ControllerEvents;
use prompt::PasscodePrompt;
use state::StatePublisher;

pub use state::{VaultState, VaultStateListener};

/// Result of [`SessionVault::unlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum UnlockOutcome {
    /// The vault is unlocked.
    Unlocked,
    /// The operator dismissed the unlock challenge. The vault stays locked.
    Cancelled,
}

/// State shared between the controller and the handler it registers on the vault.
pub(crate) struct Shared {
    state: StatePublisher,
    prompt: PasscodePrompt,
}

/// Session manager on top of the platform vault.
///
/// Create it with a [`VaultProvider`], call [`SessionVault::initialize`] once
/// at startup, then store and restore the session through it. Custom passcode
/// prompts show up in [`VaultState::passcode_prompt`] and are answered with
/// [`SessionVault::submit_passcode`] or [`SessionVault::cancel_passcode_prompt`].
#[derive(uniffi::Object)]
pub struct SessionVault {
    provider: Arc<dyn VaultProvider>,
    config: VaultConfig,
    vault: OnceCell<Arc<dyn IdentityVault>>,
    shared: Arc<Shared>,
}

#[uniffi::export(async_runtime = "tokio")]
impl SessionVault {
    /// Creates a controller that opens its vault with [`default_vault_config`].
    #[uniffi::constructor]
    #[must_use]
    pub fn new(provider: Arc<dyn VaultProvider>) -> Arc<Self> {
        Self::with_config(provider, default_vault_config())
    }

    /// Creates a controller that opens its vault with `config`.
    #[uniffi::constructor]
    #[must_use]
    pub fn with_config(provider: Arc<dyn VaultProvider>, config: VaultConfig) -> Arc<Self> {
        Arc::new(Self {
            provider,
            config,
            vault: OnceCell::new(),
            shared: Arc::new(Shared {
                state: StatePublisher::new(),
                prompt: PasscodePrompt::default(),
            }),
        })
    }

    /// Opens the vault and publishes its initial state.
    ///
    /// Only the first call opens the vault; later calls return right away.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the vault cannot be opened, or the
    /// vault's error if its state cannot be read.
    pub async fn initialize(&self) -> VaultResult<()> {
        if self.vault.initialized() {
            return Ok(());
        }
        let vault = self
            .vault
            .get_or_try_init(|| async {
                let vault = self.provider.open(self.config.clone())?;
                vault.set_event_handler(Arc::new(ControllerEvents::new(
                    Arc::downgrade(&vault),
                    Arc::downgrade(&self.shared),
                )));
                info!("session vault {} opened", self.config.key);
                Ok::<_, VaultError>(vault)
            })
            .await?;

        let is_locked = vault.is_locked().await?;
        let vault_exists = vault.does_vault_exist().await?;
        let policy = vault.config().policy();
        self.shared.state.update(|state| {
            state.is_locked = is_locked;
            state.vault_exists = vault_exists;
            state.policy = policy;
        });

        if self.config.unlock_vault_on_load && is_locked {
            let outcome = self.unlock().await?;
            info!("unlock on load: {outcome:?}");
        }
        Ok(())
    }

    /// Applies the lock policy matching `lock_type`.
    ///
    /// The vault may settle on a different policy than requested (see
    /// [`VaultErrorCode::UnsupportedSecurityClass`]); the published state
    /// always carries the policy the vault reports afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StorageUnavailable`] before [`Self::initialize`],
    /// or the vault's error if it rejects the new configuration.
    pub async fn set_lock_policy(&self, lock_type: LockType) -> VaultResult<()> {
        let vault = self.handle()?;
        let config = vault.config().with_policy(lock_type.policy());
        vault.update_config(config).await?;

        let effective = vault.config().policy();
        info!("lock policy {lock_type} requested, {effective} in effect");
        self.shared.state.publish_policy(effective);
        Ok(())
    }

    /// Stores `session` in the vault.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StorageUnavailable`] before [`Self::initialize`]
    /// or when the device refuses the write, or the vault's error otherwise.
    pub async fn store_session(&self, session: String) -> VaultResult<()> {
        let vault = self.handle()?;
        vault
            .set_value(SESSION_KEY.to_string(), session.clone())
            .await?;
        let vault_exists = vault.does_vault_exist().await?;
        self.shared.state.update(|state| {
            state.session = Some(session);
            state.vault_exists = vault_exists;
        });
        Ok(())
    }

    /// Reads the session from the vault.
    ///
    /// A locked vault runs its unlock challenge first.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StorageUnavailable`] before [`Self::initialize`],
    /// or the vault's error if the read or the unlock fails.
    pub async fn restore_session(&self) -> VaultResult<Option<String>> {
        let vault = self.handle()?;
        let session = vault.get_value(SESSION_KEY.to_string()).await?;
        let cached = session.clone();
        self.shared.state.update(|state| state.session = cached);
        Ok(session)
    }

    /// Locks the vault.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StorageUnavailable`] before [`Self::initialize`],
    /// or the vault's error.
    pub async fn lock(&self) -> VaultResult<()> {
        self.handle()?.lock().await
    }

    /// Unlocks the vault, running the challenge of the current policy.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StorageUnavailable`] before [`Self::initialize`],
    /// or the vault's error if the challenge fails. A dismissed challenge is
    /// reported as [`UnlockOutcome::Cancelled`].
    pub async fn unlock(&self) -> VaultResult<UnlockOutcome> {
        let vault = self.handle()?;
        match vault.unlock().await {
            Ok(()) => {
                let is_locked = vault.is_locked().await?;
                self.shared.state.update(|state| state.is_locked = is_locked);
                Ok(UnlockOutcome::Unlocked)
            }
            Err(err) if err.code() == Some(VaultErrorCode::UserCanceledInteraction) => {
                info!("unlock cancelled by the operator");
                Ok(UnlockOutcome::Cancelled)
            }
            Err(err) => Err(err),
        }
    }

    /// Erases the vault and goes back to [`LockType::NoLocking`].
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::StorageUnavailable`] before [`Self::initialize`],
    /// or the vault's error.
    pub async fn clear(&self) -> VaultResult<()> {
        let vault = self.handle()?;
        vault.clear().await?;
        vault
            .update_config(vault.config().with_policy(LockPolicy::NO_LOCKING))
            .await?;

        let policy = vault.config().policy();
        let is_locked = vault.is_locked().await?;
        self.shared.state.update(|state| {
            state.session = None;
            state.vault_exists = false;
            state.is_locked = is_locked;
            state.policy = policy;
        });
        info!("session vault cleared");
        Ok(())
    }

    /// Answers the pending custom passcode prompt with `passcode`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NoPendingPrompt`] if no prompt is pending.
    pub fn submit_passcode(&self, passcode: String) -> VaultResult<()> {
        self.shared
            .prompt
            .resolve(PasscodeResponse::Submitted { passcode })
            .map(|_| ())
    }

    /// Dismisses the pending custom passcode prompt.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::NoPendingPrompt`] if no prompt is pending.
    pub fn cancel_passcode_prompt(&self) -> VaultResult<()> {
        self.shared
            .prompt
            .resolve(PasscodeResponse::Cancelled)
            .map(|_| ())
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> VaultState {
        let mut state = self.shared.state.snapshot();
        state.passcode_prompt = self.shared.prompt.pending();
        state
    }

    /// Registers the observer notified on every state change.
    pub fn set_state_listener(&self, listener: Arc<dyn VaultStateListener>) {
        self.shared.state.set_listener(listener);
    }
}

impl SessionVault {
    /// Returns a receiver that sees every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<VaultState> {
        self.shared.state.subscribe()
    }

    fn handle(&self) -> VaultResult<Arc<dyn IdentityVault>> {
        self.vault.get().cloned().ok_or_else(|| {
            VaultError::StorageUnavailable("session vault not initialized".to_string())
        })
    }
}

impl Drop for SessionVault {
    fn drop(&mut self) {
        self.shared.prompt.abandon();
    }
}
