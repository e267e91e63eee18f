//! State the controller publishes to the presentation layer.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::defaults::DEFAULT_POLICY;
use crate::platform::PasscodeMode;
use crate::policy::{LockPolicy, LockType};

/// Snapshot of the session vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct VaultState {
    /// Cached session value. Cleared whenever the vault locks.
    pub session: Option<String>,
    /// Whether the vault is locked.
    pub is_locked: bool,
    /// Whether the vault holds any data. Independent of `is_locked`.
    pub vault_exists: bool,
    /// Effective lock policy, as reported by the vault.
    pub policy: LockPolicy,
    /// Lock type matching `policy`.
    pub lock_type: Option<LockType>,
    /// Custom passcode prompt waiting for the operator, if any.
    pub passcode_prompt: Option<PasscodeMode>,
}

impl Default for VaultState {
    fn default() -> Self {
        Self {
            session: None,
            is_locked: false,
            vault_exists: false,
            policy: DEFAULT_POLICY,
            lock_type: DEFAULT_POLICY.lock_type(),
            passcode_prompt: None,
        }
    }
}

/// Observer of [`VaultState`] changes, implemented by the presentation layer.
#[uniffi::export(with_foreign)]
pub trait VaultStateListener: Send + Sync {
    /// Called with the new state after every change.
    fn on_state_changed(&self, state: VaultState);
}

/// Owns the current [`VaultState`] and notifies observers of changes.
pub(crate) struct StatePublisher {
    sender: watch::Sender<VaultState>,
    listener: RwLock<Option<Arc<dyn VaultStateListener>>>,
}

impl StatePublisher {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(VaultState::default());
        Self {
            sender,
            listener: RwLock::new(None),
        }
    }

    pub(crate) fn snapshot(&self) -> VaultState {
        self.sender.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<VaultState> {
        self.sender.subscribe()
    }

    pub(crate) fn set_listener(&self, listener: Arc<dyn VaultStateListener>) {
        *self
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    /// Applies `change`; observers hear about it only if the state differs.
    pub(crate) fn update(&self, change: impl FnOnce(&mut VaultState)) {
        let changed = self.sender.send_if_modified(|state| {
            let before = state.clone();
            change(state);
            state.lock_type = state.policy.lock_type();
            *state != before
        });
        if !changed {
            return;
        }

        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            listener.on_state_changed(self.snapshot());
        }
    }

    pub(crate) fn publish_policy(&self, policy: LockPolicy) {
        self.update(|state| state.policy = policy);
    }
}
