//! Events raised by the platform vault.

use serde::{Deserialize, Serialize};

use crate::error::{VaultErrorCode, VaultResult};

/// Why the vault needs a custom passcode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum, strum::Display,
)]
pub enum PasscodeMode {
    /// A new passcode is being set (first use, or re-sealing existing data).
    Set,
    /// An existing passcode is being verified to unlock the vault.
    Verify,
}

/// Operator answer to a custom passcode request.
#[derive(Clone, PartialEq, Eq, uniffi::Enum)]
pub enum PasscodeResponse {
    /// The operator entered a passcode.
    Submitted {
        /// The passcode entered.
        passcode: String,
    },
    /// The operator dismissed the prompt.
    Cancelled,
}

impl std::fmt::Debug for PasscodeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted { .. } => f.write_str("Submitted(..)"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Handler for events raised by an [`IdentityVault`](super::IdentityVault).
///
/// The vault may raise events from any thread, at any time relative to calls
/// made into it.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait VaultEvents: Send + Sync {
    /// The vault locked. `timeout` is set when it locked after backgrounding.
    fn on_lock(&self, timeout: bool);

    /// The vault unlocked.
    fn on_unlock(&self);

    /// The vault hit an error outside of a direct call, or one the app should
    /// react to (e.g. an unsupported security class).
    async fn on_error(&self, code: VaultErrorCode, detail: String);

    /// The vault needs a custom passcode.
    ///
    /// The handler obtains the passcode from the operator and hands it to
    /// [`IdentityVault::set_custom_passcode`](super::IdentityVault::set_custom_passcode)
    /// before returning. The requesting vault operation is suspended until
    /// then.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be served, for instance because
    /// another prompt is still pending.
    async fn on_passcode_requested(&self, mode: PasscodeMode) -> VaultResult<()>;
}
