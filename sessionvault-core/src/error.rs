//! Error types for the session vault.

use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Error codes reported by the platform vault.
///
/// The numeric values are the ones the native vault SDKs use, see
/// [`VaultErrorCode::code`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, uniffi::Enum, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum VaultErrorCode {
    /// Unclassified failure.
    Unknown,
    /// Biometrics are not enabled on the device.
    BiometricsNotEnabled,
    /// The key protecting the vault was invalidated (e.g. biometric enrollment changed).
    InvalidatedCredential,
    /// The device offers no security that satisfies the vault type.
    SecurityNotAvailable,
    /// The unlock challenge was answered incorrectly.
    AuthFailed,
    /// Too many failed custom passcode attempts.
    TooManyFailedAttempts,
    /// The operator dismissed an interactive prompt.
    UserCanceledInteraction,
    /// The passcode confirmation did not match.
    MismatchedPasscode,
    /// The configured security class cannot be satisfied by this environment.
    UnsupportedSecurityClass,
    /// The device has no system passcode set.
    PasscodeNotEnabled,
    /// The vault key could not be found.
    KeyNotFound,
    /// The vault must be unlocked for this operation.
    VaultLocked,
}

impl VaultErrorCode {
    /// Returns the numeric code used by the native SDKs.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::BiometricsNotEnabled => 1,
            Self::InvalidatedCredential => 2,
            Self::SecurityNotAvailable => 3,
            Self::AuthFailed => 4,
            Self::TooManyFailedAttempts => 5,
            Self::UserCanceledInteraction => 6,
            Self::MismatchedPasscode => 7,
            Self::UnsupportedSecurityClass => 8,
            Self::PasscodeNotEnabled => 9,
            Self::KeyNotFound => 10,
            Self::VaultLocked => 11,
        }
    }

    /// Maps a numeric SDK code back to a [`VaultErrorCode`].
    ///
    /// Unrecognized codes map to [`VaultErrorCode::Unknown`].
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::BiometricsNotEnabled,
            2 => Self::InvalidatedCredential,
            3 => Self::SecurityNotAvailable,
            4 => Self::AuthFailed,
            5 => Self::TooManyFailedAttempts,
            6 => Self::UserCanceledInteraction,
            7 => Self::MismatchedPasscode,
            8 => Self::UnsupportedSecurityClass,
            9 => Self::PasscodeNotEnabled,
            10 => Self::KeyNotFound,
            11 => Self::VaultLocked,
            _ => Self::Unknown,
        }
    }
}

/// Errors raised by the session vault and its platform collaborators.
#[derive(Debug, Error, uniffi::Error)]
pub enum VaultError {
    /// The vault handle is not initialized or can no longer be reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Failure reported by the platform vault.
    #[error("vault error {code}: {detail}")]
    Vault {
        /// Classified error code.
        code: VaultErrorCode,
        /// Human readable detail.
        detail: String,
    },

    /// The vault configuration is not acceptable.
    #[error("invalid vault config: {0}")]
    InvalidConfig(String),

    /// A passcode prompt was requested while another one is still pending.
    #[error("a passcode prompt is already pending")]
    PromptAlreadyPending,

    /// A passcode answer was submitted while no prompt is pending.
    #[error("no passcode prompt is pending")]
    NoPendingPrompt,

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl VaultError {
    /// Builds a [`VaultError::Vault`] from a code and a message.
    pub fn vault(code: VaultErrorCode, detail: impl Into<String>) -> Self {
        Self::Vault {
            code,
            detail: detail.into(),
        }
    }

    /// Returns the vault error code, if this is a platform vault failure.
    #[must_use]
    pub const fn code(&self) -> Option<VaultErrorCode> {
        match self {
            Self::Vault { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for VaultError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}
