//! Lock policies: how the vault is backed and which challenge unlocks it.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Storage backing of the vault.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    uniffi::Enum,
)]
pub enum VaultType {
    /// Platform secure storage without any unlock challenge.
    SecureStorage,
    /// Backed by device security (biometrics or the system passcode).
    DeviceSecurity,
    /// Backed by an application-defined passcode.
    CustomPasscode,
}

/// Device security used by [`VaultType::DeviceSecurity`] vaults.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    uniffi::Enum,
)]
pub enum DeviceSecurityType {
    /// No device security.
    None,
    /// Biometric prompt (fingerprint, face).
    Biometrics,
    /// The operating system passcode.
    SystemPasscode,
}

/// Locking mechanism selected by the operator.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    uniffi::Enum,
)]
pub enum LockType {
    /// Never lock.
    NoLocking,
    /// Unlock with biometrics.
    Biometrics,
    /// Unlock with the system passcode.
    SystemPasscode,
    /// Unlock with an application-defined passcode.
    CustomPasscode,
}

impl LockType {
    /// Every lock type, in the order they are offered to the operator.
    pub const ALL: [Self; 4] = [
        Self::NoLocking,
        Self::Biometrics,
        Self::SystemPasscode,
        Self::CustomPasscode,
    ];

    /// Returns the storage policy implementing this lock type.
    #[must_use]
    pub const fn policy(self) -> LockPolicy {
        let (vault_type, device_security_type) = match self {
            Self::NoLocking => (VaultType::SecureStorage, DeviceSecurityType::None),
            Self::Biometrics => (VaultType::DeviceSecurity, DeviceSecurityType::Biometrics),
            Self::SystemPasscode => {
                (VaultType::DeviceSecurity, DeviceSecurityType::SystemPasscode)
            }
            Self::CustomPasscode => (VaultType::CustomPasscode, DeviceSecurityType::None),
        };
        LockPolicy {
            vault_type,
            device_security_type,
        }
    }
}

/// The pair of settings that decides how a vault locks and unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Record)]
pub struct LockPolicy {
    /// Storage backing.
    pub vault_type: VaultType,
    /// Device security used when `vault_type` is [`VaultType::DeviceSecurity`].
    pub device_security_type: DeviceSecurityType,
}

impl LockPolicy {
    /// Policy of a vault that never locks.
    pub const NO_LOCKING: Self = LockType::NoLocking.policy();

    /// Returns the lock type this policy implements.
    ///
    /// `None` for combinations no lock type produces, such as device security
    /// without a device security type.
    #[must_use]
    pub const fn lock_type(self) -> Option<LockType> {
        match (self.vault_type, self.device_security_type) {
            (VaultType::SecureStorage, _) => Some(LockType::NoLocking),
            (VaultType::DeviceSecurity, DeviceSecurityType::Biometrics) => {
                Some(LockType::Biometrics)
            }
            (VaultType::DeviceSecurity, DeviceSecurityType::SystemPasscode) => {
                Some(LockType::SystemPasscode)
            }
            (VaultType::DeviceSecurity, DeviceSecurityType::None) => None,
            (VaultType::CustomPasscode, _) => Some(LockType::CustomPasscode),
        }
    }
}

impl std::fmt::Display for LockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.vault_type, self.device_security_type)
    }
}
