//! Platform abstraction traits for the session vault.
//!
//! The controller never talks to secure hardware itself. Every platform
//! capability it depends on sits behind a trait that the host implements,
//! natively or across the FFI boundary:
//!
//! - [`VaultProvider`]: Opens the platform vault for an identifier
//! - [`IdentityVault`]: The vault handle: values, locking, configuration
//! - [`VaultEvents`]: Callbacks the vault raises (lock, unlock, errors,
//!   custom passcode requests); implemented by the controller
//! - [`DeviceSecurity`]: Device introspection (biometrics, system passcode,
//!   privacy screen)
//!
//! # Platform Implementations
//!
//! ## iOS (Swift)
//! - `IdentityVault`: Keychain item protected by `SecAccessControl`
//! - `DeviceSecurity`: `LAContext` and scene snapshot hiding
//!
//! ## Android (Kotlin)
//! - `IdentityVault`: Android Keystore backed `EncryptedSharedPreferences`
//! - `DeviceSecurity`: `BiometricManager`, `KeyguardManager`, `FLAG_SECURE`
//!
//! ## In-process
//! - [`memory`]: AEAD sealed in-memory vault and a scriptable device, for
//!   tests and for hosts without a native vault.

mod device;
mod events;
pub mod memory;
mod vault;

pub use device::DeviceSecurity;
pub use events::{PasscodeMode, PasscodeResponse, VaultEvents};
pub use vault::{IdentityVault, VaultProvider};

pub use memory::{MemoryDevice, MemoryPlatform, MemoryVault};
