//! `sessionvault-core` keeps an app's session token in the platform vault.
//!
//! The [`SessionVault`] controller sits on a platform vault ([`IdentityVault`])
//! and holds one opaque session value. It applies the lock policy the operator
//! picks (none, biometrics, system passcode or a custom passcode), follows the
//! vault's lock and unlock events, and publishes a [`VaultState`].
//!
//! Encryption, secure hardware and biometric prompts stay with the platform.
//! Hosts implement the traits in [`platform`] natively or through the `UniFFI`
//! bindings; [`platform::memory`] provides an in-process implementation.
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod capabilities;
pub mod config;
pub mod defaults;
pub mod logger;
pub mod platform;
pub mod policy;

mod controller;
mod error;

pub use capabilities::DeviceCapabilities;
pub use config::VaultConfig;
pub use controller::{SessionVault, UnlockOutcome, VaultState, VaultStateListener};
pub use defaults::{default_vault_config, SESSION_KEY};
pub use error::{VaultError, VaultErrorCode, VaultResult};
pub use platform::{
    DeviceSecurity, IdentityVault, PasscodeMode, PasscodeResponse, VaultEvents, VaultProvider,
};
pub use policy::{DeviceSecurityType, LockPolicy, LockType, VaultType};

uniffi::setup_scaffolding!("sessionvault_core");
