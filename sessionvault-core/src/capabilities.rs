//! What the device can back, and the privacy screen toggle.
//!
//! Advisory only: the controller accepts any [`LockType`]. A policy the device
//! cannot satisfy is downgraded by the vault at runtime.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::VaultResult;
use crate::platform::DeviceSecurity;
use crate::policy::LockType;

/// Security features available on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, uniffi::Record)]
pub struct DeviceCapabilities {
    /// The device has biometric hardware.
    pub biometrics_supported: bool,
    /// Biometrics are enrolled and usable.
    pub biometrics_enabled: bool,
    /// A system passcode is set.
    pub system_passcode_set: bool,
    /// The app content is hidden while in the background.
    pub privacy_screen: bool,
}

impl DeviceCapabilities {
    /// Queries `device`.
    ///
    /// # Errors
    ///
    /// Returns the device's error if any query fails.
    pub async fn query(device: &dyn DeviceSecurity) -> VaultResult<Self> {
        Ok(Self {
            biometrics_supported: device.is_biometrics_supported().await?,
            biometrics_enabled: device.is_biometrics_enabled().await?,
            system_passcode_set: device.is_system_passcode_set().await?,
            privacy_screen: device.is_hide_screen_on_background_enabled().await?,
        })
    }

    /// Whether the operator may pick `lock_type` on this device.
    #[must_use]
    pub const fn allows(&self, lock_type: LockType) -> bool {
        match lock_type {
            LockType::NoLocking | LockType::CustomPasscode => true,
            LockType::Biometrics => self.biometrics_supported && self.biometrics_enabled,
            LockType::SystemPasscode => self.system_passcode_set,
        }
    }

    /// Lock types the operator may pick, in display order.
    #[must_use]
    pub fn selectable_lock_types(&self) -> Vec<LockType> {
        LockType::ALL
            .into_iter()
            .filter(|lock_type| self.allows(*lock_type))
            .collect()
    }
}

/// Queries the security features of `device`.
///
/// # Errors
///
/// Returns the device's error if any query fails.
#[uniffi::export(async_runtime = "tokio")]
pub async fn query_device_capabilities(
    device: Arc<dyn DeviceSecurity>,
) -> VaultResult<DeviceCapabilities> {
    DeviceCapabilities::query(device.as_ref()).await
}

/// Lock types `capabilities` allow, in display order.
#[must_use]
#[uniffi::export]
pub fn selectable_lock_types(capabilities: DeviceCapabilities) -> Vec<LockType> {
    capabilities.selectable_lock_types()
}

/// Turns the privacy screen on or off and returns the refreshed capabilities.
///
/// # Errors
///
/// Returns the device's error if the toggle or the follow-up query fails.
#[uniffi::export(async_runtime = "tokio")]
pub async fn set_privacy_screen(
    device: Arc<dyn DeviceSecurity>,
    enabled: bool,
) -> VaultResult<DeviceCapabilities> {
    device.set_hide_screen_on_background(enabled).await?;
    log::debug!("privacy screen {}", if enabled { "on" } else { "off" });
    DeviceCapabilities::query(device.as_ref()).await
}
