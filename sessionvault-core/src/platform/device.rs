//! Device introspection provided by the host platform.

use crate::error::VaultResult;

/// Device security capabilities and the privacy screen.
///
/// Queries are advisory: they tell the app which lock types it should offer.
/// The vault still reports an unsupported security class when a policy cannot
/// be satisfied.
#[uniffi::export(with_foreign)]
#[async_trait::async_trait]
pub trait DeviceSecurity: Send + Sync {
    /// Returns whether the device has biometric hardware.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform query fails.
    async fn is_biometrics_supported(&self) -> VaultResult<bool>;

    /// Returns whether biometrics are enrolled and allowed for this app.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform query fails.
    async fn is_biometrics_enabled(&self) -> VaultResult<bool>;

    /// Returns whether the device has a system passcode set.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform query fails.
    async fn is_system_passcode_set(&self) -> VaultResult<bool>;

    /// Returns whether app content is hidden in the task switcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform query fails.
    async fn is_hide_screen_on_background_enabled(&self) -> VaultResult<bool>;

    /// Hides (or shows) app content in the task switcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses the change.
    async fn set_hide_screen_on_background(&self, enabled: bool) -> VaultResult<()>;
}
