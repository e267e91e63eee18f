//! In-memory implementations of the platform traits.
//!
//! [`MemoryVault`] behaves like a platform vault: entries are sealed with
//! XChaCha20-Poly1305, the key is dropped while locked, and custom passcode
//! vaults derive their key from the passcode with HKDF-SHA256. It is NOT a
//! secure store. The device key lives in process memory next to the data.
//! Use it for tests and for hosts without a native vault.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    Key, XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use log::{debug, info, warn};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultErrorCode, VaultResult};
use crate::policy::{DeviceSecurityType, LockPolicy, VaultType};

use super::{
    DeviceSecurity, IdentityVault, PasscodeMode, PasscodeResponse, VaultEvents, VaultProvider,
};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;
const SALT_LEN: usize = 16;
const PASSCODE_KEY_INFO: &[u8] = b"sessionvault:custom-passcode-key";

type VaultKey = Zeroizing<[u8; KEY_LEN]>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Memory Device
// =============================================================================

/// Result of the next simulated biometric or system passcode challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// The operator passes the challenge.
    Pass,
    /// The operator dismisses the prompt.
    Cancel,
    /// The operator fails the challenge.
    Fail,
}

#[derive(Debug, Clone, Copy)]
struct DeviceSettings {
    biometrics_supported: bool,
    biometrics_enabled: bool,
    system_passcode_set: bool,
    hide_screen_on_background: bool,
    challenge_outcome: ChallengeOutcome,
    challenges: u32,
}

/// Scriptable device: capability flags, privacy screen and unlock challenges.
pub struct MemoryDevice {
    key: VaultKey,
    settings: Mutex<DeviceSettings>,
}

impl MemoryDevice {
    /// Creates a device with enrolled biometrics and a system passcode.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(true, true)
    }

    /// Creates a device with neither biometrics nor a system passcode.
    #[must_use]
    pub fn without_security() -> Self {
        Self::with_capabilities(false, false)
    }

    /// Creates a device with the given capabilities.
    #[must_use]
    pub fn with_capabilities(biometrics_enabled: bool, system_passcode_set: bool) -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(key.as_mut_slice());
        Self {
            key,
            settings: Mutex::new(DeviceSettings {
                biometrics_supported: biometrics_enabled,
                biometrics_enabled,
                system_passcode_set,
                hide_screen_on_background: false,
                challenge_outcome: ChallengeOutcome::Pass,
                challenges: 0,
            }),
        }
    }

    /// Enrolls or removes biometrics.
    pub fn set_biometrics_enabled(&self, enabled: bool) {
        let mut settings = lock(&self.settings);
        settings.biometrics_enabled = enabled;
        settings.biometrics_supported |= enabled;
    }

    /// Sets or removes the system passcode.
    pub fn set_system_passcode_set(&self, set: bool) {
        lock(&self.settings).system_passcode_set = set;
    }

    /// Decides how the following challenges end.
    pub fn set_challenge_outcome(&self, outcome: ChallengeOutcome) {
        lock(&self.settings).challenge_outcome = outcome;
    }

    /// Returns how many biometric or system passcode challenges were shown.
    #[must_use]
    pub fn challenge_count(&self) -> u32 {
        lock(&self.settings).challenges
    }

    /// Returns whether the device can back `policy`.
    #[must_use]
    pub fn supports(&self, policy: LockPolicy) -> bool {
        let settings = lock(&self.settings);
        match (policy.vault_type, policy.device_security_type) {
            (VaultType::DeviceSecurity, DeviceSecurityType::Biometrics) => {
                settings.biometrics_supported && settings.biometrics_enabled
            }
            (VaultType::DeviceSecurity, DeviceSecurityType::SystemPasscode) => {
                settings.system_passcode_set
            }
            (VaultType::DeviceSecurity, DeviceSecurityType::None) => false,
            (VaultType::SecureStorage | VaultType::CustomPasscode, _) => true,
        }
    }

    fn authenticate(&self, kind: DeviceSecurityType) -> VaultResult<()> {
        let outcome = {
            let mut settings = lock(&self.settings);
            settings.challenges += 1;
            settings.challenge_outcome
        };
        debug!("device challenge ({kind}) -> {outcome:?}");
        match outcome {
            ChallengeOutcome::Pass => Ok(()),
            ChallengeOutcome::Cancel => Err(VaultError::vault(
                VaultErrorCode::UserCanceledInteraction,
                format!("{kind} prompt dismissed"),
            )),
            ChallengeOutcome::Fail => Err(VaultError::vault(
                VaultErrorCode::AuthFailed,
                format!("{kind} challenge failed"),
            )),
        }
    }

    fn device_key(&self) -> VaultKey {
        self.key.clone()
    }
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceSecurity for MemoryDevice {
    async fn is_biometrics_supported(&self) -> VaultResult<bool> {
        Ok(lock(&self.settings).biometrics_supported)
    }

    async fn is_biometrics_enabled(&self) -> VaultResult<bool> {
        Ok(lock(&self.settings).biometrics_enabled)
    }

    async fn is_system_passcode_set(&self) -> VaultResult<bool> {
        Ok(lock(&self.settings).system_passcode_set)
    }

    async fn is_hide_screen_on_background_enabled(&self) -> VaultResult<bool> {
        Ok(lock(&self.settings).hide_screen_on_background)
    }

    async fn set_hide_screen_on_background(&self, enabled: bool) -> VaultResult<()> {
        lock(&self.settings).hide_screen_on_background = enabled;
        Ok(())
    }
}

// =============================================================================
// Memory Platform
// =============================================================================

/// In-memory [`VaultProvider`] keeping one [`MemoryVault`] per identifier.
pub struct MemoryPlatform {
    device: Arc<MemoryDevice>,
    vaults: Mutex<HashMap<String, Arc<MemoryVault>>>,
}

impl MemoryPlatform {
    /// Creates a platform backed by `device`.
    #[must_use]
    pub fn new(device: Arc<MemoryDevice>) -> Self {
        Self {
            device,
            vaults: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the device of this platform.
    #[must_use]
    pub fn device(&self) -> Arc<MemoryDevice> {
        Arc::clone(&self.device)
    }

    /// Returns the vault opened under `key`, if any.
    #[must_use]
    pub fn vault(&self, key: &str) -> Option<Arc<MemoryVault>> {
        lock(&self.vaults).get(key).cloned()
    }
}

impl VaultProvider for MemoryPlatform {
    fn open(&self, config: VaultConfig) -> VaultResult<Arc<dyn IdentityVault>> {
        config.validate()?;
        let vault: Arc<dyn IdentityVault> = lock(&self.vaults)
            .entry(config.key.clone())
            .or_insert_with(|| {
                info!("opening memory vault {}", config.key);
                Arc::new(MemoryVault::new(config, Arc::clone(&self.device)))
            })
            .clone();
        Ok(vault)
    }
}

// =============================================================================
// Memory Vault
// =============================================================================

struct Sealed {
    /// Present when the entries are sealed under a custom passcode key.
    salt: Option<[u8; SALT_LEN]>,
    /// `nonce || ciphertext`
    bytes: Vec<u8>,
}

struct VaultState {
    config: VaultConfig,
    sealed: Option<Sealed>,
    /// Held only while unlocked and holding data.
    key: Option<VaultKey>,
    locked: bool,
    failed_attempts: u32,
    backgrounded_at: Option<Instant>,
}

impl VaultState {
    fn erase(&mut self, config: VaultConfig) {
        self.config = config;
        self.sealed = None;
        self.key = None;
        self.failed_attempts = 0;
        self.backgrounded_at = None;
    }

    fn salt(&self) -> Option<[u8; SALT_LEN]> {
        self.sealed.as_ref().and_then(|sealed| sealed.salt)
    }
}

enum VaultEvent {
    Lock { timeout: bool },
    Unlock,
    Error { code: VaultErrorCode, detail: String },
}

/// In-memory [`IdentityVault`].
pub struct MemoryVault {
    device: Arc<MemoryDevice>,
    opened_with: VaultConfig,
    state: Mutex<VaultState>,
    handler: RwLock<Option<Arc<dyn VaultEvents>>>,
    passcode: Mutex<Option<PasscodeResponse>>,
    /// Serializes unlock challenges, re-keying and locking.
    challenge: tokio::sync::Mutex<()>,
}

impl MemoryVault {
    /// Creates an empty, unlocked vault.
    #[must_use]
    pub fn new(config: VaultConfig, device: Arc<MemoryDevice>) -> Self {
        Self {
            device,
            state: Mutex::new(VaultState {
                config: config.clone(),
                sealed: None,
                key: None,
                locked: false,
                failed_attempts: 0,
                backgrounded_at: None,
            }),
            opened_with: config,
            handler: RwLock::new(None),
            passcode: Mutex::new(None),
            challenge: tokio::sync::Mutex::new(()),
        }
    }

    /// Records that the app moved to the background.
    pub fn app_backgrounded(&self) {
        lock(&self.state).backgrounded_at = Some(Instant::now());
    }

    /// Records that the app returned to the foreground.
    ///
    /// Locks the vault when it stayed in the background for at least
    /// `lock_after_backgrounded_ms`. Secure storage vaults never relock.
    /// Returns whether the vault locked.
    pub async fn app_resumed(&self) -> bool {
        let relocked = {
            let mut state = lock(&self.state);
            match state.backgrounded_at.take() {
                Some(since)
                    if !state.locked
                        && state.config.vault_type != VaultType::SecureStorage
                        && since.elapsed() >= state.config.lock_after_backgrounded() =>
                {
                    state.locked = true;
                    state.key = None;
                    true
                }
                _ => false,
            }
        };
        if relocked {
            info!("vault {} locked after backgrounding", self.opened_with.key);
            self.dispatch(vec![VaultEvent::Lock { timeout: true }]).await;
        }
        relocked
    }

    /// Returns how many failed custom passcode attempts are on record.
    #[must_use]
    pub fn failed_attempts(&self) -> u32 {
        lock(&self.state).failed_attempts
    }

    fn handler(&self) -> Option<Arc<dyn VaultEvents>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn dispatch(&self, events: Vec<VaultEvent>) {
        let Some(handler) = self.handler() else {
            return;
        };
        for event in events {
            match event {
                VaultEvent::Lock { timeout } => handler.on_lock(timeout),
                VaultEvent::Unlock => handler.on_unlock(),
                VaultEvent::Error { code, detail } => handler.on_error(code, detail).await,
            }
        }
    }

    fn aad(&self) -> &[u8] {
        self.opened_with.key.as_bytes()
    }

    async fn ensure_unlocked(&self) -> VaultResult<()> {
        let locked = lock(&self.state).locked;
        if locked {
            self.unlock().await?;
        }
        Ok(())
    }

    async fn request_passcode(&self, mode: PasscodeMode) -> VaultResult<SecretString> {
        let handler = self.handler().ok_or_else(|| {
            VaultError::vault(
                VaultErrorCode::KeyNotFound,
                "no event handler to request a custom passcode from",
            )
        })?;
        lock(&self.passcode).take();
        handler.on_passcode_requested(mode).await?;
        let response = lock(&self.passcode).take();
        match response {
            Some(PasscodeResponse::Submitted { passcode }) => Ok(SecretString::from(passcode)),
            Some(PasscodeResponse::Cancelled) | None => Err(VaultError::vault(
                VaultErrorCode::UserCanceledInteraction,
                format!("custom passcode prompt ({mode}) dismissed"),
            )),
        }
    }

    /// Produces a fresh key for `config`, asking for a new passcode if needed.
    async fn provision_key(
        &self,
        config: &VaultConfig,
    ) -> VaultResult<(VaultKey, Option<[u8; SALT_LEN]>)> {
        match config.vault_type {
            VaultType::SecureStorage => Ok((self.device.device_key(), None)),
            VaultType::DeviceSecurity => {
                if !self.device.supports(config.policy()) {
                    return Err(VaultError::StorageUnavailable(format!(
                        "device cannot provide {}",
                        config.device_security_type
                    )));
                }
                Ok((self.device.device_key(), None))
            }
            VaultType::CustomPasscode => {
                let passcode = self.request_passcode(PasscodeMode::Set).await?;
                let mut salt = [0u8; SALT_LEN];
                OsRng.fill_bytes(&mut salt);
                Ok((derive_passcode_key(&passcode, &salt)?, Some(salt)))
            }
        }
    }

    /// Runs the unlock challenge of `config` and returns the data key.
    async fn challenge_key(
        &self,
        config: &VaultConfig,
        salt: Option<[u8; SALT_LEN]>,
        events: &mut Vec<VaultEvent>,
    ) -> VaultResult<VaultKey> {
        if let Some(salt) = salt {
            return self.verify_passcode(config, &salt, events).await;
        }
        if config.vault_type == VaultType::DeviceSecurity {
            self.device.authenticate(config.device_security_type)?;
        }
        Ok(self.device.device_key())
    }

    async fn verify_passcode(
        &self,
        config: &VaultConfig,
        salt: &[u8; SALT_LEN],
        events: &mut Vec<VaultEvent>,
    ) -> VaultResult<VaultKey> {
        let passcode = self.request_passcode(PasscodeMode::Verify).await?;
        let key = derive_passcode_key(&passcode, salt)?;

        let mut state = lock(&self.state);
        let verified = state
            .sealed
            .as_ref()
            .is_none_or(|sealed| open_entries(&key, self.aad(), &sealed.bytes).is_ok());
        if verified {
            return Ok(key);
        }

        state.failed_attempts += 1;
        let allowed = config.custom_passcode_invalid_unlock_attempts;
        if state.failed_attempts < allowed {
            let remaining = allowed - state.failed_attempts;
            warn!("custom passcode rejected, {remaining} attempt(s) left");
            return Err(VaultError::vault(
                VaultErrorCode::AuthFailed,
                format!("invalid passcode, {remaining} attempt(s) left"),
            ));
        }

        state.failed_attempts = 0;
        let detail = format!("{allowed} failed custom passcode attempts");
        if config.should_clear_vault_after_too_many_failed_attempts {
            warn!("{detail}, clearing vault {}", self.opened_with.key);
            state.erase(self.opened_with.clone());
            events.push(VaultEvent::Error {
                code: VaultErrorCode::TooManyFailedAttempts,
                detail: detail.clone(),
            });
        }
        Err(VaultError::vault(VaultErrorCode::TooManyFailedAttempts, detail))
    }

    async fn unlock_exclusive(&self, events: &mut Vec<VaultEvent>) -> VaultResult<()> {
        let (config, salt, has_data) = {
            let state = lock(&self.state);
            if !state.locked {
                return Ok(());
            }
            (state.config.clone(), state.salt(), state.sealed.is_some())
        };

        let key = if has_data {
            Some(self.challenge_key(&config, salt, events).await?)
        } else {
            None
        };

        {
            let mut state = lock(&self.state);
            state.key = key;
            state.locked = false;
            state.failed_attempts = 0;
        }
        info!("vault {} unlocked", self.opened_with.key);
        events.push(VaultEvent::Unlock);
        Ok(())
    }

    async fn rekey_exclusive(
        &self,
        config: VaultConfig,
        events: &mut Vec<VaultEvent>,
    ) -> VaultResult<()> {
        let (locked, current_key, salt, has_data) = {
            let state = lock(&self.state);
            (
                state.locked,
                state.key.clone(),
                state.salt(),
                state.sealed.is_some(),
            )
        };
        if locked && has_data {
            return Err(VaultError::vault(
                VaultErrorCode::VaultLocked,
                "unlock the vault before changing its configuration",
            ));
        }

        if !self.device.supports(config.policy()) {
            let detail = format!("device cannot provide {}", config.policy());
            warn!("{detail}");
            lock(&self.state).config = config;
            events.push(VaultEvent::Error {
                code: VaultErrorCode::UnsupportedSecurityClass,
                detail,
            });
            return Ok(());
        }

        let Some(current_key) = current_key.filter(|_| has_data) else {
            let mut state = lock(&self.state);
            state.config = config;
            state.key = None;
            return Ok(());
        };

        let sealed_with_passcode = salt.is_some();
        let wants_passcode = config.vault_type == VaultType::CustomPasscode;
        let (key, salt) = if sealed_with_passcode == wants_passcode {
            (current_key.clone(), salt)
        } else {
            self.provision_key(&config).await?
        };

        let mut state = lock(&self.state);
        if let Some(sealed) = state.sealed.as_ref() {
            let entries = open_entries(&current_key, self.aad(), &sealed.bytes)?;
            let bytes = seal_entries(&key, self.aad(), &entries)?;
            state.sealed = Some(Sealed { salt, bytes });
        }
        debug!("vault {} re-sealed for {}", self.opened_with.key, config.policy());
        state.config = config;
        state.key = Some(key);
        Ok(())
    }

    async fn store_exclusive(&self, key: String, value: String) -> VaultResult<()> {
        let (config, current_key, salt) = {
            let state = lock(&self.state);
            if state.locked {
                return Err(VaultError::vault(
                    VaultErrorCode::VaultLocked,
                    "vault locked while writing",
                ));
            }
            (state.config.clone(), state.key.clone(), state.salt())
        };

        let (data_key, salt) = match current_key {
            Some(data_key) => (data_key, salt),
            None => self.provision_key(&config).await?,
        };

        let mut state = lock(&self.state);
        let mut entries = match state.sealed.as_ref() {
            Some(sealed) => open_entries(&data_key, self.aad(), &sealed.bytes)?,
            None => HashMap::new(),
        };
        entries.insert(key, value);
        let bytes = seal_entries(&data_key, self.aad(), &entries)?;
        state.sealed = Some(Sealed { salt, bytes });
        state.key = Some(data_key);
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityVault for MemoryVault {
    fn config(&self) -> VaultConfig {
        lock(&self.state).config.clone()
    }

    fn set_event_handler(&self, handler: Arc<dyn VaultEvents>) {
        *self
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    async fn update_config(&self, config: VaultConfig) -> VaultResult<()> {
        config.validate()?;
        let mut events = Vec::new();
        let result = {
            let _challenge = self.challenge.lock().await;
            self.rekey_exclusive(config, &mut events).await
        };
        self.dispatch(events).await;
        result
    }

    async fn get_value(&self, key: String) -> VaultResult<Option<String>> {
        self.ensure_unlocked().await?;
        let state = lock(&self.state);
        match (state.sealed.as_ref(), state.key.as_ref()) {
            (None, _) => Ok(None),
            (Some(sealed), Some(data_key)) => {
                Ok(open_entries(data_key, self.aad(), &sealed.bytes)?.remove(&key))
            }
            (Some(_), None) => Err(VaultError::vault(
                VaultErrorCode::VaultLocked,
                "vault locked while reading",
            )),
        }
    }

    async fn set_value(&self, key: String, value: String) -> VaultResult<()> {
        self.ensure_unlocked().await?;
        let _challenge = self.challenge.lock().await;
        self.store_exclusive(key, value).await
    }

    async fn lock(&self) -> VaultResult<()> {
        let transitioned = {
            let _challenge = self.challenge.lock().await;
            let mut state = lock(&self.state);
            let was_locked = state.locked;
            state.locked = true;
            state.key = None;
            state.backgrounded_at = None;
            !was_locked
        };
        if transitioned {
            info!("vault {} locked", self.opened_with.key);
            self.dispatch(vec![VaultEvent::Lock { timeout: false }]).await;
        }
        Ok(())
    }

    async fn unlock(&self) -> VaultResult<()> {
        let mut events = Vec::new();
        let result = {
            let _challenge = self.challenge.lock().await;
            self.unlock_exclusive(&mut events).await
        };
        self.dispatch(events).await;
        result
    }

    async fn is_locked(&self) -> VaultResult<bool> {
        Ok(lock(&self.state).locked)
    }

    async fn does_vault_exist(&self) -> VaultResult<bool> {
        Ok(lock(&self.state).sealed.is_some())
    }

    async fn clear(&self) -> VaultResult<()> {
        let _challenge = self.challenge.lock().await;
        {
            let mut state = lock(&self.state);
            state.erase(self.opened_with.clone());
            state.locked = false;
        }
        lock(&self.passcode).take();
        info!("vault {} cleared", self.opened_with.key);
        Ok(())
    }

    async fn set_custom_passcode(&self, response: PasscodeResponse) -> VaultResult<()> {
        *lock(&self.passcode) = Some(response);
        Ok(())
    }
}

// =============================================================================
// Sealing
// =============================================================================

fn derive_passcode_key(passcode: &SecretString, salt: &[u8; SALT_LEN]) -> VaultResult<VaultKey> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt.as_slice()), passcode.expose_secret().as_bytes());
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    hkdf.expand(PASSCODE_KEY_INFO, key.as_mut_slice())
        .map_err(|err| VaultError::vault(VaultErrorCode::Unknown, err.to_string()))?;
    Ok(key)
}

fn seal_entries(
    key: &[u8; KEY_LEN],
    aad: &[u8],
    entries: &HashMap<String, String>,
) -> VaultResult<Vec<u8>> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(entries)
            .map_err(|err| VaultError::vault(VaultErrorCode::Unknown, err.to_string()))?,
    );
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext.as_slice(),
                aad,
            },
        )
        .map_err(|err| VaultError::vault(VaultErrorCode::Unknown, err.to_string()))?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open_entries(
    key: &[u8; KEY_LEN],
    aad: &[u8],
    bytes: &[u8],
) -> VaultResult<HashMap<String, String>> {
    if bytes.len() < NONCE_LEN {
        return Err(VaultError::vault(
            VaultErrorCode::Unknown,
            "sealed entries too short",
        ));
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                XNonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| VaultError::vault(VaultErrorCode::AuthFailed, "cannot open vault"))?,
    );
    serde_json::from_slice(&plaintext)
        .map_err(|err| VaultError::vault(VaultErrorCode::Unknown, err.to_string()))
}
