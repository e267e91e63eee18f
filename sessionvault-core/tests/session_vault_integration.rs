//! End-to-end flows of the session vault over the memory platform.

mod common;

use std::sync::Arc;

use sessionvault_core::platform::memory::ChallengeOutcome;
use sessionvault_core::platform::MemoryDevice;
use sessionvault_core::{
    default_vault_config, DeviceSecurityType, IdentityVault, LockPolicy, LockType, PasscodeMode,
    SessionVault, UnlockOutcome, VaultConfig, VaultError, VaultErrorCode, VaultType,
};
use test_case::test_case;

use common::{
    prompts_answered, setup, spawn_operator, Fixture, RecordingListener, FLOW_TIMEOUT,
};

#[test_case(LockType::NoLocking, VaultType::SecureStorage, DeviceSecurityType::None ; "no locking")]
#[test_case(LockType::Biometrics, VaultType::DeviceSecurity, DeviceSecurityType::Biometrics ; "biometrics")]
#[test_case(LockType::SystemPasscode, VaultType::DeviceSecurity, DeviceSecurityType::SystemPasscode ; "system passcode")]
#[test_case(LockType::CustomPasscode, VaultType::CustomPasscode, DeviceSecurityType::None ; "custom passcode")]
#[tokio::test]
async fn test_lock_policy_choice_maps_to_vault_settings(
    lock_type: LockType,
    vault_type: VaultType,
    device_security_type: DeviceSecurityType,
) {
    let fixture = setup(MemoryDevice::new()).await;

    fixture
        .controller
        .set_lock_policy(lock_type)
        .await
        .expect("set lock policy");

    let expected = LockPolicy {
        vault_type,
        device_security_type,
    };
    let state = fixture.controller.state();
    assert_eq!(state.policy, expected);
    assert_eq!(state.lock_type, Some(lock_type));
    assert_eq!(fixture.vault().config().policy(), expected);
}

#[tokio::test]
async fn test_store_then_restore_while_unlocked() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;

    controller
        .store_session("session-token-X".to_string())
        .await
        .expect("store");
    let state = controller.state();
    assert!(state.vault_exists);
    assert_eq!(state.session.as_deref(), Some("session-token-X"));

    let restored = controller.restore_session().await.expect("restore");
    assert_eq!(restored.as_deref(), Some("session-token-X"));
    assert!(!controller.state().is_locked);
}

#[tokio::test]
async fn test_restore_before_any_store_is_absent() {
    let fixture = setup(MemoryDevice::new()).await;
    let restored = fixture.controller.restore_session().await.expect("restore");
    assert_eq!(restored, None);
    assert!(!fixture.controller.state().vault_exists);
}

#[tokio::test]
async fn test_operations_require_initialize() {
    let device = Arc::new(MemoryDevice::new());
    let platform = Arc::new(sessionvault_core::platform::MemoryPlatform::new(device));
    let controller = SessionVault::new(platform);

    let err = controller
        .store_session("token".to_string())
        .await
        .expect_err("not initialized");
    assert!(matches!(err, VaultError::StorageUnavailable(_)));
    assert!(matches!(
        controller.restore_session().await,
        Err(VaultError::StorageUnavailable(_))
    ));
}

#[tokio::test]
async fn test_store_refused_when_device_cannot_back_policy() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::Biometrics)
        .await
        .expect("policy");
    fixture.device.set_biometrics_enabled(false);

    let err = controller
        .store_session("token".to_string())
        .await
        .expect_err("device denies the write");

    assert!(matches!(err, VaultError::StorageUnavailable(_)));
    let state = controller.state();
    assert!(!state.vault_exists);
    assert_eq!(state.session, None);
}

#[tokio::test]
async fn test_initialize_is_idempotent_and_reuses_the_handle() {
    let fixture = setup(MemoryDevice::new()).await;
    fixture
        .controller
        .store_session("token".to_string())
        .await
        .expect("store");

    fixture.controller.initialize().await.expect("initialize again");
    assert_eq!(fixture.controller.state().session.as_deref(), Some("token"));

    let restarted = fixture.restart(default_vault_config()).await;
    assert!(restarted.state().vault_exists);
    assert_eq!(
        restarted.restore_session().await.expect("restore").as_deref(),
        Some("token")
    );
}

#[tokio::test]
async fn test_lock_clears_cached_session_but_keeps_data() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::Biometrics)
        .await
        .expect("policy");
    controller
        .store_session("token".to_string())
        .await
        .expect("store");

    controller.lock().await.expect("lock");

    let state = controller.state();
    assert!(state.is_locked);
    assert!(state.vault_exists);
    assert_eq!(state.session, None);

    assert_eq!(
        controller.unlock().await.expect("unlock"),
        UnlockOutcome::Unlocked
    );
    assert!(!controller.state().is_locked);
    assert_eq!(
        controller.restore_session().await.expect("restore").as_deref(),
        Some("token")
    );
}

#[tokio::test]
async fn test_background_timeout_relocks_vault() {
    let config = VaultConfig {
        lock_after_backgrounded_ms: 0,
        ..default_vault_config()
    };
    let device = Arc::new(MemoryDevice::new());
    let platform = Arc::new(sessionvault_core::platform::MemoryPlatform::new(device));
    let controller = SessionVault::with_config(platform.clone(), config.clone());
    controller.initialize().await.expect("initialize");
    controller
        .set_lock_policy(LockType::SystemPasscode)
        .await
        .expect("policy");
    controller
        .store_session("token".to_string())
        .await
        .expect("store");

    let vault = platform.vault(&config.key).expect("vault");
    vault.app_backgrounded();
    assert!(vault.app_resumed().await);

    let state = controller.state();
    assert!(state.is_locked);
    assert!(state.vault_exists);
    assert_eq!(state.session, None);
}

#[tokio::test]
async fn test_restore_while_locked_runs_unlock_challenge() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::Biometrics)
        .await
        .expect("policy");
    controller
        .store_session("token".to_string())
        .await
        .expect("store");
    controller.lock().await.expect("lock");

    let restored = controller.restore_session().await.expect("restore");

    assert_eq!(restored.as_deref(), Some("token"));
    assert_eq!(fixture.device.challenge_count(), 1);
    assert!(!controller.state().is_locked);
}

#[tokio::test]
async fn test_clear_resets_to_no_locking() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::SystemPasscode)
        .await
        .expect("policy");
    controller
        .store_session("token".to_string())
        .await
        .expect("store");
    controller.lock().await.expect("lock");

    controller.clear().await.expect("clear");

    let state = controller.state();
    assert!(!state.vault_exists);
    assert_eq!(state.session, None);
    assert_eq!(state.policy, LockPolicy::NO_LOCKING);
    assert_eq!(state.lock_type, Some(LockType::NoLocking));
    assert!(!fixture
        .vault()
        .does_vault_exist()
        .await
        .expect("exists"));
}

#[tokio::test]
async fn test_unsupported_security_class_downgrades_silently() {
    let fixture = setup(MemoryDevice::without_security()).await;
    let controller = &fixture.controller;

    controller
        .set_lock_policy(LockType::Biometrics)
        .await
        .expect("no error surfaces");

    assert_eq!(controller.state().policy, LockPolicy::NO_LOCKING);
    assert_eq!(fixture.vault().config().policy(), LockPolicy::NO_LOCKING);

    controller
        .store_session("token".to_string())
        .await
        .expect("store after downgrade");
}

#[tokio::test]
async fn test_custom_passcode_set_verify_and_attempt_limit() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::CustomPasscode)
        .await
        .expect("policy");

    let operator = spawn_operator(controller, &[Some("1234")]);
    controller
        .store_session("X".to_string())
        .await
        .expect("store");
    assert_eq!(prompts_answered(operator).await, vec![PasscodeMode::Set]);

    controller.lock().await.expect("lock");
    let operator = spawn_operator(controller, &[Some("1234")]);
    let restored = controller.restore_session().await.expect("restore");
    assert_eq!(restored.as_deref(), Some("X"));
    assert_eq!(prompts_answered(operator).await, vec![PasscodeMode::Verify]);

    controller.lock().await.expect("lock");
    let operator = spawn_operator(controller, &[Some("0000"), Some("9999")]);
    let first = controller.unlock().await.expect_err("wrong passcode");
    assert_eq!(first.code(), Some(VaultErrorCode::AuthFailed));
    assert!(controller.state().vault_exists);

    let second = controller.unlock().await.expect_err("wrong passcode again");
    assert_eq!(second.code(), Some(VaultErrorCode::TooManyFailedAttempts));
    assert_eq!(
        prompts_answered(operator).await,
        vec![PasscodeMode::Verify, PasscodeMode::Verify]
    );

    let state = controller.state();
    assert!(!state.vault_exists);
    assert!(state.is_locked);
    assert_eq!(state.session, None);
    assert_eq!(state.policy, LockPolicy::NO_LOCKING);
}

#[tokio::test]
async fn test_cancelled_passcode_prompt_is_not_an_attempt() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::CustomPasscode)
        .await
        .expect("policy");
    let operator = spawn_operator(controller, &[Some("1234")]);
    controller
        .store_session("X".to_string())
        .await
        .expect("store");
    prompts_answered(operator).await;
    controller.lock().await.expect("lock");

    let operator = spawn_operator(controller, &[None]);
    let outcome = controller.unlock().await.expect("cancel is not an error");
    prompts_answered(operator).await;

    assert_eq!(outcome, UnlockOutcome::Cancelled);
    assert!(controller.state().is_locked);
    assert_eq!(controller.state().passcode_prompt, None);
    assert_eq!(fixture.vault().failed_attempts(), 0);
}

#[tokio::test]
async fn test_cancelled_biometric_prompt_keeps_vault_locked() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::Biometrics)
        .await
        .expect("policy");
    controller
        .store_session("token".to_string())
        .await
        .expect("store");
    controller.lock().await.expect("lock");

    fixture.device.set_challenge_outcome(ChallengeOutcome::Cancel);
    assert_eq!(
        controller.unlock().await.expect("unlock"),
        UnlockOutcome::Cancelled
    );
    assert!(controller.state().is_locked);

    fixture.device.set_challenge_outcome(ChallengeOutcome::Fail);
    let err = controller.unlock().await.expect_err("failed challenge");
    assert_eq!(err.code(), Some(VaultErrorCode::AuthFailed));
}

#[tokio::test]
async fn test_concurrent_unlocks_share_one_prompt() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::CustomPasscode)
        .await
        .expect("policy");
    let operator = spawn_operator(controller, &[Some("1234")]);
    controller
        .store_session("X".to_string())
        .await
        .expect("store");
    prompts_answered(operator).await;
    controller.lock().await.expect("lock");

    let operator = spawn_operator(controller, &[Some("1234")]);
    let (first, second) = tokio::time::timeout(FLOW_TIMEOUT, async {
        tokio::join!(controller.unlock(), controller.unlock())
    })
    .await
    .expect("unlocks finished");

    assert_eq!(first.expect("first unlock"), UnlockOutcome::Unlocked);
    assert_eq!(second.expect("second unlock"), UnlockOutcome::Unlocked);
    assert_eq!(prompts_answered(operator).await, vec![PasscodeMode::Verify]);
}

#[tokio::test]
async fn test_concurrent_biometric_unlocks_challenge_once() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::Biometrics)
        .await
        .expect("policy");
    controller
        .store_session("token".to_string())
        .await
        .expect("store");
    controller.lock().await.expect("lock");

    let (first, second) = tokio::join!(controller.unlock(), controller.restore_session());

    assert_eq!(first.expect("unlock"), UnlockOutcome::Unlocked);
    assert_eq!(second.expect("restore").as_deref(), Some("token"));
    assert_eq!(fixture.device.challenge_count(), 1);
}

#[tokio::test]
async fn test_switching_to_custom_passcode_with_data_asks_for_new_passcode() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .store_session("token".to_string())
        .await
        .expect("store");

    let operator = spawn_operator(controller, &[Some("2468")]);
    controller
        .set_lock_policy(LockType::CustomPasscode)
        .await
        .expect("policy");
    assert_eq!(prompts_answered(operator).await, vec![PasscodeMode::Set]);
    assert_eq!(
        controller.state().lock_type,
        Some(LockType::CustomPasscode)
    );

    controller.lock().await.expect("lock");
    let operator = spawn_operator(controller, &[Some("2468")]);
    assert_eq!(
        controller.restore_session().await.expect("restore").as_deref(),
        Some("token")
    );
    prompts_answered(operator).await;
}

#[tokio::test]
async fn test_unlock_on_load_unlocks_after_restart() {
    let fixture = setup(MemoryDevice::new()).await;
    fixture
        .controller
        .set_lock_policy(LockType::Biometrics)
        .await
        .expect("policy");
    fixture
        .controller
        .store_session("token".to_string())
        .await
        .expect("store");
    fixture.controller.lock().await.expect("lock");

    let restarted = fixture
        .restart(VaultConfig {
            unlock_vault_on_load: true,
            ..default_vault_config()
        })
        .await;

    let state = restarted.state();
    assert!(!state.is_locked);
    assert!(state.vault_exists);
    assert_eq!(state.lock_type, Some(LockType::Biometrics));
    assert_eq!(fixture.device.challenge_count(), 1);
}

#[tokio::test]
async fn test_state_listener_follows_lock_cycle() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    let listener = Arc::new(RecordingListener::default());
    controller.set_state_listener(listener.clone());

    controller
        .set_lock_policy(LockType::SystemPasscode)
        .await
        .expect("policy");
    controller
        .store_session("token".to_string())
        .await
        .expect("store");
    controller.lock().await.expect("lock");
    controller.unlock().await.expect("unlock");

    let locked: Vec<bool> = listener
        .states()
        .iter()
        .map(|state| state.is_locked)
        .collect();
    assert_eq!(locked, vec![false, false, true, false]);
}

#[tokio::test]
async fn test_submit_without_prompt_is_rejected() {
    let fixture = setup(MemoryDevice::new()).await;
    assert!(matches!(
        fixture.controller.submit_passcode("1234".to_string()),
        Err(VaultError::NoPendingPrompt)
    ));
    assert!(matches!(
        fixture.controller.cancel_passcode_prompt(),
        Err(VaultError::NoPendingPrompt)
    ));
}

#[tokio::test]
async fn test_lock_during_pending_unlock_is_kept() {
    let fixture = setup(MemoryDevice::new()).await;
    let controller = &fixture.controller;
    controller
        .set_lock_policy(LockType::CustomPasscode)
        .await
        .expect("policy");
    let operator = spawn_operator(controller, &[Some("1234")]);
    controller
        .store_session("X".to_string())
        .await
        .expect("store");
    prompts_answered(operator).await;
    controller.lock().await.expect("lock");

    let mut changes = controller.subscribe();
    let unlocking = tokio::spawn({
        let controller = Arc::clone(controller);
        async move { controller.unlock().await }
    });
    changes
        .wait_for(|state| state.passcode_prompt.is_some())
        .await
        .expect("verify prompt");

    let locking = tokio::spawn({
        let controller = Arc::clone(controller);
        async move { controller.lock().await }
    });
    tokio::task::yield_now().await;
    controller
        .submit_passcode("1234".to_string())
        .expect("answer prompt");

    let outcome = tokio::time::timeout(FLOW_TIMEOUT, unlocking)
        .await
        .expect("unlock finished")
        .expect("unlock task");
    assert_eq!(outcome.expect("unlock"), UnlockOutcome::Unlocked);
    tokio::time::timeout(FLOW_TIMEOUT, locking)
        .await
        .expect("lock finished")
        .expect("lock task")
        .expect("lock");

    assert!(fixture.vault().is_locked().await.expect("locked"));
    assert!(controller.state().is_locked);
}

#[tokio::test]
async fn test_passcode_request_after_controller_dropped_is_cancelled() {
    let fixture = setup(MemoryDevice::new()).await;
    fixture
        .controller
        .set_lock_policy(LockType::CustomPasscode)
        .await
        .expect("policy");
    let operator = spawn_operator(&fixture.controller, &[Some("1234")]);
    fixture
        .controller
        .store_session("X".to_string())
        .await
        .expect("store");
    prompts_answered(operator).await;
    fixture.controller.lock().await.expect("lock");

    let vault = fixture.vault();
    let Fixture { controller, .. } = fixture;
    drop(controller);

    let err = tokio::time::timeout(FLOW_TIMEOUT, vault.unlock())
        .await
        .expect("unlock finished")
        .expect_err("nobody to answer");
    assert_eq!(err.code(), Some(VaultErrorCode::UserCanceledInteraction));
    assert!(vault.is_locked().await.expect("locked"));
    assert_eq!(vault.failed_attempts(), 0);
}
