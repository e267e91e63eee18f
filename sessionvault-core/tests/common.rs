//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sessionvault_core::platform::{MemoryDevice, MemoryPlatform, MemoryVault};
use sessionvault_core::{
    default_vault_config, PasscodeMode, SessionVault, VaultConfig, VaultState, VaultStateListener,
};
use tokio::task::JoinHandle;

/// Upper bound for any flow waiting on an operator.
pub const FLOW_TIMEOUT: Duration = Duration::from_secs(5);

/// Memory platform with an initialized controller on top.
pub struct Fixture {
    /// Platform the controller opened its vault on.
    pub platform: Arc<MemoryPlatform>,
    /// Device behind the platform.
    pub device: Arc<MemoryDevice>,
    /// Controller under test.
    pub controller: Arc<SessionVault>,
}

impl Fixture {
    /// Memory vault behind the controller.
    pub fn vault(&self) -> Arc<MemoryVault> {
        self.platform
            .vault(&default_vault_config().key)
            .expect("vault opened")
    }

    /// A second controller on the same platform, as after an app restart.
    pub async fn restart(&self, config: VaultConfig) -> Arc<SessionVault> {
        let controller = SessionVault::with_config(self.platform.clone(), config);
        controller.initialize().await.expect("initialize");
        controller
    }
}

/// Initialized controller over a fresh memory platform.
pub async fn setup(device: MemoryDevice) -> Fixture {
    let device = Arc::new(device);
    let platform = Arc::new(MemoryPlatform::new(device.clone()));
    let controller = SessionVault::new(platform.clone());
    controller.initialize().await.expect("initialize");
    Fixture {
        platform,
        device,
        controller,
    }
}

/// Plays the operator: answers custom passcode prompts in order.
///
/// `None` cancels the prompt. The task ends once every answer is given and
/// returns the modes of the prompts it saw.
pub fn spawn_operator(
    controller: &Arc<SessionVault>,
    answers: &[Option<&str>],
) -> JoinHandle<Vec<PasscodeMode>> {
    let controller = Arc::clone(controller);
    let mut changes = controller.subscribe();
    let mut answers: Vec<Option<String>> = answers
        .iter()
        .map(|answer| answer.map(str::to_string))
        .collect();
    answers.reverse();

    tokio::spawn(async move {
        let mut seen = Vec::new();
        while !answers.is_empty() {
            if let Some(mode) = controller.state().passcode_prompt {
                let answered = match answers.last().cloned().flatten() {
                    Some(passcode) => controller.submit_passcode(passcode),
                    None => controller.cancel_passcode_prompt(),
                };
                if answered.is_ok() {
                    answers.pop();
                    seen.push(mode);
                    continue;
                }
            }
            if changes.changed().await.is_err() {
                break;
            }
        }
        seen
    })
}

/// Waits for the operator task and returns the prompts it answered.
pub async fn prompts_answered(operator: JoinHandle<Vec<PasscodeMode>>) -> Vec<PasscodeMode> {
    tokio::time::timeout(FLOW_TIMEOUT, operator)
        .await
        .expect("operator finished")
        .expect("operator task")
}

/// Listener recording every published state.
#[derive(Default)]
pub struct RecordingListener {
    states: Mutex<Vec<VaultState>>,
}

impl RecordingListener {
    /// States published so far, oldest first.
    pub fn states(&self) -> Vec<VaultState> {
        self.states.lock().unwrap().clone()
    }
}

impl VaultStateListener for RecordingListener {
    fn on_state_changed(&self, state: VaultState) {
        self.states.lock().unwrap().push(state);
    }
}
