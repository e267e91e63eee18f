//! Single-slot custom passcode prompt.
//!
//! The vault asks for a passcode and waits; the operator answers through the
//! controller. At most one request is outstanding at a time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::{VaultError, VaultResult};
use crate::platform::{PasscodeMode, PasscodeResponse};

struct Pending {
    mode: PasscodeMode,
    reply: oneshot::Sender<PasscodeResponse>,
}

/// Slot holding the pending passcode request.
#[derive(Default)]
pub(crate) struct PasscodePrompt {
    slot: Mutex<Option<Pending>>,
}

impl PasscodePrompt {
    fn slot(&self) -> MutexGuard<'_, Option<Pending>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the slot for a new request.
    ///
    /// A request whose waiter went away no longer occupies the slot.
    pub(crate) fn open(
        &self,
        mode: PasscodeMode,
    ) -> VaultResult<oneshot::Receiver<PasscodeResponse>> {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|pending| !pending.reply.is_closed()) {
            return Err(VaultError::PromptAlreadyPending);
        }
        let (reply, answer) = oneshot::channel();
        *slot = Some(Pending { mode, reply });
        Ok(answer)
    }

    /// Answers the pending request and frees the slot.
    pub(crate) fn resolve(&self, response: PasscodeResponse) -> VaultResult<PasscodeMode> {
        let pending = self.slot().take().ok_or(VaultError::NoPendingPrompt)?;
        pending
            .reply
            .send(response)
            .map_err(|_| VaultError::NoPendingPrompt)?;
        Ok(pending.mode)
    }

    /// Mode of the pending request.
    pub(crate) fn pending(&self) -> Option<PasscodeMode> {
        self.slot()
            .as_ref()
            .filter(|pending| !pending.reply.is_closed())
            .map(|pending| pending.mode)
    }

    /// Drops the pending request; its waiter sees a cancellation.
    pub(crate) fn abandon(&self) {
        self.slot().take();
    }
}
