//! Confirmation Gate: suspends a write tool call until the user decides.
//!
//! Holds at most one pending action and the oneshot sender that releases its
//! waiter. A dropped sender reads as a denial on the waiting side, so no turn
//! can be stranded by teardown.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;

use super::errors::AgentError;
use super::types::PendingAction;

type Slot = Option<(PendingAction, oneshot::Sender<bool>)>;

/// Single-slot allow/deny channel.
#[derive(Default)]
pub struct ConfirmationGate {
    slot: Mutex<Slot>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Park an action. The receiver yields `true` (allow) or `false` (deny);
    /// a receive error means the gate was torn down and counts as deny.
    pub fn request(&self, action: PendingAction) -> Result<oneshot::Receiver<bool>, AgentError> {
        let mut slot = self.lock();
        if let Some((outstanding, _)) = slot.as_ref() {
            return Err(AgentError::Confirmation {
                reason: format!(
                    "'{}' is already awaiting confirmation",
                    outstanding.tool_name
                ),
            });
        }
        let (tx, rx) = oneshot::channel();
        *slot = Some((action, tx));
        Ok(rx)
    }

    /// Release the waiter. Returns `false` when nothing was pending.
    pub fn resolve(&self, confirmed: bool) -> bool {
        let Some((action, tx)) = self.lock().take() else {
            tracing::warn!(confirmed, "no pending confirmation, response ignored");
            return false;
        };
        tracing::info!(tool = %action.tool_name, confirmed, "confirmation resolved");
        if tx.send(confirmed).is_err() {
            tracing::warn!(tool = %action.tool_name, "confirmation waiter already gone");
        }
        true
    }

    /// The action currently awaiting a decision.
    pub fn pending(&self) -> Option<PendingAction> {
        self.lock().as_ref().map(|(action, _)| action.clone())
    }

    /// Deny whatever is pending. Returns whether anything was.
    pub fn abandon(&self) -> bool {
        match self.lock().take() {
            Some((action, tx)) => {
                tracing::info!(tool = %action.tool_name, "pending confirmation auto-denied");
                let _ = tx.send(false);
                true
            }
            None => false,
        }
    }
}
