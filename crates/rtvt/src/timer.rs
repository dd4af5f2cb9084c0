//! Single-slot task handle.
//!
//! Heartbeat and reconnect timers are each held in a `TaskSlot`. Installing a
//! new task aborts whatever the slot held, so at most one instance of a timer
//! is ever pending.

use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    handle: Option<JoinHandle<()>>,
}

impl TaskSlot {
    /// Install `handle`, aborting the previous occupant.
    pub fn replace(&mut self, handle: JoinHandle<()>) {
        if let Some(old) = self.handle.replace(handle) {
            old.abort();
        }
    }

    /// Abort and clear.
    pub fn cancel(&mut self) {
        if let Some(old) = self.handle.take() {
            old.abort();
        }
    }

    /// Clear without aborting. Used by a task that has fired and keeps
    /// running outside the slot.
    pub fn release(&mut self) {
        self.handle.take();
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}
