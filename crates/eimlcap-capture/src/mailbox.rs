use std::sync::{Mutex, MutexGuard};

/// Single-slot, latest-wins handoff between two threads.
///
/// `publish` replaces whatever is in the slot; `try_take` empties it. The
/// lock is held only for the swap, never across I/O.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Store `value`, replacing any unread one. Returns true if an unread
    /// value was overwritten.
    pub fn publish(&self, value: T) -> bool {
        let previous = self.lock().replace(value);
        previous.is_some()
    }

    /// Take the pending value, if any. Never blocks on an empty slot.
    pub fn try_take(&self) -> Option<T> {
        self.lock().take()
    }

    /// True if a value is waiting.
    pub fn has_pending(&self) -> bool {
        self.lock().is_some()
    }

    // A panic while holding the lock cannot leave the Option half-written.
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
