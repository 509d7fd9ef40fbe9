//! A write-once value that any number of tasks can wait on.
//!
//! A [`Signal`] starts pending and resolves exactly once. Readers that arrive after
//! the write observe the value immediately, readers that arrive before it are woken
//! when it lands. Handles are cheap to clone and all clones share the same slot.

use std::fmt;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

pub struct Signal<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    slot: Mutex<Option<T>>,
    notify: Notify,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self { shared: Arc::new(Shared { slot: Mutex::new(None), notify: Notify::new() }) }
    }

    /// Resolves the signal.
    ///
    /// The first write wins. Later writes hand their value back untouched.
    pub fn write(&self, value: T) -> Result<(), T> {
        self.write_then(value, || {})
    }

    /// Like [`write`](Self::write), running `then` after a successful write and before
    /// any other writer or reader can observe the slot.
    pub fn write_then<F: FnOnce()>(&self, value: T, then: F) -> Result<(), T> {
        let mut slot = self.lock();
        if slot.is_some() {
            return Err(value);
        }
        *slot = Some(value);
        then();
        drop(slot);

        self.shared.notify.notify_waiters();
        Ok(())
    }

    pub fn is_written(&self) -> bool {
        self.lock().is_some()
    }

    /// Waits until the signal has been written.
    pub async fn written(&self) {
        loop {
            let mut notified = pin!(self.shared.notify.notified());
            // register before checking, a write in between would otherwise be missed
            notified.as_mut().enable();
            if self.is_written() {
                return;
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.shared.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> Signal<T> {
    /// Waits for the value and returns a copy of it.
    pub async fn read(&self) -> T {
        loop {
            self.written().await;
            let value = self.lock().clone();
            if let Some(value) = value {
                return value;
            }
        }
    }

    /// Returns a copy of the value if it has already been written.
    pub fn peek(&self) -> Option<T> {
        self.lock().clone()
    }
}

impl<U> Signal<Option<U>> {
    /// Waits for the value and moves it out.
    ///
    /// The signal stays resolved, later readers observe `None`.
    pub async fn take(&self) -> Option<U> {
        self.written().await;
        self.lock().as_mut().and_then(Option::take)
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal").field("written", &self.is_written()).finish()
    }
}
