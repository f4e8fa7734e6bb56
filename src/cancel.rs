// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cancellation for blocked acquisitions.
//!
//! Threads cannot be interrupted from the outside, so blocking operations that
//! should be abortable take a [`CancelToken`]. Cancelling the token wakes every
//! thread currently parked under it; each one undoes its waiting bookkeeping and
//! returns [`Cancelled`].

use crate::spinlock::Spinlock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread};

/// Error returned when a blocking operation was cancelled through its [`CancelToken`].
///
/// This is distinct from a timeout, which is reported as `false`.
///
/// # Examples
///
/// ```
/// use wp_lock::{CancelToken, Cancelled, WriterPreferenceLock};
///
/// let lock = WriterPreferenceLock::new();
/// let token = CancelToken::new();
/// token.cancel();
///
/// // An already-cancelled token fails before touching the lock.
/// assert_eq!(lock.acquire_read_cancellable(&token), Err(Cancelled));
/// assert_eq!(lock.stats().active_readers, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation cancelled")
    }
}

impl std::error::Error for Cancelled {}

#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    watchers: Spinlock<Vec<Thread>>,
}

/// A shareable, one-shot cancellation signal.
///
/// Clones share the same signal. Once [`cancel`](Self::cancel) has been called the
/// token stays cancelled.
///
/// # Examples
///
/// ```
/// use wp_lock::{CancelToken, Cancelled, WriterPreferenceLock};
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
///
/// let lock = Arc::new(WriterPreferenceLock::new());
/// lock.acquire_write();
///
/// let token = CancelToken::new();
/// let waiter = {
///     let lock = Arc::clone(&lock);
///     let token = token.clone();
///     thread::spawn(move || lock.acquire_read_cancellable(&token))
/// };
///
/// thread::sleep(Duration::from_millis(20));
/// token.cancel();
/// assert_eq!(waiter.join().unwrap(), Err(Cancelled));
/// lock.release_write();
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Cancels the token and wakes every thread currently blocked under it.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
        let watchers = self.shared.watchers.with_mut(std::mem::take);
        log::trace!("cancel: waking {} blocked thread(s)", watchers.len());
        for thread in watchers {
            thread.unpark();
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Registers the current thread to be unparked on cancellation.
    ///
    /// Register before the final `is_cancelled` check that precedes parking,
    /// otherwise a cancel landing in between is missed until the next wakeup.
    pub(crate) fn watch(&self) -> Watch<'_> {
        let current = thread::current();
        self.shared.watchers.with_mut(|watchers| {
            watchers.push(current);
        });
        Watch { token: self }
    }
}

/// Deregisters the current thread from a token when dropped.
pub(crate) struct Watch<'a> {
    token: &'a CancelToken,
}

impl Drop for Watch<'_> {
    fn drop(&mut self) {
        let id = thread::current().id();
        self.token.shared.watchers.with_mut(|watchers| {
            if let Some(pos) = watchers.iter().position(|t| t.id() == id) {
                watchers.swap_remove(pos);
            }
        });
    }
}

/// `true` if an optional token has been cancelled.
pub(crate) fn is_cancelled(token: Option<&CancelToken>) -> bool {
    token.is_some_and(CancelToken::is_cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        // cancelling twice is harmless
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_watch_deregisters_on_drop() {
        let token = CancelToken::new();
        {
            let _watch = token.watch();
            assert_eq!(token.shared.watchers.with_mut(|w| w.len()), 1);
        }
        assert_eq!(token.shared.watchers.with_mut(|w| w.len()), 0);
    }

    #[test]
    fn test_cancel_unparks_watcher() {
        let token = CancelToken::new();
        let (tx, rx) = std::sync::mpsc::channel();
        let clone = token.clone();
        let handle = thread::spawn(move || {
            let _watch = clone.watch();
            tx.send(()).unwrap();
            while !clone.is_cancelled() {
                thread::park();
            }
        });
        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(10));
        token.cancel();
        handle.join().unwrap();
    }

    #[test]
    fn test_display() {
        assert_eq!(Cancelled.to_string(), "operation cancelled");
    }
}
