// SPDX-License-Identifier: MIT OR Apache-2.0
//! A counter of outstanding work that threads can wait to drain.
//!
//! [`down`](Semaphore::down) registers one unit of outstanding work,
//! [`up`](Semaphore::up) marks one done, and [`wait_for`](Semaphore::wait_for)
//! blocks until nothing is outstanding. The typical use is "start a job on
//! another thread, then wait until it (and any others) have finished".
//!
//! # Examples
//!
//! ```
//! use wp_lock::Semaphore;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let pending = Arc::new(Semaphore::new());
//! for _ in 0..4 {
//!     pending.down();
//!     let pending = Arc::clone(&pending);
//!     thread::spawn(move || {
//!         // work
//!         pending.up();
//!     });
//! }
//! pending.wait_for();
//! assert_eq!(pending.count(), 0);
//! ```

use crate::cancel::{self, CancelToken, Cancelled};
use crate::spinlock::Spinlock;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    count: usize,
    waiting_threads: Vec<Thread>,
}

/// A counting semaphore whose waiters wake when the count reaches zero.
#[derive(Debug, Default)]
pub struct Semaphore {
    inner: Spinlock<Inner>,
}

impl Semaphore {
    /// Creates a semaphore with nothing outstanding.
    pub const fn new() -> Self {
        Semaphore::with_count(0)
    }

    /// Creates a semaphore with `count` units already outstanding.
    ///
    /// # Examples
    ///
    /// ```
    /// use wp_lock::Semaphore;
    /// use std::time::Duration;
    ///
    /// let semaphore = Semaphore::with_count(1);
    /// assert!(!semaphore.wait_for_timeout(Duration::ZERO));
    /// semaphore.up();
    /// assert!(semaphore.wait_for_timeout(Duration::ZERO));
    /// ```
    pub const fn with_count(count: usize) -> Self {
        Semaphore {
            inner: Spinlock::new(Inner {
                count,
                waiting_threads: Vec::new(),
            }),
        }
    }

    /// Registers one more unit of outstanding work. Never blocks.
    pub fn down(&self) {
        self.inner.with_mut(|inner| inner.count += 1);
    }

    /// Marks one unit of work done, waking every waiter if none remain.
    ///
    /// Calling this with nothing outstanding is a caller bug. It is checked in
    /// debug builds (or with the `strict` feature) and otherwise ignored.
    pub fn up(&self) {
        let released = self.try_up();
        crate::contract!(released, "Semaphore::up with nothing outstanding");
        if !released {
            log::warn!("Semaphore::up with nothing outstanding, ignored");
        }
    }

    /// Marks one unit of work done if any is outstanding.
    ///
    /// Returns `false`, changing nothing, when the count is already zero.
    pub fn try_up(&self) -> bool {
        let woken = self.inner.with_mut(|inner| {
            if inner.count == 0 {
                return None;
            }
            inner.count -= 1;
            Some(if inner.count == 0 {
                std::mem::take(&mut inner.waiting_threads)
            } else {
                Vec::new()
            })
        });
        match woken {
            None => false,
            Some(threads) => {
                for thread in threads {
                    thread.unpark();
                }
                true
            }
        }
    }

    /// The number of outstanding units.
    pub fn count(&self) -> usize {
        self.inner.with_mut(|inner| inner.count)
    }

    /// Blocks until nothing is outstanding.
    pub fn wait_for(&self) {
        let drained = self.wait(None, None);
        debug_assert_eq!(drained, Ok(true));
    }

    /// Waits at most `timeout` for the count to reach zero.
    pub fn wait_for_timeout(&self, timeout: Duration) -> bool {
        self.wait(None, Some(timeout)).unwrap_or(false)
    }

    /// Blocks until nothing is outstanding, or fails once `cancel` fires.
    ///
    /// # Examples
    ///
    /// ```
    /// use wp_lock::{CancelToken, Cancelled, Semaphore};
    ///
    /// let semaphore = Semaphore::with_count(1);
    /// let token = CancelToken::new();
    /// token.cancel();
    /// assert_eq!(semaphore.wait_for_cancellable(&token), Err(Cancelled));
    /// ```
    pub fn wait_for_cancellable(&self, cancel: &CancelToken) -> Result<(), Cancelled> {
        self.wait(Some(cancel), None)?;
        Ok(())
    }

    fn wait(
        &self,
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<bool, Cancelled> {
        if cancel::is_cancelled(cancel) {
            return Err(Cancelled);
        }
        let current = thread::current();
        let id = current.id();
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let _watch = cancel.map(CancelToken::watch);
        loop {
            let drained = self.inner.with_mut(|inner| {
                if inner.count == 0 {
                    if let Some(pos) = inner.waiting_threads.iter().position(|t| t.id() == id) {
                        inner.waiting_threads.swap_remove(pos);
                    }
                    true
                } else {
                    if !inner.waiting_threads.iter().any(|t| t.id() == id) {
                        inner.waiting_threads.push(current.clone());
                    }
                    false
                }
            });
            if drained {
                return Ok(true);
            }
            if cancel::is_cancelled(cancel) {
                self.forget(id);
                return Err(Cancelled);
            }
            match deadline {
                None => thread::park(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.forget(id);
                        return Ok(false);
                    }
                    thread::park_timeout(deadline - now);
                }
            }
        }
    }

    fn forget(&self, id: thread::ThreadId) {
        self.inner.with_mut(|inner| {
            if let Some(pos) = inner.waiting_threads.iter().position(|t| t.id() == id) {
                inner.waiting_threads.swap_remove(pos);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;

    #[test]
    fn test_wait_for_returns_when_drained() {
        let semaphore = Arc::new(Semaphore::new());
        semaphore.down();
        semaphore.down();
        assert_eq!(semaphore.count(), 2);

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let semaphore = Arc::clone(&semaphore);
            thread::spawn(move || {
                semaphore.wait_for();
                tx.send(()).unwrap();
            })
        };

        semaphore.up();
        assert!(rx.recv_timeout(Duration::from_millis(30)).is_err());
        semaphore.up();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_wait_for_timeout() {
        let semaphore = Semaphore::with_count(1);
        let start = Instant::now();
        assert!(!semaphore.wait_for_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(semaphore.inner.with_mut(|inner| inner.waiting_threads.len()), 0);
    }

    #[test]
    fn test_try_up_at_zero() {
        let semaphore = Semaphore::new();
        assert!(!semaphore.try_up());
        semaphore.down();
        assert!(semaphore.try_up());
        assert_eq!(semaphore.count(), 0);
    }

    #[test]
    fn test_cancel_while_waiting() {
        let semaphore = Arc::new(Semaphore::with_count(1));
        let token = CancelToken::new();
        let waiter = {
            let semaphore = Arc::clone(&semaphore);
            let token = token.clone();
            thread::spawn(move || semaphore.wait_for_cancellable(&token))
        };
        while semaphore.inner.with_mut(|inner| inner.waiting_threads.is_empty()) {
            thread::yield_now();
        }
        token.cancel();
        assert_eq!(waiter.join().unwrap(), Err(Cancelled));
        assert_eq!(semaphore.count(), 1);
        assert_eq!(semaphore.inner.with_mut(|inner| inner.waiting_threads.len()), 0);
    }

    #[test]
    #[cfg(any(debug_assertions, feature = "strict"))]
    #[should_panic(expected = "Semaphore::up with nothing outstanding")]
    fn test_up_at_zero_is_caught() {
        Semaphore::new().up();
    }

    #[test]
    #[cfg(not(any(debug_assertions, feature = "strict")))]
    fn test_unchecked_up_at_zero_is_ignored() {
        let semaphore = Semaphore::new();
        semaphore.up();
        assert_eq!(semaphore.count(), 0);
        assert!(semaphore.wait_for_timeout(Duration::ZERO));
    }
}
