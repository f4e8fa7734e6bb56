// SPDX-License-Identifier: MIT OR Apache-2.0
use super::LockSide;
use super::inner::RwLock;
use super::policy::{Policy, Role};
use crate::cancel::{CancelToken, Cancelled};
use crate::guard::ReadGuard;
use std::time::Duration;

/// The reader role of a lock, as a standalone handle.
///
/// Useful where code is written against [`LockSide`] and should not care which
/// role it was given.
///
/// # Examples
///
/// ```
/// use wp_lock::{LockSide, WriterPreferenceLock};
/// use std::time::Duration;
///
/// let lock = WriterPreferenceLock::new();
/// let readers = lock.read_side();
///
/// readers.acquire();
/// assert!(readers.attempt(Duration::ZERO)); // readers share
/// readers.release();
/// readers.release();
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ReaderSide<'a, P: Policy> {
    lock: &'a RwLock<P>,
}

impl<P: Policy> LockSide for ReaderSide<'_, P> {
    fn acquire(&self) {
        let granted = self.lock.acquire_as(Role::Read, None, None);
        debug_assert_eq!(granted, Ok(true));
    }

    fn acquire_cancellable(&self, cancel: &CancelToken) -> Result<(), Cancelled> {
        self.lock.acquire_as(Role::Read, Some(cancel), None)?;
        Ok(())
    }

    fn attempt(&self, timeout: Duration) -> bool {
        self.lock
            .acquire_as(Role::Read, None, Some(timeout))
            .unwrap_or(false)
    }

    fn attempt_cancellable(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<bool, Cancelled> {
        self.lock.acquire_as(Role::Read, Some(cancel), Some(timeout))
    }

    fn release(&self) {
        self.lock.release_as(Role::Read);
    }
}

impl<P: Policy> RwLock<P> {
    /// A handle to the reader role of this lock.
    pub fn read_side(&self) -> ReaderSide<'_, P> {
        ReaderSide { lock: self }
    }

    /// Blocks until the calling thread holds the lock for reading.
    ///
    /// While a writer holds the lock, or is waiting for it, a thread without a
    /// read hold parks here.
    pub fn acquire_read(&self) {
        self.read_side().acquire();
    }

    /// Like [`acquire_read`](Self::acquire_read), but gives up when `cancel` fires.
    ///
    /// A cancelled call leaves the lock as if it had never been made.
    pub fn acquire_read_cancellable(&self, cancel: &CancelToken) -> Result<(), Cancelled> {
        self.read_side().acquire_cancellable(cancel)
    }

    /// Tries to take a read hold, waiting at most `timeout`.
    ///
    /// With a zero timeout this is a single admission check that never parks.
    ///
    /// # Examples
    ///
    /// ```
    /// use wp_lock::WriterPreferenceLock;
    /// use std::time::Duration;
    ///
    /// let lock = WriterPreferenceLock::new();
    /// assert!(lock.try_acquire_read(Duration::ZERO));
    /// lock.release_read();
    /// ```
    pub fn try_acquire_read(&self, timeout: Duration) -> bool {
        self.read_side().attempt(timeout)
    }

    /// Like [`try_acquire_read`](Self::try_acquire_read), but also gives up when
    /// `cancel` fires.
    pub fn try_acquire_read_cancellable(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<bool, Cancelled> {
        self.read_side().attempt_cancellable(timeout, cancel)
    }

    /// Gives up one read hold of the calling thread. Never blocks.
    ///
    /// The calling thread must hold the lock for reading.
    pub fn release_read(&self) {
        self.read_side().release();
    }

    /// Takes a read hold released when the guard drops.
    ///
    /// # Examples
    ///
    /// ```
    /// use wp_lock::WriterPreferenceLock;
    ///
    /// let lock = WriterPreferenceLock::new();
    /// {
    ///     let _first = lock.read();
    ///     assert_eq!(lock.stats().active_readers, 1);
    /// }
    /// assert_eq!(lock.stats().active_readers, 0);
    /// ```
    pub fn read(&self) -> ReadGuard<'_, P> {
        self.acquire_read();
        ReadGuard::new(self)
    }

    /// Tries to take a scoped read hold, waiting at most `timeout`.
    pub fn try_read(&self, timeout: Duration) -> Option<ReadGuard<'_, P>> {
        self.try_acquire_read(timeout).then(|| ReadGuard::new(self))
    }
}
