// SPDX-License-Identifier: MIT OR Apache-2.0
use super::LockSide;
use super::inner::RwLock;
use super::policy::{Policy, Role};
use crate::cancel::{CancelToken, Cancelled};
use crate::guard::WriteGuard;
use std::time::Duration;

/// The writer role of a lock, as a standalone handle.
///
/// # Examples
///
/// ```
/// use wp_lock::{LockSide, ONE_SECOND, WriterPreferenceLock};
///
/// let lock = WriterPreferenceLock::new();
/// let writer = lock.write_side();
///
/// if writer.attempt(ONE_SECOND) {
///     // exclusive section
///     writer.release();
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WriterSide<'a, P: Policy> {
    lock: &'a RwLock<P>,
}

impl<P: Policy> LockSide for WriterSide<'_, P> {
    fn acquire(&self) {
        let granted = self.lock.acquire_as(Role::Write, None, None);
        debug_assert_eq!(granted, Ok(true));
    }

    fn acquire_cancellable(&self, cancel: &CancelToken) -> Result<(), Cancelled> {
        self.lock.acquire_as(Role::Write, Some(cancel), None)?;
        Ok(())
    }

    fn attempt(&self, timeout: Duration) -> bool {
        self.lock
            .acquire_as(Role::Write, None, Some(timeout))
            .unwrap_or(false)
    }

    fn attempt_cancellable(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<bool, Cancelled> {
        self.lock.acquire_as(Role::Write, Some(cancel), Some(timeout))
    }

    fn release(&self) {
        self.lock.release_as(Role::Write);
    }
}

impl<P: Policy> RwLock<P> {
    /// A handle to the writer role of this lock.
    pub fn write_side(&self) -> WriterSide<'_, P> {
        WriterSide { lock: self }
    }

    /// Blocks until the calling thread holds the lock exclusively.
    ///
    /// While parked here the caller counts as a waiting writer, which keeps
    /// threads without a read hold from starting to read.
    ///
    /// With the [`Reentrant`](super::Reentrant) policy a reader may call this to
    /// upgrade. It returns once every other reader thread has left; if one never
    /// does, it never returns.
    pub fn acquire_write(&self) {
        self.write_side().acquire();
    }

    /// Like [`acquire_write`](Self::acquire_write), but gives up when `cancel` fires.
    ///
    /// A cancelled call leaves the lock as if it had never been made, and wakes
    /// any readers that were only held back by this waiting writer.
    pub fn acquire_write_cancellable(&self, cancel: &CancelToken) -> Result<(), Cancelled> {
        self.write_side().acquire_cancellable(cancel)
    }

    /// Tries to take the write hold, waiting at most `timeout`.
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
    /// lock.acquire_read();
    /// assert!(!lock.try_acquire_write(Duration::ZERO));
    /// lock.release_read();
    /// assert!(lock.try_acquire_write(Duration::ZERO));
    /// lock.release_write();
    /// ```
    pub fn try_acquire_write(&self, timeout: Duration) -> bool {
        self.write_side().attempt(timeout)
    }

    /// Like [`try_acquire_write`](Self::try_acquire_write), but also gives up when
    /// `cancel` fires.
    pub fn try_acquire_write_cancellable(
        &self,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<bool, Cancelled> {
        self.write_side().attempt_cancellable(timeout, cancel)
    }

    /// Gives up one write hold of the calling thread. Never blocks.
    ///
    /// The calling thread must own the write hold.
    pub fn release_write(&self) {
        self.write_side().release();
    }

    /// Takes the write hold, released when the guard drops.
    ///
    /// # Examples
    ///
    /// ```
    /// use wp_lock::WriterPreferenceLock;
    /// use std::time::Duration;
    ///
    /// let lock = WriterPreferenceLock::new();
    /// let hold = lock.write();
    /// assert!(lock.stats().has_writer);
    /// drop(hold);
    /// assert!(lock.try_read(Duration::ZERO).is_some());
    /// ```
    pub fn write(&self) -> WriteGuard<'_, P> {
        self.acquire_write();
        WriteGuard::new(self)
    }

    /// Tries to take a scoped write hold, waiting at most `timeout`.
    pub fn try_write(&self, timeout: Duration) -> Option<WriteGuard<'_, P>> {
        self.try_acquire_write(timeout).then(|| WriteGuard::new(self))
    }
}
