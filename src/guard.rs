// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scoped holds on an [`RwLock`].
//!
//! The locks in this crate guard no data; a guard only stands for a hold and
//! gives it back when dropped. Holds belong to the thread that took them, so
//! guards are neither `Send` nor `Sync`.

use crate::rwlock::{Policy, RwLock};
use std::marker::PhantomData;

/// Releases one read hold when dropped.
///
/// # Examples
///
/// ```
/// use wp_lock::ReentrantLock;
///
/// let lock = ReentrantLock::new();
/// let outer = lock.read();
/// let inner = lock.read(); // nesting is fine with the reentrant policy
/// assert_eq!(lock.stats().active_readers, 2);
/// drop(inner);
/// drop(outer);
/// assert_eq!(lock.stats().active_readers, 0);
/// ```
#[must_use = "the read hold is released as soon as the guard is dropped"]
pub struct ReadGuard<'a, P: Policy> {
    lock: &'a RwLock<P>,
    _not_send: PhantomData<*const ()>,
}

/// Releases one write hold when dropped.
///
/// # Examples
///
/// ```
/// use wp_lock::ReentrantLock;
/// use std::thread;
///
/// let lock = ReentrantLock::new();
/// let me = thread::current().id();
/// {
///     let _write = lock.write();
///     // downgrade: the writer may also read
///     let _read = lock.read();
///     assert!(lock.is_write_held_by(me));
/// }
/// assert!(!lock.is_write_held_by(me));
/// ```
#[must_use = "the write hold is released as soon as the guard is dropped"]
pub struct WriteGuard<'a, P: Policy> {
    lock: &'a RwLock<P>,
    _not_send: PhantomData<*const ()>,
}

impl<'a, P: Policy> ReadGuard<'a, P> {
    /// Wraps a read hold the current thread already has.
    pub(crate) fn new(lock: &'a RwLock<P>) -> Self {
        ReadGuard {
            lock,
            _not_send: PhantomData,
        }
    }

    /// The lock this hold is on.
    pub fn lock(&self) -> &'a RwLock<P> {
        self.lock
    }
}

impl<'a, P: Policy> WriteGuard<'a, P> {
    /// Wraps a write hold the current thread already has.
    pub(crate) fn new(lock: &'a RwLock<P>) -> Self {
        WriteGuard {
            lock,
            _not_send: PhantomData,
        }
    }

    /// The lock this hold is on.
    pub fn lock(&self) -> &'a RwLock<P> {
        self.lock
    }
}

impl<P: Policy> Drop for ReadGuard<'_, P> {
    fn drop(&mut self) {
        self.lock.release_read();
    }
}

impl<P: Policy> Drop for WriteGuard<'_, P> {
    fn drop(&mut self) {
        self.lock.release_write();
    }
}

// ================================================================================================
// Boilerplate trait implementations
// ================================================================================================

impl<P: Policy> std::fmt::Debug for ReadGuard<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadGuard")
            .field("lock", self.lock)
            .finish()
    }
}

impl<P: Policy> std::fmt::Debug for WriteGuard<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteGuard")
            .field("lock", self.lock)
            .finish()
    }
}
