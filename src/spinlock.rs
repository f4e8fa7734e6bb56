// SPDX-License-Identifier: MIT OR Apache-2.0
//! The private exclusive section every lock in this crate keeps its bookkeeping behind.
//!
//! Counters, owner fields and wait lists are only ever touched inside
//! [`Spinlock::with_mut`]. Nothing parks while holding it, so sections stay a few
//! instructions long and spinning beats a kernel round trip.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Spins this many times before yielding the timeslice.
///
/// On an oversubscribed machine the holder may be descheduled mid-section;
/// yielding lets it finish instead of burning the waiter's quantum.
const SPINS_BEFORE_YIELD: u32 = 64;

/// A spinlock that only hands out scoped access.
#[derive(Debug)]
pub(crate) struct Spinlock<T> {
    data: UnsafeCell<T>,
    locked: AtomicBool,
}

impl<T> Spinlock<T> {
    pub(crate) const fn new(data: T) -> Self {
        Spinlock {
            data: UnsafeCell::new(data),
            locked: AtomicBool::new(false),
        }
    }

    /// Runs `f` with exclusive access to the protected data.
    ///
    /// The lock is released when `f` returns or unwinds.
    pub(crate) fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut T) -> R,
    {
        let mut spins = 0;
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spins += 1;
            if spins < SPINS_BEFORE_YIELD {
                std::hint::spin_loop();
            } else {
                spins = 0;
                std::thread::yield_now();
            }
        }

        let _unlock = Unlock(&self.locked);
        // SAFETY: `locked` was false and we swapped it to true, so no one else
        // is inside a section until `_unlock` drops.
        f(unsafe { &mut *self.data.get() })
    }
}

struct Unlock<'a>(&'a AtomicBool);

impl Drop for Unlock<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

impl<T: Default> Default for Spinlock<T> {
    fn default() -> Self {
        Spinlock::new(T::default())
    }
}
