// SPDX-License-Identifier: MIT OR Apache-2.0
use super::policy::{self, Policy, Role, Wake, WriterPreference};
use super::state::{LockState, LockStats};
use crate::cancel::{self, CancelToken, Cancelled};
use crate::spinlock::Spinlock;
use std::marker::PhantomData;
use std::thread::{self, Thread, ThreadId};
use std::time::{Duration, Instant};

/// Everything the lock's exclusive section protects.
#[derive(Debug, Default)]
struct Monitor {
    state: LockState,
    waiting_read_threads: Vec<Thread>,
    waiting_write_threads: Vec<Thread>,
}

impl Monitor {
    fn waiters_mut(&mut self, role: Role) -> &mut Vec<Thread> {
        match role {
            Role::Read => &mut self.waiting_read_threads,
            Role::Write => &mut self.waiting_write_threads,
        }
    }

    /// Drains the wait set named by `wake`.
    fn take(&mut self, wake: Wake) -> Vec<Thread> {
        match wake {
            Wake::Nobody => Vec::new(),
            Wake::Readers => std::mem::take(&mut self.waiting_read_threads),
            Wake::Writers => std::mem::take(&mut self.waiting_write_threads),
        }
    }

    fn park_as(&mut self, role: Role, current: &Thread) {
        let id = current.id();
        let waiters = self.waiters_mut(role);
        if !waiters.iter().any(|t| t.id() == id) {
            waiters.push(current.clone());
        }
    }

    fn unpark_as(&mut self, role: Role, id: ThreadId) {
        let waiters = self.waiters_mut(role);
        if let Some(pos) = waiters.iter().position(|t| t.id() == id) {
            waiters.swap_remove(pos);
        }
    }

    fn debug_check<P: Policy>(&self) {
        debug_assert_eq!(self.state.check(P::TRACKS_HOLDS), Ok(()));
    }
}

/// A writer-preference reader-writer lock that guards no data of its own.
///
/// Any number of threads may hold it for reading at once; a writer holds it
/// alone. Once a writer is waiting, threads asking for a new read hold queue
/// behind it, so a steady stream of readers cannot starve writers.
///
/// The rules are chosen by `P`:
/// - [`WriterPreference`]: non-reentrant. A thread must not nest holds.
/// - [`Reentrant`](super::Reentrant): nesting, upgrade and downgrade.
///
/// Every acquisition comes in four flavors, on the lock itself or through the
/// role handles from [`read_side`](Self::read_side) and
/// [`write_side`](Self::write_side):
/// - **`acquire_*`**: block until granted
/// - **`acquire_*_cancellable`**: block until granted or the [`CancelToken`] fires
/// - **`try_acquire_*`**: block for at most a timeout, `false` if not granted
/// - **`try_acquire_*_cancellable`**: both bounds
///
/// Releases never block. Releasing a hold the calling thread does not have is a
/// caller bug; it is only caught in debug builds (or with the `strict`
/// feature) and otherwise leaves the lock's counters wrong. The release is
/// applied as if the caller held the role: counts drop (wrapping below zero)
/// and a stray `release_write` gives up the real writer's hold.
///
/// For scoped holds use [`read`](Self::read) and [`write`](Self::write).
///
/// # Examples
///
/// ```
/// use wp_lock::WriterPreferenceLock;
/// use std::sync::Arc;
/// use std::thread;
///
/// let lock = Arc::new(WriterPreferenceLock::new());
///
/// let readers: Vec<_> = (0..3)
///     .map(|_| {
///         let lock = Arc::clone(&lock);
///         thread::spawn(move || {
///             let _hold = lock.read();
///             // shared section
///         })
///     })
///     .collect();
/// for reader in readers {
///     reader.join().unwrap();
/// }
///
/// lock.acquire_write();
/// // exclusive section
/// lock.release_write();
/// ```
pub struct RwLock<P: Policy = WriterPreference> {
    monitor: Spinlock<Monitor>,
    policy: PhantomData<P>,
}

impl<P: Policy> RwLock<P> {
    /// Creates an unlocked lock.
    pub fn new() -> Self {
        RwLock {
            monitor: Spinlock::new(Monitor::default()),
            policy: PhantomData,
        }
    }

    /// A snapshot of the lock's counters.
    pub fn stats(&self) -> LockStats {
        self.with_state(LockState::stats)
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&LockState) -> R) -> R {
        self.monitor.with_mut(|monitor| f(&monitor.state))
    }

    /// The blocking protocol shared by both roles.
    ///
    /// `Ok(false)` only when `timeout` ran out. Without a token the result is
    /// never `Err`; without a timeout it is never `Ok(false)`.
    pub(crate) fn acquire_as(
        &self,
        role: Role,
        cancel: Option<&CancelToken>,
        timeout: Option<Duration>,
    ) -> Result<bool, Cancelled> {
        if cancel::is_cancelled(cancel) {
            return Err(Cancelled);
        }
        let current = thread::current();
        let me = current.id();

        if timeout == Some(Duration::ZERO) {
            return Ok(self.monitor.with_mut(|monitor| {
                let granted = policy::start::<P>(role, &mut monitor.state, me);
                monitor.debug_check::<P>();
                granted
            }));
        }

        let granted = self.monitor.with_mut(|monitor| {
            let granted = policy::start_from_new::<P>(role, &mut monitor.state, me);
            if !granted {
                monitor.park_as(role, &current);
            }
            monitor.debug_check::<P>();
            granted
        });
        if granted {
            return Ok(true);
        }

        log::trace!("{me:?} waits for {role:?}");
        // A timeout too large to represent waits like no timeout at all.
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let _watch = cancel.map(CancelToken::watch);
        loop {
            if cancel::is_cancelled(cancel) {
                log::trace!("{me:?} cancelled while waiting for {role:?}");
                self.abandon(role, me);
                return Err(Cancelled);
            }
            match deadline {
                None => thread::park(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        log::trace!("{me:?} timed out waiting for {role:?}");
                        self.abandon(role, me);
                        return Ok(false);
                    }
                    thread::park_timeout(deadline - now);
                }
            }

            let granted = self.monitor.with_mut(|monitor| {
                let granted = policy::start_from_waiting::<P>(role, &mut monitor.state, me);
                if granted {
                    monitor.unpark_as(role, me);
                } else {
                    // drained by a wakeup, or a spurious return from park
                    monitor.park_as(role, &current);
                }
                monitor.debug_check::<P>();
                granted
            });
            if granted {
                log::trace!("{me:?} granted {role:?} after waiting");
                return Ok(true);
            }
        }
    }

    /// Undoes a waiter's registration and lets the other role re-check.
    ///
    /// The departing waiter may have been what kept the other role out, as a
    /// waiting writer does for new readers.
    fn abandon(&self, role: Role, me: ThreadId) {
        let woken = self.monitor.with_mut(|monitor| {
            monitor.unpark_as(role, me);
            policy::cancelled_waiting::<P>(role, &mut monitor.state);
            monitor.debug_check::<P>();
            monitor.take(role.opposite())
        });
        signal(woken);
    }

    pub(crate) fn release_as(&self, role: Role) {
        let me = thread::current().id();
        let woken = self.monitor.with_mut(|monitor| {
            let wake = policy::end::<P>(role, &mut monitor.state, me);
            monitor.debug_check::<P>();
            monitor.take(wake)
        });
        if !woken.is_empty() {
            log::trace!("{me:?} released {role:?}, waking {} thread(s)", woken.len());
        }
        signal(woken);
    }
}

/// Wakes every thread in a drained wait set. Each one re-checks admission itself.
fn signal(threads: Vec<Thread>) {
    for thread in threads {
        thread.unpark();
    }
}

impl<P: Policy> Default for RwLock<P> {
    fn default() -> Self {
        RwLock::new()
    }
}

impl<P: Policy> std::fmt::Debug for RwLock<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RwLock")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
