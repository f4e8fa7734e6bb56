// SPDX-License-Identifier: MIT OR Apache-2.0
//! Admission and release decisions.
//!
//! A [`Policy`] is a set of pure state transitions over [`LockState`]. It never
//! blocks and never wakes anyone itself; it only answers "may this caller
//! proceed?" and "who should be woken now?". The lock runs every transition
//! inside its monitor and acts on the answers.

use super::state::LockState;
use std::thread::ThreadId;

/// Which wait set a release or cancellation should wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wake {
    /// Nobody can make progress because of this transition.
    Nobody,
    /// Every thread parked on the reader wait set.
    Readers,
    /// Every thread parked on the writer wait set.
    Writers,
}

/// The two roles a caller can acquire in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Role {
    Read,
    Write,
}

impl Role {
    /// The wait set to signal when a waiter of this role gives up.
    pub(crate) fn opposite(self) -> Wake {
        match self {
            Role::Read => Wake::Writers,
            Role::Write => Wake::Readers,
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// The rule set a lock enforces. Implemented by [`WriterPreference`] and
/// [`Reentrant`](super::Reentrant); not implementable outside this crate.
///
/// The required methods are the decision points. The provided `*_from_*` and
/// `cancelled_*` methods wrap them with the waiting-count bookkeeping shared by
/// every policy, so an overriding policy only restates the rules that differ.
pub trait Policy: sealed::Sealed + Send + Sync + 'static {
    /// Whether this policy records read holds per thread.
    #[doc(hidden)]
    const TRACKS_HOLDS: bool;

    /// Whether a reader that holds nothing yet may enter now.
    #[doc(hidden)]
    fn allow_reader(state: &LockState, me: ThreadId) -> bool;

    #[doc(hidden)]
    fn start_read(state: &mut LockState, me: ThreadId) -> bool;

    #[doc(hidden)]
    fn start_write(state: &mut LockState, me: ThreadId) -> bool;

    #[doc(hidden)]
    fn end_read(state: &mut LockState, me: ThreadId) -> Wake;

    #[doc(hidden)]
    fn end_write(state: &mut LockState, me: ThreadId) -> Wake;

    /// First attempt by a caller about to block; a denial counts it as waiting.
    #[doc(hidden)]
    fn start_read_from_new_reader(state: &mut LockState, me: ThreadId) -> bool {
        let granted = Self::start_read(state, me);
        if !granted {
            state.waiting_readers += 1;
        }
        granted
    }

    #[doc(hidden)]
    fn start_write_from_new_writer(state: &mut LockState, me: ThreadId) -> bool {
        let granted = Self::start_write(state, me);
        if !granted {
            state.waiting_writers += 1;
        }
        granted
    }

    /// Retry by a parked caller; a grant takes it off the waiting count.
    #[doc(hidden)]
    fn start_read_from_waiting_reader(state: &mut LockState, me: ThreadId) -> bool {
        let granted = Self::start_read(state, me);
        if granted {
            state.waiting_readers -= 1;
        }
        granted
    }

    #[doc(hidden)]
    fn start_write_from_waiting_writer(state: &mut LockState, me: ThreadId) -> bool {
        let granted = Self::start_write(state, me);
        if granted {
            state.waiting_writers -= 1;
        }
        granted
    }

    #[doc(hidden)]
    fn cancelled_waiting_reader(state: &mut LockState) {
        state.waiting_readers -= 1;
    }

    #[doc(hidden)]
    fn cancelled_waiting_writer(state: &mut LockState) {
        state.waiting_writers -= 1;
    }
}

/// Role-dispatching helpers so the acquire loop is written once.
pub(crate) fn start<P: Policy>(role: Role, state: &mut LockState, me: ThreadId) -> bool {
    match role {
        Role::Read => P::start_read(state, me),
        Role::Write => P::start_write(state, me),
    }
}

pub(crate) fn start_from_new<P: Policy>(role: Role, state: &mut LockState, me: ThreadId) -> bool {
    match role {
        Role::Read => P::start_read_from_new_reader(state, me),
        Role::Write => P::start_write_from_new_writer(state, me),
    }
}

pub(crate) fn start_from_waiting<P: Policy>(
    role: Role,
    state: &mut LockState,
    me: ThreadId,
) -> bool {
    match role {
        Role::Read => P::start_read_from_waiting_reader(state, me),
        Role::Write => P::start_write_from_waiting_writer(state, me),
    }
}

pub(crate) fn cancelled_waiting<P: Policy>(role: Role, state: &mut LockState) {
    match role {
        Role::Read => P::cancelled_waiting_reader(state),
        Role::Write => P::cancelled_waiting_writer(state),
    }
}

pub(crate) fn end<P: Policy>(role: Role, state: &mut LockState, me: ThreadId) -> Wake {
    match role {
        Role::Read => P::end_read(state, me),
        Role::Write => P::end_write(state, me),
    }
}

/// Who to wake once the write hold is fully given up.
///
/// Waiting readers go first if they are admissible now; otherwise one of the
/// waiting writers gets a chance.
pub(crate) fn wake_after_write<P: Policy>(state: &LockState, me: ThreadId) -> Wake {
    if state.waiting_readers > 0 && P::allow_reader(state, me) {
        Wake::Readers
    } else if state.waiting_writers > 0 {
        Wake::Writers
    } else {
        Wake::Nobody
    }
}

/// The non-reentrant writer-preference rules.
///
/// New readers queue behind any waiting writer, which bounds writer starvation
/// under continuous read traffic.
///
/// # Caller contract
///
/// Holds are not tracked per thread. A thread must not take a read hold it
/// already has: if a writer starts waiting in between, the second request
/// queues behind that writer, which in turn waits for the first hold, and the
/// thread deadlocks itself. Releasing a hold the thread does not own corrupts
/// the counters. Neither is detected outside debug builds; use
/// [`Reentrant`](super::Reentrant) when nesting is needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WriterPreference;

impl sealed::Sealed for WriterPreference {}
impl sealed::Sealed for super::Reentrant {}

impl Policy for WriterPreference {
    const TRACKS_HOLDS: bool = false;

    fn allow_reader(state: &LockState, _me: ThreadId) -> bool {
        state.active_writer.is_none() && state.waiting_writers == 0
    }

    fn start_read(state: &mut LockState, me: ThreadId) -> bool {
        let allowed = Self::allow_reader(state, me);
        if allowed {
            state.active_readers += 1;
        }
        allowed
    }

    fn start_write(state: &mut LockState, me: ThreadId) -> bool {
        if state.active_writer.is_none() && state.active_readers == 0 {
            state.active_writer = Some(me);
            state.write_holds = 1;
            true
        } else {
            false
        }
    }

    fn end_read(state: &mut LockState, _me: ThreadId) -> Wake {
        crate::contract!(
            state.active_readers > 0,
            "released a read hold on a lock with no active readers"
        );
        // without the contract check a stray release wraps the count
        state.active_readers = state.active_readers.wrapping_sub(1);
        if state.active_readers == 0 && state.waiting_writers > 0 {
            Wake::Writers
        } else {
            Wake::Nobody
        }
    }

    fn end_write(state: &mut LockState, me: ThreadId) -> Wake {
        crate::contract!(
            state.active_writer == Some(me),
            "released a write hold the thread does not own"
        );
        state.active_writer = None;
        state.write_holds = 0;
        wake_after_write::<Self>(state, me)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn other_thread_id() -> ThreadId {
        thread::spawn(|| thread::current().id()).join().unwrap()
    }

    #[test]
    fn test_readers_share() {
        let mut state = LockState::default();
        let me = thread::current().id();
        let other = other_thread_id();
        assert!(WriterPreference::start_read(&mut state, me));
        assert!(WriterPreference::start_read(&mut state, other));
        assert_eq!(state.active_readers, 2);
        assert!(!WriterPreference::start_write(&mut state, me));
        assert_eq!(WriterPreference::end_read(&mut state, other), Wake::Nobody);
        assert_eq!(WriterPreference::end_read(&mut state, me), Wake::Nobody);
        assert!(WriterPreference::start_write(&mut state, me));
        assert_eq!(state.check(false), Ok(()));
    }

    #[test]
    fn test_waiting_writer_blocks_new_readers() {
        let mut state = LockState::default();
        let reader = thread::current().id();
        let writer = other_thread_id();
        assert!(WriterPreference::start_read_from_new_reader(&mut state, reader));
        assert!(!WriterPreference::start_write_from_new_writer(&mut state, writer));
        assert_eq!(state.waiting_writers, 1);

        let late_reader = other_thread_id();
        assert!(!WriterPreference::start_read_from_new_reader(&mut state, late_reader));
        assert_eq!(state.waiting_readers, 1);

        // the last reader leaving hands over to the writer
        assert_eq!(WriterPreference::end_read(&mut state, reader), Wake::Writers);
        assert!(WriterPreference::start_write_from_waiting_writer(&mut state, writer));
        assert_eq!(state.waiting_writers, 0);

        // the writer leaving lets the queued reader in
        assert_eq!(WriterPreference::end_write(&mut state, writer), Wake::Readers);
        assert!(WriterPreference::start_read_from_waiting_reader(&mut state, late_reader));
        assert_eq!(state.waiting_readers, 0);
        assert_eq!(state.check(false), Ok(()));
    }

    #[test]
    fn test_end_write_prefers_admissible_readers() {
        let mut state = LockState::default();
        let writer = thread::current().id();
        assert!(WriterPreference::start_write(&mut state, writer));
        state.waiting_readers = 2;
        state.waiting_writers = 1;
        // readers wait, but a writer waits too, so readers are not admissible
        assert_eq!(WriterPreference::end_write(&mut state, writer), Wake::Writers);

        assert!(WriterPreference::start_write(&mut state, writer));
        state.waiting_writers = 0;
        assert_eq!(WriterPreference::end_write(&mut state, writer), Wake::Readers);

        assert!(WriterPreference::start_write(&mut state, writer));
        state.waiting_readers = 0;
        assert_eq!(WriterPreference::end_write(&mut state, writer), Wake::Nobody);
    }

    #[test]
    fn test_cancelled_waiting_restores_counts() {
        let mut state = LockState::default();
        let writer = thread::current().id();
        let reader = other_thread_id();
        assert!(WriterPreference::start_write(&mut state, writer));
        assert!(!start_from_new::<WriterPreference>(Role::Read, &mut state, reader));
        assert_eq!(state.waiting_readers, 1);
        cancelled_waiting::<WriterPreference>(Role::Read, &mut state);
        assert_eq!(state.waiting_readers, 0);
        assert_eq!(Role::Read.opposite(), Wake::Writers);
        assert_eq!(Role::Write.opposite(), Wake::Readers);
    }
}
