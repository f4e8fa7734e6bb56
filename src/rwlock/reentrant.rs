// SPDX-License-Identifier: MIT OR Apache-2.0
use super::inner::RwLock;
use super::policy::{Policy, Wake, WriterPreference, wake_after_write};
use super::state::LockState;
use std::thread::ThreadId;

/// Writer-preference rules that let a thread nest its own holds.
///
/// On top of [`WriterPreference`]:
///
/// - A thread may take read holds it already has any number of times. Such a
///   thread is never queued behind a waiting writer; only threads with no read
///   hold are.
/// - The writer may take the write hold again, and must release it as many
///   times as it took it.
/// - The writer may take read holds (downgrade). Releasing them all does not
///   give up the write hold.
/// - The only reader thread may take the write hold without releasing its reads
///   (upgrade).
///
/// # Upgrade deadlock
///
/// A reader that is *not* the only reader thread and asks for the write hold
/// waits until every other reader has left. If another reader never leaves, or
/// is itself waiting to upgrade, the wait never ends. This is inherent to
/// upgrading in place and is not detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Reentrant;

impl Policy for Reentrant {
    const TRACKS_HOLDS: bool = true;

    fn allow_reader(state: &LockState, me: ThreadId) -> bool {
        WriterPreference::allow_reader(state, me) || state.active_writer == Some(me)
    }

    fn start_read(state: &mut LockState, me: ThreadId) -> bool {
        if state.reader_holds.get(me) > 0 || Self::allow_reader(state, me) {
            if state.reader_holds.increment(me) == 1 && state.active_writer == Some(me) {
                log::debug!("{me:?} reads under its own write hold");
            }
            state.active_readers += 1;
            true
        } else {
            false
        }
    }

    fn start_write(state: &mut LockState, me: ThreadId) -> bool {
        match state.active_writer {
            Some(writer) if writer == me => {
                state.write_holds += 1;
                true
            }
            Some(_) => false,
            None => {
                let upgrade = state.active_readers > 0;
                if !upgrade || state.reader_holds.is_sole_holder(me) {
                    if upgrade {
                        log::debug!("{me:?} upgrades its read hold to write");
                    }
                    state.active_writer = Some(me);
                    state.write_holds = 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn end_read(state: &mut LockState, me: ThreadId) -> Wake {
        let remaining = state.reader_holds.decrement(me);
        crate::contract!(
            remaining.is_some(),
            "released a read hold the thread does not own"
        );
        state.active_readers = state.active_readers.wrapping_sub(1);
        if remaining.is_some_and(|remaining| remaining > 0) {
            return Wake::Nobody;
        }
        if state.active_writer == Some(me) {
            // downgraded writer keeps exclusivity
            return Wake::Nobody;
        }
        // A single remaining reader thread may be the one waiting to upgrade.
        if state.reader_holds.threads() <= 1 && state.waiting_writers > 0 {
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
        state.write_holds = state.write_holds.wrapping_sub(1);
        if state.write_holds > 0 {
            return Wake::Nobody;
        }
        state.active_writer = None;
        wake_after_write::<Self>(state, me)
    }
}

impl RwLock<Reentrant> {
    /// Whether `thread` currently has at least one read hold.
    ///
    /// # Examples
    ///
    /// ```
    /// use wp_lock::ReentrantLock;
    /// use std::thread;
    ///
    /// let lock = ReentrantLock::new();
    /// let me = thread::current().id();
    /// lock.acquire_read();
    /// assert!(lock.is_read_held_by(me));
    /// lock.release_read();
    /// assert!(!lock.is_read_held_by(me));
    /// ```
    pub fn is_read_held_by(&self, thread: ThreadId) -> bool {
        self.read_holds_of(thread) > 0
    }

    /// Whether `thread` owns the write hold.
    pub fn is_write_held_by(&self, thread: ThreadId) -> bool {
        self.with_state(|state| state.active_writer == Some(thread))
    }

    /// How many nested read holds `thread` has.
    pub fn read_holds_of(&self, thread: ThreadId) -> usize {
        self.with_state(|state| state.reader_holds.get(thread))
    }

    /// Nesting depth of the current writer, 0 if there is none.
    pub fn write_holds(&self) -> usize {
        self.with_state(|state| state.write_holds)
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
    fn test_nested_reads_bypass_waiting_writer() {
        let mut state = LockState::default();
        let reader = thread::current().id();
        let writer = other_thread_id();
        assert!(Reentrant::start_read(&mut state, reader));
        assert!(!Reentrant::start_write_from_new_writer(&mut state, writer));

        // already a reader, so the waiting writer does not queue it
        assert!(Reentrant::start_read(&mut state, reader));
        assert_eq!(state.reader_holds.get(reader), 2);
        assert_eq!(state.active_readers, 2);

        // a fresh reader does queue
        let fresh = other_thread_id();
        assert!(!Reentrant::start_read(&mut state, fresh));

        assert_eq!(Reentrant::end_read(&mut state, reader), Wake::Nobody);
        assert_eq!(Reentrant::end_read(&mut state, reader), Wake::Writers);
        assert_eq!(state.check(true), Ok(()));
    }

    #[test]
    fn test_upgrade_only_for_sole_reader() {
        let mut state = LockState::default();
        let t1 = thread::current().id();
        let t2 = other_thread_id();
        assert!(Reentrant::start_read(&mut state, t1));
        assert!(Reentrant::start_read(&mut state, t1));
        assert!(Reentrant::start_read(&mut state, t2));
        assert!(!Reentrant::start_write_from_new_writer(&mut state, t1));

        // t2 leaving makes t1 the sole reader, which is worth a writer wakeup
        assert_eq!(Reentrant::end_read(&mut state, t2), Wake::Writers);
        assert!(Reentrant::start_write_from_waiting_writer(&mut state, t1));
        assert_eq!(state.active_writer, Some(t1));
        assert_eq!(state.check(true), Ok(()));
    }

    #[test]
    fn test_downgrade_keeps_write_hold() {
        let mut state = LockState::default();
        let me = thread::current().id();
        assert!(Reentrant::start_write(&mut state, me));
        assert!(Reentrant::start_read(&mut state, me));
        state.waiting_writers = 1;
        assert_eq!(Reentrant::end_read(&mut state, me), Wake::Nobody);
        assert_eq!(state.active_writer, Some(me));
        state.waiting_writers = 0;
        assert_eq!(state.check(true), Ok(()));
    }

    #[test]
    fn test_nested_write_releases_at_zero() {
        let mut state = LockState::default();
        let me = thread::current().id();
        assert!(Reentrant::start_write(&mut state, me));
        assert!(Reentrant::start_write(&mut state, me));
        state.waiting_readers = 1;
        assert_eq!(Reentrant::end_write(&mut state, me), Wake::Nobody);
        assert_eq!(state.active_writer, Some(me));
        assert_eq!(Reentrant::end_write(&mut state, me), Wake::Readers);
        assert_eq!(state.active_writer, None);
        assert_eq!(state.write_holds, 0);
    }

    #[test]
    fn test_writer_excludes_other_readers() {
        let mut state = LockState::default();
        let writer = thread::current().id();
        let reader = other_thread_id();
        assert!(Reentrant::start_write(&mut state, writer));
        assert!(!Reentrant::allow_reader(&state, reader));
        assert!(Reentrant::allow_reader(&state, writer));
        assert!(!Reentrant::start_read(&mut state, reader));
        assert!(!Reentrant::start_write(&mut state, reader));
    }
}
