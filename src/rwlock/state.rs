// SPDX-License-Identifier: MIT OR Apache-2.0
use super::holds::HoldTable;
use std::thread::ThreadId;

/// Bookkeeping for one lock. Only mutated inside the lock's monitor.
#[doc(hidden)]
#[derive(Debug, Default, Clone)]
pub struct LockState {
    pub(crate) active_readers: usize,
    pub(crate) active_writer: Option<ThreadId>,
    pub(crate) waiting_readers: usize,
    pub(crate) waiting_writers: usize,
    pub(crate) write_holds: usize,
    /// Empty unless the policy tracks read ownership.
    pub(crate) reader_holds: HoldTable,
}

impl LockState {
    pub(crate) fn stats(&self) -> LockStats {
        LockStats {
            active_readers: self.active_readers,
            waiting_readers: self.waiting_readers,
            waiting_writers: self.waiting_writers,
            write_holds: self.write_holds,
            has_writer: self.active_writer.is_some(),
        }
    }

    /// Checks the quiescent-point invariants.
    ///
    /// `tracks_holds` is whether the owning policy records per-thread read holds.
    pub(crate) fn check(&self, tracks_holds: bool) -> Result<(), &'static str> {
        if self.active_writer.is_some() != (self.write_holds > 0) {
            return Err("writer identity and write holds disagree");
        }
        if let Some(writer) = self.active_writer {
            let own_reads = self.reader_holds.get(writer);
            if self.active_readers != own_reads {
                return Err("readers other than the writer are active");
            }
        }
        if tracks_holds {
            if self.reader_holds.total() != self.active_readers {
                return Err("read holds do not sum to active readers");
            }
        } else if self.reader_holds.threads() != 0 {
            return Err("hold table used by a policy that does not track holds");
        }
        Ok(())
    }
}

/// A point-in-time copy of a lock's counters.
///
/// Useful for diagnostics and tests; by the time it is inspected the lock may
/// have moved on.
///
/// # Examples
///
/// ```
/// use wp_lock::WriterPreferenceLock;
///
/// let lock = WriterPreferenceLock::new();
/// lock.acquire_read();
/// let stats = lock.stats();
/// assert_eq!(stats.active_readers, 1);
/// assert!(!stats.has_writer);
/// lock.release_read();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LockStats {
    /// Read holds currently granted. Nested holds of one thread count separately.
    pub active_readers: usize,
    /// Threads parked waiting for a read hold.
    pub waiting_readers: usize,
    /// Threads parked waiting for the write hold.
    pub waiting_writers: usize,
    /// Nesting depth of the current writer, 0 when there is none.
    pub write_holds: usize,
    /// Whether some thread owns the write hold.
    pub has_writer: bool,
}
