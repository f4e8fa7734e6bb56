// SPDX-License-Identifier: MIT OR Apache-2.0
use std::collections::HashMap;
use std::thread::ThreadId;

/// Per-thread read hold counts.
///
/// A thread with no entry holds nothing; stored counts are always at least one.
#[derive(Debug, Default, Clone)]
pub(crate) struct HoldTable {
    holds: HashMap<ThreadId, usize>,
}

impl HoldTable {
    pub(crate) fn get(&self, thread: ThreadId) -> usize {
        self.holds.get(&thread).copied().unwrap_or(0)
    }

    /// Adds one hold for `thread`, returning the new count.
    pub(crate) fn increment(&mut self, thread: ThreadId) -> usize {
        let count = self.holds.entry(thread).or_insert(0);
        *count += 1;
        *count
    }

    /// Drops one hold for `thread`, returning what remains.
    ///
    /// `None` if the thread held nothing.
    pub(crate) fn decrement(&mut self, thread: ThreadId) -> Option<usize> {
        let count = self.holds.get_mut(&thread)?;
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.holds.remove(&thread);
        }
        Some(remaining)
    }

    /// Number of distinct threads holding at least once.
    pub(crate) fn threads(&self) -> usize {
        self.holds.len()
    }

    /// `true` if `thread` is the only thread with holds.
    pub(crate) fn is_sole_holder(&self, thread: ThreadId) -> bool {
        self.holds.len() == 1 && self.holds.contains_key(&thread)
    }

    pub(crate) fn total(&self) -> usize {
        self.holds.values().sum()
    }
}
