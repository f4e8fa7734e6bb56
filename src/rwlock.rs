// SPDX-License-Identifier: MIT OR Apache-2.0
//! Writer-preference reader-writer locks.
//!
//! # The Problem
//!
//! A plain reader-writer lock that admits readers whenever no writer is active
//! can starve writers forever: with overlapping readers the reader count never
//! drops to zero. Shared structures that are read constantly but must still be
//! updated (caches, indexes, UI models) need writers to get their turn.
//!
//! # The Solution
//!
//! These locks use **writer preference**: as soon as a writer is waiting, threads
//! asking for a *new* read hold queue behind it. The readers already inside
//! drain, the writer runs, and then the queued readers are let in together.
//!
//! Two rule sets are provided:
//!
//! - [`WriterPreferenceLock`] (`RwLock<WriterPreference>`): the base rules. Holds are
//!   not tracked per thread, so a thread must never nest holds.
//! - [`ReentrantLock`] (`RwLock<Reentrant>`): nested read and write holds, a writer
//!   may also read (downgrade), and the only reader may start writing (upgrade).
//!
//! # Waking
//!
//! Waiters of each role park on their own wait set. A release that lets a role
//! make progress wakes *every* thread parked on that role's set, and each one
//! re-checks admission for itself. There is no FIFO order among waiters of one
//! role.
//!
//! # Examples
//!
//! ## Writer preference
//!
//! ```
//! use wp_lock::WriterPreferenceLock;
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let lock = Arc::new(WriterPreferenceLock::new());
//! lock.acquire_read();
//!
//! let writer = {
//!     let lock = Arc::clone(&lock);
//!     thread::spawn(move || {
//!         lock.acquire_write();
//!         lock.release_write();
//!     })
//! };
//! while lock.stats().waiting_writers == 0 {
//!     thread::yield_now();
//! }
//!
//! // A reader arriving now would share with us, but the waiting writer goes first.
//! let late_reader = {
//!     let lock = Arc::clone(&lock);
//!     thread::spawn(move || lock.try_acquire_read(Duration::ZERO))
//! };
//! assert!(!late_reader.join().unwrap());
//!
//! lock.release_read();
//! writer.join().unwrap();
//! ```
//!
//! ## Upgrade and downgrade
//!
//! ```
//! use wp_lock::ReentrantLock;
//! use std::thread;
//!
//! let lock = ReentrantLock::new();
//! let me = thread::current().id();
//!
//! lock.acquire_read();
//! lock.acquire_write(); // sole reader: upgrades without blocking
//! lock.release_read(); // still the writer
//! assert!(lock.is_write_held_by(me));
//! lock.release_write();
//! assert!(!lock.is_read_held_by(me));
//! ```

mod holds;
mod inner;
mod policy;
mod read;
mod reentrant;
mod state;
mod write;


use crate::cancel::{CancelToken, Cancelled};
use std::time::Duration;

pub use inner::RwLock;
pub use policy::{Policy, Wake, WriterPreference};
pub use read::ReaderSide;
pub use reentrant::Reentrant;
pub use state::{LockState, LockStats};
pub use write::WriterSide;

/// The non-reentrant writer-preference lock.
pub type WriterPreferenceLock = RwLock<WriterPreference>;

/// The writer-preference lock with nesting, upgrade and downgrade.
pub type ReentrantLock = RwLock<Reentrant>;

/// A conventional budget for [`LockSide::attempt`].
pub const ONE_SECOND: Duration = Duration::from_secs(1);

/// A conventional budget for [`LockSide::attempt`].
pub const ONE_MINUTE: Duration = Duration::from_secs(60);

/// One role of a lock: acquire it, try to acquire it, release it.
///
/// Implemented by [`ReaderSide`] and [`WriterSide`].
pub trait LockSide {
    /// Blocks until the role is granted to the calling thread.
    fn acquire(&self);

    /// Blocks until the role is granted, or fails once `cancel` fires.
    ///
    /// An already-cancelled token fails immediately without touching the lock.
    fn acquire_cancellable(&self, cancel: &CancelToken) -> Result<(), Cancelled>;

    /// Waits at most `timeout` for the role. A zero timeout never parks.
    fn attempt(&self, timeout: Duration) -> bool;

    /// [`attempt`](Self::attempt), failing with [`Cancelled`] if `cancel` fires first.
    fn attempt_cancellable(&self, timeout: Duration, cancel: &CancelToken)
    -> Result<bool, Cancelled>;

    /// Gives the role back. Never blocks.
    ///
    /// The calling thread must hold the role; this is only checked in debug
    /// builds or with the `strict` feature.
    fn release(&self);
}
