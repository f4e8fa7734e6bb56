// SPDX-License-Identifier: MIT OR Apache-2.0
//! Writer-preference reader-writer locks for OS threads.
//!
//! - [`WriterPreferenceLock`]: many readers or one writer; a waiting writer keeps
//!   new readers out so it cannot be starved.
//! - [`ReentrantLock`]: the same policy, plus nested holds, read→write upgrade for
//!   the only reader, and reads by the writer (downgrade).
//! - [`Semaphore`]: counts outstanding work and lets threads wait for it to drain.
//!
//! Every blocking call has a timed variant returning `bool` and a cancellable
//! variant taking a [`CancelToken`]. Cancelled or timed-out calls leave the lock
//! exactly as if they had never been made.
//!
//! The locks guard no data. Pair them with the structure they protect, or use
//! the scoped [`ReadGuard`] / [`WriteGuard`] holds.
//!
//! # Logging
//!
//! Park, wake, timeout and cancellation transitions are reported through the
//! [`log`] facade at `trace` level; upgrades at `debug`. Nothing is printed unless
//! the application installs a logger.

/// Checks a caller contract in debug builds, or always with the `strict` feature.
///
/// Release builds without `strict` skip the check entirely.
macro_rules! contract {
    ($cond:expr, $($arg:tt)+) => {
        if cfg!(any(debug_assertions, feature = "strict")) {
            assert!($cond, $($arg)+);
        }
    };
}
pub(crate) use contract;

pub mod cancel;
pub mod guard;
pub mod rwlock;
pub mod semaphore;
mod spinlock;


pub use cancel::{CancelToken, Cancelled};
pub use guard::{ReadGuard, WriteGuard};
pub use rwlock::{
    LockSide, LockStats, ONE_MINUTE, ONE_SECOND, Policy, ReaderSide, Reentrant, ReentrantLock,
    RwLock, WriterPreference, WriterPreferenceLock, WriterSide,
};
pub use semaphore::Semaphore;
