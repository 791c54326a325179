//! Thread-safe allocator for frame call ids.
//!
//! # What is a call id? (for beginners)
//!
//! A single TCP connection can carry several requests in flight at once: a
//! client may send a `Push` while a `Connect` from another task is still
//! waiting for its answer.  Every request frame carries a *call id*, and the
//! server copies it into the matching response.  The client keeps a table of
//! "call id → waiting task" and uses the id on the response to wake the right
//! task.
//!
//! Ids only need to be unique among the calls that are in flight on one
//! connection, so a per-connection counter is enough.  Zero is never handed
//! out; it is left free as a "no call" marker in logs.

use std::sync::atomic::{AtomicU64, Ordering};

/// A lock-free, monotonically increasing source of call ids.
///
/// # Examples
///
/// ```rust
/// use netput_core::protocol::CallIdCounter;
///
/// let ids = CallIdCounter::new();
/// assert_eq!(ids.next(), 1);
/// assert_eq!(ids.next(), 2);
/// ```
#[derive(Debug)]
pub struct CallIdCounter {
    inner: AtomicU64,
}

impl CallIdCounter {
    /// Creates a counter whose first id is 1.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(1),
        }
    }

    /// Returns a fresh call id.
    ///
    /// Wraps from `u64::MAX` back to 1, skipping zero.  `Relaxed` ordering is
    /// enough: the id guards no other memory.
    pub fn next(&self) -> u64 {
        loop {
            let id = self.inner.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }
}

impl Default for CallIdCounter {
    fn default() -> Self {
        Self::new()
    }
}
