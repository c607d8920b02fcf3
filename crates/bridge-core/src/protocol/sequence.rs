//! Sequence numbering for input packets.
//!
//! # What is a sequence number? (for beginners)
//!
//! Mouse events travel over UDP, which may drop, duplicate, or reorder
//! datagrams. Every packet therefore carries a 32-bit counter value assigned
//! by the sender. The receiver remembers the newest value it has accepted
//! and drops anything that is not newer, so a late duplicate of an old mouse
//! delta can never be replayed.
//!
//! The value `0` is special: it means "this packet is not part of the
//! ordered stream" (mode switches use it), so it is always accepted and it
//! resets the receiver's window.
//!
//! # Wraparound
//!
//! After `u32::MAX` the sender continues at `1`. The receiver compares
//! numbers with serial-number arithmetic (as in RFC 1982): `b` is newer than
//! `a` when `b - a`, computed with wrapping, lands in the lower half of the
//! number space. That makes the rollover an ordinary in-order step.
//!
//! # Thread safety
//!
//! [`SequenceCounter`] uses an `AtomicU32`, so a single counter can be shared
//! between tasks without a lock. [`SequenceWindow`] is owned by one receive
//! loop and needs no synchronisation.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::protocol::packet::UNSEQUENCED;

/// A thread-safe, monotonically increasing counter for packet sequence numbers.
///
/// Starts at 1 and never yields [`UNSEQUENCED`], even across wraparound.
///
/// # Examples
///
/// ```rust
/// use bridge_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
pub struct SequenceCounter {
    inner: AtomicU32,
}

impl SequenceCounter {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a counter whose first [`next`](Self::next) returns `first`
    /// (or 1 if `first` is the sentinel).
    pub fn starting_at(first: u32) -> Self {
        Self {
            inner: AtomicU32::new(first),
        }
    }

    /// Returns the next sequence number and atomically advances the counter.
    ///
    /// `Ordering::Relaxed` is enough: the value orders packets, it does not
    /// publish memory to other threads.
    pub fn next(&self) -> u32 {
        loop {
            let value = self.inner.fetch_add(1, Ordering::Relaxed);
            if value != UNSEQUENCED {
                return value;
            }
        }
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver-side filter that drops stale or duplicate sequence numbers.
#[derive(Debug, Default, Clone)]
pub struct SequenceWindow {
    last_accepted: Option<u32>,
}

impl SequenceWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a packet carrying `sequence` should be processed,
    /// updating the window when it is.
    pub fn accept(&mut self, sequence: u32) -> bool {
        if sequence == UNSEQUENCED {
            self.last_accepted = None;
            return true;
        }

        let fresh = match self.last_accepted {
            None => true,
            Some(last) => is_newer(sequence, last),
        };
        if fresh {
            self.last_accepted = Some(sequence);
        }
        fresh
    }

    /// The newest sequence number accepted since the last reset.
    pub fn last_accepted(&self) -> Option<u32> {
        self.last_accepted
    }
}

/// Serial-number comparison: is `candidate` strictly after `reference`?
fn is_newer(candidate: u32, reference: u32) -> bool {
    (candidate.wrapping_sub(reference) as i32) > 0
}
