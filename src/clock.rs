//! Deterministic virtual time for one engine handle.
//!
//! All callbacks scheduled against the clock run synchronously inside
//! [`VirtualClock::drain`]; nothing here ever sleeps or reads wall-clock time.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use crate::{Error, Result};

/// A callback run when virtual time reaches its due time. It may schedule
/// further callbacks on the clock it receives.
pub type ClockCallback = Box<dyn FnOnce(&mut VirtualClock)>;

struct Scheduled {
    due: u64,
    seq: u64,
    callback: ClockCallback,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Monotonic nanosecond clock with a due-time ordered callback queue.
pub struct VirtualClock {
    now: u64,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Scheduled>>,
    max_drain_iterations: usize,
}

impl VirtualClock {
    pub const DEFAULT_MAX_DRAIN_ITERATIONS: usize = 10_000;

    pub fn new(max_drain_iterations: usize) -> Self {
        Self {
            now: 0,
            next_seq: 0,
            queue: BinaryHeap::new(),
            max_drain_iterations,
        }
    }

    /// Current virtual time in nanoseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Start a new session epoch: drop pending callbacks and jump to `epoch`.
    pub fn reset(&mut self, epoch: u64) {
        self.queue.clear();
        self.now = epoch;
    }

    /// Advance virtual time to `t`.
    ///
    /// # Panics
    ///
    /// Panics if `t` is earlier than the current time; engine animation math
    /// only supports forward time.
    pub fn set(&mut self, t: u64) {
        assert!(
            t >= self.now,
            "virtual clock moved backwards: {}ns -> {}ns",
            self.now,
            t
        );
        self.now = t;
    }

    /// Schedule `callback` at absolute virtual time `due`.
    pub fn post_at<F>(&mut self, due: u64, callback: F)
    where
        F: FnOnce(&mut VirtualClock) + 'static,
    {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled {
            due,
            seq,
            callback: Box::new(callback),
        }));
    }

    /// Schedule `callback` `delay` after the current time.
    pub fn post_delayed<F>(&mut self, delay: Duration, callback: F)
    where
        F: FnOnce(&mut VirtualClock) + 'static,
    {
        let due = self.now.saturating_add(u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX));
        self.post_at(due, callback);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(s)| s.due)
    }

    /// Run every callback due at or before `t`, including callbacks those
    /// callbacks schedule at or before `t`. Ties run in scheduling order.
    ///
    /// Returns the number of callbacks executed.
    pub fn drain(&mut self, t: u64) -> Result<usize> {
        let mut executed = 0usize;
        while self.next_due().is_some_and(|due| due <= t) {
            if executed >= self.max_drain_iterations {
                return Err(Error::RunawayScheduling {
                    iterations: executed,
                    at_nanos: t,
                });
            }
            let Some(Reverse(entry)) = self.queue.pop() else {
                break;
            };
            executed += 1;
            (entry.callback)(self);
        }
        Ok(executed)
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DRAIN_ITERATIONS)
    }
}

impl std::fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualClock")
            .field("now", &self.now)
            .field("pending", &self.queue.len())
            .field("max_drain_iterations", &self.max_drain_iterations)
            .finish()
    }
}
