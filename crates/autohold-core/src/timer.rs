//! Single-shot deadlines driven by the owner's event loop.
//!
//! A [`OneShot`] never runs anything by itself. The loop asks every owner
//! for its earliest deadline, sleeps until then and calls [`OneShot::fire`],
//! so expiry is handled on the same queue as key events.

use std::time::{Duration, Instant};

/// A cancelable one-shot timer holding at most one pending deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OneShot {
    deadline: Option<i64>,
}

impl OneShot {
    pub fn new() -> Self {
        Self { deadline: None }
    }

    /// Arm the timer to expire `delay_ms` after `now`, replacing any pending deadline.
    pub fn schedule(&mut self, now: i64, delay_ms: u64) {
        let delay = i64::try_from(delay_ms).unwrap_or(i64::MAX);
        self.deadline = Some(now.saturating_add(delay));
    }

    /// Drop the pending deadline. Canceling an idle or already fired timer does nothing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<i64> {
        self.deadline
    }

    /// Consume the deadline if it has passed. Returns true exactly once per schedule.
    pub fn fire(&mut self, now: i64) -> bool {
        match self.deadline {
            Some(at) if now >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Millisecond uptime clock shared by the event loop and the core.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> i64 {
        i64::try_from(self.start.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    /// Wall-clock instant for a millisecond timestamp on this clock.
    pub fn instant_at(&self, ms: i64) -> Instant {
        self.start + Duration::from_millis(u64::try_from(ms).unwrap_or(0))
    }
}
