//! Host time. The engine never reads a clock itself; the host passes `Timestamp`s in.

use std::cell::Cell;
use std::ops::Add;
use std::time::{Duration, Instant};

/// Milliseconds on a monotonic clock that started at (or before) board boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub const fn from_secs(s: u64) -> Self {
        Timestamp(s.saturating_mul(1000))
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Time since `earlier`, zero if `earlier` is in the future.
    pub fn since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        let ms = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(ms))
    }
}

pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-independent clock anchored at construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let ms = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX);
        Timestamp(ms)
    }
}

/// Hand-driven clock for simulations. With a non-zero step, every `now()` call
/// advances time by that step, so spin loops terminate.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
    step: u64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Cell::new(start.0),
            step: 0,
        }
    }

    pub fn with_step(start: Timestamp, step: Duration) -> Self {
        Self {
            now: Cell::new(start.0),
            step: u64::try_from(step.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set((Timestamp(self.now.get()) + by).0);
    }

    pub fn set(&self, at: Timestamp) {
        self.now.set(at.0);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let t = self.now.get();
        self.now.set(t.saturating_add(self.step));
        Timestamp(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_saturates() {
        let a = Timestamp::from_millis(100);
        let b = Timestamp::from_millis(250);
        assert_eq!(b.since(a), Duration::from_millis(150));
        assert_eq!(a.since(b), Duration::ZERO);
    }

    #[test]
    fn from_secs_saturates() {
        assert_eq!(Timestamp::from_secs(3), Timestamp::from_millis(3_000));
        assert_eq!(Timestamp::from_secs(u64::MAX), Timestamp::from_millis(u64::MAX));
    }

    #[test]
    fn manual_clock_steps_on_read() {
        let clock = ManualClock::with_step(Timestamp::ZERO, Duration::from_millis(10));
        assert_eq!(clock.now(), Timestamp::from_millis(0));
        assert_eq!(clock.now(), Timestamp::from_millis(10));
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Timestamp::from_millis(1020));
    }
}
