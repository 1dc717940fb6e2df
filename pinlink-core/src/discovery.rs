//! Presence broadcast schedule: fast at boot, slower once the neighbourhood has settled.

use std::time::Duration;

use crate::config::DiscoveryConfig;
use crate::time::Timestamp;

/// Broadcast regime. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Regime {
    Warmup,
    Active,
    Stable,
}

pub struct DiscoveryScheduler {
    config: DiscoveryConfig,
    started_at: Option<Timestamp>,
    last_broadcast: Option<Timestamp>,
    regime: Regime,
}

impl DiscoveryScheduler {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            config,
            started_at: None,
            last_broadcast: None,
            regime: Regime::Warmup,
        }
    }

    /// Anchor the schedule. The first `poll` after this is due immediately.
    pub fn start(&mut self, now: Timestamp) {
        self.started_at = Some(now);
        self.last_broadcast = None;
        self.regime = Regime::Warmup;
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn interval(&self) -> Duration {
        let ms = match self.regime {
            Regime::Warmup => self.config.warmup_interval_ms,
            Regime::Active => self.config.active_interval_ms,
            Regime::Stable => self.config.stable_interval_ms,
        };
        Duration::from_millis(ms)
    }

    /// Returns true when a presence broadcast is due, and records it as sent.
    pub fn poll(&mut self, now: Timestamp) -> bool {
        let Some(started) = self.started_at else {
            return false;
        };
        self.advance(now.since(started));
        let due = match self.last_broadcast {
            None => true,
            Some(last) => now.since(last) >= self.interval(),
        };
        if due {
            self.last_broadcast = Some(now);
        }
        due
    }

    fn advance(&mut self, elapsed: Duration) {
        let target = if elapsed < Duration::from_millis(self.config.warmup_until_ms) {
            Regime::Warmup
        } else if elapsed < Duration::from_millis(self.config.active_until_ms) {
            Regime::Active
        } else {
            Regime::Stable
        };
        if target > self.regime {
            tracing::debug!(from = ?self.regime, to = ?target, "discovery regime advanced");
            self.regime = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcasts_between(start: u64, end: u64, tick_ms: u64) -> Vec<u64> {
        let mut sched = DiscoveryScheduler::new(DiscoveryConfig::default());
        sched.start(Timestamp::from_millis(start));
        let mut out = Vec::new();
        let mut t = start;
        while t <= end {
            if sched.poll(Timestamp::from_millis(t)) {
                out.push(t - start);
            }
            t += tick_ms;
        }
        out
    }

    #[test]
    fn four_hundred_second_run_matches_schedule() {
        let sent = broadcasts_between(0, 400_000, 100);
        // Warm-up: 0, 5, ..., 55 s.
        let mut expected: Vec<u64> = (0..12).map(|i| i * 5_000).collect();
        // Active: every 20 s after the last warm-up broadcast, while under 300 s.
        expected.extend((1..=12).map(|i| 55_000 + i * 20_000));
        // Stable: every 60 s after 295 s.
        expected.push(355_000);
        assert_eq!(sent, expected);
        assert_eq!(sent.len(), 25);
    }

    #[test]
    fn schedule_is_relative_to_start() {
        let offset = broadcasts_between(7_000, 407_000, 100);
        let base = broadcasts_between(0, 400_000, 100);
        assert_eq!(offset, base);
    }

    #[test]
    fn nothing_before_start() {
        let mut sched = DiscoveryScheduler::new(DiscoveryConfig::default());
        assert!(!sched.poll(Timestamp::from_secs(1)));
    }

    #[test]
    fn regime_never_reverts() {
        let mut sched = DiscoveryScheduler::new(DiscoveryConfig::default());
        sched.start(Timestamp::ZERO);
        sched.poll(Timestamp::from_secs(301));
        assert_eq!(sched.regime(), Regime::Stable);
        // A clock reading from the past does not pull the regime back.
        sched.poll(Timestamp::from_secs(10));
        assert_eq!(sched.regime(), Regime::Stable);
        assert_eq!(sched.interval(), Duration::from_secs(60));
    }
}
