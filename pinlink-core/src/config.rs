//! Engine configuration. Deserializable so hosts can embed it in their own config files.

use std::time::Duration;

use serde::Deserialize;

/// Hard cap on `max_retries`.
pub const MAX_RETRIES_CAP: u8 = 10;
/// Retry delay floor.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(50);
/// Retry delay ceiling.
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Attach message ids to unicast frames and expect acknowledgements.
    pub acknowledgements: bool,
    /// Resend failed pin-control frames.
    pub auto_retry: bool,
    /// Retries after the first attempt (0-10).
    pub max_retries: u8,
    /// Delay before a resend, 50 ms - 10 s.
    pub retry_delay_ms: u64,
    /// How long a tracked frame waits for its acknowledgement.
    pub ack_timeout_ms: u64,
    /// Peer directory slots.
    pub peer_capacity: usize,
    /// Tracked-message pool slots.
    pub tracker_capacity: usize,
    /// How long an unmatched pin-read response is kept for a blocking reader.
    pub pending_response_timeout_ms: u64,
    pub discovery: DiscoveryConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            acknowledgements: true,
            auto_retry: true,
            max_retries: 3,
            retry_delay_ms: 500,
            ack_timeout_ms: 5_000,
            peer_capacity: 20,
            tracker_capacity: 10,
            pending_response_timeout_ms: 5_000,
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Apply the documented ranges. Called on construction and by every setter.
    pub fn clamped(mut self) -> Self {
        self.set_max_retries(self.max_retries);
        self.set_retry_delay(Duration::from_millis(self.retry_delay_ms));
        self.peer_capacity = self.peer_capacity.max(1);
        self.tracker_capacity = self.tracker_capacity.max(1);
        self
    }

    pub fn set_max_retries(&mut self, n: u8) {
        self.max_retries = n.min(MAX_RETRIES_CAP);
    }

    pub fn set_retry_delay(&mut self, delay: Duration) {
        let delay = delay.clamp(MIN_RETRY_DELAY, MAX_RETRY_DELAY);
        self.retry_delay_ms = delay.as_millis() as u64;
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Acknowledged entries linger this long after their last send.
    pub fn ack_grace(&self) -> Duration {
        self.ack_timeout() * 2
    }

    pub fn pending_response_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_response_timeout_ms)
    }
}

/// Presence broadcast schedule. Regimes are keyed off time since start.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub warmup_interval_ms: u64,
    pub active_interval_ms: u64,
    pub stable_interval_ms: u64,
    /// End of the warm-up regime, measured from start.
    pub warmup_until_ms: u64,
    /// End of the active regime, measured from start.
    pub active_until_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            warmup_interval_ms: 5_000,
            active_interval_ms: 20_000,
            stable_interval_ms: 60_000,
            warmup_until_ms: 60_000,
            active_until_ms: 300_000,
        }
    }
}
