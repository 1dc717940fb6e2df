//! Link diagnostics: counters kept by the node and a JSON status snapshot.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Frames handed to the transport (first attempts, resends, acks, beacons).
    pub frames_sent: u64,
    pub frames_received: u64,
    /// Sends the transport refused plus negative delivery reports.
    pub send_failures: u64,
    pub malformed_dropped: u64,
    pub retries: u64,
    /// Confirmable sends that went out without tracking because the pool was full.
    pub untracked_sends: u64,
    pub acks_received: u64,
}

impl LinkStats {
    /// Percentage of sent frames that did not fail; 0 before anything was sent.
    pub fn success_rate(&self) -> f32 {
        if self.frames_sent == 0 {
            return 0.0;
        }
        let ok = self.frames_sent.saturating_sub(self.send_failures);
        ok as f32 * 100.0 / self.frames_sent as f32
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerStatus {
    pub board_id: String,
    pub address: String,
    pub last_seen_seconds: u64,
}

/// Snapshot rendered by `Node::status_json`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub board_id: String,
    pub peers_count: usize,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub message_failures: u64,
    pub success_rate: f32,
    pub malformed_dropped: u64,
    pub retries: u64,
    pub untracked_sends: u64,
    pub tracked_in_flight: usize,
    pub inbox_dropped: u32,
    pub peers: Vec<PeerStatus>,
}

impl StatusReport {
    pub fn new(status: &'static str, board_id: String, stats: &LinkStats) -> Self {
        Self {
            status,
            board_id,
            peers_count: 0,
            messages_sent: stats.frames_sent,
            messages_received: stats.frames_received,
            message_failures: stats.send_failures,
            success_rate: stats.success_rate(),
            malformed_dropped: stats.malformed_dropped,
            retries: stats.retries,
            untracked_sends: stats.untracked_sends,
            tracked_in_flight: 0,
            inbox_dropped: 0,
            peers: Vec::new(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
