//! Peer directory: fixed slots, linear scan, oldest-seen eviction when full.

use tracing::debug;

use crate::ids::{BoardId, LinkAddress};
use crate::time::Timestamp;

/// A board known through discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer<A> {
    pub board_id: BoardId,
    pub address: A,
    pub last_seen: Timestamp,
}

/// What `register_or_refresh` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Took a free slot.
    Added,
    /// Already known; `last_seen` bumped.
    Refreshed,
    /// Already known under a different address; address replaced.
    Moved,
    /// Table full; the least recently seen peer was overwritten.
    Replaced { evicted: BoardId },
}

impl Registration {
    pub fn is_new(&self) -> bool {
        matches!(self, Registration::Added | Registration::Replaced { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    #[error("the broadcast address cannot belong to a peer")]
    BroadcastAddress,
}

pub struct PeerDirectory<A> {
    slots: Vec<Option<Peer<A>>>,
}

impl<A: LinkAddress> PeerDirectory<A> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Upsert. At most one entry per board id ever exists.
    pub fn register_or_refresh(
        &mut self,
        board_id: &BoardId,
        address: A,
        now: Timestamp,
    ) -> Result<Registration, PeerError> {
        if address.is_broadcast() {
            return Err(PeerError::BroadcastAddress);
        }

        if let Some(peer) = self.find_mut(board_id.as_str()) {
            peer.last_seen = now;
            if peer.address != address {
                debug!(board = %board_id, old = %peer.address, new = %address, "peer address changed");
                peer.address = address;
                return Ok(Registration::Moved);
            }
            return Ok(Registration::Refreshed);
        }

        let fresh = Peer {
            board_id: board_id.clone(),
            address,
            last_seen: now,
        };

        if let Some(slot) = self.slots.iter_mut().find(|s| s.is_none()) {
            debug!(board = %board_id, address = %fresh.address, "peer added");
            *slot = Some(fresh);
            return Ok(Registration::Added);
        }

        // Full: overwrite the smallest last_seen; first slot wins ties.
        let victim = self.oldest_slot();
        let evicted = self.slots[victim]
            .replace(fresh)
            .map(|p| p.board_id)
            .unwrap_or_else(|| board_id.clone());
        debug!(board = %board_id, evicted = %evicted, "peer table full, evicted oldest");
        Ok(Registration::Replaced { evicted })
    }

    fn oldest_slot(&self) -> usize {
        let mut best = 0;
        let mut best_seen = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(peer) = slot {
                if best_seen.map_or(true, |t| peer.last_seen < t) {
                    best = i;
                    best_seen = Some(peer.last_seen);
                }
            }
        }
        best
    }

    fn find_mut(&mut self, board_id: &str) -> Option<&mut Peer<A>> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|p| p.board_id.as_str() == board_id)
    }

    pub fn get(&self, board_id: &str) -> Option<&Peer<A>> {
        self.iter().find(|p| p.board_id.as_str() == board_id)
    }

    pub fn resolve(&self, board_id: &str) -> Option<&A> {
        self.get(board_id).map(|p| &p.address)
    }

    /// Reverse lookup; first slot holding `address` wins.
    pub fn board_for_address(&self, address: &A) -> Option<&BoardId> {
        self.iter()
            .find(|p| p.address == *address)
            .map(|p| &p.board_id)
    }

    pub fn contains(&self, board_id: &str) -> bool {
        self.get(board_id).is_some()
    }

    /// The local board is always available to itself.
    pub fn is_available(&self, board_id: &str, local: &BoardId) -> bool {
        local.as_str() == board_id || self.contains(board_id)
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Board at `index` among active entries, in slot order. Not stable across churn.
    pub fn name_at(&self, index: usize) -> Option<&BoardId> {
        self.iter().nth(index).map(|p| &p.board_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer<A>> {
        self.slots.iter().flatten()
    }
}
