//! Delivery correlation: a link-layer status names an address, not a message.
//!
//! The tracked entry is found by resolving each entry's target board to its current address
//! and taking the first match in slot order, among entries still waiting on a link event.
//! With two messages in flight to the same board, a status may be credited to the older
//! one even if the radio was reporting on the newer. Callers that need exact attribution
//! should keep one confirmable message per board in flight.

use std::fmt;

use crate::ids::{BoardId, LinkAddress, BROADCAST_BOARD};
use crate::peers::PeerDirectory;
use crate::tracker::MessageTracker;

/// Who a delivery status was about, as far as the directory can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Board(BoardId),
    Broadcast,
}

impl Recipient {
    pub fn as_str(&self) -> &str {
        match self {
            Recipient::Board(id) => id.as_str(),
            Recipient::Broadcast => BROADCAST_BOARD,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    /// `None` when the address belongs to no known board.
    pub recipient: Option<Recipient>,
    /// Tracker slot the status applies to, if any.
    pub slot: Option<usize>,
}

pub fn correlate<A: LinkAddress>(
    address: &A,
    peers: &PeerDirectory<A>,
    tracker: &MessageTracker,
) -> Correlation {
    if address.is_broadcast() {
        return Correlation {
            recipient: Some(Recipient::Broadcast),
            slot: None,
        };
    }
    let recipient = peers
        .board_for_address(address)
        .cloned()
        .map(Recipient::Board);
    let slot = tracker
        .iter()
        .filter(|(_, m)| m.awaiting_link_status())
        .find(|(_, m)| peers.resolve(m.target.as_str()) == Some(address))
        .map(|(slot, _)| slot);
    Correlation { recipient, slot }
}
