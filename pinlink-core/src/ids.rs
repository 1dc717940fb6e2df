//! Identifiers: board ids, message ids, and the opaque link-layer address.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest board id accepted, in bytes.
pub const MAX_BOARD_ID_LEN: usize = 31;

/// Pseudo board id reported for the all-peers address.
pub const BROADCAST_BOARD: &str = "broadcast";

/// Name a board announces itself with. Unique on the network, 1..=31 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardId(String);

impl BoardId {
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdError::Empty);
        }
        if id.len() > MAX_BOARD_ID_LEN {
            return Err(IdError::TooLong(id.len()));
        }
        Ok(BoardId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BoardId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BoardId::new(value)
    }
}

impl TryFrom<&str> for BoardId {
    type Error = IdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        BoardId::new(value)
    }
}

impl From<BoardId> for String {
    fn from(id: BoardId) -> Self {
        id.0
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl PartialEq<str> for BoardId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BoardId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("board id is empty")]
    Empty,
    #[error("board id is {0} bytes, limit is 31")]
    TooLong(usize),
}

/// Random 128-bit token identifying one logical message across its retries.
/// Travels as 16 raw bytes; displayed in the usual 8-4-4-4-12 form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn generate() -> Self {
        MessageId(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        MessageId(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Low-level destination the transport understands. The engine only compares,
/// clones and prints these; the broadcast address is never a peer.
pub trait LinkAddress: Clone + Eq + fmt::Debug + fmt::Display + Send + 'static {
    fn is_broadcast(&self) -> bool;
}

/// 6-byte hardware address, as used by station-mode radios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl LinkAddress for MacAddress {
    fn is_broadcast(&self) -> bool {
        *self == MacAddress::BROADCAST
    }
}

impl LinkAddress for SocketAddr {
    fn is_broadcast(&self) -> bool {
        matches!(self.ip(), IpAddr::V4(v4) if v4.is_broadcast())
    }
}
