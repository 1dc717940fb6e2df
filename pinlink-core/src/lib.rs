//! PinLink engine: peer discovery and reliable messaging for boards sharing a broadcast radio.
//! Host-driven: no I/O; the host passes time, link events and API calls, and implements `Transport`.

pub mod config;
pub mod correlator;
pub mod discovery;
pub mod dispatch;
pub mod ids;
pub mod link;
pub mod node;
pub mod peers;
pub mod protocol;
pub mod stats;
pub mod time;
pub mod tracker;
pub mod wire;

pub use config::{CoreConfig, DiscoveryConfig};
pub use dispatch::{Dispatcher, SubscriptionError, Subscriptions};
pub use ids::{BoardId, IdError, LinkAddress, MacAddress, MessageId, BROADCAST_BOARD};
pub use link::{LinkEvent, LinkHandle};
pub use node::{Node, SendError, SendFailure, SendOutcome, Transport};
pub use peers::{Peer, PeerDirectory, PeerError, Registration};
pub use protocol::{Body, Frame, MessageKind, PROTOCOL_VERSION};
pub use stats::LinkStats;
pub use time::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use tracker::{PinControlOutcome, PinReadOutcome, SettleReason};
pub use wire::{decode_datagram, decode_frame, encode_frame, FrameDecodeError, FrameEncodeError};
