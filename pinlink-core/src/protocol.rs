//! PinLink wire protocol: frame envelope, message kinds, payload bodies.

use serde::{Deserialize, Serialize};

use crate::ids::{BoardId, MessageId};

/// Current protocol version. Frames carrying any other version are dropped.
pub const PROTOCOL_VERSION: u8 = 1;

/// Numeric message type, as reported to hosts in send-status notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    PinControl = 1,
    PinSubscribe = 2,
    PinPublish = 3,
    Topic = 4,
    SerialData = 5,
    DirectMessage = 6,
    Discovery = 7,
    DiscoveryResponse = 8,
    Acknowledgement = 9,
    PinReadRequest = 10,
    PinReadResponse = 11,
}

impl MessageKind {
    /// Kinds a caller may attach a completion callback to.
    pub fn is_confirmable(self) -> bool {
        matches!(self, MessageKind::PinControl | MessageKind::PinReadRequest)
    }

    /// Kinds resent automatically after a failed attempt.
    pub fn is_retryable(self) -> bool {
        self == MessageKind::PinControl
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => MessageKind::PinControl,
            2 => MessageKind::PinSubscribe,
            3 => MessageKind::PinPublish,
            4 => MessageKind::Topic,
            5 => MessageKind::SerialData,
            6 => MessageKind::DirectMessage,
            7 => MessageKind::Discovery,
            8 => MessageKind::DiscoveryResponse,
            9 => MessageKind::Acknowledgement,
            10 => MessageKind::PinReadRequest,
            11 => MessageKind::PinReadResponse,
            other => return Err(other),
        })
    }
}

/// Type-specific part of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    /// Set a pin on the receiving board.
    PinControl { pin: u8, value: u8 },
    /// Ask the receiving board to send us control for this pin.
    PinSubscribe { pin: u8 },
    /// Pin state announcement (broadcast).
    PinPublish { pin: u8, value: u8 },
    /// Topic message (broadcast).
    Topic { topic: String, message: String },
    /// Serial bytes echoed to every board (broadcast).
    SerialData { data: String },
    DirectMessage { message: String },
    /// "I exist". Carries nothing beyond the envelope's sender.
    Discovery,
    /// Unicast reply to a discovery from a board we had not seen.
    DiscoveryResponse,
    /// Confirms the frame whose `message_id` was `ack_id` was handled.
    Acknowledgement { ack_id: MessageId },
    PinReadRequest { pin: u8 },
    /// Answer to a read; `request_id` is the request's `message_id`.
    PinReadResponse {
        request_id: MessageId,
        pin: u8,
        value: u8,
        success: bool,
    },
}

impl Body {
    pub fn kind(&self) -> MessageKind {
        match self {
            Body::PinControl { .. } => MessageKind::PinControl,
            Body::PinSubscribe { .. } => MessageKind::PinSubscribe,
            Body::PinPublish { .. } => MessageKind::PinPublish,
            Body::Topic { .. } => MessageKind::Topic,
            Body::SerialData { .. } => MessageKind::SerialData,
            Body::DirectMessage { .. } => MessageKind::DirectMessage,
            Body::Discovery => MessageKind::Discovery,
            Body::DiscoveryResponse => MessageKind::DiscoveryResponse,
            Body::Acknowledgement { .. } => MessageKind::Acknowledgement,
            Body::PinReadRequest { .. } => MessageKind::PinReadRequest,
            Body::PinReadResponse { .. } => MessageKind::PinReadResponse,
        }
    }
}

/// Envelope shared by every frame on the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub version: u8,
    pub sender: BoardId,
    /// Present on unicast frames when acknowledgements are enabled; never on acks.
    pub message_id: Option<MessageId>,
    pub body: Body,
}

impl Frame {
    pub fn new(sender: BoardId, body: Body) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            sender,
            message_id: None,
            body,
        }
    }

    pub fn with_message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }

    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }
}
