//! Framing: length-prefix (2 bytes LE) + bincode frame. One frame per radio datagram.

use crate::protocol::{Frame, PROTOCOL_VERSION};

const LEN_SIZE: usize = 2;

/// Largest datagram the radio carries, prefix included.
pub const MAX_FRAME_LEN: usize = 250;

/// Encode a frame: 2 bytes LE length + bincode payload. Oversized frames are rejected, never cut.
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, FrameEncodeError> {
    encode_frame_limited(frame, MAX_FRAME_LEN)
}

/// Like `encode_frame` with a transport-specific ceiling (capped at `MAX_FRAME_LEN`).
pub fn encode_frame_limited(frame: &Frame, limit: usize) -> Result<Vec<u8>, FrameEncodeError> {
    let payload = bincode::serialize(frame).map_err(FrameEncodeError::Encode)?;
    let total = LEN_SIZE + payload.len();
    let limit = limit.min(MAX_FRAME_LEN);
    if total > limit {
        return Err(FrameEncodeError::TooLarge { len: total, limit });
    }
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Error encoding a frame (bincode or size limit).
#[derive(Debug, thiserror::Error)]
pub enum FrameEncodeError {
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("frame is {len} bytes, limit is {limit}")]
    TooLarge { len: usize, limit: usize },
}

/// Decode one frame from the front of `bytes`. Returns the frame and the number of bytes consumed.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), FrameDecodeError> {
    if bytes.len() < LEN_SIZE {
        return Err(FrameDecodeError::NeedMore);
    }
    let len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
    if LEN_SIZE + len > MAX_FRAME_LEN {
        return Err(FrameDecodeError::TooLarge);
    }
    if bytes.len() < LEN_SIZE + len {
        return Err(FrameDecodeError::NeedMore);
    }
    let frame: Frame = bincode::deserialize(&bytes[LEN_SIZE..LEN_SIZE + len])
        .map_err(FrameDecodeError::Decode)?;
    if frame.version != PROTOCOL_VERSION {
        return Err(FrameDecodeError::Version(frame.version));
    }
    Ok((frame, LEN_SIZE + len))
}

/// Decode a datagram that must hold exactly one frame.
pub fn decode_datagram(bytes: &[u8]) -> Result<Frame, FrameDecodeError> {
    let (frame, used) = decode_frame(bytes)?;
    if used != bytes.len() {
        return Err(FrameDecodeError::TrailingBytes(bytes.len() - used));
    }
    Ok(frame)
}

/// Error decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameDecodeError {
    #[error("need more bytes")]
    NeedMore,
    #[error("frame too large")]
    TooLarge,
    #[error("decode error: {0}")]
    Decode(#[from] bincode::Error),
    #[error("unsupported protocol version {0}")]
    Version(u8),
    #[error("{0} bytes after frame")]
    TrailingBytes(usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{BoardId, MessageId};
    use crate::protocol::Body;

    fn board(name: &str) -> BoardId {
        BoardId::new(name).unwrap()
    }

    #[test]
    fn roundtrip_pin_control_with_id() {
        let id = MessageId::generate();
        let frame = Frame::new(board("porch"), Body::PinControl { pin: 4, value: 1 })
            .with_message_id(id);
        let bytes = encode_frame(&frame).unwrap();
        let (decoded, n) = decode_frame(&bytes).unwrap();
        assert_eq!(n, bytes.len());
        assert_eq!(decoded, frame);
        assert_eq!(decoded.message_id, Some(id));
    }

    #[test]
    fn discovery_frame_is_small() {
        let frame = Frame::new(board("a"), Body::Discovery);
        let bytes = encode_frame(&frame).unwrap();
        assert!(bytes.len() < 32, "discovery frame was {} bytes", bytes.len());
    }

    #[test]
    fn oversized_frame_rejected_not_truncated() {
        let frame = Frame::new(
            board("garage"),
            Body::DirectMessage {
                message: "z".repeat(400),
            },
        );
        match encode_frame(&frame) {
            Err(FrameEncodeError::TooLarge { len, limit }) => {
                assert!(len > 400);
                assert_eq!(limit, MAX_FRAME_LEN);
            }
            other => panic!("expected TooLarge, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn transport_limit_applies() {
        let frame = Frame::new(
            board("garage"),
            Body::Topic {
                topic: "t".into(),
                message: "m".repeat(60),
            },
        );
        assert!(encode_frame(&frame).is_ok());
        assert!(matches!(
            encode_frame_limited(&frame, 40),
            Err(FrameEncodeError::TooLarge { limit: 40, .. })
        ));
    }

    #[test]
    fn partial_read_need_more() {
        let frame = Frame::new(board("a"), Body::PinReadRequest { pin: 2 });
        let bytes = encode_frame(&frame).unwrap();
        assert!(matches!(decode_frame(&bytes[..1]), Err(FrameDecodeError::NeedMore)));
        assert!(matches!(
            decode_frame(&bytes[..bytes.len() - 1]),
            Err(FrameDecodeError::NeedMore)
        ));
    }

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        let junk = [0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        assert!(decode_frame(&junk).is_err());
        assert!(decode_frame(&[0xFF, 0xFF, 0x00]).is_err());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut frame = Frame::new(board("a"), Body::Discovery);
        frame.version = 9;
        let payload = bincode::serialize(&frame).unwrap();
        let mut bytes = (payload.len() as u16).to_le_bytes().to_vec();
        bytes.extend_from_slice(&payload);
        assert!(matches!(decode_frame(&bytes), Err(FrameDecodeError::Version(9))));
    }

    #[test]
    fn datagram_with_trailing_bytes_rejected() {
        let frame = Frame::new(board("a"), Body::Discovery);
        let mut bytes = encode_frame(&frame).unwrap();
        assert!(decode_datagram(&bytes).is_ok());
        bytes.push(0);
        assert!(matches!(
            decode_datagram(&bytes),
            Err(FrameDecodeError::TrailingBytes(1))
        ));
    }
}
