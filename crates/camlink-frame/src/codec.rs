use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: marker (2) + length (4) = 6 bytes.
pub const FRAME_HEADER_SIZE: usize = 6;

/// Command header: length (2).
pub const COMMAND_HEADER_SIZE: usize = 2;

/// Frame marker bytes.
pub const MAGIC: [u8; 2] = [0xBE, 0xEF];

/// Default maximum frame payload accepted by readers: 2,000,000 bytes.
///
/// A 640x480 JPEG at the quality the device encodes with is well under
/// 100 KiB, so anything near this cap is garbage.
pub const DEFAULT_MAX_PAYLOAD: usize = 2_000_000;

/// Longest command text the 16-bit prefix can carry.
pub const MAX_COMMAND_LEN: usize = u16::MAX as usize;

/// One encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// JPEG bytes; opaque to this layer.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬─────────────┬──────────────────┐
/// │ Marker (2B)  │ Length      │ Payload          │
/// │ 0xBE 0xEF    │ (4B BE)     │ (Length bytes)   │
/// └──────────────┴─────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(FRAME_HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::ProtocolDesync {
            found: [src[0], src[1]],
        });
    }

    let payload_len = (&src[2..6]).get_u32() as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = FRAME_HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(FRAME_HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { payload }))
}

/// Drop bytes from the front of `src` until it starts with the frame marker.
///
/// Returns the number of bytes discarded. A trailing `0xBE` is kept since it
/// may be the first half of a marker still in flight.
pub fn skip_to_marker(src: &mut BytesMut) -> usize {
    if let Some(pos) = src.windows(2).position(|w| w == MAGIC) {
        src.advance(pos);
        return pos;
    }
    let keep = usize::from(src.last() == Some(&MAGIC[0]));
    let dropped = src.len() - keep;
    src.advance(dropped);
    dropped
}

/// Encode a command message: 16-bit big-endian length + UTF-8 text.
pub fn encode_command(text: &str, dst: &mut BytesMut) -> Result<()> {
    let bytes = text.as_bytes();
    if bytes.len() > MAX_COMMAND_LEN {
        return Err(FrameError::CommandTooLong { len: bytes.len() });
    }
    dst.reserve(COMMAND_HEADER_SIZE + bytes.len());
    dst.put_u16(bytes.len() as u16);
    dst.put_slice(bytes);
    Ok(())
}

/// Decode one command message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't hold the whole message yet. The
/// payload is returned as raw bytes; text decoding is the caller's concern.
pub fn decode_command(src: &mut BytesMut) -> Result<Option<Bytes>> {
    if src.len() < COMMAND_HEADER_SIZE {
        return Ok(None);
    }
    let len = (&src[0..2]).get_u16() as usize;
    if src.len() < COMMAND_HEADER_SIZE + len {
        return Ok(None);
    }
    src.advance(COMMAND_HEADER_SIZE);
    Ok(Some(src.split_to(len).freeze()))
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 2,000,000.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
    /// Skip garbage up to the next marker (and drop oversized frames) instead
    /// of failing with `ProtocolDesync`. Off by default.
    pub resync: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
            resync: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"\xFF\xD8jpeg-bytes\xFF\xD9";

        encode_frame(payload, &mut buf).unwrap();

        assert_eq!(buf.len(), FRAME_HEADER_SIZE + payload.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();

        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_layout_is_big_endian() {
        let mut buf = BytesMut::new();
        encode_frame(&[0u8; 100], &mut buf).unwrap();
        assert_eq!(&buf[..6], &[0xBE, 0xEF, 0x00, 0x00, 0x00, 0x64]);
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0xBE, 0xEF, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf).unwrap();
        buf.truncate(FRAME_HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0x49, 0x50, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(
            result,
            Err(FrameError::ProtocolDesync { found: [0x49, 0x50] })
        ));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32(3_000_000);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f1.payload.as_ref(), b"first");

        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(f2.payload.as_ref(), b"second");

        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf).unwrap();

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_skip_to_marker() {
        let mut buf = BytesMut::from(&b"xx\x01\xBE\xEFrest"[..]);
        assert_eq!(skip_to_marker(&mut buf), 3);
        assert_eq!(&buf[..2], &MAGIC);

        let mut tail = BytesMut::from(&b"junk\xBE"[..]);
        assert_eq!(skip_to_marker(&mut tail), 4);
        assert_eq!(tail.as_ref(), &[0xBE]);
    }

    #[test]
    fn test_command_layout() {
        let mut buf = BytesMut::new();
        encode_command("ZOOM:0.75", &mut buf).unwrap();
        assert_eq!(&buf[..], b"\x00\x09ZOOM:0.75");

        let payload = decode_command(&mut buf).unwrap().unwrap();
        assert_eq!(payload.as_ref(), b"ZOOM:0.75");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_command_incomplete() {
        let mut buf = BytesMut::from(&b"\x00\x0DSWITCH"[..]);
        assert!(decode_command(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_command_too_long() {
        let text = "A".repeat(MAX_COMMAND_LEN + 1);
        let mut buf = BytesMut::new();
        let err = encode_command(&text, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::CommandTooLong { len } if len == MAX_COMMAND_LEN + 1));
    }
}
