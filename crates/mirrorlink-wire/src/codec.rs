use std::borrow::Cow;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};

/// Frame header: type (1) + flag (1) + id (2) + cmd_len (4) + content_len (4) = 12 bytes.
pub const HEADER_SIZE: usize = 12;

/// Default maximum command name length accepted from a peer: 4 KiB.
pub const DEFAULT_MAX_COMMAND_LEN: usize = 4 * 1024;

/// Default maximum content length accepted from a peer: 16 MiB.
pub const DEFAULT_MAX_CONTENT_LEN: usize = 16 * 1024 * 1024;

/// Direction of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Request = 0,
    Response = 1,
}

impl MessageType {
    /// Parse the on-wire type byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Self::Request),
            1 => Ok(Self::Response),
            other => Err(WireError::InvalidMessageType(other)),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Decoded fixed-size frame header, in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: MessageType,
    pub flag: u8,
    pub id: u16,
    pub cmd_len: u32,
    pub content_len: u32,
}

impl Header {
    /// Read a header from the front of `src` without consuming anything.
    ///
    /// Returns `Ok(None)` if fewer than [`HEADER_SIZE`] bytes are available.
    pub fn peek(src: &[u8]) -> Result<Option<Self>> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let kind = MessageType::from_byte(src[0])?;
        let flag = src[1];
        let id = u16::from_be_bytes([src[2], src[3]]);
        let cmd_len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]);
        let content_len = u32::from_be_bytes([src[8], src[9], src[10], src[11]]);

        Ok(Some(Self {
            kind,
            flag,
            id,
            cmd_len,
            content_len,
        }))
    }

    /// Total wire size of the frame this header announces.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.cmd_len as usize + self.content_len as usize
    }

    fn put(&self, dst: &mut BytesMut) {
        dst.put_u8(self.kind.as_byte());
        dst.put_u8(self.flag);
        dst.put_u16(self.id);
        dst.put_u32(self.cmd_len);
        dst.put_u32(self.content_len);
    }
}

/// One complete request or response on the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Request or response.
    pub kind: MessageType,
    /// Raw flag byte. Responses use 1 for success and 0 for failure.
    pub flag: u8,
    /// Correlation id.
    pub id: u16,
    /// Command name bytes (an identifier, normally ASCII).
    pub command: Bytes,
    /// Content bytes (opaque).
    pub content: Bytes,
}

impl Frame {
    /// Build a request frame.
    pub fn request(id: u16, command: impl Into<Bytes>, content: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageType::Request,
            flag: 0,
            id,
            command: command.into(),
            content: content.into(),
        }
    }

    /// Build a response frame answering `id`.
    pub fn response(
        id: u16,
        success: bool,
        command: impl Into<Bytes>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            kind: MessageType::Response,
            flag: u8::from(success),
            id,
            command: command.into(),
            content: content.into(),
        }
    }

    pub fn is_request(&self) -> bool {
        self.kind == MessageType::Request
    }

    /// Whether the success bit is set. Only meaningful on responses.
    pub fn is_success(&self) -> bool {
        self.flag != 0
    }

    /// The command name as text. Invalid UTF-8 is replaced, never rejected.
    pub fn command_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.command)
    }

    /// The content as text, lossily.
    pub fn content_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// The total wire size of this frame (header + command + content).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.command.len() + self.content.len()
    }
}

/// Limits applied while decoding frames announced by a peer.
#[derive(Debug, Clone)]
pub struct WireConfig {
    /// Maximum command name length in bytes. Default: 4 KiB.
    pub max_command_len: usize,
    /// Maximum content length in bytes. Default: 16 MiB.
    pub max_content_len: usize,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_command_len: DEFAULT_MAX_COMMAND_LEN,
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
        }
    }
}

/// Encode a request frame.
pub fn encode_request(id: u16, command: &[u8], content: &[u8], dst: &mut BytesMut) -> Result<()> {
    encode_parts(MessageType::Request, 0, id, command, content, dst)
}

/// Encode a response frame answering `id`.
pub fn encode_response(
    id: u16,
    success: bool,
    command: &[u8],
    content: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    encode_parts(
        MessageType::Response,
        u8::from(success),
        id,
        command,
        content,
        dst,
    )
}

/// Encode an already-built frame.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    encode_parts(
        frame.kind,
        frame.flag,
        frame.id,
        &frame.command,
        &frame.content,
        dst,
    )
}

/// Wire format:
/// ```text
/// ┌──────┬──────┬──────────┬──────────────┬──────────────┬─────────┬─────────┐
/// │ type │ flag │ id       │ cmd_len      │ content_len  │ command │ content │
/// │ (1B) │ (1B) │ (2B BE)  │ (4B BE)      │ (4B BE)      │         │         │
/// └──────┴──────┴──────────┴──────────────┴──────────────┴─────────┴─────────┘
/// ```
fn encode_parts(
    kind: MessageType,
    flag: u8,
    id: u16,
    command: &[u8],
    content: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let cmd_len = wire_len("command", command.len())?;
    let content_len = wire_len("content", content.len())?;

    dst.reserve(HEADER_SIZE + command.len() + content.len());
    Header {
        kind,
        flag,
        id,
        cmd_len,
        content_len,
    }
    .put(dst);
    dst.put_slice(command);
    dst.put_slice(content);
    Ok(())
}

fn wire_len(section: &'static str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| WireError::PayloadTooLarge {
        section,
        size: len,
        max: u32::MAX as usize,
    })
}

/// Decode one frame from the front of a receive buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet; in
/// that case nothing is consumed and the header is re-validated on the next
/// call. On success, consumes exactly the frame's bytes.
pub fn decode_frame(src: &mut BytesMut, config: &WireConfig) -> Result<Option<Frame>> {
    let header = match Header::peek(src)? {
        Some(header) => header,
        None => return Ok(None), // Need more data
    };

    let cmd_len = header.cmd_len as usize;
    let content_len = header.content_len as usize;

    if cmd_len > config.max_command_len {
        return Err(WireError::PayloadTooLarge {
            section: "command",
            size: cmd_len,
            max: config.max_command_len,
        });
    }
    if content_len > config.max_content_len {
        return Err(WireError::PayloadTooLarge {
            section: "content",
            size: content_len,
            max: config.max_content_len,
        });
    }

    if src.len() < header.frame_len() {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let command = src.split_to(cmd_len).freeze();
    let content = src.split_to(content_len).freeze();

    Ok(Some(Frame {
        kind: header.kind,
        flag: header.flag,
        id: header.id,
        command,
        content,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(buf: &mut BytesMut) -> Vec<Frame> {
        let config = WireConfig::default();
        let mut frames = Vec::new();
        while let Some(frame) = decode_frame(buf, &config).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_request_roundtrip() {
        let mut buf = BytesMut::new();
        encode_request(7, b"screenshot", b"path=/tmp/a.png", &mut buf).unwrap();

        assert_eq!(buf.len(), HEADER_SIZE + 10 + 15);

        let frame = decode_frame(&mut buf, &WireConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(frame.kind, MessageType::Request);
        assert_eq!(frame.flag, 0);
        assert_eq!(frame.id, 7);
        assert_eq!(frame.command.as_ref(), b"screenshot");
        assert_eq!(frame.content.as_ref(), b"path=/tmp/a.png");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_response_roundtrip_with_empty_content() {
        let mut buf = BytesMut::new();
        encode_response(0xBEEF, true, b"ping", b"", &mut buf).unwrap();

        let frame = decode_frame(&mut buf, &WireConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(frame.kind, MessageType::Response);
        assert!(frame.is_success());
        assert_eq!(frame.id, 0xBEEF);
        assert_eq!(frame.command_str(), "ping");
        assert!(frame.content.is_empty());
    }

    #[test]
    fn test_failure_response_clears_flag() {
        let frame = Frame::response(3, false, "nope", "unknown");
        let mut buf = BytesMut::new();
        encode_frame(&frame, &mut buf).unwrap();

        assert_eq!(buf[1], 0);
        let decoded = decode_frame(&mut buf, &WireConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_header_is_big_endian() {
        let mut buf = BytesMut::new();
        encode_request(0x0102, b"ab", b"xyz", &mut buf).unwrap();

        assert_eq!(
            &buf[..HEADER_SIZE],
            &[0, 0, 0x01, 0x02, 0, 0, 0, 2, 0, 0, 0, 3]
        );
        assert_eq!(&buf[HEADER_SIZE..], b"abxyz");
    }

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 1, 0][..]);
        let result = decode_frame(&mut buf, &WireConfig::default()).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_decode_incomplete_body_consumes_nothing() {
        let mut buf = BytesMut::new();
        encode_request(1, b"hello", b"world", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 7);

        let result = decode_frame(&mut buf, &WireConfig::default()).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 7);
    }

    #[test]
    fn test_fragmented_frame_yields_single_frame() {
        let mut wire = BytesMut::new();
        encode_request(42, b"new_frame", b"{\"width\":4}", &mut wire).unwrap();
        let whole = wire.clone();
        let expected = decode_frame(&mut wire, &WireConfig::default())
            .unwrap()
            .unwrap();

        for chunk_size in [1usize, 2, 3, 5, 11, 13] {
            let mut buf = BytesMut::new();
            let mut frames = Vec::new();
            for chunk in whole.chunks(chunk_size) {
                buf.extend_from_slice(chunk);
                frames.extend(decode_all(&mut buf));
            }
            assert_eq!(frames.len(), 1, "chunk size {chunk_size}");
            assert_eq!(frames[0], expected);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn test_multiple_frames_in_arrival_order() {
        let mut buf = BytesMut::new();
        encode_request(1, b"first", b"", &mut buf).unwrap();
        encode_response(2, true, b"second", b"ok", &mut buf).unwrap();
        encode_request(3, b"third", b"3", &mut buf).unwrap();

        let frames = decode_all(&mut buf);
        let ids: Vec<u16> = frames.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(frames[1].command.as_ref(), b"second");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_trailing_partial_frame_is_kept() {
        let mut buf = BytesMut::new();
        encode_request(1, b"one", b"", &mut buf).unwrap();
        encode_request(2, b"two", b"payload", &mut buf).unwrap();
        buf.truncate(buf.len() - 3);

        let frames = decode_all(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(buf.len(), HEADER_SIZE + 3 + 4);
    }

    #[test]
    fn test_decode_invalid_type() {
        let mut buf = BytesMut::from(&[7u8, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0][..]);
        let result = decode_frame(&mut buf, &WireConfig::default());
        assert!(matches!(result, Err(WireError::InvalidMessageType(7))));
    }

    #[test]
    fn test_decode_content_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_u16(1);
        buf.put_u32(4);
        buf.put_u32(64 * 1024 * 1024);

        let result = decode_frame(&mut buf, &WireConfig::default());
        assert!(matches!(
            result,
            Err(WireError::PayloadTooLarge {
                section: "content",
                ..
            })
        ));
    }

    #[test]
    fn test_decode_command_too_large() {
        let config = WireConfig {
            max_command_len: 8,
            ..WireConfig::default()
        };
        let mut buf = BytesMut::new();
        encode_request(1, b"much-too-long-command", b"", &mut buf).unwrap();

        let result = decode_frame(&mut buf, &config);
        assert!(matches!(
            result,
            Err(WireError::PayloadTooLarge {
                section: "command",
                ..
            })
        ));
    }

    #[test]
    fn test_non_utf8_content_preserved() {
        let content = [0xFFu8, 0x00, 0xFE, 0x80];
        let mut buf = BytesMut::new();
        encode_request(9, b"blob", &content, &mut buf).unwrap();

        let frame = decode_frame(&mut buf, &WireConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(frame.content.as_ref(), &content);
    }

    #[test]
    fn test_frame_wire_size() {
        let frame = Frame::request(1, Bytes::from_static(b"ping"), Bytes::new());
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
    }
}
