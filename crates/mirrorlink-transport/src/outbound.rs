use bytes::{Buf, BytesMut};
use mirrorlink_wire::{encode_frame, encode_request, encode_response, Frame};

use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Encoded frames waiting to be written to the peer.
#[derive(Debug)]
pub struct Outbound {
    buf: BytesMut,
}

impl Default for Outbound {
    fn default() -> Self {
        Self::new()
    }
}

impl Outbound {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append a request frame.
    pub fn push_request(&mut self, id: u16, command: &[u8], content: &[u8]) -> Result<()> {
        encode_request(id, command, content, &mut self.buf)?;
        Ok(())
    }

    /// Append a response frame answering `id`.
    pub fn push_response(
        &mut self,
        id: u16,
        success: bool,
        command: &[u8],
        content: &[u8],
    ) -> Result<()> {
        encode_response(id, success, command, content, &mut self.buf)?;
        Ok(())
    }

    /// Append an already-built frame.
    pub fn push_frame(&mut self, frame: &Frame) -> Result<()> {
        encode_frame(frame, &mut self.buf)?;
        Ok(())
    }

    /// Number of bytes not yet written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take every pending byte, leaving the buffer empty.
    pub fn split(&mut self) -> BytesMut {
        self.buf.split()
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn consume(&mut self, written: usize) {
        self.buf.advance(written);
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use mirrorlink_wire::{decode_frame, MessageType, WireConfig};

    use super::*;

    #[test]
    fn frames_are_queued_in_order() {
        let mut out = Outbound::new();
        out.push_request(1, b"start_work_notify", b"").unwrap();
        out.push_response(9, false, b"bogus", b"unknown").unwrap();

        let mut wire = out.split();
        assert!(out.is_empty());

        let config = WireConfig::default();
        let first = decode_frame(&mut wire, &config).unwrap().unwrap();
        let second = decode_frame(&mut wire, &config).unwrap().unwrap();

        assert_eq!(first.kind, MessageType::Request);
        assert_eq!(first.id, 1);
        assert_eq!(second.kind, MessageType::Response);
        assert!(!second.is_success());
        assert_eq!(second.content.as_ref(), b"unknown");
    }

    #[test]
    fn consume_drops_written_prefix() {
        let mut out = Outbound::new();
        out.push_frame(&Frame::request(2, "ping", "")).unwrap();
        let total = out.len();

        out.consume(5);
        assert_eq!(out.len(), total - 5);
        out.clear();
        assert!(out.is_empty());
    }
}
