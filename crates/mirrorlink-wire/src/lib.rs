//! Binary request/response framing for the mirrorlink command channel.
//!
//! Every message on the wire carries a fixed 12-byte header:
//! - 1 byte message type (request or response)
//! - 1 byte flag (success bit on responses)
//! - 2 byte big-endian correlation id
//! - 4 byte big-endian command length
//! - 4 byte big-endian content length
//!
//! followed by the command name and the content bytes. The decoder never
//! consumes a partial frame, so it can be fed a receive buffer that grows one
//! readiness event at a time.

pub mod codec;
pub mod commands;
pub mod error;

pub use codec::{
    decode_frame, encode_frame, encode_request, encode_response, Frame, Header, MessageType,
    WireConfig, DEFAULT_MAX_COMMAND_LEN, DEFAULT_MAX_CONTENT_LEN, HEADER_SIZE,
};
pub use error::{Result, WireError};
