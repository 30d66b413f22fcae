//! Non-blocking command transport.
//!
//! Wraps exactly one outbound TCP connection. The transport owns no thread:
//! the host calls [`Transport::step`] repeatedly from its own loop, and each
//! call performs one non-blocking pass over connect completion, reads,
//! frame decoding and writes.
//!
//! Decoded frames are handed to a [`FrameSink`]; replies and requests are
//! encoded into the transport's [`Outbound`] buffer and flushed on the next
//! pass.

pub mod config;
pub mod error;
pub mod outbound;
mod socket;
pub mod state;
pub mod transport;

pub use config::{FatalPolicy, TransportConfig, FATAL_EXIT_CODE};
pub use error::{Result, TransportError};
pub use outbound::Outbound;
pub use state::{ConnectionState, StopHandle};
pub use transport::{FrameSink, Transport};
