/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The header carries a message type other than request (0) or response (1).
    #[error("invalid message type {0} (expected 0=request or 1=response)")]
    InvalidMessageType(u8),

    /// A command or content section exceeds the configured (or representable) size.
    #[error("{section} too large ({size} bytes, max {max})")]
    PayloadTooLarge {
        section: &'static str,
        size: usize,
        max: usize,
    },
}

pub type Result<T> = std::result::Result<T, WireError>;
