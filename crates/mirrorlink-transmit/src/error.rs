use crate::source::CaptureError;

/// Errors that abort one transmit cycle.
#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    /// The frame source could not produce pixels.
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// The captured frame does not fit the staging buffer.
    #[error("{width}x{height} frame too large ({size} bytes, max {max})")]
    FrameTooLarge {
        width: u32,
        height: u32,
        size: u64,
        max: usize,
    },

    /// Shared frame channel error.
    #[error("shared frame channel error: {0}")]
    Shm(#[from] mirrorlink_shm::ShmError),

    /// Failed to queue the frame notification.
    #[error("notification failed: {0}")]
    Notify(#[from] mirrorlink_command::CommandError),

    /// Failed to encode the frame notification.
    #[error("json error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransmitError>;
