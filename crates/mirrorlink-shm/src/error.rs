/// Errors that can occur while creating, opening or accessing a frame mapping.
#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    /// The mapping name cannot be turned into a backing identity.
    #[error("invalid mapping name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The requested capacity cannot hold a frame header.
    #[error("capacity {capacity} is smaller than the {min}-byte frame header")]
    CapacityTooSmall { capacity: usize, min: usize },

    /// Failed to create or size the backing store.
    #[error("failed to create {identity}: {source}")]
    Create {
        identity: String,
        source: std::io::Error,
    },

    /// Failed to open an existing backing store.
    #[error("failed to open {identity}: {source}")]
    Open {
        identity: String,
        source: std::io::Error,
    },

    /// The existing backing store is smaller than requested.
    #[error("{identity} is {actual} bytes, need at least {required}")]
    SizeMismatch {
        identity: String,
        actual: u64,
        required: usize,
    },

    /// Failed to map the backing store into memory.
    #[error("failed to map {identity}: {source}")]
    Map {
        identity: String,
        source: std::io::Error,
    },

    /// A frame does not fit the region or the caller's buffer.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The payload is shorter than the header's `frame_size`.
    #[error("payload too short ({actual} bytes, header declares {expected})")]
    PayloadTooShort { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ShmError>;
