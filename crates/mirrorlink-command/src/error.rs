/// Errors that can occur in command registration and request issuing.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// A handler is already registered under this name.
    #[error("command {0:?} is already registered")]
    AlreadyRegistered(String),

    /// The command name cannot be carried in a frame.
    #[error("invalid command name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] mirrorlink_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, CommandError>;
