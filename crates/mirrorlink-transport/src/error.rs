use std::net::SocketAddr;

use mirrorlink_wire::WireError;

/// Errors that can occur in command transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to resolve the controller address.
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    /// Failed to begin connecting to the resolved address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// A connection is already in progress or established.
    #[error("transport already connected ({0})")]
    AlreadyConnected(&'static str),

    /// Frames can only be queued once a connect has been initiated.
    #[error("transport not connected")]
    NotConnected,

    /// The established connection failed (reset, unexpected close, write error).
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] std::io::Error),

    /// The peer sent bytes that do not form a valid frame.
    #[error("protocol violation: {0}")]
    Protocol(#[from] WireError),
}

impl TransportError {
    /// Whether this error tore the connection down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionLost(_) | Self::Protocol(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
