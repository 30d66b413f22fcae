use std::fmt;
use std::io;

use mirrorlink_command::CommandError;
use mirrorlink_shm::ShmError;
use mirrorlink_transmit::TransmitError;
use mirrorlink_transport::{TransportError, FATAL_EXIT_CODE};
use mirrorlink_wire::WireError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// Shared with the transport's fatal-error exit so both paths report alike.
pub const TRANSPORT_ERROR: i32 = FATAL_EXIT_CODE;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::InvalidInput => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn wire_error(context: &str, err: WireError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } => io_error(context, source),
        TransportError::Protocol(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn command_error(context: &str, err: CommandError) -> CliError {
    match err {
        CommandError::Transport(err) => transport_error(context, err),
        CommandError::InvalidName { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn shm_error(context: &str, err: ShmError) -> CliError {
    match err {
        ShmError::Create { source, .. }
        | ShmError::Open { source, .. }
        | ShmError::Map { source, .. } => io_error(context, source),
        ShmError::InvalidName { .. } | ShmError::CapacityTooSmall { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn transmit_error(context: &str, err: TransmitError) -> CliError {
    match err {
        TransmitError::Shm(err) => shm_error(context, err),
        TransmitError::Notify(err) => command_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_mapping_is_a_plain_failure() {
        let err = shm_error(
            "open failed",
            ShmError::Open {
                identity: "mapping file /tmp/scrcpy_x.map".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("open failed: "));
    }

    #[test]
    fn protocol_errors_are_data_invalid() {
        let err = transport_error(
            "step failed",
            TransportError::Protocol(mirrorlink_wire::WireError::InvalidMessageType(7)),
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn lost_connection_uses_transport_code() {
        let err = command_error(
            "step failed",
            CommandError::Transport(TransportError::ConnectionLost(io::Error::from(
                io::ErrorKind::ConnectionReset,
            ))),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert_eq!(TRANSPORT_ERROR, 3);
    }

    #[test]
    fn transmit_errors_keep_their_underlying_code() {
        let notify = transmit_error(
            "frame notification failed",
            TransmitError::Notify(CommandError::Transport(TransportError::NotConnected)),
        );
        assert_eq!(notify.code, TRANSPORT_ERROR);
        assert!(notify.message.starts_with("frame notification failed: "));

        let shm = transmit_error(
            "publish failed",
            TransmitError::Shm(ShmError::Create {
                identity: "mapping file /tmp/scrcpy_x.map".into(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            }),
        );
        assert_eq!(shm.code, PERMISSION_DENIED);
    }
}
