//! Well-known command names exchanged on the command channel.
//!
//! The mirroring side announces itself with [`START_WORK_NOTIFY`], answers
//! [`PING`] liveness checks, and publishes [`NEW_FRAME`] notifications whose
//! content is the compact JSON object
//! `{"width":W,"height":H,"sequence":S,"timestamp":T}`.

/// Sent once by the mirroring side after the connection is initiated.
pub const START_WORK_NOTIFY: &str = "start_work_notify";

/// Liveness check issued by the controller.
pub const PING: &str = "ping";

/// Result message of a successful [`PING`].
pub const PONG: &str = "pong";

/// A new video frame is available in the shared frame channel.
pub const NEW_FRAME: &str = "new_frame";

/// Controller asks the mirroring side to start publishing frames.
pub const ENABLE_FRAMES: &str = "enable_frames";

/// Controller asks the mirroring side to stop publishing frames.
pub const DISABLE_FRAMES: &str = "disable_frames";

/// Controller asks the mirroring side to stop its event loop.
pub const SHUTDOWN: &str = "shutdown";

/// Result message sent back for a command that has no registered handler.
pub const UNKNOWN_COMMAND: &str = "unknown";

/// Returns a short human-readable label for a command name.
pub fn command_label(name: &str) -> &'static str {
    match name {
        START_WORK_NOTIFY => "START",
        PING => "PING",
        NEW_FRAME => "FRAME",
        ENABLE_FRAMES | DISABLE_FRAMES => "FRAMES",
        SHUTDOWN => "SHUTDOWN",
        _ => "USER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_builtin_commands() {
        assert_eq!(command_label(PING), "PING");
        assert_eq!(command_label(NEW_FRAME), "FRAME");
        assert_eq!(command_label("take_screenshot"), "USER");
    }
}
