use std::time::Duration;

use mirrorlink_wire::WireConfig;

/// Exit code used when a fatal connection error terminates the process.
pub const FATAL_EXIT_CODE: i32 = 3;

/// What the transport does after an unrecoverable connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalPolicy {
    /// Log the error and terminate the process with [`FATAL_EXIT_CODE`].
    ///
    /// A broken control channel means the controller can no longer drive this
    /// process, so there is nothing to reconnect to.
    #[default]
    ExitProcess,
    /// Tear the connection down and return the error from `step()`.
    ///
    /// For embedders that own process lifetime themselves.
    Propagate,
}

/// Configuration for the command transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Limits applied to frames announced by the peer.
    pub wire: WireConfig,
    /// Bytes read from the socket per `read` call. Default: 8 KiB.
    pub read_chunk_size: usize,
    /// Connect timeout on platforms without a non-blocking connect path.
    pub connect_timeout: Duration,
    /// Behavior on fatal connection errors. Default: exit the process.
    pub fatal_policy: FatalPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            wire: WireConfig::default(),
            read_chunk_size: 8 * 1024,
            connect_timeout: Duration::from_secs(3),
            fatal_policy: FatalPolicy::ExitProcess,
        }
    }
}

impl TransportConfig {
    /// Override the fatal error policy.
    pub fn with_fatal_policy(mut self, policy: FatalPolicy) -> Self {
        self.fatal_policy = policy;
        self
    }
}
