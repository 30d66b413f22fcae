//! Command channel and shared frame publishing for screen mirroring processes.
//!
//! A mirroring process connects out to its controller over TCP, answers named
//! commands, and publishes rendered frames into a shared memory slot that
//! other local processes read directly.
//!
//! # Crate Structure
//!
//! - [`wire`]: binary request/response framing and well-known command names
//! - [`transport`]: non-blocking single-connection transport driven by `step()`
//! - [`command`]: command registry, dispatcher and [`command::CommandChannel`]
//! - [`shm`]: shared frame channel (behind the `transmit` feature)
//! - [`transmit`]: frame transmitter (behind the `transmit` feature)

/// Re-export wire types.
pub mod wire {
    pub use mirrorlink_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use mirrorlink_transport::*;
}

/// Re-export command types.
pub mod command {
    pub use mirrorlink_command::*;
}

/// Re-export shared frame channel types (requires `transmit` feature).
#[cfg(feature = "transmit")]
pub mod shm {
    pub use mirrorlink_shm::*;
}

/// Re-export frame transmitter types (requires `transmit` feature).
#[cfg(feature = "transmit")]
pub mod transmit {
    pub use mirrorlink_transmit::*;
}
