//! Frame transmitter.
//!
//! On each trigger the [`FrameTransmitter`] pulls RGBA pixels from a
//! [`FrameSource`], stores them in the shared frame channel and announces the
//! new frame to the controller with a `new_frame` request carrying a
//! [`FrameNotice`].

pub mod error;
pub mod notice;
pub mod source;
pub mod transmitter;

pub use error::{Result, TransmitError};
pub use notice::{FrameNotice, FrameNotifier};
pub use source::{CaptureError, FrameSource};
pub use transmitter::{FrameTransmitter, TransmitterConfig, DEFAULT_MAX_FRAME_SIZE};
