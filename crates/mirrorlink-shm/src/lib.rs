//! Shared frame channel.
//!
//! A named shared region holding exactly one frame: a fixed 36-byte
//! [`FrameHeader`] followed by the pixel payload. The creator writes, any
//! number of openers read. There is no synchronization between them; a
//! reader may observe a frame that is being overwritten.
//!
//! Two backings are supported: a memory-mapped file at
//! `<temp>/scrcpy_<name>.map` (the default) and a named shared memory object.

pub mod buffer;
pub mod error;
pub mod header;
pub mod mapping;
pub mod naming;
mod sys;

pub use buffer::{SharedFrameBuffer, SharedFrameBufferMut};
pub use error::{Result, ShmError};
pub use header::{FrameHeader, PixelFormat, FRAME_HEADER_SIZE};
pub use mapping::{FrameMapping, MappingConfig};
pub use naming::{mapping_file_path, resolve_temp_dir, temp_dir, BackingIdentity, BackingKind};
