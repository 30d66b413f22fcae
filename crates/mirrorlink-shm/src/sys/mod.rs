//! Platform mapping primitives.
//!
//! Each backend provides the same internal surface: a [`Region`] that owns
//! one mapped view (unmapped on drop) and `remove_backing` for the creator's
//! cleanup.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::{remove_backing, BackingStamp, Region};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::{remove_backing, BackingStamp, Region};
