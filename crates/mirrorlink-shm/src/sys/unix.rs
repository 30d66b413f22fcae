use std::ffi::CString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::ptr::{self, NonNull};
use std::slice;

use tracing::{debug, warn};

use crate::error::{Result, ShmError};
use crate::naming::BackingIdentity;

/// Device and inode of a file the creator made, checked before removal.
pub(crate) type BackingStamp = Option<(u64, u64)>;

/// One `MAP_SHARED` read-write view.
pub(crate) struct Region {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is exclusively owned by this value; access goes through
// `&self`/`&mut self`, so moving it to another thread is sound.
unsafe impl Send for Region {}

impl Region {
    /// Create (or truncate) the backing store, size it to `len`, map and zero it.
    ///
    /// A store that was created but could not be sized or mapped is removed
    /// again before the error is returned.
    pub(crate) fn create(
        identity: &BackingIdentity,
        len: usize,
        mode: u32,
    ) -> Result<(Self, BackingStamp)> {
        let file = match identity {
            BackingIdentity::File(path) => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .mode(mode)
                .open(path),
            BackingIdentity::SharedMemory(name) => {
                shm_open(name, libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC, mode)
            }
        }
        .map_err(|source| ShmError::Create {
            identity: identity.to_string(),
            source,
        })?;

        Self::initialize(identity, &file, len).inspect_err(|_| discard(identity))
    }

    fn initialize(
        identity: &BackingIdentity,
        file: &File,
        len: usize,
    ) -> Result<(Self, BackingStamp)> {
        let create_err = |source| ShmError::Create {
            identity: identity.to_string(),
            source,
        };
        file.set_len(len as u64).map_err(create_err)?;

        let stamp = match identity {
            BackingIdentity::File(_) => {
                let metadata = file.metadata().map_err(create_err)?;
                Some((metadata.dev(), metadata.ino()))
            }
            BackingIdentity::SharedMemory(_) => None,
        };

        let mut region = Self::map(file, len).map_err(|source| ShmError::Map {
            identity: identity.to_string(),
            source,
        })?;
        region.as_mut_slice().fill(0);
        Ok((region, stamp))
    }

    /// Map an existing backing store, requiring at least `len` bytes.
    pub(crate) fn open(identity: &BackingIdentity, len: usize) -> Result<Self> {
        let open_err = |source| ShmError::Open {
            identity: identity.to_string(),
            source,
        };

        let file = match identity {
            BackingIdentity::File(path) => OpenOptions::new().read(true).write(true).open(path),
            BackingIdentity::SharedMemory(name) => shm_open(name, libc::O_RDWR, 0),
        }
        .map_err(open_err)?;

        let actual = file.metadata().map_err(open_err)?.len();
        if actual < len as u64 {
            return Err(ShmError::SizeMismatch {
                identity: identity.to_string(),
                actual,
                required: len,
            });
        }

        Self::map(&file, len).map_err(|source| ShmError::Map {
            identity: identity.to_string(),
            source,
        })
    }

    fn map(file: &File, len: usize) -> io::Result<Self> {
        // SAFETY: `file` is an open descriptor sized to at least `len` bytes; the
        // kernel picks the address and the result is checked before use.
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;
        Ok(Self { ptr, len })
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` points to a live mapping of `len` bytes owned by `self`.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` guarantees no other view from this value.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Schedule write-back of the mapping without waiting for it.
    pub(crate) fn flush(&self) -> io::Result<()> {
        // SAFETY: the range is exactly the live mapping.
        let rc = unsafe { libc::msync(self.ptr.as_ptr().cast(), self.len, libc::MS_ASYNC) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: the mapping was created by `map` with this address and length
        // and is not referenced after drop.
        let rc = unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) };
        if rc != 0 {
            debug!(error = %io::Error::last_os_error(), "munmap failed");
        }
    }
}

/// Remove the backing store. Files are only removed while they are still the
/// file this process created. Returns whether anything was removed.
pub(crate) fn remove_backing(identity: &BackingIdentity, stamp: BackingStamp) -> io::Result<bool> {
    match identity {
        BackingIdentity::File(path) => {
            let metadata = match fs::symlink_metadata(path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e),
            };
            if let Some((dev, ino)) = stamp {
                if metadata.dev() != dev || metadata.ino() != ino {
                    debug!(path = ?path, "mapping file identity changed; skipping cleanup");
                    return Ok(false);
                }
            }
            fs::remove_file(path)?;
            Ok(true)
        }
        BackingIdentity::SharedMemory(name) => {
            let c_name = c_name(name)?;
            // SAFETY: `c_name` is a valid NUL-terminated string for the call.
            let rc = unsafe { libc::shm_unlink(c_name.as_ptr()) };
            if rc != 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::NotFound {
                    return Ok(false);
                }
                return Err(err);
            }
            Ok(true)
        }
    }
}

/// Remove a store left behind by a failed create.
fn discard(identity: &BackingIdentity) {
    if let Err(err) = remove_backing(identity, None) {
        warn!(%identity, error = %err, "failed to remove partially created mapping");
    }
}

fn shm_open(name: &str, flags: libc::c_int, mode: u32) -> io::Result<File> {
    let c_name = c_name(name)?;
    // SAFETY: `c_name` is a valid NUL-terminated string for the call; the
    // returned descriptor is checked before it is wrapped.
    let fd = unsafe { libc::shm_open(c_name.as_ptr(), flags, mode as libc::c_uint) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` was just returned by shm_open and is owned by nothing else.
    Ok(File::from(unsafe { OwnedFd::from_raw_fd(fd) }))
}

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains NUL"))
}
