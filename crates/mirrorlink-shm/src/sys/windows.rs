use std::ffi::c_void;
use std::fs::{self, OpenOptions};
use std::io;
use std::iter;
use std::os::windows::io::AsRawHandle;
use std::ptr::{self, NonNull};
use std::slice;

use tracing::{debug, warn};
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE, INVALID_HANDLE_VALUE};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, FlushViewOfFile, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile,
    FILE_MAP_ALL_ACCESS, MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
};

use crate::error::{Result, ShmError};
use crate::naming::BackingIdentity;

/// Windows cleanup needs no identity check.
pub(crate) type BackingStamp = ();

/// One read-write view of a file mapping object.
pub(crate) struct Region {
    view: NonNull<u8>,
    len: usize,
    mapping: HANDLE,
}

// SAFETY: the view and mapping handle are exclusively owned by this value.
unsafe impl Send for Region {}

impl Region {
    /// A file backing that was created but could not be sized or mapped is
    /// deleted again before the error is returned.
    pub(crate) fn create(
        identity: &BackingIdentity,
        len: usize,
        _mode: u32,
    ) -> Result<(Self, BackingStamp)> {
        let create_err = |source| ShmError::Create {
            identity: identity.to_string(),
            source,
        };

        let mapping = match identity {
            BackingIdentity::File(path) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(create_err)?;
                let mapping = file
                    .set_len(len as u64)
                    .and_then(|()| file_mapping(file.as_raw_handle() as HANDLE, 0, None));
                // The file handle must be closed before the file can be deleted.
                drop(file);
                mapping.map_err(|source| {
                    discard(identity);
                    create_err(source)
                })?
            }
            BackingIdentity::SharedMemory(name) => {
                file_mapping(INVALID_HANDLE_VALUE, len as u64, Some(name)).map_err(create_err)?
            }
        };

        // `map` closes the section handle on failure, so the file is unlocked.
        let mut region = Self::map(mapping, len).map_err(|source| {
            discard(identity);
            ShmError::Map {
                identity: identity.to_string(),
                source,
            }
        })?;
        region.as_mut_slice().fill(0);
        Ok((region, ()))
    }

    pub(crate) fn open(identity: &BackingIdentity, len: usize) -> Result<Self> {
        let open_err = |source| ShmError::Open {
            identity: identity.to_string(),
            source,
        };

        let mapping = match identity {
            BackingIdentity::File(path) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(open_err)?;
                let actual = file.metadata().map_err(open_err)?.len();
                if actual < len as u64 {
                    return Err(ShmError::SizeMismatch {
                        identity: identity.to_string(),
                        actual,
                        required: len,
                    });
                }
                file_mapping(file.as_raw_handle() as HANDLE, 0, None)
            }
            BackingIdentity::SharedMemory(name) => {
                let wide = wide(name);
                // SAFETY: `wide` is NUL-terminated and outlives the call.
                let handle = unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, 0, wide.as_ptr()) };
                if handle.is_null() {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(handle)
                }
            }
        }
        .map_err(open_err)?;

        // Mapping more than the section holds fails here, which covers the
        // size check for named sections.
        Self::map(mapping, len).map_err(|source| ShmError::Map {
            identity: identity.to_string(),
            source,
        })
    }

    /// Map `len` bytes of `mapping`. Takes ownership of the handle.
    fn map(mapping: HANDLE, len: usize) -> io::Result<Self> {
        // SAFETY: `mapping` is a valid file mapping handle owned by this call.
        let view = unsafe { MapViewOfFile(mapping, FILE_MAP_ALL_ACCESS, 0, 0, len) };
        match NonNull::new(view.Value.cast::<u8>()) {
            Some(view) => Ok(Self { view, len, mapping }),
            None => {
                let err = io::Error::last_os_error();
                // SAFETY: the handle is owned here and not used afterwards.
                unsafe { CloseHandle(mapping) };
                Err(err)
            }
        }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: `view` points to a live view of `len` bytes owned by `self`.
        unsafe { slice::from_raw_parts(self.view.as_ptr(), self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; `&mut self` guarantees no other view from this value.
        unsafe { slice::from_raw_parts_mut(self.view.as_ptr(), self.len) }
    }

    /// Start writing dirty pages back. Does not wait for the disk.
    pub(crate) fn flush(&self) -> io::Result<()> {
        // SAFETY: the range is exactly the live view.
        let ok = unsafe { FlushViewOfFile(self.view.as_ptr().cast::<c_void>(), self.len) };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // SAFETY: the view and handle were created by `map` and are not used
        // after drop.
        unsafe {
            if UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS {
                Value: self.view.as_ptr().cast::<c_void>(),
            }) == 0
            {
                debug!(error = %io::Error::last_os_error(), "UnmapViewOfFile failed");
            }
            CloseHandle(self.mapping);
        }
    }
}

/// Remove the backing store. Named sections disappear with their last handle.
pub(crate) fn remove_backing(identity: &BackingIdentity, _stamp: BackingStamp) -> io::Result<bool> {
    match identity {
        BackingIdentity::File(path) => match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        },
        BackingIdentity::SharedMemory(_) => Ok(false),
    }
}

/// Remove a file left behind by a failed create.
fn discard(identity: &BackingIdentity) {
    if let Err(err) = remove_backing(identity, ()) {
        warn!(%identity, error = %err, "failed to remove partially created mapping");
    }
}

fn file_mapping(file: HANDLE, size: u64, name: Option<&str>) -> io::Result<HANDLE> {
    let wide_name = name.map(wide);
    let name_ptr = wide_name
        .as_ref()
        .map_or(ptr::null(), |wide| wide.as_ptr());
    // SAFETY: `file` is a valid handle (or INVALID_HANDLE_VALUE for a
    // pagefile-backed section) and `name_ptr` is null or NUL-terminated.
    let handle = unsafe {
        CreateFileMappingW(
            file,
            ptr::null(),
            PAGE_READWRITE,
            (size >> 32) as u32,
            size as u32,
            name_ptr,
        )
    };
    if handle.is_null() {
        return Err(io::Error::last_os_error());
    }
    Ok(handle)
}

fn wide(name: &str) -> Vec<u16> {
    name.encode_utf16().chain(iter::once(0)).collect()
}
