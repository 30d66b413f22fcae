use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShmError};

const FILE_PREFIX: &str = "scrcpy_";
const FILE_SUFFIX: &str = ".map";

/// Maximum mapping name length. Keeps POSIX shm names under `NAME_MAX`.
pub const MAX_NAME_LEN: usize = 200;

/// Where a mapping's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackingKind {
    /// A memory-mapped file under the temp directory.
    #[default]
    File,
    /// A named shared memory object (`shm_open` on Unix, a pagefile-backed
    /// named mapping on Windows).
    SharedMemory,
}

impl BackingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::SharedMemory => "shm",
        }
    }
}

/// The concrete backing store derived from a mapping name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackingIdentity {
    File(PathBuf),
    SharedMemory(String),
}

impl fmt::Display for BackingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "mapping file {}", path.display()),
            Self::SharedMemory(name) => write!(f, "shared memory object {name}"),
        }
    }
}

impl BackingIdentity {
    /// Derive the identity for `name` under the given backing.
    ///
    /// `dir` overrides the temp directory for file backings.
    pub fn derive(name: &str, kind: BackingKind, dir: Option<&Path>) -> Result<Self> {
        validate_name(name)?;
        Ok(match kind {
            BackingKind::File => {
                let dir = dir.map(Path::to_path_buf).unwrap_or_else(temp_dir);
                Self::File(mapping_file_path(&dir, name))
            }
            BackingKind::SharedMemory => Self::SharedMemory(shm_object_name(name)),
        })
    }
}

/// `<dir>/scrcpy_<name>.map`
pub fn mapping_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{FILE_PREFIX}{name}{FILE_SUFFIX}"))
}

#[cfg(unix)]
fn shm_object_name(name: &str) -> String {
    format!("/{name}")
}

#[cfg(not(unix))]
fn shm_object_name(name: &str) -> String {
    name.to_string()
}

/// The temp directory used for file-backed mappings.
pub fn temp_dir() -> PathBuf {
    resolve_temp_dir(|key| std::env::var_os(key))
}

/// Resolve the temp directory through `lookup` (an environment accessor).
///
/// Checks `TMP`, `TEMP` and, on Unix, `TMPDIR`, skipping empty values. Falls
/// back to `/tmp` on Unix and the system temp path elsewhere.
pub fn resolve_temp_dir<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<OsString>,
{
    let keys: &[&str] = if cfg!(unix) {
        &["TMP", "TEMP", "TMPDIR"]
    } else {
        &["TMP", "TEMP"]
    };

    for key in keys {
        if let Some(value) = lookup(key) {
            if !value.is_empty() {
                return PathBuf::from(value);
            }
        }
    }

    if cfg!(unix) {
        PathBuf::from("/tmp")
    } else {
        std::env::temp_dir()
    }
}

fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > MAX_NAME_LEN {
        "name is too long"
    } else if name.contains(['/', '\\']) {
        "name contains a path separator"
    } else if name.contains('\0') {
        "name contains NUL"
    } else {
        return Ok(());
    };

    Err(ShmError::InvalidName {
        name: name.to_string(),
        reason,
    })
}
