//! POSIX shared memory operations

use crate::consts::{MAX_NAME_LEN, SHM_MODE, SHM_NAME_PREFIX, SHM_NAME_SUFFIX};
use crate::error::{ShmError, ShmResult};
use memmap2::{MmapOptions, MmapRaw};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use std::fs::File;

/// How to open a backing object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create a new object, failing if it exists
    CreateNew,
    /// Open an existing object read-write
    Existing,
    /// Open an existing object read-only
    ReadOnly,
}

/// Map a logical region name to its OS object name.
pub fn object_name(name: &str) -> ShmResult<String> {
    if name.is_empty() {
        return Err(ShmError::InvalidName {
            name: name.to_string(),
            reason: "name is empty",
        });
    }
    if name.contains('/') {
        return Err(ShmError::InvalidName {
            name: name.to_string(),
            reason: "name contains '/'",
        });
    }
    let path = format!("{SHM_NAME_PREFIX}{name}{SHM_NAME_SUFFIX}");
    if path.len() > MAX_NAME_LEN {
        return Err(ShmError::InvalidName {
            name: name.to_string(),
            reason: "name is too long",
        });
    }
    Ok(path)
}

/// Open or create the backing object for `name` at `path`.
pub fn open_object(name: &str, path: &str, mode: OpenMode) -> ShmResult<File> {
    let (flags, perms) = match mode {
        OpenMode::CreateNew => (
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::from_bits_truncate(SHM_MODE as libc::mode_t),
        ),
        OpenMode::Existing => (OFlag::O_RDWR, Mode::empty()),
        OpenMode::ReadOnly => (OFlag::O_RDONLY, Mode::empty()),
    };

    match shm_open(path, flags, perms) {
        Ok(fd) => Ok(File::from(fd)),
        Err(Errno::ENOENT) => Err(ShmError::NotFound {
            name: name.to_string(),
        }),
        Err(Errno::EEXIST) => Err(ShmError::AlreadyExists {
            name: name.to_string(),
        }),
        Err(e) => Err(ShmError::backing(name, "shm_open", e)),
    }
}

/// Resize the backing object to exactly `size` bytes.
pub fn resize_object(name: &str, file: &File, size: usize) -> ShmResult<()> {
    file.set_len(size as u64)
        .map_err(|e| ShmError::backing(name, "ftruncate", e))
}

/// Current byte length of the backing object.
pub fn object_len(name: &str, file: &File) -> ShmResult<usize> {
    let len = file
        .metadata()
        .map_err(|e| ShmError::backing(name, "fstat", e))?
        .len();
    usize::try_from(len).map_err(|_| ShmError::LayoutOverflow)
}

/// Map `len` bytes of the backing object read-write and shared.
pub fn map_object(name: &str, file: &File, len: usize) -> ShmResult<MmapRaw> {
    MmapOptions::new()
        .len(len)
        .map_raw(file)
        .map_err(|source| ShmError::Mapping {
            name: name.to_string(),
            source,
        })
}

/// Remove the object name. Existing mappings stay valid.
pub fn unlink_object(name: &str, path: &str) -> ShmResult<()> {
    match shm_unlink(path) {
        Ok(()) => Ok(()),
        Err(Errno::ENOENT) => Err(ShmError::NotFound {
            name: name.to_string(),
        }),
        Err(e) => Err(ShmError::backing(name, "shm_unlink", e)),
    }
}
