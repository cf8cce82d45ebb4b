//! Reads that bypass the OS page cache.
//!
//! The uncached read probe measures raw device or network throughput instead of memory speed.
//! Platforms expose this differently, so the capability is abstracted behind
//! [`CacheBypassReader`]:
//!
//!  - Linux, Android and FreeBSD open files with `O_DIRECT`.
//!  - macOS disables caching on the open file with `F_NOCACHE`.
//!  - Everywhere else, [`OpenError::Unavailable`] is returned.
//!
//! Implementations must never fall back to a cached read. Doing so would report page cache
//! throughput as if it was the share's.

use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Alignment of offsets, lengths and buffers for direct I/O.
pub const SECTOR_SIZE: usize = 4096;

/// Size of a single uncached read, a multiple of [`SECTOR_SIZE`].
pub const CHUNK_SIZE: usize = SECTOR_SIZE * 16;

/// Error opening a file through a [`CacheBypassReader`].
#[derive(Debug, Error)]
pub enum OpenError {
    /// The platform or file system cannot bypass the page cache.
    #[error("cache bypass is not available for `{}`", .0.display())]
    Unavailable(PathBuf),

    /// The bypass-capable open call failed.
    #[error("uncached open of `{}` failed: {source}", path.display())]
    Os {
        /// The file that was opened.
        path: PathBuf,
        /// The raw OS error code, or `-1` if the error did not carry one.
        code: i32,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl OpenError {
    /// Maps the error of a bypass-capable open call.
    ///
    /// `EINVAL` means that the file system rejects direct I/O, which is reported as
    /// [`Unavailable`](Self::Unavailable).
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.raw_os_error() {
            Some(libc::EINVAL) => Self::Unavailable(path.to_owned()),
            code => Self::Os {
                path: path.to_owned(),
                code: code.unwrap_or(-1),
                source,
            },
        }
    }
}

/// A readable stream that does not populate the page cache.
pub type UncachedStream = Box<dyn Read + Send>;

/// Platform capability to open files for reading without the page cache.
pub trait CacheBypassReader: fmt::Debug + Send + Sync {
    /// Opens `path` for uncached sequential reads.
    ///
    /// Reads from the returned stream must use buffers aligned to [`SECTOR_SIZE`].
    fn open(&self, path: &Path) -> Result<UncachedStream, OpenError>;
}

/// The cache bypass primitive of the target platform.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeBypass;

impl CacheBypassReader for NativeBypass {
    #[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
    fn open(&self, path: &Path) -> Result<UncachedStream, OpenError> {
        use std::os::unix::fs::OpenOptionsExt;

        let file = std::fs::OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECT)
            .open(path)
            .map_err(|e| OpenError::from_io(path, e))?;

        Ok(Box::new(file))
    }

    #[cfg(target_os = "macos")]
    fn open(&self, path: &Path) -> Result<UncachedStream, OpenError> {
        use std::os::fd::AsRawFd;

        let file = std::fs::File::open(path).map_err(|e| OpenError::from_io(path, e))?;
        // SAFETY: the descriptor is owned by `file` and stays open for the duration of the call.
        let ret = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_NOCACHE, 1) };
        if ret == -1 {
            return Err(OpenError::from_io(path, io::Error::last_os_error()));
        }

        Ok(Box::new(file))
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "macos"
    )))]
    fn open(&self, path: &Path) -> Result<UncachedStream, OpenError> {
        Err(OpenError::Unavailable(path.to_owned()))
    }
}

/// A reader that always reports cache bypass as unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unsupported;

impl CacheBypassReader for Unsupported {
    fn open(&self, path: &Path) -> Result<UncachedStream, OpenError> {
        Err(OpenError::Unavailable(path.to_owned()))
    }
}

/// Selects the cache bypass implementation for the running platform.
pub fn platform_default() -> Arc<dyn CacheBypassReader> {
    Arc::new(NativeBypass)
}

/// Returns the largest multiple of [`SECTOR_SIZE`] that fits into `file_size`.
pub fn aligned_length(file_size: u64) -> u64 {
    file_size - file_size % SECTOR_SIZE as u64
}

/// Reads up to `len` bytes from `stream` in [`CHUNK_SIZE`] pieces through a sector-aligned buffer.
///
/// `len` must be a multiple of [`SECTOR_SIZE`]. Returns the number of bytes read, which is less
/// than `len` only if the stream ends early.
pub fn read_aligned<R>(stream: &mut R, len: u64) -> io::Result<u64>
where
    R: Read + ?Sized,
{
    let mut storage = vec![0u8; CHUNK_SIZE + SECTOR_SIZE];
    let offset = storage.as_ptr().align_offset(SECTOR_SIZE).min(SECTOR_SIZE);
    let buffer = &mut storage[offset..offset + CHUNK_SIZE];

    let mut total = 0;
    while total < len {
        let to_read = (len - total).min(CHUNK_SIZE as u64) as usize;
        let read = stream.read(&mut buffer[..to_read])?;
        if read == 0 {
            break;
        }
        total += read as u64;
    }

    Ok(total)
}

/// Opens `path` normally, for tests that need a working [`CacheBypassReader`].
#[cfg(test)]
pub(crate) fn open_cached(path: &Path) -> Result<UncachedStream, OpenError> {
    let file = std::fs::File::open(path).map_err(|e| OpenError::from_io(path, e))?;
    Ok(Box::new(file))
}
