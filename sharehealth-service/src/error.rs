use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::uncached::OpenError;

/// Errors raised by individual probes of the benchmark pipeline.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The volume backing the share could not be resolved.
    #[error("cannot resolve volume of `{}`: {source}", path.display())]
    Capacity {
        /// The share root.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A file system operation was denied.
    #[error("permission denied: {action} `{}`: {source}", path.display())]
    Permission {
        /// The attempted operation.
        action: &'static str,
        /// The affected path.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A file system operation failed.
    #[error("failed to {action} `{}`: {source}", path.display())]
    Io {
        /// The attempted operation.
        action: &'static str,
        /// The affected path.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Opening a file through the cache bypass failed.
    #[error(transparent)]
    Open(#[from] OpenError),

    /// A blocking probe task panicked or was cancelled.
    #[error("probe task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ProbeError {
    /// Classifies an I/O error on `path`, separating permission failures.
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        let path = path.to_owned();
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::Permission {
                action,
                path,
                source,
            }
        } else {
            Self::Io {
                action,
                path,
                source,
            }
        }
    }

    /// Returns `true` if the error means that cache bypass is not possible on this file system.
    pub fn is_bypass_unavailable(&self) -> bool {
        match self {
            Self::Open(OpenError::Unavailable(_)) => true,
            Self::Io { source, .. } => source.raw_os_error() == Some(libc::EINVAL),
            _ => false,
        }
    }
}

/// Attaches probe context to I/O results.
pub trait IoResultExt<T> {
    /// Converts the error into a [`ProbeError`] describing `action` on `path`.
    fn probe_context(self, action: &'static str, path: &Path) -> Result<T, ProbeError>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn probe_context(self, action: &'static str, path: &Path) -> Result<T, ProbeError> {
        self.map_err(|source| ProbeError::io(action, path, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_errors_are_classified() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let error = ProbeError::io("write", Path::new("/mnt/probe"), denied);
        assert!(matches!(error, ProbeError::Permission { .. }));
        assert!(error.to_string().starts_with("permission denied: write `/mnt/probe`"));

        let missing = io::Error::from(io::ErrorKind::NotFound);
        let error = ProbeError::io("read", Path::new("/mnt/probe"), missing);
        assert!(matches!(error, ProbeError::Io { .. }));
        assert!(error.to_string().starts_with("failed to read `/mnt/probe`"));
    }

    #[test]
    fn einval_means_bypass_unavailable() {
        let error = ProbeError::io(
            "read uncached",
            Path::new("/mnt/probe"),
            io::Error::from_raw_os_error(libc::EINVAL),
        );
        assert!(error.is_bypass_unavailable());

        let error = ProbeError::io(
            "read uncached",
            Path::new("/mnt/probe"),
            io::Error::from_raw_os_error(libc::EIO),
        );
        assert!(!error.is_bypass_unavailable());
    }
}
