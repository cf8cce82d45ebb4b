//! The probe pipeline and its failure policy.

use std::fmt;

/// How a probe failure affects the rest of the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Policy {
    /// The run is aborted and reported as failed.
    FailFast,
    /// The failure is counted and appended to the error text, and the run continues.
    Recoverable,
}

/// One discrete measurement step of the benchmark pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Probe {
    /// Total and free bytes of the volume backing the share.
    Capacity,
    /// Sequential write of the test file.
    Write,
    /// Sequential buffered read of the test file.
    CachedRead,
    /// Sequential read of the test file bypassing the page cache.
    UncachedRead,
    /// Creation and deletion of zero-byte files.
    SmallFiles,
    /// Durable write and read of a single 4 KiB block.
    BlockLatency,
    /// Enumeration of the share root.
    DirectoryListing,
}

impl Probe {
    /// All probes in execution order.
    pub const PIPELINE: [Probe; 7] = [
        Probe::Capacity,
        Probe::Write,
        Probe::CachedRead,
        Probe::UncachedRead,
        Probe::SmallFiles,
        Probe::BlockLatency,
        Probe::DirectoryListing,
    ];

    /// Returns the failure policy of this probe.
    pub fn policy(self) -> Policy {
        match self {
            Probe::Capacity | Probe::Write | Probe::CachedRead | Probe::SmallFiles => {
                Policy::FailFast
            }
            Probe::UncachedRead | Probe::BlockLatency | Probe::DirectoryListing => {
                Policy::Recoverable
            }
        }
    }

    /// Returns a short name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Probe::Capacity => "capacity",
            Probe::Write => "write",
            Probe::CachedRead => "cached_read",
            Probe::UncachedRead => "uncached_read",
            Probe::SmallFiles => "small_files",
            Probe::BlockLatency => "block_latency",
            Probe::DirectoryListing => "directory_listing",
        }
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
