//! Definitions for share and stress settings.
//!
//! Both types are created once by the configuration loader and are read-only afterwards. They
//! deserialize from YAML or environment variables with sensible defaults for every numeric field.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One mebibyte, the unit of all `*_mb` size settings.
pub const MIB: u64 = 1024 * 1024;

/// A mounted share that is benchmarked by the health checker.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ShareConfig {
    /// Unique label of the share, used in logs and metric labels.
    pub share_name: String,

    /// Root of the share.
    ///
    /// The capacity probe resolves the volume backing this path, and the directory listing probe
    /// enumerates its entries.
    pub share_path: PathBuf,

    /// Working directory for probe files.
    ///
    /// This directory is created if it does not exist. It should be separate from the share root so
    /// that probe files do not show up in the directory listing probe.
    pub health_directory: PathBuf,

    /// Size of the sequential write and read test file in MiB.
    ///
    /// Defaults to `100`.
    #[serde(default = "default_test_file_size_mb")]
    pub test_file_size_mb: u64,

    /// Number of zero-byte files created and deleted by the small files probe.
    ///
    /// Set to `0` to skip the probe. Defaults to `500`.
    #[serde(default = "default_small_files_count")]
    pub small_files_count: usize,
}

impl ShareConfig {
    /// Creates a share configuration with default probe sizes.
    pub fn new(
        share_name: impl Into<String>,
        share_path: impl Into<PathBuf>,
        health_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            share_name: share_name.into(),
            share_path: share_path.into(),
            health_directory: health_directory.into(),
            test_file_size_mb: default_test_file_size_mb(),
            small_files_count: default_small_files_count(),
        }
    }

    /// Returns the size of the test file in bytes.
    pub fn test_file_size_bytes(&self) -> u64 {
        self.test_file_size_mb.saturating_mul(MIB)
    }
}

fn default_test_file_size_mb() -> u64 {
    100
}

fn default_small_files_count() -> usize {
    500
}

/// Synthetic load that can be generated against a share before it is checked.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StressConfig {
    /// Whether stress runs are enabled at all.
    ///
    /// Defaults to `false`.
    pub enabled: bool,

    /// Wall-clock duration of one stress run.
    ///
    /// Defaults to `60s`.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Number of concurrent workers.
    ///
    /// Defaults to `4`.
    pub parallel_workers: usize,

    /// Size of the file each worker writes, reads back and deletes per iteration, in MiB.
    ///
    /// Defaults to `100`.
    pub write_file_size_mb: u64,

    /// Number of zero-byte files each worker creates and deletes per iteration.
    ///
    /// Defaults to `200`.
    pub small_files_per_batch: usize,
}

impl StressConfig {
    /// Returns the size of a worker's write file in bytes.
    pub fn write_file_size_bytes(&self) -> u64 {
        self.write_file_size_mb.saturating_mul(MIB)
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: Duration::from_secs(60),
            parallel_workers: 4,
            write_file_size_mb: 100,
            small_files_per_batch: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_defaults_from_yaml() {
        let config: ShareConfig = serde_yaml::from_str(
            r#"
            share_name: archive
            share_path: /mnt/archive
            health_directory: /mnt/archive/.health
            "#,
        )
        .unwrap();

        assert_eq!(config.share_name, "archive");
        assert_eq!(config.test_file_size_mb, 100);
        assert_eq!(config.small_files_count, 500);
        assert_eq!(config.test_file_size_bytes(), 100 * MIB);
    }

    #[test]
    fn stress_duration_is_humantime() {
        let config: StressConfig = serde_yaml::from_str(
            r#"
            enabled: true
            duration: 2m 30s
            parallel_workers: 8
            "#,
        )
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.duration, Duration::from_secs(150));
        assert_eq!(config.parallel_workers, 8);
        assert_eq!(config.write_file_size_mb, 100);
        assert_eq!(config.small_files_per_batch, 200);
    }

    #[test]
    fn stress_is_disabled_by_default() {
        let config: StressConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, StressConfig::default());
        assert!(!config.enabled);
    }
}
