//! The measurement record produced by one health check run.
//!
//! Every duration that is used as a divisor is floored at [`MIN_DURATION_SECS`], so throughput
//! and operation rates are always finite. Paired measurements (a duration together with the rate
//! derived from it) are stored as a single optional struct, which makes it impossible to report
//! one half of a pair without the other.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ShareConfig;

/// Lower bound for measured durations, in seconds.
pub const MIN_DURATION_SECS: f64 = 0.000_001;

/// Converts an elapsed duration into seconds, floored at [`MIN_DURATION_SECS`].
pub fn floored_secs(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64().max(MIN_DURATION_SECS)
}

/// Converts an elapsed duration into milliseconds, floored at [`MIN_DURATION_SECS`].
pub fn floored_millis(elapsed: Duration) -> f64 {
    floored_secs(elapsed) * 1000.0
}

/// Size and free space of the volume backing a share.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Capacity {
    /// Total size of the volume in bytes.
    pub total_bytes: u64,
    /// Bytes available to unprivileged users.
    pub free_bytes: u64,
    /// `free_bytes / total_bytes` in `[0, 1]`, or `0` for an empty volume.
    pub free_ratio: f64,
}

impl Capacity {
    /// Creates a capacity triple and derives the free ratio.
    pub fn new(total_bytes: u64, free_bytes: u64) -> Self {
        let free_ratio = if total_bytes == 0 {
            0.0
        } else {
            (free_bytes as f64 / total_bytes as f64).clamp(0.0, 1.0)
        };

        Self {
            total_bytes,
            free_bytes,
            free_ratio,
        }
    }
}

/// Duration and throughput of a sequential transfer.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Throughput {
    /// Elapsed time in seconds.
    pub duration_secs: f64,
    /// Transferred bytes per second.
    pub bytes_per_sec: f64,
}

impl Throughput {
    /// Computes the throughput of transferring `bytes` in `elapsed`.
    pub fn measure(bytes: u64, elapsed: Duration) -> Self {
        let duration_secs = floored_secs(elapsed);
        Self {
            duration_secs,
            bytes_per_sec: bytes as f64 / duration_secs,
        }
    }
}

/// Duration and rate of a batch of metadata operations.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct OpRate {
    /// Elapsed time in seconds.
    pub duration_secs: f64,
    /// Operations per second.
    pub ops_per_sec: f64,
}

impl OpRate {
    /// Computes the rate of performing `ops` operations in `elapsed`.
    pub fn measure(ops: usize, elapsed: Duration) -> Self {
        let duration_secs = floored_secs(elapsed);
        Self {
            duration_secs,
            ops_per_sec: ops as f64 / duration_secs,
        }
    }
}

/// Outcome of one health check run against a share.
///
/// A result is created fresh for every run. When a fail-fast probe aborts the run, all
/// measurements of later probes stay `None`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct ShareHealthResult {
    /// Name of the checked share.
    pub share_name: String,
    /// Whether all fail-fast probes completed.
    pub success: bool,
    /// Error text, one line per recorded failure.
    pub error_message: Option<String>,

    /// Volume capacity.
    pub capacity: Option<Capacity>,

    /// Configured size of the test file in MiB.
    pub test_file_size_mb: u64,
    /// Sequential write of the test file.
    pub write: Option<Throughput>,
    /// Sequential buffered read of the test file.
    pub cached_read: Option<Throughput>,
    /// Sequential read of the test file bypassing the page cache.
    pub uncached_read: Option<Throughput>,
    /// Time to open a directory handle on the share root, in milliseconds.
    pub connection_open_latency_ms: Option<f64>,

    /// Configured number of small files.
    pub small_files_count: usize,
    /// Creation of the small files.
    pub small_create: Option<OpRate>,
    /// Deletion of the small files.
    pub small_delete: Option<OpRate>,

    /// Durable write of a single 4 KiB block, in milliseconds.
    pub small_write_latency_ms: Option<f64>,
    /// Read of a single 4 KiB block, in milliseconds.
    pub small_read_latency_ms: Option<f64>,
    /// Enumeration of the share root, in seconds.
    pub directory_list_duration_secs: Option<f64>,

    /// Number of recoverable I/O errors encountered during the run.
    pub io_error_count: u32,
}

impl ShareHealthResult {
    /// Creates an empty result for the given share.
    pub fn new(config: &ShareConfig) -> Self {
        Self {
            share_name: config.share_name.clone(),
            test_file_size_mb: config.test_file_size_mb,
            small_files_count: config.small_files_count,
            ..Default::default()
        }
    }

    /// Counts a recoverable I/O error and appends its description to the error text.
    pub fn record_io_error(&mut self, error: impl fmt::Display) {
        self.io_error_count = self.io_error_count.saturating_add(1);
        self.append_error(error);
    }

    /// Marks the run as failed with the given error.
    pub fn fail(&mut self, error: impl fmt::Display) {
        self.success = false;
        self.append_error(error);
    }

    fn append_error(&mut self, error: impl fmt::Display) {
        match &mut self.error_message {
            Some(message) => {
                message.push('\n');
                message.push_str(&error.to_string());
            }
            None => self.error_message = Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_ratio_of_empty_volume_is_zero() {
        let capacity = Capacity::new(0, 0);
        assert_eq!(capacity.free_ratio, 0.0);

        let capacity = Capacity::new(1000, 250);
        assert_eq!(capacity.free_ratio, 0.25);
    }

    #[test]
    fn instantaneous_operations_stay_finite() {
        let throughput = Throughput::measure(1024, Duration::ZERO);
        assert_eq!(throughput.duration_secs, MIN_DURATION_SECS);
        assert!(throughput.bytes_per_sec.is_finite());
        assert!(throughput.bytes_per_sec > 0.0);

        let rate = OpRate::measure(0, Duration::ZERO);
        assert_eq!(rate.ops_per_sec, 0.0);

        assert!(floored_millis(Duration::ZERO) > 0.0);
    }

    #[test]
    fn errors_are_appended_line_by_line() {
        let config = ShareConfig::new("data", "/mnt/data", "/mnt/data/.health");
        let mut result = ShareHealthResult::new(&config);
        result.success = true;

        result.record_io_error("first");
        result.record_io_error("second");

        assert!(result.success);
        assert_eq!(result.io_error_count, 2);
        assert_eq!(result.error_message.as_deref(), Some("first\nsecond"));

        result.fail("fatal");
        assert!(!result.success);
        assert_eq!(result.io_error_count, 2);
        assert_eq!(
            result.error_message.as_deref(),
            Some("first\nsecond\nfatal")
        );
    }

    #[test]
    fn serializes_missing_measurements_as_null() {
        let config = ShareConfig::new("data", "/mnt/data", "/mnt/data/.health");
        let result = ShareHealthResult::new(&config);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["share_name"], "data");
        assert!(json["write"].is_null());
        assert!(json["capacity"].is_null());
        assert_eq!(json["io_error_count"], 0);
    }
}
