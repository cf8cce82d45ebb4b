//! Share-labelled gauges rendered in the Prometheus text exposition format.
//!
//! Every numeric field of a [`ShareHealthResult`] maps onto one `fs_share_*` gauge with a `share`
//! label. Failed runs only flip `fs_share_up` to `0` and leave the last good values in place.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::{Mutex, PoisonError};

use sharehealth_types::ShareHealthResult;

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Gauge reporting whether the last run of a share succeeded.
pub const UP: &str = "fs_share_up";

struct Gauge {
    name: &'static str,
    help: &'static str,
    value: fn(&ShareHealthResult) -> Option<f64>,
}

const GAUGES: &[Gauge] = &[
    Gauge {
        name: "fs_share_free_ratio",
        help: "Free space ratio (0-1) per share",
        value: |r| r.capacity.map(|c| c.free_ratio),
    },
    Gauge {
        name: "fs_share_free_bytes",
        help: "Free bytes per share",
        value: |r| r.capacity.map(|c| c.free_bytes as f64),
    },
    Gauge {
        name: "fs_share_total_bytes",
        help: "Total bytes per share",
        value: |r| r.capacity.map(|c| c.total_bytes as f64),
    },
    Gauge {
        name: "fs_share_write_throughput_bytes",
        help: "Write throughput (bytes/sec) per share",
        value: |r| r.write.map(|t| t.bytes_per_sec),
    },
    Gauge {
        name: "fs_share_read_cached_throughput_bytes",
        help: "Cached read throughput (bytes/sec) per share",
        value: |r| r.cached_read.map(|t| t.bytes_per_sec),
    },
    Gauge {
        name: "fs_share_read_unbuffered_throughput_bytes",
        help: "Unbuffered read throughput (bytes/sec) per share",
        value: |r| r.uncached_read.map(|t| t.bytes_per_sec),
    },
    Gauge {
        name: "fs_share_connection_open_latency_ms",
        help: "Time to open the share root directory (ms) per share",
        value: |r| r.connection_open_latency_ms,
    },
    Gauge {
        name: "fs_share_smallfiles_create_ops_per_sec",
        help: "Small files create ops/sec per share",
        value: |r| r.small_create.map(|o| o.ops_per_sec),
    },
    Gauge {
        name: "fs_share_smallfiles_delete_ops_per_sec",
        help: "Small files delete ops/sec per share",
        value: |r| r.small_delete.map(|o| o.ops_per_sec),
    },
    Gauge {
        name: "fs_share_block_write_latency_ms",
        help: "Single block write latency (ms) per share",
        value: |r| r.small_write_latency_ms,
    },
    Gauge {
        name: "fs_share_block_read_latency_ms",
        help: "Single block read latency (ms) per share",
        value: |r| r.small_read_latency_ms,
    },
    Gauge {
        name: "fs_share_directory_list_seconds",
        help: "Directory listing duration (seconds) per share",
        value: |r| r.directory_list_duration_secs,
    },
    Gauge {
        name: "fs_share_io_errors",
        help: "Recoverable I/O errors during the last run per share",
        value: |r| Some(f64::from(r.io_error_count)),
    },
];

/// Latest gauge values per share.
#[derive(Debug, Default)]
pub struct ShareMetrics {
    // gauge name -> share name -> value
    values: Mutex<BTreeMap<&'static str, BTreeMap<String, f64>>>,
}

impl ShareMetrics {
    /// Records the outcome of one run.
    pub fn update(&self, result: &ShareHealthResult) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let mut set = |name: &'static str, value: f64| {
            values
                .entry(name)
                .or_default()
                .insert(result.share_name.clone(), value);
        };

        set(UP, if result.success { 1.0 } else { 0.0 });
        if !result.success {
            return;
        }

        for gauge in GAUGES {
            if let Some(value) = (gauge.value)(result) {
                set(gauge.name, value);
            }
        }
    }

    /// Returns the current value of a gauge for the given share.
    pub fn get(&self, name: &str, share: &str) -> Option<f64> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.get(name)?.get(share).copied()
    }

    /// Renders all gauges that have at least one value.
    pub fn render(&self) -> String {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();

        let up = std::iter::once((UP, "Whether the last health check of the share succeeded"));
        let gauges = GAUGES.iter().map(|gauge| (gauge.name, gauge.help));

        for (name, help) in up.chain(gauges) {
            let Some(shares) = values.get(name) else {
                continue;
            };

            // Writing into a String cannot fail.
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} gauge");
            for (share, value) in shares {
                let _ = writeln!(out, "{name}{{share=\"{}\"}} {value}", escape_label(share));
            }
        }

        out
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use sharehealth_types::{Capacity, OpRate, ShareConfig, Throughput};

    use super::*;

    fn result(name: &str) -> ShareHealthResult {
        let config = ShareConfig::new(name, "/mnt/share", "/mnt/share/.health");
        let mut result = ShareHealthResult::new(&config);
        result.success = true;
        result.capacity = Some(Capacity::new(1000, 250));
        result.write = Some(Throughput {
            duration_secs: 2.0,
            bytes_per_sec: 4096.0,
        });
        result.small_create = Some(OpRate {
            duration_secs: 0.5,
            ops_per_sec: 1000.0,
        });
        result
    }

    #[test]
    fn records_successful_run() {
        let metrics = ShareMetrics::default();
        metrics.update(&result("projects"));

        assert_eq!(metrics.get(UP, "projects"), Some(1.0));
        assert_eq!(metrics.get("fs_share_free_ratio", "projects"), Some(0.25));
        assert_eq!(metrics.get("fs_share_total_bytes", "projects"), Some(1000.0));
        assert_eq!(
            metrics.get("fs_share_write_throughput_bytes", "projects"),
            Some(4096.0)
        );
        assert_eq!(metrics.get("fs_share_io_errors", "projects"), Some(0.0));
        // Probes without a value are not exported.
        assert_eq!(metrics.get("fs_share_read_unbuffered_throughput_bytes", "projects"), None);
    }

    #[test]
    fn failed_run_keeps_previous_values() {
        let metrics = ShareMetrics::default();
        metrics.update(&result("projects"));

        let mut failed = result("projects");
        failed.success = false;
        failed.capacity = Some(Capacity::new(1000, 0));
        metrics.update(&failed);

        assert_eq!(metrics.get(UP, "projects"), Some(0.0));
        assert_eq!(metrics.get("fs_share_free_ratio", "projects"), Some(0.25));
    }

    #[test]
    fn renders_exposition_format() {
        let metrics = ShareMetrics::default();
        metrics.update(&result("b"));
        metrics.update(&result("a"));

        let rendered = metrics.render();

        assert!(rendered.starts_with("# HELP fs_share_up "));
        assert!(rendered.contains("# TYPE fs_share_free_bytes gauge\n"));
        assert!(rendered.contains("fs_share_up{share=\"a\"} 1\nfs_share_up{share=\"b\"} 1\n"));
        assert!(rendered.contains("fs_share_free_bytes{share=\"a\"} 250\n"));
        assert!(!rendered.contains("fs_share_read_unbuffered_throughput_bytes"));
    }

    #[test]
    fn escapes_label_values() {
        let metrics = ShareMetrics::default();
        metrics.update(&result("a \"quoted\" \\ name"));

        assert!(
            metrics
                .render()
                .contains(r#"fs_share_up{share="a \"quoted\" \\ name"} 1"#)
        );
    }

    #[test]
    fn empty_registry_renders_nothing() {
        assert_eq!(ShareMetrics::default().render(), "");
    }
}
