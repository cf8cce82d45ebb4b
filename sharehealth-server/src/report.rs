//! Human readable summary of a single result.

use std::fmt::{self, Write};

use sharehealth_types::ShareHealthResult;

const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Logs the summary of a result, as a warning if the run failed.
pub fn log_result(result: &ShareHealthResult) {
    let report = render(result);
    if result.success {
        tracing::info!(share = %result.share_name, "health check finished\n{report}");
    } else {
        tracing::warn!(share = %result.share_name, "health check failed\n{report}");
    }
}

/// Renders a multi-line summary of a result.
///
/// Probes without a value are rendered as `n/a`.
pub fn render(result: &ShareHealthResult) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_report(&mut out, result);
    out
}

fn write_report(out: &mut String, r: &ShareHealthResult) -> fmt::Result {
    let status = if r.success { "OK" } else { "FAILED" };
    writeln!(out, "=== {} [{status}] ===", r.share_name)?;

    match &r.capacity {
        Some(c) => writeln!(
            out,
            "  capacity:         {:.2} GB free of {:.2} GB ({:.1}%)",
            c.free_bytes as f64 / GIB,
            c.total_bytes as f64 / GIB,
            c.free_ratio * 100.0
        )?,
        None => writeln!(out, "  capacity:         n/a")?,
    }

    writeln!(
        out,
        "  write:            {} ({} MB)",
        mb_per_sec(r.write.map(|t| t.bytes_per_sec)),
        r.test_file_size_mb
    )?;
    writeln!(
        out,
        "  cached read:      {}",
        mb_per_sec(r.cached_read.map(|t| t.bytes_per_sec))
    )?;
    writeln!(
        out,
        "  uncached read:    {}",
        mb_per_sec(r.uncached_read.map(|t| t.bytes_per_sec))
    )?;
    writeln!(
        out,
        "  open latency:     {}",
        fixed(r.connection_open_latency_ms, "ms")
    )?;
    writeln!(
        out,
        "  small files:      {} create, {} delete ({} files)",
        fixed(r.small_create.map(|o| o.ops_per_sec), "ops/s"),
        fixed(r.small_delete.map(|o| o.ops_per_sec), "ops/s"),
        r.small_files_count
    )?;
    writeln!(
        out,
        "  block latency:    {} write, {} read",
        fixed(r.small_write_latency_ms, "ms"),
        fixed(r.small_read_latency_ms, "ms")
    )?;
    writeln!(
        out,
        "  directory list:   {}",
        fixed(r.directory_list_duration_secs, "s")
    )?;
    write!(out, "  io errors:        {}", r.io_error_count)?;

    if let Some(error) = &r.error_message {
        for line in error.lines() {
            write!(out, "\n  error: {line}")?;
        }
    }

    Ok(())
}

fn mb_per_sec(bytes_per_sec: Option<f64>) -> String {
    fixed(bytes_per_sec.map(|b| b / MIB), "MB/s")
}

fn fixed(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(value) => format!("{value:.2} {unit}"),
        None => "n/a".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use sharehealth_types::{Capacity, ShareConfig, Throughput};

    use super::*;

    #[test]
    fn renders_populated_result() {
        let config = ShareConfig::new("projects", "/mnt/projects", "/mnt/projects/.health");
        let mut result = ShareHealthResult::new(&config);
        result.success = true;
        result.capacity = Some(Capacity::new(4 * GIB as u64, GIB as u64));
        result.write = Some(Throughput {
            duration_secs: 1.0,
            bytes_per_sec: 50.0 * MIB,
        });
        result.small_read_latency_ms = Some(0.5);

        let report = render(&result);

        assert!(report.starts_with("=== projects [OK] ==="));
        assert!(report.contains("1.00 GB free of 4.00 GB (25.0%)"));
        assert!(report.contains("write:            50.00 MB/s (100 MB)"));
        assert!(report.contains("uncached read:    n/a"));
        assert!(report.contains("n/a write, 0.50 ms read"));
        assert!(!report.contains("error:"));
    }

    #[test]
    fn renders_every_error_line() {
        let config = ShareConfig::new("archive", "/mnt/archive", "/mnt/archive/.health");
        let mut result = ShareHealthResult::new(&config);
        result.record_io_error("first");
        result.fail("second");

        let report = render(&result);

        assert!(report.starts_with("=== archive [FAILED] ==="));
        assert!(report.contains("io errors:        1"));
        assert!(report.ends_with("\n  error: first\n  error: second"));
    }
}
