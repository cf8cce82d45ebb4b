//! Run a pool of stress workers against one share and summarize what they did.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use sharehealth_types::{ShareConfig, StressConfig};
use sketches_ddsketch::DDSketch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use yansi::Paint;

use crate::worker::{STRESS_DIR_NAME, Worker, WorkerMetrics};

/// Totals collected over all workers of a single stress run.
#[derive(Clone, Default)]
pub struct StressReport {
    /// Number of workers that took part in the run.
    pub workers: usize,
    /// Completed loop iterations summed over all workers.
    pub iterations: u64,
    /// Bytes written to stress files.
    pub bytes_written: u64,
    /// Bytes read back from stress files.
    pub bytes_read: u64,
    /// Small files created and deleted.
    pub small_files: u64,
    /// Duration of each iteration in seconds.
    pub iteration_timing: DDSketch,
    /// Wall-clock time from start until every worker exited.
    pub elapsed: Duration,
}

// `DDSketch` does not implement `Debug`, so the sketch is left out.
impl fmt::Debug for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StressReport")
            .field("workers", &self.workers)
            .field("iterations", &self.iterations)
            .field("bytes_written", &self.bytes_written)
            .field("bytes_read", &self.bytes_read)
            .field("small_files", &self.small_files)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

impl StressReport {
    fn merge(&mut self, metrics: WorkerMetrics) -> Result<()> {
        self.iterations += metrics.iterations;
        self.bytes_written += metrics.bytes_written;
        self.bytes_read += metrics.bytes_read;
        self.small_files += metrics.small_files;
        self.iteration_timing
            .merge(&metrics.iteration_timing)
            .map_err(|err| anyhow::anyhow!("failed to merge iteration timings: {err:?}"))
    }
}

/// Drives `stress.parallel_workers` concurrent workers against the share until `stress.duration`
/// has elapsed or `cancel` fires.
///
/// Returns immediately with an empty report if stress is disabled. Workers check the deadline and
/// the cancellation token once per iteration, so the call returns at most one iteration after
/// either fires. The first worker error aborts every other worker and is returned.
///
/// Worker directories are left in place under `<health_directory>/_stress`.
pub async fn run(
    share: &ShareConfig,
    stress: &StressConfig,
    cancel: CancellationToken,
) -> Result<StressReport> {
    if !stress.enabled {
        return Ok(StressReport::default());
    }

    tracing::info!(
        share = %share.share_name,
        workers = stress.parallel_workers,
        duration = ?stress.duration,
        "starting stress run"
    );

    let start = Instant::now();
    let deadline = start + stress.duration;

    let mut workers = JoinSet::new();
    for id in 0..stress.parallel_workers {
        let worker = Worker::new(id, &share.health_directory, stress);
        workers.spawn(worker.run(deadline, cancel.clone()));
    }

    let mut report = StressReport {
        workers: stress.parallel_workers,
        ..Default::default()
    };

    // Dropping the set on an early return aborts the remaining workers.
    while let Some(joined) = workers.join_next().await {
        let metrics = joined.context("stress worker panicked")??;
        report.merge(metrics)?;
    }
    report.elapsed = start.elapsed();

    tracing::info!(
        share = %share.share_name,
        iterations = report.iterations,
        written = %ByteSize::b(report.bytes_written),
        elapsed = ?report.elapsed,
        dir = %share.health_directory.join(STRESS_DIR_NAME).display(),
        "stress run finished"
    );

    Ok(report)
}

/// Prints a human readable summary of the report to stdout.
pub fn print_report(report: &StressReport) {
    println!(
        "{} ({} workers, {} iterations, {:.2?})",
        "STRESS:".bold().green(),
        report.workers.bold(),
        report.iterations.bold(),
        report.elapsed
    );
    if report.iterations == 0 {
        return;
    }

    print!("  write");
    print_throughput(report.bytes_written, report.elapsed);
    print!("  read");
    print_throughput(report.bytes_read, report.elapsed);
    println!(
        "  {} small files, {:.2} files/s",
        report.small_files.bold(),
        (report.small_files as f64 / report.elapsed.as_secs_f64()).bold()
    );
    print_percentiles(&report.iteration_timing, Duration::from_secs_f64);
}

fn print_percentiles<T: fmt::Debug>(sketch: &DDSketch, map: impl Fn(f64) -> T) {
    let quantile = |q| sketch.quantile(q).ok().flatten().unwrap_or_default();
    let ops = sketch.count().max(1);
    let avg = map(sketch.sum().unwrap_or_default() / ops as f64);
    let p50 = map(quantile(0.5));
    let p90 = map(quantile(0.9));
    let p99 = map(quantile(0.99));
    println!(
        "  iteration avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

fn print_throughput(total: u64, duration: Duration) {
    let throughput = (total as f64 / duration.as_secs_f64()) as u64;
    println!(" {}, {:.2}/s", ByteSize::b(total), ByteSize::b(throughput).bold());
}
