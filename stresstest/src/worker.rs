//! A single stress worker and the metrics it collects.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sharehealth_service::payload::{self, BLOCK_SIZE};
use sharehealth_service::{IoResultExt, scratch};
use sharehealth_types::StressConfig;
use sketches_ddsketch::DDSketch;
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Name of the directory below the health directory that holds all worker directories.
pub const STRESS_DIR_NAME: &str = "_stress";

/// Prefix of the large files written by workers.
pub const STRESS_FILE_PREFIX: &str = "stress_";

/// Returns the private directory of the worker with the given index.
pub fn worker_dir(health_directory: &Path, id: usize) -> PathBuf {
    health_directory
        .join(STRESS_DIR_NAME)
        .join(format!("worker_{id}"))
}

/// Metrics collected by a single worker.
#[derive(Default)]
pub struct WorkerMetrics {
    /// Number of completed loop iterations.
    pub iterations: u64,
    /// Total bytes written to stress files.
    pub bytes_written: u64,
    /// Total bytes read back from stress files.
    pub bytes_read: u64,
    /// Total number of small files created and deleted.
    pub small_files: u64,
    /// Duration of each iteration in seconds.
    pub iteration_timing: DDSketch,
}

// `DDSketch` does not implement `Debug`, so the sketch is left out.
impl std::fmt::Debug for WorkerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerMetrics")
            .field("iterations", &self.iterations)
            .field("bytes_written", &self.bytes_written)
            .field("bytes_read", &self.bytes_read)
            .field("small_files", &self.small_files)
            .finish_non_exhaustive()
    }
}

/// One synthetic-load unit operating on a private directory.
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    dir: PathBuf,
    block: Vec<u8>,
    file_size: u64,
    small_files: usize,
}

impl Worker {
    pub(crate) fn new(id: usize, health_directory: &Path, stress: &StressConfig) -> Self {
        Self {
            id,
            dir: worker_dir(health_directory, id),
            block: payload::seeded_block(payload::worker_seed(id), BLOCK_SIZE),
            file_size: stress.write_file_size_bytes(),
            small_files: stress.small_files_per_batch,
        }
    }

    /// Loops until `deadline` passes or `cancel` fires, checking both once per iteration.
    pub(crate) async fn run(
        self,
        deadline: Instant,
        cancel: CancellationToken,
    ) -> Result<WorkerMetrics> {
        fs::create_dir_all(&self.dir).await.with_context(|| {
            format!("failed to create worker directory `{}`", self.dir.display())
        })?;

        let mut metrics = WorkerMetrics::default();
        let mut buffer = vec![0; BLOCK_SIZE];

        while Instant::now() < deadline && !cancel.is_cancelled() {
            let start = Instant::now();
            self.iteration(&mut buffer, &mut metrics)
                .await
                .with_context(|| format!("stress worker {} failed", self.id))?;
            metrics.iterations += 1;
            metrics
                .iteration_timing
                .add(start.elapsed().as_secs_f64());
        }

        tracing::debug!(
            worker = self.id,
            iterations = metrics.iterations,
            "stress worker finished"
        );
        Ok(metrics)
    }

    async fn iteration(&self, buffer: &mut [u8], metrics: &mut WorkerMetrics) -> Result<()> {
        let path = self.dir.join(format!(
            "{STRESS_FILE_PREFIX}{}.bin",
            Uuid::new_v4().simple()
        ));

        let mut file = File::create(&path).await.probe_context("create", &path)?;
        metrics.bytes_written += payload::write_repeated(&mut file, &self.block, self.file_size)
            .await
            .probe_context("write", &path)?;
        drop(file);

        let mut file = File::open(&path).await.probe_context("open", &path)?;
        loop {
            let read = file.read(buffer).await.probe_context("read", &path)?;
            if read == 0 {
                break;
            }
            metrics.bytes_read += read as u64;
        }
        drop(file);

        fs::remove_file(&path)
            .await
            .probe_context("delete", &path)?;

        scratch::create_small_files(&self.dir, self.small_files).await?;
        let removed = scratch::remove_small_files(&self.dir).await?;
        metrics.small_files += removed as u64;

        Ok(())
    }
}
