//! The benchmark engine.
//!
//! [`HealthService`] is the entry point for health checks. It holds the shared [`RunGate`] and the
//! [`CacheBypassReader`] of the platform, and runs the probe pipeline for one share per call.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use sharehealth_types::result::{floored_millis, floored_secs};
use sharehealth_types::{Capacity, OpRate, ShareConfig, ShareHealthResult, Throughput};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{IoResultExt, ProbeError};
use crate::gate::RunGate;
use crate::payload::{self, BLOCK_SIZE, LATENCY_PROBE_SEED, WRITE_PROBE_SEED};
use crate::probe::{Policy, Probe};
use crate::scratch;
use crate::uncached::{self, CacheBypassReader};

/// Name of the sequential write and read test file in the health directory.
pub const TEST_FILE_NAME: &str = "fs_health_test.bin";

/// Name of the single-block latency probe file in the health directory.
pub const LATENCY_FILE_NAME: &str = "fs_health_latency.bin";

/// Size of the block written and read by the latency probe.
const LATENCY_BLOCK_SIZE: usize = 4096;

/// Runs health checks against shares.
///
/// This type is cheap to clone; all clones share the same [`RunGate`], so at most one check runs
/// at any time across all of them.
#[derive(Clone, Debug)]
pub struct HealthService(Arc<HealthServiceInner>);

#[derive(Debug)]
struct HealthServiceInner {
    gate: RunGate,
    bypass: Arc<dyn CacheBypassReader>,
}

impl HealthService {
    /// Creates a service using the platform's cache bypass primitive.
    pub fn new(gate: RunGate) -> Self {
        Self::with_bypass(gate, uncached::platform_default())
    }

    /// Creates a service with a custom cache bypass implementation.
    pub fn with_bypass(gate: RunGate, bypass: Arc<dyn CacheBypassReader>) -> Self {
        Self(Arc::new(HealthServiceInner { gate, bypass }))
    }

    /// Returns the gate serializing runs of this service.
    pub fn gate(&self) -> &RunGate {
        &self.0.gate
    }

    /// Runs all probes against the given share and returns the measurements.
    ///
    /// Waits for exclusive ownership of the [`RunGate`] first. This never fails: fatal probe
    /// errors are reported through [`ShareHealthResult::success`] and the error text. There is no
    /// internal timeout, a stuck I/O call blocks the run and every run waiting behind it.
    #[tracing::instrument(skip_all, fields(share = %config.share_name))]
    pub async fn run_checks(&self, config: &ShareConfig) -> ShareHealthResult {
        let _permit = self.0.gate.acquire().await;
        tracing::debug!("acquired run gate");

        let start = Instant::now();
        let result = Run::new(config, Arc::clone(&self.0.bypass)).execute().await;

        tracing::info!(
            success = result.success,
            io_errors = result.io_error_count,
            elapsed = ?start.elapsed(),
            "health check finished"
        );
        result
    }
}

/// State of a single pipeline execution.
struct Run<'a> {
    config: &'a ShareConfig,
    bypass: Arc<dyn CacheBypassReader>,
    test_file: PathBuf,
    result: ShareHealthResult,
}

impl<'a> Run<'a> {
    fn new(config: &'a ShareConfig, bypass: Arc<dyn CacheBypassReader>) -> Self {
        Self {
            config,
            bypass,
            test_file: config.health_directory.join(TEST_FILE_NAME),
            result: ShareHealthResult::new(config),
        }
    }

    async fn execute(mut self) -> ShareHealthResult {
        let health_dir = &self.config.health_directory;
        if let Err(error) = fs::create_dir_all(health_dir)
            .await
            .probe_context("create health directory", health_dir)
        {
            tracing::error!(
                error = &error as &dyn std::error::Error,
                "cannot prepare health directory"
            );
            self.result.fail(&error);
            return self.result;
        }

        for probe in Probe::PIPELINE {
            tracing::debug!(%probe, "running probe");
            let Err(error) = self.run_probe(probe).await else {
                continue;
            };

            match probe.policy() {
                Policy::FailFast => {
                    tracing::error!(
                        %probe,
                        error = &error as &dyn std::error::Error,
                        "probe failed, aborting run"
                    );
                    self.result.fail(&error);
                    return self.result;
                }
                Policy::Recoverable => {
                    tracing::warn!(
                        %probe,
                        error = &error as &dyn std::error::Error,
                        "probe failed, continuing"
                    );
                    self.result.record_io_error(&error);
                }
            }
        }

        self.result.success = true;
        self.result
    }

    async fn run_probe(&mut self, probe: Probe) -> Result<(), ProbeError> {
        match probe {
            Probe::Capacity => self.capacity().await,
            Probe::Write => self.write().await,
            Probe::CachedRead => self.cached_read().await,
            Probe::UncachedRead => self.uncached_read().await,
            Probe::SmallFiles => self.small_files().await,
            Probe::BlockLatency => self.block_latency().await,
            Probe::DirectoryListing => self.directory_listing().await,
        }
    }

    async fn capacity(&mut self) -> Result<(), ProbeError> {
        let path = self.config.share_path.clone();
        let stat = tokio::task::spawn_blocking({
            let path = path.clone();
            move || nix::sys::statvfs::statvfs(&path)
        })
        .await?
        .map_err(|errno| ProbeError::Capacity {
            path,
            source: errno.into(),
        })?;

        let fragment_size = stat.fragment_size() as u64;
        let total_bytes = u64::from(stat.blocks()).saturating_mul(fragment_size);
        let free_bytes = u64::from(stat.blocks_available()).saturating_mul(fragment_size);

        self.result.capacity = Some(Capacity::new(total_bytes, free_bytes));
        Ok(())
    }

    async fn write(&mut self) -> Result<(), ProbeError> {
        let path = &self.test_file;
        let size = self.config.test_file_size_bytes();
        let block = payload::seeded_block(WRITE_PROBE_SEED, BLOCK_SIZE);

        let start = Instant::now();
        let mut file = File::create(path).await.probe_context("create", path)?;
        let written = payload::write_repeated(&mut file, &block, size)
            .await
            .probe_context("write", path)?;
        drop(file);

        self.result.write = Some(Throughput::measure(written, start.elapsed()));
        Ok(())
    }

    async fn cached_read(&mut self) -> Result<(), ProbeError> {
        let path = &self.test_file;
        if !fs::try_exists(path).await.probe_context("stat", path)? {
            tracing::debug!("test file missing, skipping read");
            return Ok(());
        }

        let mut buffer = vec![0; BLOCK_SIZE];
        let start = Instant::now();
        let mut file = File::open(path).await.probe_context("open", path)?;
        let mut total = 0;
        loop {
            let read = file.read(&mut buffer).await.probe_context("read", path)?;
            if read == 0 {
                break;
            }
            total += read as u64;
        }
        drop(file);

        self.result.cached_read = Some(Throughput::measure(total, start.elapsed()));
        Ok(())
    }

    async fn uncached_read(&mut self) -> Result<(), ProbeError> {
        let path = self.test_file.clone();
        if !fs::try_exists(&path).await.probe_context("stat", &path)? {
            return Ok(());
        }

        let file_size = fs::metadata(&path).await.probe_context("stat", &path)?.len();
        let aligned_len = uncached::aligned_length(file_size);
        if aligned_len == 0 {
            tracing::debug!(file_size, "test file smaller than a sector, skipping uncached read");
            return Ok(());
        }

        let bypass = Arc::clone(&self.bypass);
        let outcome = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let mut stream = bypass.open(&path)?;
            let read = uncached::read_aligned(&mut stream, aligned_len)
                .probe_context("read uncached", &path)?;
            Ok::<_, ProbeError>((read, start.elapsed()))
        })
        .await?;

        match outcome {
            Ok((read, elapsed)) => {
                self.result.uncached_read = Some(Throughput::measure(read, elapsed));
                Ok(())
            }
            Err(error) if error.is_bypass_unavailable() => {
                tracing::info!(
                    error = &error as &dyn std::error::Error,
                    "uncached read unavailable"
                );
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    async fn small_files(&mut self) -> Result<(), ProbeError> {
        let count = self.config.small_files_count;
        if count == 0 {
            return Ok(());
        }

        let dir = &self.config.health_directory;

        let start = Instant::now();
        scratch::create_small_files(dir, count).await?;
        self.result.small_create = Some(OpRate::measure(count, start.elapsed()));

        let start = Instant::now();
        let removed = scratch::remove_small_files(dir).await?;
        self.result.small_delete = Some(OpRate::measure(count, start.elapsed()));

        tracing::debug!(created = count, removed, "small files probe finished");
        Ok(())
    }

    async fn block_latency(&mut self) -> Result<(), ProbeError> {
        let path = self.config.health_directory.join(LATENCY_FILE_NAME);
        let block = payload::seeded_block(LATENCY_PROBE_SEED, LATENCY_BLOCK_SIZE);

        let start = Instant::now();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .probe_context("open for write", &path)?;
        file.write_all(&block).await.probe_context("write", &path)?;
        file.sync_all().await.probe_context("sync", &path)?;
        drop(file);
        self.result.small_write_latency_ms = Some(floored_millis(start.elapsed()));

        let mut buffer = vec![0; LATENCY_BLOCK_SIZE];
        let start = Instant::now();
        let mut file = File::open(&path)
            .await
            .probe_context("open for read", &path)?;
        file.read_exact(&mut buffer)
            .await
            .probe_context("read", &path)?;
        drop(file);
        self.result.small_read_latency_ms = Some(floored_millis(start.elapsed()));

        Ok(())
    }

    async fn directory_listing(&mut self) -> Result<(), ProbeError> {
        let root = &self.config.share_path;

        let start = Instant::now();
        let mut entries = fs::read_dir(root)
            .await
            .probe_context("open directory", root)?;
        self.result.connection_open_latency_ms = Some(floored_millis(start.elapsed()));

        let mut count = 0usize;
        while entries
            .next_entry()
            .await
            .probe_context("list", root)?
            .is_some()
        {
            count += 1;
        }
        self.result.directory_list_duration_secs = Some(floored_secs(start.elapsed()));

        tracing::debug!(entries = count, "listed share root");
        Ok(())
    }
}
