//! On-demand health check runs.

use std::time::SystemTime;

use anyhow::Context;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::{Json, Router, routing};
use serde::{Deserialize, Serialize};
use sharehealth_types::ShareHealthResult;

use crate::error::{ApiError, ApiResult};
use crate::runner;
use crate::state::ServiceState;

const MIB: f64 = 1024.0 * 1024.0;

pub fn router() -> Router<ServiceState> {
    Router::new().route("/run", routing::post(run))
}

/// Query parameters of `POST /api/healthcheck/run`.
#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    /// Stress each share before checking it, if stress is enabled.
    #[serde(default, alias = "withStress")]
    pub with_stress: bool,
}

/// Response of `POST /api/healthcheck/run`.
#[derive(Debug, Deserialize, Serialize)]
pub struct RunResponse {
    /// Start of the run in RFC 3339 format.
    pub ran_at: String,
    /// Whether stress was requested.
    pub with_stress: bool,
    /// Number of configured shares.
    pub shares_count: usize,
    /// One summary per share, in configuration order.
    pub results: Vec<ShareSummary>,
}

/// Summary of a single share's result with throughput in MB/s.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct ShareSummary {
    /// Name of the share.
    pub share_name: String,
    /// Whether all fatal probes succeeded.
    pub success: bool,
    /// Error text, one line per error.
    pub error_message: Option<String>,
    /// Free space ratio between 0 and 1.
    pub free_ratio: Option<f64>,
    /// Free bytes available to unprivileged users.
    pub free_bytes: Option<u64>,
    /// Total bytes of the volume.
    pub total_bytes: Option<u64>,
    /// Write throughput in MB/s.
    pub write_mbps: Option<f64>,
    /// Cached read throughput in MB/s.
    pub read_cached_mbps: Option<f64>,
    /// Uncached read throughput in MB/s.
    pub read_unbuffered_mbps: Option<f64>,
    /// Small file creations per second.
    pub small_files_create_ops_per_sec: Option<f64>,
    /// Small file deletions per second.
    pub small_files_delete_ops_per_sec: Option<f64>,
    /// Recoverable I/O errors.
    pub io_error_count: u32,
}

impl From<&ShareHealthResult> for ShareSummary {
    fn from(result: &ShareHealthResult) -> Self {
        Self {
            share_name: result.share_name.clone(),
            success: result.success,
            error_message: result.error_message.clone(),
            free_ratio: result.capacity.map(|c| c.free_ratio),
            free_bytes: result.capacity.map(|c| c.free_bytes),
            total_bytes: result.capacity.map(|c| c.total_bytes),
            write_mbps: result.write.map(|t| t.bytes_per_sec / MIB),
            read_cached_mbps: result.cached_read.map(|t| t.bytes_per_sec / MIB),
            read_unbuffered_mbps: result.uncached_read.map(|t| t.bytes_per_sec / MIB),
            small_files_create_ops_per_sec: result.small_create.map(|o| o.ops_per_sec),
            small_files_delete_ops_per_sec: result.small_delete.map(|o| o.ops_per_sec),
            io_error_count: result.io_error_count,
        }
    }
}

async fn run(
    State(state): State<ServiceState>,
    query: Result<Query<RunParams>, QueryRejection>,
) -> ApiResult<Json<RunResponse>> {
    let Query(params) = query.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    if state.shutdown.is_cancelled() {
        return Err(ApiError::ShuttingDown);
    }

    let ran_at = humantime::format_rfc3339_millis(SystemTime::now()).to_string();
    tracing::info!(with_stress = params.with_stress, "manual health check requested");

    // Run detached so a client disconnect does not abort a run midway.
    let results = tokio::spawn({
        let state = state.clone();
        async move { runner::run_all(&state, params.with_stress).await }
    })
    .await
    .context("health check task failed")?;

    Ok(Json(RunResponse {
        ran_at,
        with_stress: params.with_stress,
        shares_count: state.config.shares.len(),
        results: results.iter().map(ShareSummary::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use sharehealth_types::{Capacity, ShareConfig, Throughput};

    use super::*;

    #[test]
    fn summary_converts_to_megabytes() {
        let config = ShareConfig::new("projects", "/mnt/projects", "/mnt/projects/.health");
        let mut result = ShareHealthResult::new(&config);
        result.success = true;
        result.capacity = Some(Capacity::new(100, 25));
        result.write = Some(Throughput {
            duration_secs: 1.0,
            bytes_per_sec: 3.0 * MIB,
        });

        let summary = ShareSummary::from(&result);

        assert_eq!(summary.share_name, "projects");
        assert_eq!(summary.free_ratio, Some(0.25));
        assert_eq!(summary.total_bytes, Some(100));
        assert_eq!(summary.write_mbps, Some(3.0));
        assert_eq!(summary.read_unbuffered_mbps, None);
    }
}
