//! Runs checks over the configured shares and publishes the results.

use sharehealth_types::{ShareConfig, ShareHealthResult};

use crate::report;
use crate::state::State;

/// Checks every configured share in order.
///
/// Shares are isolated from each other: a failing share produces a failed result and the next
/// share is checked regardless.
pub async fn run_all(state: &State, with_stress: bool) -> Vec<ShareHealthResult> {
    let mut results = Vec::with_capacity(state.config.shares.len());
    for share in &state.config.shares {
        results.push(run_share(state, share, with_stress).await);
    }
    results
}

/// Checks a single share, optionally stressing it first.
///
/// Stress only runs if it is both requested and enabled in the configuration. A failed stress run
/// fails the share without running the checks. Every result is recorded in the metrics registry
/// and logged.
pub async fn run_share(state: &State, share: &ShareConfig, with_stress: bool) -> ShareHealthResult {
    let stress = &state.config.stress;
    if with_stress && stress.enabled {
        let cancel = state.shutdown.child_token();
        if let Err(err) = stresstest::run(share, stress, cancel).await {
            tracing::error!(
                error = &*err as &dyn std::error::Error,
                share = %share.share_name,
                "stress run failed"
            );

            let mut result = ShareHealthResult::new(share);
            result.fail(format_args!("stress run failed: {err:#}"));
            return publish(state, result);
        }
    }

    let result = state.service.run_checks(share).await;
    publish(state, result)
}

fn publish(state: &State, result: ShareHealthResult) -> ShareHealthResult {
    state.metrics.update(&result);
    report::log_result(&result);
    result
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sharehealth_types::StressConfig;

    use super::*;
    use crate::config::Config;
    use crate::metrics::UP;

    fn share(root: &std::path::Path, name: &str) -> ShareConfig {
        let path = root.join(name);
        std::fs::create_dir_all(&path).unwrap();
        ShareConfig {
            test_file_size_mb: 1,
            small_files_count: 10,
            ..ShareConfig::new(name, &path, path.join(".health"))
        }
    }

    #[tokio::test]
    async fn failing_share_does_not_stop_others() {
        let tempdir = tempfile::tempdir().unwrap();
        let healthy = share(tempdir.path(), "healthy");
        let missing = ShareConfig::new(
            "missing",
            tempdir.path().join("does-not-exist"),
            tempdir.path().join("missing-health"),
        );
        let state = State::new(Config {
            shares: vec![missing, healthy],
            ..Default::default()
        });

        let results = run_all(&state, false).await;

        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[0].error_message.is_some());
        assert!(results[1].success);
        assert_eq!(state.metrics.get(UP, "missing"), Some(0.0));
        assert_eq!(state.metrics.get(UP, "healthy"), Some(1.0));
    }

    #[tokio::test]
    async fn stress_runs_only_when_enabled() {
        let tempdir = tempfile::tempdir().unwrap();
        let share = share(tempdir.path(), "share");
        let state = State::new(Config {
            shares: vec![share.clone()],
            stress: StressConfig {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        });

        let result = run_share(&state, &share, true).await;

        assert!(result.success);
        assert!(!share.health_directory.join("_stress").exists());
    }

    #[tokio::test]
    async fn stress_precedes_checks() {
        let tempdir = tempfile::tempdir().unwrap();
        let share = share(tempdir.path(), "share");
        let state = State::new(Config {
            shares: vec![share.clone()],
            stress: StressConfig {
                enabled: true,
                duration: Duration::from_millis(200),
                parallel_workers: 2,
                write_file_size_mb: 1,
                small_files_per_batch: 5,
            },
            ..Default::default()
        });

        let result = run_share(&state, &share, true).await;

        assert!(result.success);
        assert!(share.health_directory.join("_stress/worker_0").is_dir());
        assert!(share.health_directory.join("_stress/worker_1").is_dir());
    }

    #[tokio::test]
    async fn stress_failure_fails_share() {
        let tempdir = tempfile::tempdir().unwrap();
        let share = share(tempdir.path(), "share");
        std::fs::create_dir_all(&share.health_directory).unwrap();
        std::fs::write(share.health_directory.join("_stress"), b"").unwrap();

        let state = State::new(Config {
            shares: vec![share.clone()],
            stress: StressConfig {
                enabled: true,
                duration: Duration::from_secs(60),
                parallel_workers: 1,
                ..Default::default()
            },
            ..Default::default()
        });

        let result = run_share(&state, &share, true).await;

        assert!(!result.success);
        assert!(
            result
                .error_message
                .as_deref()
                .unwrap()
                .starts_with("stress run failed")
        );
        assert!(result.write.is_none());
        assert_eq!(state.metrics.get(UP, "share"), Some(0.0));
    }
}
