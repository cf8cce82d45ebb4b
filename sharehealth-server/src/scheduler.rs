//! Periodic health checks over all shares.

use tokio::time::MissedTickBehavior;

use crate::runner;
use crate::state::ServiceState;

/// Checks all shares every `metrics_interval` until shutdown.
///
/// The first run starts immediately. Stress runs before each share if it is enabled. A run that is
/// still in progress when shutdown is requested is dropped, which also releases the run gate.
pub async fn run(state: ServiceState) {
    let interval = state.config.metrics_interval;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(?interval, "starting scheduler");

    loop {
        tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => break,
            _ = ticker.tick() => (),
        }

        tracing::debug!("starting scheduled run");
        tokio::select! {
            biased;
            _ = state.shutdown.cancelled() => break,
            results = runner::run_all(&state, true) => {
                let failed = results.iter().filter(|r| !r.success).count();
                tracing::debug!(shares = results.len(), failed, "scheduled run finished");
            }
        }
    }

    tracing::info!("scheduler stopped");
}
