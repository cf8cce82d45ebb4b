use std::sync::Arc;

use sharehealth_service::{HealthService, RunGate};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::metrics::ShareMetrics;

/// Shared reference to the sharehealth [service state](State).
pub type ServiceState = Arc<State>;

/// Everything needed to run checks and serve their results.
///
/// This structure is created during server startup and shared with the scheduler and all HTTP
/// request handlers. Checks started from either place go through the same [`HealthService`] and
/// therefore the same [`RunGate`].
///
/// In request handlers, use `axum::extract::State<ServiceState>` to retrieve a shared reference to
/// this structure.
#[derive(Debug)]
pub struct State {
    /// The server configuration.
    pub config: Config,
    /// The benchmark engine.
    pub service: HealthService,
    /// Latest results as Prometheus gauges.
    pub metrics: ShareMetrics,
    /// Cancelled on shutdown, stops the scheduler and running stress workers.
    pub shutdown: CancellationToken,
}

impl State {
    /// Creates the state for the given configuration.
    pub fn new(config: Config) -> ServiceState {
        Arc::new(Self {
            config,
            service: HealthService::new(RunGate::new()),
            metrics: ShareMetrics::default(),
            shutdown: CancellationToken::new(),
        })
    }
}
