//! The share health checker.
//!
//! This runs the health probes of [`sharehealth_service`] against every configured share on a
//! fixed interval, exposes the results as Prometheus gauges and allows triggering a run over HTTP.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    sharehealth_server::cli::execute()
}
