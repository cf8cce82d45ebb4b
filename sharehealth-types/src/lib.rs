//! Shared types for the share health checker.
//!
//! This crate contains the per-share configuration consumed by the benchmark pipeline and the
//! stress generator, and the [`ShareHealthResult`](result::ShareHealthResult) record they
//! produce:
//!
//!  - [`ShareConfig`](config::ShareConfig) describes one share under test
//!  - [`StressConfig`](config::StressConfig) describes synthetic load to run before a check
//!  - [`ShareHealthResult`](result::ShareHealthResult) holds the measurements of one run
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod result;

pub use config::{ShareConfig, StressConfig};
pub use result::{Capacity, OpRate, ShareHealthResult, Throughput};
