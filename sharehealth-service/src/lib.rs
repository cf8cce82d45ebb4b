//! The benchmark pipeline for mounted storage shares.
//!
//! [`HealthService`] runs an ordered sequence of [probes](Probe) against one
//! [`ShareConfig`](sharehealth_types::ShareConfig) and returns a
//! [`ShareHealthResult`](sharehealth_types::ShareHealthResult):
//!
//!  1. **Capacity** of the volume backing the share
//!  2. Sequential **write** of a test file
//!  3. Sequential **cached read** of that file
//!  4. Sequential **uncached read** through a [`CacheBypassReader`]
//!  5. Creation and deletion of many **small files**
//!  6. Durable **single-block** write and read latency
//!  7. **Directory listing** of the share root
//!
//! Each probe has a [`Policy`]: fail-fast probes abort the run, recoverable probes only count an
//! I/O error and continue. Runs are serialized through a caller-owned [`RunGate`], so throughput
//! numbers are never skewed by another share being benchmarked at the same time.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod error;
mod gate;
pub mod payload;
mod probe;
pub mod scratch;
mod service;
pub mod uncached;

pub use error::{IoResultExt, ProbeError};
pub use gate::{RunGate, RunPermit};
pub use probe::{Policy, Probe};
pub use service::HealthService;
pub use uncached::{CacheBypassReader, NativeBypass, OpenError, Unsupported};
