//! This is a stresstest library which generates synthetic load against a mounted share.
//!
//! A stress run spawns a fixed number of [workers](worker), each owning a private subdirectory
//! below the share's health directory. Until the configured duration elapses or the run is
//! cancelled, every worker repeatedly:
//!
//!  1. writes a file from a deterministic per-worker payload,
//!  2. reads it back and deletes it,
//!  3. creates a batch of zero-byte files and deletes them again.
//!
//! Stress runs are not serialized with health checks. Callers that want a check to measure a
//! quiet share must await the stress run before starting the check.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod stresstest;
pub mod worker;

pub use crate::stresstest::{StressReport, print_report, run};
