//! Test utilities for the share health checker.
//!
//! This crate provides utilities to facilitate integration testing of the sharehealth server. See
//! the modules for all available utilities.

pub mod server;
pub mod tracing;
