//! The share health checker server.
//!
//! This builds on top of [`sharehealth_service`] and [`stresstest`]: it loads the share
//! configuration, runs checks on a schedule or on request, records the results as metrics and
//! serves them over `HTTP`.

pub mod cli;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod healthcheck;
pub mod metrics;
pub mod observability;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod web;
