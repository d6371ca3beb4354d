//! # showerpool
//!
//! Runs large batches of external simulation jobs on one machine with a
//! bounded number of processes alive at a time.
//!
//! Provides the bounded work pool (subprocess and in-process variants), a
//! multi-stage pipeline driver built on it, job-file parsing, post-hoc
//! failure detection over captured stderr logs, and tracing/OpenTelemetry
//! setup.

pub mod config;
pub mod error;
pub mod jobs;
pub mod logscan;
pub mod model;
pub mod pipeline;
pub mod pool;
pub mod source;
pub mod telemetry;
