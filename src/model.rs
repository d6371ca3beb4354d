//! Core data model.
//!
//! A work item is one keyed unit of work. The pool turns it into a running
//! task and, once reaped, into a task report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Work Item
// ---------------------------------------------------------------------------

/// A unit of work produced by a source.
///
/// The key must be unique among tasks that are running at the same time. It
/// names the log files of the subprocess variant, so it should also be safe
/// to use in a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem<D> {
    pub key: String,
    /// What to execute. A command line for subprocesses, an argument for
    /// in-process calls. The pool doesn't interpret it.
    pub descriptor: D,
}

impl<D> WorkItem<D> {
    pub fn new(key: impl Into<String>, descriptor: D) -> Self {
        Self {
            key: key.into(),
            descriptor,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How a task ended. Failures never stop the pool; they only show up here
/// and in the captured stderr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub success: bool,
    /// Process exit code. None for in-process calls and signal deaths.
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// What `reap` hands back for one finished task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub key: String,
    pub outcome: TaskOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Run Summary
// ---------------------------------------------------------------------------

/// Counters for one `run()` of a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub admitted: usize,
    pub reaped: usize,
    /// Reaped tasks whose outcome was not successful.
    pub unsuccessful: usize,
    pub duration_ms: u64,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run {}: {} admitted, {} reaped, {} unsuccessful in {}ms",
            &self.run_id.to_string()[..8],
            self.admitted,
            self.reaped,
            self.unsuccessful,
            self.duration_ms
        )
    }
}
