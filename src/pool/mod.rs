//! Bounded work pool: at most `capacity` tasks running, refilled from a lazy
//! source as soon as any of them finishes.
//!
//! One controller owns the pool. It primes `capacity` slots, then scans the
//! running tasks at a fixed interval; every finished task is reaped (output
//! collected and written, slot freed) and its slot is offered straight back
//! to the source. The run ends when the source is exhausted and the last task
//! has been reaped.

pub mod call;
pub mod command;
pub mod launcher;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{Instrument, Span, debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{RunSummary, TaskOutcome, TaskReport};
use crate::source::Source;
use crate::telemetry::metrics;
use crate::telemetry::pool::{record_transition, start_run_span, start_task_span};

pub use call::{CallHandle, CallLauncher};
pub use command::{CommandHandle, CommandLauncher};
pub use launcher::{Capture, Completion, Launcher, TaskHandle};

/// Pool of subprocesses, one command line per work item.
pub type CommandPool = WorkPool<CommandLauncher>;

/// Pool of in-process calls, one argument per work item.
pub type CallPool<A, F> = WorkPool<CallLauncher<A, F>>;

/// Configuration for a pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of tasks running at once.
    pub capacity: usize,
    /// Where `output_{key}.out` / `.err` go. Must already exist. Required
    /// for launchers that capture output, unused otherwise.
    pub log_dir: Option<PathBuf>,
    /// Pause between two scans of the running tasks.
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            log_dir: None,
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// A task that has been started and not yet reaped.
pub struct RunningTask<H> {
    handle: H,
    started_at: DateTime<Utc>,
    started: Instant,
    span: Span,
}

/// The pool itself. Lives for one `run()`.
pub struct WorkPool<L: Launcher> {
    launcher: L,
    source: Source<L::Descriptor>,
    config: PoolConfig,
    running: HashMap<String, RunningTask<L::Handle>>,
    summary: RunSummary,
}

impl<L: Launcher> WorkPool<L> {
    pub fn new(launcher: L, source: Source<L::Descriptor>, config: PoolConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(Error::Config("pool capacity must be at least 1".to_string()));
        }
        if config.poll_interval.is_zero() {
            return Err(Error::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if launcher.captures_output() && config.log_dir.is_none() {
            return Err(Error::Config(
                "a log directory is required to keep task output".to_string(),
            ));
        }

        Ok(Self {
            launcher,
            source,
            config,
            running: HashMap::new(),
            summary: RunSummary {
                run_id: Uuid::new_v4(),
                ..RunSummary::default()
            },
        })
    }

    /// Run every item of the source to completion.
    ///
    /// Primes `capacity` slots, then drains. Returns once the source is
    /// exhausted and nothing is running. Task failures do not end the run;
    /// only controller errors (spawn failures, log I/O) do, and they leave
    /// still-running processes behind.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let start = Instant::now();
        let span = start_run_span(&self.summary.run_id, self.config.capacity);

        async {
            info!(capacity = self.config.capacity, "pool started");
            for _ in 0..self.config.capacity {
                self.admit()?;
            }
            self.drain().await
        }
        .instrument(span.clone())
        .await?;

        self.summary.duration_ms = start.elapsed().as_millis() as u64;
        span.in_scope(|| info!(summary = %self.summary, "pool finished"));
        Ok(self.summary.clone())
    }

    /// Pull the next item from the source and start it.
    ///
    /// Does nothing and returns `None` when the source is exhausted or every
    /// slot is already taken.
    pub fn admit(&mut self) -> Result<Option<String>> {
        if self.running.len() >= self.config.capacity {
            debug!(running = self.running.len(), "pool full, not admitting");
            return Ok(None);
        }
        let Some(item) = self.source.next_item() else {
            debug!(running = self.running.len(), "source exhausted");
            return Ok(None);
        };
        let key = item.key.clone();
        self.start(item.key, item.descriptor)?;
        Ok(Some(key))
    }

    /// Start a task chosen by the caller instead of the source.
    ///
    /// Used by drivers that run their own sequence of steps (such as the
    /// stage pipeline) and reap each step themselves. It does not consult
    /// the capacity.
    pub fn admit_keyed(&mut self, key: impl Into<String>, descriptor: L::Descriptor) -> Result<()> {
        self.start(key.into(), descriptor)
    }

    /// Scan running tasks at the poll interval and reap each one that has
    /// finished, until nothing is left running.
    pub async fn drain(&mut self) -> Result<()> {
        while !self.running.is_empty() {
            for key in self.finished_keys()? {
                self.reap(&key).await?;
            }
            if self.running.is_empty() {
                break;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
        Ok(())
    }

    /// Collect a task, free its slot, then refill the slot from the source.
    ///
    /// Blocks until the task has fully exited. Its captured output is
    /// written to the log directory whether it succeeded or not. The key
    /// leaves the pool even if collecting or writing fails; the error is
    /// returned and a second `reap` of the same key is `NotRunning`.
    pub async fn reap(&mut self, key: &str) -> Result<TaskReport> {
        let report = self.retire(key).await?;
        self.admit()?;
        Ok(report)
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.running.contains_key(key)
    }

    /// Keys of the running tasks, sorted.
    pub fn running_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.running.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Counters so far. `duration_ms` is only set once `run()` returns.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn start(&mut self, key: String, descriptor: L::Descriptor) -> Result<()> {
        if self.running.contains_key(&key) {
            return Err(Error::DuplicateKey(key));
        }

        let span = start_task_span(&key);
        let handle = span.in_scope(|| self.launcher.launch(&key, descriptor))?;
        record_transition(&span, "admitted", "running");

        metrics::tasks_admitted().add(1, &[]);
        metrics::tasks_running().add(1, &[]);
        self.summary.admitted += 1;
        info!(key = %key, running = self.running.len() + 1, "task admitted");

        self.running.insert(
            key,
            RunningTask {
                handle,
                started_at: Utc::now(),
                started: Instant::now(),
                span,
            },
        );
        Ok(())
    }

    fn finished_keys(&mut self) -> Result<Vec<String>> {
        let mut finished = Vec::new();
        for (key, task) in self.running.iter_mut() {
            if task.handle.is_finished()? {
                finished.push(key.clone());
            }
        }
        Ok(finished)
    }

    async fn retire(&mut self, key: &str) -> Result<TaskReport> {
        // The entry leaves the pool before anything can fail, so a key is
        // removed exactly once even when collection or log writing errors.
        let mut task = self
            .running
            .remove(key)
            .ok_or_else(|| Error::NotRunning(key.to_string()))?;
        metrics::tasks_running().add(-1, &[]);
        let span = task.span.clone();

        let completion = task.handle.finish().instrument(span.clone()).await;
        task.handle.terminate();
        let completion = completion?;
        let duration_ms = task.started.elapsed().as_millis() as u64;

        if let Some(capture) = &completion.capture {
            let dir = self.config.log_dir.as_deref().ok_or_else(|| {
                Error::Config(format!("no log directory for the output of task {key}"))
            })?;
            write_logs(dir, key, capture).await?;
        }
        record_transition(&span, "running", "reaped");

        let outcome = TaskOutcome {
            success: completion.success,
            exit_code: completion.exit_code,
            error: completion.error,
            duration_ms,
        };

        let label = if outcome.success { "success" } else { "failure" };
        metrics::tasks_reaped().add(1, &[opentelemetry::KeyValue::new("outcome", label)]);
        metrics::task_duration_ms().record(duration_ms as f64, &[]);

        self.summary.reaped += 1;
        if outcome.success {
            info!(key, duration_ms, "task reaped");
        } else {
            self.summary.unsuccessful += 1;
            warn!(
                key,
                duration_ms,
                exit_code = outcome.exit_code,
                error = outcome.error.as_deref().unwrap_or("-"),
                "task reaped after failure"
            );
        }

        Ok(TaskReport {
            key: key.to_string(),
            outcome,
            started_at: task.started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Log file paths for a key: `output_{key}.out` and `output_{key}.err`.
pub fn log_paths(dir: &Path, key: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("output_{key}.out")),
        dir.join(format!("output_{key}.err")),
    )
}

async fn write_logs(dir: &Path, key: &str, capture: &Capture) -> Result<()> {
    let (out, err) = log_paths(dir, key);
    tokio::fs::write(&out, String::from_utf8_lossy(&capture.stdout).as_bytes()).await?;
    tokio::fs::write(&err, String::from_utf8_lossy(&capture.stderr).as_bytes()).await?;
    debug!(key, out = %out.display(), err = %err.display(), "logs written");
    Ok(())
}
