//! Pool run and task span helpers.
//!
//! One span per `run()`, one child span per admitted task. Task spans carry
//! the work item key and record each lifecycle step as an event.

use tracing::Span;
use uuid::Uuid;

/// Start the span covering one pool run.
pub fn start_run_span(run_id: &Uuid, capacity: usize) -> Span {
    tracing::info_span!(
        "pool.run",
        "pool.run_id" = %run_id,
        "pool.capacity" = capacity,
    )
}

/// Start a span for one task, from admission to reaping.
///
/// The `task.state` field is declared empty and can be updated via
/// [`record_transition`].
pub fn start_task_span(key: &str) -> Span {
    tracing::info_span!(
        "pool.task",
        "task.key" = key,
        "task.state" = tracing::field::Empty,
    )
}

/// Record a lifecycle transition on a task span.
pub fn record_transition(span: &Span, from: &str, to: &str) {
    span.record("task.state", to);
    span.in_scope(|| {
        tracing::debug!(from = from, to = to, "state_transition");
    });
}
