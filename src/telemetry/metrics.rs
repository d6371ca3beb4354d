//! Metric instrument factories for showerpool.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"showerpool"` meter and are
//! no-ops until a provider is installed.

use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};

fn meter() -> Meter {
    opentelemetry::global::meter("showerpool")
}

/// Counter: tasks started by a pool.
pub fn tasks_admitted() -> Counter<u64> {
    meter()
        .u64_counter("showerpool.tasks.admitted")
        .with_description("Number of tasks admitted into a pool")
        .build()
}

/// Counter: tasks collected after finishing.
/// Labels: `outcome` ("success" | "failure").
pub fn tasks_reaped() -> Counter<u64> {
    meter()
        .u64_counter("showerpool.tasks.reaped")
        .with_description("Number of tasks reaped")
        .build()
}

/// Up-down counter: tasks currently occupying a slot.
pub fn tasks_running() -> UpDownCounter<i64> {
    meter()
        .i64_up_down_counter("showerpool.tasks.running")
        .with_description("Number of tasks currently running")
        .build()
}

/// Histogram: wall time from admission to reaping, in milliseconds.
pub fn task_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("showerpool.task.duration_ms")
        .with_description("Task wall time from admission to reaping")
        .with_unit("ms")
        .build()
}
