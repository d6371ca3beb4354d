//! Integration tests for telemetry initialization and span helpers.

use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be installed once per test binary.
    let config = showerpool::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "showerpool-test".to_string(),
        default_level: "debug".to_string(),
    };
    let _guard = showerpool::telemetry::init_telemetry(config);
}

#[test]
fn run_and_task_spans_record_transitions() {
    let run = showerpool::telemetry::pool::start_run_span(&Uuid::new_v4(), 4);
    let task = run.in_scope(|| showerpool::telemetry::pool::start_task_span("5.0_000001"));
    showerpool::telemetry::pool::record_transition(&task, "admitted", "running");
    showerpool::telemetry::pool::record_transition(&task, "running", "reaped");
}

#[test]
fn metric_instruments_work_without_a_provider() {
    use showerpool::telemetry::metrics;

    metrics::tasks_admitted().add(1, &[]);
    metrics::tasks_running().add(1, &[]);
    metrics::tasks_running().add(-1, &[]);
    metrics::task_duration_ms().record(12.5, &[]);
}
