//! Logging and OpenTelemetry setup for the `showerpool` binary.
//!
//! Human-readable logs always go to stderr; stdout carries run summaries and
//! scan verdicts. With an OTLP endpoint, the pool's run/task spans, its
//! `showerpool.*` metrics, and every log event are exported as well.

pub mod metrics;
pub mod pool;

use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::error::{Error, Result};

/// How to set up logging for one process.
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint, e.g. `http://localhost:4317`. `None` keeps
    /// everything local.
    pub endpoint: Option<String>,
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is not set.
    pub default_level: String,
}

/// The three OTLP pipelines, built together against one endpoint.
struct Exporters {
    traces: SdkTracerProvider,
    metrics: SdkMeterProvider,
    logs: SdkLoggerProvider,
}

impl Exporters {
    fn build(endpoint: &str, service_name: &str) -> Result<Self> {
        use opentelemetry_otlp::WithExportConfig as _;
        use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;

        let resource = opentelemetry_sdk::Resource::builder()
            .with_service_name(service_name.to_string())
            .with_attribute(opentelemetry::KeyValue::new(
                SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            ))
            .build();

        let spans = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_err("span", endpoint, e))?;
        let traces = SdkTracerProvider::builder()
            .with_batch_exporter(spans)
            .with_resource(resource.clone())
            .build();

        let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_err("metric", endpoint, e))?;
        let metrics = SdkMeterProvider::builder()
            .with_periodic_exporter(metric_exporter)
            .with_resource(resource.clone())
            .build();
        // The pool's instruments come from the global meter.
        opentelemetry::global::set_meter_provider(metrics.clone());

        let log_exporter = opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_err("log", endpoint, e))?;
        let logs = SdkLoggerProvider::builder()
            .with_batch_exporter(log_exporter)
            .with_resource(resource)
            .build();

        Ok(Self {
            traces,
            metrics,
            logs,
        })
    }
}

fn exporter_err(signal: &str, endpoint: &str, e: impl std::fmt::Display) -> Error {
    Error::Other(format!("OTLP {signal} exporter for {endpoint}: {e}"))
}

/// Keeps the OTLP pipelines alive; flushes and shuts them down on drop.
///
/// Hold it until the last pool run has returned, or the final batch of task
/// spans is lost.
pub struct TelemetryGuard {
    exporters: Option<Exporters>,
}

impl TelemetryGuard {
    /// Push everything buffered so far to the collector.
    pub fn force_flush(&self) {
        if let Some(ref ex) = self.exporters {
            let _ = ex.traces.force_flush();
            let _ = ex.metrics.force_flush();
            let _ = ex.logs.force_flush();
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(ex) = self.exporters.take() {
            let _ = ex.logs.shutdown();
            let _ = ex.metrics.shutdown();
            let _ = ex.traces.shutdown();
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if an OTLP exporter cannot be built or a global subscriber is
/// already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let exporters = config
        .endpoint
        .as_deref()
        .map(|endpoint| Exporters::build(endpoint, &config.service_name))
        .transpose()?;

    let span_layer = exporters
        .as_ref()
        .map(|ex| tracing_opentelemetry::layer().with_tracer(ex.traces.tracer("showerpool")));
    let log_layer = exporters.as_ref().map(|ex| {
        opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&ex.logs)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(span_layer)
        .with(log_layer)
        .try_init()
        .map_err(|e| Error::Other(format!("failed to install tracing subscriber: {e}")))?;

    Ok(TelemetryGuard { exporters })
}
