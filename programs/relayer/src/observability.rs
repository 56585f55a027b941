//! Logging and tracing for the relayer.
//!
//! Every event goes to two sinks: a pretty stdout layer for the operator and
//! a JSON file, [`LOG_FILE`], next to the per-job logs. JSON lines keep the
//! fields of the enclosing spans, so a failed job invocation can be matched
//! with its job log through its `invocation_id`. Spans and events are also
//! exported over OTLP when enabled.

use std::{
    fs::{File, OpenOptions},
    path::Path,
    sync::Mutex,
};

use anyhow::{Context, Result};
use hub_relayer_core::config::ObservabilityConfig;
use opentelemetry::{trace::TracerProvider as _, KeyValue};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{logs::SdkLoggerProvider, trace::SdkTracerProvider, Resource};
use tracing::{warn, Subscriber};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

/// Name of the structured log file inside the relayer log directory.
pub const LOG_FILE: &str = "relayer.log";

/// Keeps the OTLP export alive. Pending spans and log records are flushed
/// when it is dropped.
pub struct ObservabilityGuard {
    otlp: Option<OtlpExport>,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if let Some(otlp) = self.otlp.take() {
            if let Err(e) = otlp.tracer_provider.shutdown() {
                eprintln!("Failed to flush OTLP spans: {e}");
            }
            // Dropping the provider flushes its batch processor.
            drop(otlp.logger_provider);
        }
    }
}

/// The OTLP/gRPC span and log pipelines.
struct OtlpExport {
    tracer_provider: SdkTracerProvider,
    logger_provider: SdkLoggerProvider,
}

impl OtlpExport {
    fn new(config: &ObservabilityConfig) -> Result<Self> {
        let resource = Resource::builder()
            .with_attributes([
                KeyValue::new("service.name", config.service_name.clone()),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ])
            .build();

        let mut spans = opentelemetry_otlp::SpanExporter::builder().with_tonic();
        let mut logs = opentelemetry_otlp::LogExporter::builder().with_tonic();
        if let Some(endpoint) = &config.otel_endpoint {
            spans = spans.with_endpoint(endpoint);
            logs = logs.with_endpoint(endpoint);
        }

        let tracer_provider = SdkTracerProvider::builder()
            .with_resource(resource.clone())
            .with_batch_exporter(spans.build().context("Failed to build the OTLP span exporter")?)
            .build();
        let logger_provider = SdkLoggerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(logs.build().context("Failed to build the OTLP log exporter")?)
            .build();

        Ok(Self {
            tracer_provider,
            logger_provider,
        })
    }
}

/// Opens [`LOG_FILE`] in `log_dir` for appending.
fn open_log_file(log_dir: &Path) -> Result<File> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let path = log_dir.join(LOG_FILE);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// The stdout and JSON file layers under the configured level filter.
fn local_subscriber(
    config: &ObservabilityConfig,
    log_file: File,
) -> impl Subscriber + for<'span> LookupSpan<'span> + Send + Sync {
    Registry::default()
        .with(EnvFilter::new(config.level().as_str().to_lowercase()))
        .with(fmt::layer().pretty().with_target(true))
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(Mutex::new(log_file)),
        )
}

/// Installs the global subscriber.
///
/// When OTLP export is enabled but cannot be set up, the relayer keeps
/// running with local logging only and says so in the log. Keep the guard
/// alive for the lifetime of the process.
///
/// # Errors
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init_observability(
    config: &ObservabilityConfig,
    log_dir: &Path,
) -> Result<ObservabilityGuard> {
    let log_file = open_log_file(log_dir)?;

    let (otlp, otlp_error) = if config.use_otel {
        match OtlpExport::new(config) {
            Ok(otlp) => (Some(otlp), None),
            Err(e) => (None, Some(e)),
        }
    } else {
        (None, None)
    };

    let otlp_layers = otlp.as_ref().map(|otlp| {
        tracing_opentelemetry::layer()
            .with_tracer(otlp.tracer_provider.tracer(config.service_name.clone()))
            .and_then(OpenTelemetryTracingBridge::new(&otlp.logger_provider))
    });

    local_subscriber(config, log_file)
        .with(otlp_layers)
        .try_init()
        .context("Failed to set global default subscriber")?;

    if let Some(e) = otlp_error {
        warn!(error = %e, "OTLP export disabled, logging locally only");
    }

    Ok(ObservabilityGuard { otlp })
}
