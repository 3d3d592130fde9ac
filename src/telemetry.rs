//! Logging and distributed tracing setup

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogFormat;
use crate::error::{Error, Result};

const SERVICE_NAME: &str = "astro-operator";

/// Install the global subscriber.
///
/// Spans are additionally exported over OTLP when an endpoint is given.
pub fn init(format: LogFormat, otlp_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let (text, json) = match format {
        LogFormat::Text => (Some(fmt::layer().with_target(true)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_target(true))),
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(text)
        .with(json);

    let installed = match otlp_endpoint {
        Some(endpoint) => {
            let tracer = init_tracer(endpoint)?;
            registry
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .try_init()
        }
        None => registry.try_init(),
    };
    installed.map_err(|e| Error::TelemetryError(e.to_string()))
}

fn init_tracer(endpoint: &str) -> Result<sdktrace::Tracer> {
    let instance = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", SERVICE_NAME),
            KeyValue::new("service.instance.id", instance),
        ])))
        .install_batch(runtime::Tokio)
        .map_err(|e| Error::TelemetryError(e.to_string()))
}

/// Flush pending spans
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}
