//! Observability wiring.
//!
//! Logs go to stderr so stdout stays free for the event stream. When an OTLP
//! endpoint is configured, spans are also exported through
//! `tracing-opentelemetry`.

use anyhow::Context;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, TelemetrySection};

const DEFAULT_FILTER: &str = "info";

/// Keeps the tracer provider alive until [`Telemetry::shutdown`].
#[must_use]
pub struct Telemetry {
    provider: Option<TracerProvider>,
}

impl Telemetry {
    /// Flushes pending spans.
    pub fn shutdown(self) {
        if let Some(provider) = self.provider {
            if let Err(e) = provider.shutdown() {
                eprintln!("failed to shut down tracer provider: {e}");
            }
        }
    }
}

/// Installs the global subscriber. Must be called once, inside the runtime.
pub fn init(config: &TelemetrySection) -> anyhow::Result<Telemetry> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let provider = config
        .otlp_endpoint
        .as_deref()
        .map(otlp_provider)
        .transpose()?;
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("colloquy")));

    let (pretty, json) = match config.format {
        LogFormat::Pretty => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(otel_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    if let Some(endpoint) = &config.otlp_endpoint {
        tracing::info!(otlp_endpoint = %endpoint, "OpenTelemetry export enabled");
    }
    Ok(Telemetry { provider })
}

fn otlp_provider(endpoint: &str) -> anyhow::Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to create OTLP span exporter")?;

    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build())
}
