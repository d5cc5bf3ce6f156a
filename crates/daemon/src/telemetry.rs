//! Optional OpenTelemetry export
//!
//! Enabled when the binary is built with the `telemetry` feature and
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set. `OTEL_SERVICE_NAME` overrides the
//! reported service name (default `netbill-scheduler`).

use anyhow::Result;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

const ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Tracing layer exporting spans over OTLP, if configured
pub fn layer<S>() -> Result<Option<BoxedLayer<S>>>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    let Ok(endpoint) = std::env::var(ENDPOINT_ENV) else {
        return Ok(None);
    };

    #[cfg(feature = "telemetry")]
    {
        otlp_layer(&endpoint).map(Some)
    }

    #[cfg(not(feature = "telemetry"))]
    {
        // Subscriber is not installed yet
        eprintln!(
            "{} is set to {} but netbill-scheduler was built without the `telemetry` feature",
            ENDPOINT_ENV, endpoint
        );
        Ok(None)
    }
}

#[cfg(feature = "telemetry")]
fn otlp_layer<S>(endpoint: &str) -> Result<BoxedLayer<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
{
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "netbill-scheduler".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}
