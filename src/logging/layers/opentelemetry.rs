use crate::logging::config::OpenTelemetryConfig;
use crate::logging::layers::BoxLayer;
use anyhow::{anyhow, Context, Result};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{resource::Resource, trace::SdkTracerProvider};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;
use url::Url;

/// Flushes and shuts the tracer provider down exactly once.
pub struct OpenTelemetryHandle(Option<SdkTracerProvider>);

impl OpenTelemetryHandle {
    pub fn shutdown(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(provider) = self.0.take() {
            let _ = provider.force_flush();
            let _ = provider.shutdown();
        }
    }
}

impl Drop for OpenTelemetryHandle {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Builds an OpenTelemetry layer wired to the configured OTLP endpoint.
pub fn init<S>(config: &OpenTelemetryConfig) -> Result<(BoxLayer<S>, OpenTelemetryHandle)>
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
{
    let endpoint = config
        .endpoint
        .as_deref()
        .ok_or_else(|| anyhow!("no OTLP endpoint configured"))?;
    let endpoint = Url::parse(endpoint).context("invalid OTLP endpoint")?;

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.as_str())
        .build()
        .context("failed to build OTLP exporter")?;

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();

    let provider = SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build();

    let tracer = provider.tracer("bizflow");
    let layer = OpenTelemetryLayer::new(tracer);

    Ok((Box::new(layer), OpenTelemetryHandle(Some(provider))))
}
