use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use opentelemetry::{propagation::TextMapCompositePropagator, trace::TracerProvider, KeyValue};
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::{
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{BatchSpanProcessor, Sampler, SdkTracerProvider, Tracer},
    Resource,
};
use opentelemetry_semantic_conventions::resource;
use tokio::{spawn, task::JoinHandle};
use tracing::{level_filters::LevelFilter, Subscriber};
use tracing_loki::BackgroundTask;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan, EnvFilter, Layer};
use url::Url;

use crate::{api::middlewares::RequestTracer, config::TelemetryConfig};

pub mod flush;
pub mod span;
pub mod trace_context;

pub use flush::{Flush, FlushError};
pub use span::{capture_exception, RequestSpan, SpanStatus, TraceSpan, SPAN_TARGET};
pub use trace_context::TraceContext;

pub struct TracingGuard {
    tracer_provider: SdkTracerProvider,
    loki_handle: Option<JoinHandle<()>>,
}

impl TracingGuard {
    /// A request tracer that flushes this guard's provider after each request.
    pub fn request_tracer(&self, flush_timeout: Duration) -> RequestTracer {
        RequestTracer::new(Arc::new(self.tracer_provider.clone()), flush_timeout)
    }
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        let _ = self.tracer_provider.force_flush();
        let _ = self.tracer_provider.shutdown();
        if let Some(loki_handle) = &self.loki_handle {
            loki_handle.abort();
        }
    }
}

pub fn init_subscribers(config: &TelemetryConfig) -> Result<TracingGuard> {
    // Filter
    let env_filter = build_env_filter_layer(config.debug);

    // Layers
    let logger_text_layer = build_logger_text_layer();
    let loki = config
        .loki_url
        .as_deref()
        .map(build_loki_layer)
        .transpose()?;
    let (loki_layer, background_task) = loki.unzip();
    let (otel_layer, tracer_provider) = build_otel_layer(config)?;

    // Subscriber
    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(logger_text_layer)
        .with(loki_layer)
        .with(otel_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install the tracing subscriber")?;

    let loki_handle = background_task.map(spawn);

    Ok(TracingGuard {
        tracer_provider,
        loki_handle,
    })
}

fn build_env_filter_layer(debug: bool) -> EnvFilter {
    let default_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let directives = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("OTEL_LOG_LEVEL"))
        .unwrap_or_else(|_| default_level.to_string());

    env_filter(default_level, directives)
}

/// Parses `directives`, keeping request spans enabled whatever the level.
pub(crate) fn env_filter(default_level: LevelFilter, mut directives: String) -> EnvFilter {
    directives.push_str(&format!(",{SPAN_TARGET}=trace"));

    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .parse_lossy(directives)
}

fn build_logger_text_layer<S>() -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    Box::new(
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_line_number(true)
            .with_timer(tracing_subscriber::fmt::time::uptime())
            .with_target(true)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true),
    )
}

fn build_loki_layer(url: &str) -> Result<(tracing_loki::Layer, BackgroundTask)> {
    let (loki_layer, background_task) = tracing_loki::builder()
        .label("service_name", env!("CARGO_PKG_NAME"))?
        .label("version", env!("CARGO_PKG_VERSION"))?
        .label(
            "environment",
            std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()),
        )?
        .build_url(Url::parse(url).context("Invalid Loki URL")?)?;

    Ok((loki_layer, background_task))
}

fn build_otel_layer<S>(
    config: &TelemetryConfig,
) -> Result<(OpenTelemetryLayer<S, Tracer>, SdkTracerProvider)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .with_protocol(Protocol::Grpc)
        .build()
        .context("Failed to build the OTLP span exporter")?;

    let mut builder = SdkTracerProvider::builder()
        .with_resource(
            Resource::builder()
                .with_attribute(KeyValue::new(
                    resource::SERVICE_NAME,
                    env!("CARGO_PKG_NAME"),
                ))
                .with_attribute(KeyValue::new(
                    resource::SERVICE_VERSION,
                    env!("CARGO_PKG_VERSION"),
                ))
                .build(),
        )
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            config.sample_rate.clamp(0.0, 1.0),
        ))))
        .with_span_processor(BatchSpanProcessor::builder(otlp_exporter).build());
    if config.debug {
        builder = builder.with_simple_exporter(opentelemetry_stdout::SpanExporter::default());
    }
    let tracer_provider = builder.build();

    init_propagator();

    let layer = tracing_opentelemetry::layer()
        .with_error_records_to_exceptions(true)
        .with_tracer(tracer_provider.tracer(env!("CARGO_PKG_NAME")));
    opentelemetry::global::set_tracer_provider(tracer_provider.clone());

    Ok((layer, tracer_provider))
}

fn init_propagator() {
    let propagators = TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]);

    opentelemetry::global::set_text_map_propagator(propagators);
}

