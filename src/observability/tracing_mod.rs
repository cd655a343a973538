//! Tracing and logging setup module.
//!
//! This module provides:
//! - Structured logging configuration
//! - OpenTelemetry span export over OTLP
//! - Tracing span creation utilities

use anyhow::Result;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Sampler, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::prelude::*;

use crate::observability_config::{ObservabilityConfig, SERVICE_NAME};

/// Initialize structured logging with tracing and configuration.
///
/// With an OTLP endpoint configured, spans are also exported through an
/// OpenTelemetry layer on the same subscriber.
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("record_lookup_bot={}", config.log_level).parse()?)
        .add_directive("teloxide=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    // Cache internals can be turned up separately when chasing staleness issues
    if let Ok(cache_log) = std::env::var("CACHE_LOG_LEVEL") {
        filter = filter.add_directive(format!("record_lookup_bot::cache={}", cache_log).parse()?);
    }

    let otel_tracer = init_otlp_tracer(config)?;
    let otel_enabled = otel_tracer.is_some();

    // Pretty for development, JSON for everything else
    if config.is_development()
        || std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()) == "pretty"
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(
                otel_tracer
                    .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .with(
                otel_tracer
                    .map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)),
            )
            .try_init()?;
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    match &config.otlp_endpoint {
        Some(endpoint) if otel_enabled => tracing::info!(
            otlp_endpoint = %endpoint,
            trace_sampling_enabled = %config.enable_trace_sampling,
            trace_sampling_ratio = %config.trace_sampling_ratio,
            "OpenTelemetry tracing initialized with OTLP export"
        ),
        _ => tracing::info!("OpenTelemetry tracing disabled (no OTLP endpoint configured)"),
    }
    Ok(())
}

/// Build the OTLP tracer and install its provider globally.
///
/// Returns `None` when no OTLP endpoint is configured.
fn init_otlp_tracer(config: &ObservabilityConfig) -> Result<Option<SdkTracer>> {
    let Some(endpoint) = &config.otlp_endpoint else {
        return Ok(None);
    };

    let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()?;

    let sampler = if config.enable_trace_sampling {
        Sampler::TraceIdRatioBased(config.trace_sampling_ratio)
    } else {
        Sampler::AlwaysOn
    };

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(otlp_exporter)
        .with_sampler(sampler)
        .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
        .build();

    let tracer = tracer_provider.tracer(SERVICE_NAME);
    global::set_tracer_provider(tracer_provider);
    Ok(Some(tracer))
}

/// Create a span for cache operations
pub fn cache_span(operation: &str, shard_id: Option<&str>) -> tracing::Span {
    tracing::info_span!(
        "cache_operation",
        operation = operation,
        shard_id = shard_id,
        component = "cache"
    )
}

/// Create a span for Telegram bot operations
pub fn telegram_span(operation: &str, user_id: Option<i64>) -> tracing::Span {
    tracing::info_span!(
        "telegram_operation",
        operation = operation,
        user_id = user_id,
        component = "telegram"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TraceContextExt;
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    #[tokio::test]
    async fn test_spans_reach_the_otlp_tracer() {
        let disabled = ObservabilityConfig {
            otlp_endpoint: None,
            ..ObservabilityConfig::default()
        };
        assert!(init_otlp_tracer(&disabled).unwrap().is_none());

        let enabled = ObservabilityConfig {
            otlp_endpoint: Some("http://localhost:4317".to_string()),
            enable_trace_sampling: false,
            ..ObservabilityConfig::default()
        };
        let tracer = init_otlp_tracer(&enabled).unwrap().unwrap();

        let subscriber =
            tracing_subscriber::registry().with(tracing_opentelemetry::layer().with_tracer(tracer));
        tracing::subscriber::with_default(subscriber, || {
            let span = cache_span("get_shard", Some("9711"));
            let _entered = span.enter();
            assert!(span.context().span().span_context().is_valid());
        });
    }
}
