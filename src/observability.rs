//! Observability module for centralized metrics, tracing, and logging setup.
//!
//! This module provides:
//! - Metrics collection and Prometheus export
//! - Distributed tracing with OpenTelemetry
//! - Structured logging with configurable levels
//! - Health check endpoints for hosting platforms

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::observability_config::ObservabilityConfig;

pub mod health_checks;
pub mod metrics;
mod tracing_mod;

pub use tracing_mod::{cache_span, telegram_span};

/// Initialize logging, metrics and trace export.
///
/// Must run once, inside the Tokio runtime, before the caches are used. The
/// returned handle renders the Prometheus registry for the health server.
pub fn init_observability_with_config(config: &ObservabilityConfig) -> Result<PrometheusHandle> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    // Initialize tracing first so the remaining steps can log
    tracing_mod::init_tracing_with_config(config)?;

    let metrics_handle = metrics::init_metrics_with_config(config)?;

    tracing::info!(
        environment = %config.environment,
        otlp_endpoint = ?config.otlp_endpoint,
        tags = ?config.get_tags(),
        "Observability stack initialized successfully"
    );
    Ok(metrics_handle)
}
