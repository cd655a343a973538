//! Metrics collection and Prometheus export module.
//!
//! All recording functions are cheap no-ops until a recorder is installed,
//! so library code and tests can call them freely.

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

use crate::observability_config::ObservabilityConfig;

/// Initialize metrics collection with Prometheus exporter and configuration
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<PrometheusHandle> {
    let mut builder = PrometheusBuilder::new();
    for (key, value) in config.get_tags() {
        builder = builder.add_global_label(key, value);
    }
    let handle = builder.install_recorder()?;

    tracing::info!(
        metrics_enabled = %config.enable_metrics_export,
        "Metrics collection initialized"
    );
    Ok(handle)
}

fn result_label(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}

/// Record a cache read, hit or miss
pub fn record_cache_request(cache: &'static str, hit: bool) {
    metrics::counter!(
        "cache_requests_total",
        "cache" => cache,
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Record the outcome of a cache refresh
pub fn record_cache_refresh(cache: &'static str, success: bool) {
    metrics::counter!(
        "cache_refreshes_total",
        "cache" => cache,
        "result" => result_label(success)
    )
    .increment(1);
}

/// Record the number of entries a cache holds
pub fn record_cache_size(cache: &'static str, entries: usize) {
    metrics::gauge!("cache_entries", "cache" => cache).set(entries as f64);
}

/// Record a document download from the backing store
pub fn record_document_fetch(kind: &str, success: bool, duration: Duration) {
    let kind = kind.to_string();
    metrics::counter!(
        "document_fetches_total",
        "kind" => kind.clone(),
        "result" => result_label(success)
    )
    .increment(1);
    metrics::histogram!("document_fetch_duration_seconds", "kind" => kind)
        .record(duration.as_secs_f64());
}

/// Record a completed user search
pub fn record_lookup(kind: &str, outcome: &str, duration: Duration) {
    let kind = kind.to_string();
    let outcome = outcome.to_string();
    metrics::counter!("lookups_total", "kind" => kind.clone(), "outcome" => outcome).increment(1);
    metrics::histogram!("lookup_duration_seconds", "kind" => kind).record(duration.as_secs_f64());
}

/// Record health check metrics
pub fn record_health_check_metrics(check_type: &str, success: bool, duration: Duration) {
    let check_type = check_type.to_string();
    metrics::counter!(
        "health_checks_total",
        "type" => check_type.clone(),
        "result" => result_label(success)
    )
    .increment(1);
    metrics::histogram!("health_check_duration_seconds", "type" => check_type.clone())
        .record(duration.as_secs_f64());
    metrics::gauge!("health_check_status", "type" => check_type).set(if success {
        1.0
    } else {
        0.0
    });
}

/// Record the size of the local index loaded at startup
pub fn record_local_index_metrics(records: usize, files: usize) {
    metrics::gauge!("local_index_records").set(records as f64);
    metrics::gauge!("local_index_files").set(files as f64);
}

/// Record application startup metrics
pub fn record_startup_metrics(duration: Duration) {
    metrics::histogram!("application_startup_duration_seconds").record(duration.as_secs_f64());
    metrics::counter!("application_starts_total").increment(1);
}

/// Record application uptime
pub fn record_uptime(uptime_secs: f64) {
    metrics::gauge!("application_uptime_seconds").set(uptime_secs);
}

/// Record Telegram message processing metrics
pub fn record_telegram_message(message_type: &str) {
    let message_type = message_type.to_string();
    metrics::counter!("telegram_messages_total", "type" => message_type).increment(1);
}

/// Record how long a Telegram update took to answer
pub fn record_telegram_response(message_type: &str, duration: Duration) {
    let message_type = message_type.to_string();
    metrics::histogram!("telegram_processing_duration_seconds", "type" => message_type)
        .record(duration.as_secs_f64());
}
