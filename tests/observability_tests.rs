//! # Observability Tests Module
//!
//! Metrics recording, span creation and configuration presets.

#[cfg(test)]
mod tests {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use record_lookup_bot::observability;
    use record_lookup_bot::observability::metrics as bot_metrics;
    use record_lookup_bot::observability_config::{presets, ObservabilityConfig};
    use std::time::Duration;

    /// Recording functions are safe to call without an installed recorder
    #[test]
    fn test_metrics_recording_without_recorder() {
        bot_metrics::record_cache_request("shard", true);
        bot_metrics::record_cache_refresh("manifest", false);
        bot_metrics::record_cache_size("shard", 3);
        bot_metrics::record_document_fetch("shard", true, Duration::from_millis(40));
        bot_metrics::record_lookup("mobile", "found", Duration::from_millis(2));
        bot_metrics::record_telegram_message("text");
        bot_metrics::record_telegram_response("text", Duration::from_millis(15));
        bot_metrics::record_health_check_metrics("data_sources", true, Duration::from_micros(5));
        bot_metrics::record_local_index_metrics(10, 2);
        bot_metrics::record_startup_metrics(Duration::from_secs(1));
        bot_metrics::record_uptime(60.0);
    }

    /// Lookup and cache metrics render with their labels
    #[test]
    fn test_metrics_export_format() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            bot_metrics::record_lookup("mobile", "not_found", Duration::from_millis(3));
            bot_metrics::record_cache_request("shard", false);
            bot_metrics::record_cache_refresh("shard", true);
            bot_metrics::record_document_fetch("shard", false, Duration::from_millis(8));
        });

        let rendered = handle.render();
        assert!(rendered.contains("lookups_total"));
        assert!(rendered.contains("outcome=\"not_found\""));
        assert!(rendered.contains("cache_requests_total"));
        assert!(rendered.contains("result=\"miss\""));
        assert!(rendered.contains("cache_refreshes_total"));
        assert!(rendered.contains("document_fetches_total"));
        assert!(rendered.contains("result=\"failure\""));
    }

    /// Test span creation functions
    #[test]
    fn test_span_creation() {
        let _span1 = observability::cache_span("get_manifest", None);
        let _span2 = observability::cache_span("get_shard", Some("9711"));
        let _span3 = observability::telegram_span("message_handler", None);
        let _span4 = observability::telegram_span("message_handler", Some(12345));
    }

    #[test]
    fn test_observability_configuration() {
        assert!(ObservabilityConfig::default().validate().is_ok());
        assert!(presets::development().validate().is_ok());
        assert!(presets::production().validate().is_ok());
        assert!(presets::minimal().validate().is_ok());

        let config = ObservabilityConfig {
            otlp_endpoint: Some("http://localhost:4317".to_string()),
            ..presets::production()
        };
        assert!(config.validate().is_ok());
    }
}
