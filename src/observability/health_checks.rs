//! Health check functionality module.
//!
//! This module provides:
//! - The HTTP endpoint hosting platforms probe (`/`, `/health/live`, `/health/ready`)
//! - Prometheus metrics rendering on `/metrics`
//! - Data source readiness checks
//!
//! In polling mode the routes run on a standalone hyper server. In webhook
//! mode they are merged into the webhook router so both answer on one port.

use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::Result;
use axum::extract::State;
use axum::http::Uri;
use axum::routing::get;
use axum::Router;
use hyper::server::conn::http1;
use hyper::{Method, Response, StatusCode};
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;

use crate::config::HEALTH_PATHS;

use crate::search::SearchService;

/// State shared by every health server connection
#[derive(Clone)]
pub struct HealthState {
    metrics_handle: Option<PrometheusHandle>,
    search: SearchService,
}

impl HealthState {
    /// `metrics_handle` is `None` when metrics export is disabled
    pub fn new(metrics_handle: Option<PrometheusHandle>, search: SearchService) -> Self {
        Self {
            metrics_handle,
            search,
        }
    }
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response<String> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

/// Answer one health server request
pub async fn respond(method: &Method, path: &str, state: &HealthState) -> Response<String> {
    match (method, path) {
        (&Method::GET | &Method::HEAD, "/") => {
            let body = serde_json::json!({ "status": "Bot is running!" }).to_string();
            let mut response = Response::new(body);
            response.headers_mut().insert(
                "content-type",
                hyper::header::HeaderValue::from_static("application/json"),
            );
            response
        }
        (&Method::GET, "/health/live") => text_response(StatusCode::OK, "OK"),
        (&Method::GET, "/health/ready") => match perform_readiness_checks(&state.search).await {
            Ok(()) => text_response(StatusCode::OK, "OK"),
            Err(e) => text_response(StatusCode::SERVICE_UNAVAILABLE, format!("NOT READY: {}", e)),
        },
        (&Method::GET, "/metrics") => match &state.metrics_handle {
            Some(handle) => {
                let mut response = Response::new(handle.render());
                response.headers_mut().insert(
                    "content-type",
                    hyper::header::HeaderValue::from_static(
                        "text/plain; version=0.0.4; charset=utf-8",
                    ),
                );
                response
            }
            None => text_response(StatusCode::NOT_FOUND, "Metrics export disabled"),
        },
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn route_request(
    State(state): State<HealthState>,
    method: Method,
    uri: Uri,
) -> Response<String> {
    // axum answers HEAD through the GET route
    let method = if method == Method::HEAD {
        Method::GET
    } else {
        method
    };
    respond(&method, uri.path(), &state).await
}

/// The health routes as an axum router
pub fn health_router(state: HealthState) -> Router {
    HEALTH_PATHS
        .iter()
        .fold(Router::<HealthState>::new(), |router, path| {
            router.route(path, get(route_request))
        })
        .with_state(state)
}

/// Serve the webhook router and the health routes together on `listener`
/// until `shutdown` resolves
pub async fn serve_public_router<F>(
    listener: TcpListener,
    webhook: Router,
    state: HealthState,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = webhook.merge(health_router(state));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind the health server on all interfaces and serve it in the background
pub async fn start_health_server(port: u16, state: HealthState) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Health server listening on {}", addr);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let state = state.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = hyper::service::service_fn(
                            move |req: hyper::Request<hyper::body::Incoming>| {
                                let state = state.clone();
                                async move {
                                    let response =
                                        respond(req.method(), req.uri().path(), &state).await;
                                    Ok::<_, std::convert::Infallible>(response)
                                }
                            },
                        );

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            crate::errors::error_logging::log_network_error(
                                &err,
                                "serve_http_connection",
                                Some(&peer_addr.to_string()),
                                None,
                            );
                        }
                    });
                }
                Err(e) => {
                    crate::errors::error_logging::log_network_error(
                        &e,
                        "accept_tcp_connection",
                        Some(&addr.to_string()),
                        None,
                    );
                }
            }
        }
    });

    Ok(())
}

/// Perform readiness checks against the configured data sources.
///
/// The sharded source is ready once its manifest can be obtained; a cached
/// manifest that is still fresh answers without touching the store.
pub async fn perform_readiness_checks(search: &SearchService) -> Result<()> {
    check_data_sources(search)?;

    if let Some(sharded) = search.sharded() {
        sharded
            .shards()
            .manifest()
            .get_manifest()
            .await
            .map_err(|e| anyhow::anyhow!("Manifest check failed: {}", e))?;
        tracing::debug!("Manifest health check passed");
    }

    Ok(())
}

/// Check that at least one data source is configured and non-empty
pub fn check_data_sources(search: &SearchService) -> Result<()> {
    if !search.has_sources() {
        return Err(anyhow::anyhow!("No data source is configured"));
    }

    if search.sharded().is_none() && search.local().is_some_and(|index| index.is_empty()) {
        return Err(anyhow::anyhow!("Local index holds no records"));
    }

    Ok(())
}

/// Start a background task to periodically record health and cache metrics
pub fn start_health_metrics_recorder(
    search: SearchService,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let started = Instant::now();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);

        loop {
            interval.tick().await;

            let check_start = Instant::now();
            let healthy = check_data_sources(&search).is_ok();
            super::metrics::record_health_check_metrics(
                "data_sources",
                healthy,
                check_start.elapsed(),
            );

            if let Some(sharded) = search.sharded() {
                super::metrics::record_cache_size("shard", sharded.shards().cached_shards());
            }
            super::metrics::record_uptime(started.elapsed().as_secs_f64());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_index::LocalIndex;
    use std::sync::Arc;

    fn state_with_local_records() -> HealthState {
        let mut index = LocalIndex::default();
        let record: crate::shard::Record =
            serde_json::from_str(r#"{"Mobile No": "9876543210"}"#).unwrap();
        index.extend([record]);
        HealthState::new(None, SearchService::new(Some(Arc::new(index)), None))
    }

    #[tokio::test]
    async fn test_root_reports_running() {
        let state = state_with_local_records();
        let response = respond(&Method::GET, "/", &state).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = serde_json::from_str(response.body()).unwrap();
        assert_eq!(body["status"], "Bot is running!");
    }

    #[tokio::test]
    async fn test_readiness_follows_data_sources() {
        let ready = respond(&Method::GET, "/health/ready", &state_with_local_records()).await;
        assert_eq!(ready.status(), StatusCode::OK);

        let empty = HealthState::new(None, SearchService::default());
        let not_ready = respond(&Method::GET, "/health/ready", &empty).await;
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(not_ready.body().starts_with("NOT READY"));

        let live = respond(&Method::GET, "/health/live", &empty).await;
        assert_eq!(live.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_disabled_and_unknown_paths() {
        let state = state_with_local_records();
        let metrics = respond(&Method::GET, "/metrics", &state).await;
        assert_eq!(metrics.status(), StatusCode::NOT_FOUND);

        let unknown = respond(&Method::POST, "/", &state).await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_and_health_routes_share_one_port() {
        let webhook =
            Router::new().route("/webhook", axum::routing::post(|| async { "update accepted" }));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_public_router(
            listener,
            webhook,
            state_with_local_records(),
            std::future::pending(),
        ));

        let client = reqwest::Client::new();
        let update = client
            .post(format!("http://{}/webhook", addr))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(update.status(), StatusCode::OK);
        assert_eq!(update.text().await.unwrap(), "update accepted");

        let root = client.get(format!("http://{}/", addr)).send().await.unwrap();
        assert_eq!(root.status(), StatusCode::OK);
        let body: serde_json::Value = root.json().await.unwrap();
        assert_eq!(body["status"], "Bot is running!");

        let ready = client
            .get(format!("http://{}/health/ready", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(ready.status(), StatusCode::OK);

        let head = client.head(format!("http://{}/health/live", addr)).send().await.unwrap();
        assert_eq!(head.status(), StatusCode::OK);
    }

    #[test]
    fn test_empty_local_index_is_not_ready() {
        let search = SearchService::new(Some(Arc::new(LocalIndex::default())), None);
        assert!(check_data_sources(&search).is_err());
    }
}
