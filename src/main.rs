use anyhow::Result;
use record_lookup_bot::bot;
use record_lookup_bot::config::AppConfig;
use record_lookup_bot::errors::error_logging;
use record_lookup_bot::observability;
use record_lookup_bot::observability::health_checks::{self, HealthState};
use record_lookup_bot::search::SearchService;
use record_lookup_bot::store;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, UpdateListener};
use tracing::info;

/// How often expired shards are dropped and gauges refreshed
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically drop shards whose TTL has elapsed
fn start_shard_cleanup(search: SearchService) -> Option<tokio::task::JoinHandle<()>> {
    let sharded = search.sharded()?.clone();
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
        loop {
            interval.tick().await;
            sharded.shards().cleanup();
        }
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let startup = Instant::now();

    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    // Initialize complete observability stack (metrics, tracing, logging)
    let metrics_handle = observability::init_observability_with_config(&config.observability)?;

    if let Err(e) = config.validate() {
        error_logging::log_config_error(&e, "app_config", "validate");
        return Err(e.into());
    }
    info!("{}", config.summary());

    // Initialize the bot with custom client configuration for better reliability
    let client = reqwest::Client::builder()
        .timeout(config.bot.http_timeout())
        .build()?;
    let bot = Bot::with_client(config.bot.token.clone(), client.clone());

    let document_store = store::build_document_store(&config.data, &bot, &client)?;
    let data_config = config.data.clone();
    let search = tokio::task::spawn_blocking(move || {
        SearchService::from_config(&data_config, document_store)
    })
    .await?;

    if !search.has_sources() {
        tracing::warn!("No data source is configured; every search will report the source as unavailable");
    }

    let exported_metrics = config
        .observability
        .enable_metrics_export
        .then_some(metrics_handle);
    let health_state = HealthState::new(exported_metrics, search.clone());
    let public_addr = SocketAddr::from(([0, 0, 0, 0], config.server.health_port));

    // Start background maintenance tasks
    let _health_metrics_handle =
        health_checks::start_health_metrics_recorder(search.clone(), MAINTENANCE_INTERVAL);
    let _cleanup_handle = start_shard_cleanup(search.clone());

    let handler = Update::filter_message().endpoint(bot::message_handler);

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![search])
        .enable_ctrlc_handler()
        .build();

    observability::metrics::record_startup_metrics(startup.elapsed());

    match &config.server.webhook_url {
        Some(url) => {
            let url = reqwest::Url::parse(url)?;
            info!(webhook_url = %url, addr = %public_addr, "Starting bot in webhook mode");

            // Registers the webhook now and removes it when the listener stops
            let (mut listener, stop_flag, webhook_router) =
                webhooks::axum_to_router(bot.clone(), webhooks::Options::new(public_addr, url))
                    .await?;
            let stop_token = listener.stop_token();

            // Telegram and the platform health probes reach the same port
            let tcp_listener = tokio::net::TcpListener::bind(public_addr).await?;
            info!("Webhook and health routes listening on {}", public_addr);
            tokio::spawn(async move {
                if let Err(e) = health_checks::serve_public_router(
                    tcp_listener,
                    webhook_router,
                    health_state,
                    stop_flag,
                )
                .await
                {
                    error_logging::log_network_error(
                        &e,
                        "serve_public_router",
                        Some(&public_addr.to_string()),
                        None,
                    );
                    stop_token.stop();
                }
            });

            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            health_checks::start_health_server(config.server.health_port, health_state).await?;

            info!("Starting bot in long polling mode");
            // A webhook left over from a previous deployment blocks polling
            bot.delete_webhook().await?;
            dispatcher.dispatch().await;
        }
    }

    info!("Dispatcher shutdown gracefully");
    Ok(())
}
