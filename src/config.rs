//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! Settings are read from environment variables (a `.env` file is honoured by
//! the binary through `dotenvy`) and validated before the bot starts.

use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Bot-specific configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token
    pub token: String,
    /// HTTP client timeout in seconds
    pub http_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            http_timeout_secs: 30,
        }
    }
}

impl BotConfig {
    /// Validate bot configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.token.trim().is_empty() {
            return Err(AppError::Config("Bot token cannot be empty".to_string()));
        }

        let parts: Vec<&str> = self.token.split(':').collect();
        if parts.len() != 2 {
            return Err(AppError::Config(
                "Bot token format is invalid. Expected format: 'bot_id:bot_token'".to_string(),
            ));
        }

        if parts[0].parse::<u64>().is_err() {
            return Err(AppError::Config(
                "Bot token bot ID must be numeric".to_string(),
            ));
        }

        if parts[1].len() < 20 {
            return Err(AppError::Config(
                "Bot token appears to be too short. Please verify it's a valid token".to_string(),
            ));
        }

        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("HTTP timeout cannot be 0".to_string()));
        }

        if self.http_timeout_secs > 300 {
            return Err(AppError::Config(
                "HTTP timeout cannot be greater than 300 seconds".to_string(),
            ));
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding `*.json.gz` record lists for the local index
    pub data_dir: String,
    /// Channel whose pinned document is the shard manifest
    pub manifest_channel: Option<String>,
    /// HTTP location of the shard manifest (takes precedence over the channel)
    pub manifest_url: Option<String>,
    /// Base URL shard handles are resolved against (defaults to the manifest URL)
    pub shard_base_url: Option<String>,
    /// Manifest time-to-live in seconds
    pub manifest_ttl_secs: u64,
    /// Shard time-to-live in seconds
    pub shard_ttl_secs: u64,
    /// Leading digits that select a shard
    pub shard_prefix_len: usize,
    /// Minimum digits of a phone query
    pub min_query_digits: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            manifest_channel: None,
            manifest_url: None,
            shard_base_url: None,
            manifest_ttl_secs: 600, // 10 minutes
            shard_ttl_secs: 600,    // 10 minutes
            shard_prefix_len: crate::query::SHARD_PREFIX_LEN,
            min_query_digits: crate::query::MIN_QUERY_DIGITS,
        }
    }
}

impl DataConfig {
    /// Validate data source configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.manifest_ttl_secs == 0 {
            return Err(AppError::Config("Manifest TTL cannot be 0".to_string()));
        }

        if self.shard_ttl_secs == 0 {
            return Err(AppError::Config("Shard TTL cannot be 0".to_string()));
        }

        if self.shard_prefix_len == 0 {
            return Err(AppError::Config(
                "Shard prefix length cannot be 0".to_string(),
            ));
        }

        if self.min_query_digits < self.shard_prefix_len {
            return Err(AppError::Config(format!(
                "Minimum query digits ({}) cannot be smaller than the shard prefix length ({})",
                self.min_query_digits, self.shard_prefix_len
            )));
        }

        for (name, value) in [
            ("MANIFEST_URL", &self.manifest_url),
            ("SHARD_BASE_URL", &self.shard_base_url),
        ] {
            if let Some(url) = value {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(AppError::Config(format!(
                        "{} must start with 'http://' or 'https://'",
                        name
                    )));
                }
            }
        }

        if self.shard_base_url.is_some() && self.manifest_url.is_none() {
            return Err(AppError::Config(
                "SHARD_BASE_URL requires MANIFEST_URL".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether a sharded manifest source is configured
    pub fn has_sharded_source(&self) -> bool {
        self.manifest_url.is_some() || self.manifest_channel.is_some()
    }

    pub fn manifest_ttl(&self) -> Duration {
        Duration::from_secs(self.manifest_ttl_secs)
    }

    pub fn shard_ttl(&self) -> Duration {
        Duration::from_secs(self.shard_ttl_secs)
    }
}

/// Paths served next to the webhook on the public port
pub const HEALTH_PATHS: [&str; 4] = ["/", "/health/live", "/health/ready", "/metrics"];

/// Server configuration for health checks and webhook delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Public HTTP port; serves the health routes and, in webhook mode, the webhook
    pub health_port: u16,
    /// Public webhook URL; long polling is used when absent
    pub webhook_url: Option<String>,
    /// Whether to allow privileged ports (< 1024)
    pub allow_privileged_ports: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            health_port: 8080,
            webhook_url: None,
            allow_privileged_ports: false,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> AppResult<()> {
        if !self.allow_privileged_ports && self.health_port < 1024 {
            return Err(AppError::Config(format!(
                "Port {} is privileged. Set allow_privileged_ports=true or use port >= 1024",
                self.health_port
            )));
        }

        if let Some(url) = &self.webhook_url {
            if !url.starts_with("https://") {
                return Err(AppError::Config(
                    "Webhook URL must start with 'https://'".to_string(),
                ));
            }

            let path = self.webhook_path().unwrap_or("/");
            if HEALTH_PATHS.contains(&path) {
                return Err(AppError::Config(format!(
                    "Webhook path {} collides with a health check route",
                    path
                )));
            }
        }

        Ok(())
    }

    /// Path component of the webhook URL, e.g. `/webhook`
    pub fn webhook_path(&self) -> Option<&str> {
        let url = self.webhook_url.as_deref()?;
        let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
        let path = rest.find('/').map_or("/", |i| &rest[i..]);
        Some(path.split(|c| c == '?' || c == '#').next().unwrap_or("/"))
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Bot configuration
    pub bot: BotConfig,
    /// Data source configuration
    pub data: DataConfig,
    /// Server configuration
    pub server: ServerConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> AppResult<T> {
    match env_opt(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a valid number", key))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // Load bot configuration
        config.bot.token = env_opt("TELEGRAM_BOT_TOKEN")
            .or_else(|| env_opt("BOT_TOKEN"))
            .ok_or_else(|| {
                AppError::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;
        config.bot.http_timeout_secs = env_parse("HTTP_CLIENT_TIMEOUT_SECS", 30)?;

        // Load data source configuration
        if let Some(dir) = env_opt("DATA_DIR") {
            config.data.data_dir = dir;
        }
        config.data.manifest_channel = env_opt("MANIFEST_CHANNEL_ID");
        config.data.manifest_url = env_opt("MANIFEST_URL");
        config.data.shard_base_url = env_opt("SHARD_BASE_URL");
        config.data.manifest_ttl_secs = env_parse("MANIFEST_TTL_SECS", 600)?;
        config.data.shard_ttl_secs = env_parse("SHARD_TTL_SECS", 600)?;
        config.data.shard_prefix_len =
            env_parse("SHARD_PREFIX_LEN", crate::query::SHARD_PREFIX_LEN)?;
        config.data.min_query_digits =
            env_parse("MIN_QUERY_DIGITS", crate::query::MIN_QUERY_DIGITS)?;

        // Load server configuration
        config.server.health_port = match env_opt("HEALTH_PORT") {
            Some(_) => env_parse("HEALTH_PORT", 8080)?,
            None => env_parse("PORT", 8080)?,
        };
        config.server.webhook_url = env_opt("WEBHOOK_URL").or_else(|| {
            env_opt("RENDER_EXTERNAL_URL")
                .map(|base| format!("{}/webhook", base.trim_end_matches('/')))
        });
        config.server.allow_privileged_ports = env::var("ALLOW_PRIVILEGED_PORTS")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.bot.validate()?;
        self.data.validate()?;
        self.server.validate()?;
        self.observability
            .validate()
            .map_err(AppError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: bot_token=[REDACTED], data_dir={}, sharded_source={}, manifest_ttl={}s, shard_ttl={}s, health_port={}, delivery={}",
            self.data.data_dir,
            self.data.has_sharded_source(),
            self.data.manifest_ttl_secs,
            self.data.shard_ttl_secs,
            self.server.health_port,
            if self.server.webhook_url.is_some() { "webhook" } else { "polling" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        // Default config has no bot token, so only that section fails
        assert!(config.validate().is_err());
        assert!(config.data.validate().is_ok());
        assert!(config.server.validate().is_ok());
    }

    #[test]
    fn test_bot_config_validation() {
        let mut config = BotConfig::default();

        // Invalid: empty token
        assert!(config.validate().is_err());

        // Invalid: malformed token
        config.token = "invalid-token".to_string();
        assert!(config.validate().is_err());

        // Invalid: short token
        config.token = "123:short".to_string();
        assert!(config.validate().is_err());

        // Valid token format
        config.token = "123456789:AAFakeTokenForTestingPurposes1234567890".to_string();
        assert!(config.validate().is_ok());

        // Invalid: zero timeout
        config.http_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.http_timeout_secs = 30;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_data_config_validation() {
        let mut config = DataConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.has_sharded_source());

        // Invalid: zero TTLs
        config.manifest_ttl_secs = 0;
        assert!(config.validate().is_err());
        config.manifest_ttl_secs = 600;
        config.shard_ttl_secs = 0;
        assert!(config.validate().is_err());
        config.shard_ttl_secs = 600;

        // Invalid: fewer required digits than the shard prefix
        config.min_query_digits = 3;
        assert!(config.validate().is_err());
        config.min_query_digits = 7;

        // Invalid: manifest URL scheme
        config.manifest_url = Some("ftp://data.example.com/manifest.json".to_string());
        assert!(config.validate().is_err());

        config.manifest_url = Some("https://data.example.com/manifest.json".to_string());
        assert!(config.validate().is_ok());
        assert!(config.has_sharded_source());

        // Invalid: base URL without manifest URL
        config.manifest_url = None;
        config.shard_base_url = Some("https://data.example.com/shards/".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_config_validation() {
        let mut config = ServerConfig::default();

        // Valid default config
        assert!(config.validate().is_ok());

        // Invalid: plain http webhook
        config.webhook_url = Some("http://bot.example.com/webhook".to_string());
        assert!(config.validate().is_err());

        config.webhook_url = Some("https://bot.example.com/webhook".to_string());
        assert!(config.validate().is_ok());

        // Invalid: webhook path shadowed by a health route
        config.webhook_url = Some("https://bot.example.com/metrics".to_string());
        assert!(config.validate().is_err());
        config.webhook_url = Some("https://bot.example.com".to_string());
        assert!(config.validate().is_err());
        config.webhook_url = Some("https://bot.example.com/webhook".to_string());

        // Invalid: privileged ports without permission
        config.health_port = 80;
        assert!(config.validate().is_err());

        // Valid: privileged ports with permission
        config.allow_privileged_ports = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_webhook_shares_the_public_port() {
        let config = ServerConfig {
            health_port: 10000,
            webhook_url: Some("https://mybot.onrender.com/webhook?x=1".to_string()),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.webhook_path(), Some("/webhook"));
        assert!(!HEALTH_PATHS.contains(&"/webhook"));

        assert_eq!(ServerConfig::default().webhook_path(), None);
    }

    #[test]
    fn test_summary_redacts_token() {
        let mut config = AppConfig::default();
        config.bot.token = "123456789:AAFakeTokenForTestingPurposes1234567890".to_string();
        let summary = config.summary();
        assert!(summary.contains("[REDACTED]"));
        assert!(!summary.contains("AAFakeToken"));
        assert!(summary.contains("delivery=polling"));
    }
}
