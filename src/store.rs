//! # Document Store Module
//!
//! Remote storage for the manifest document and the shard files it points at.
//! Two backends are provided: a Telegram channel (manifest pinned in the
//! channel, shards referenced by Telegram file id) and plain HTTP.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, Recipient};
use tracing::{debug, info};

use crate::config::DataConfig;
use crate::errors::{error_logging, AppError, AppResult, DocumentKind, LookupError, LookupResult};
use crate::observability;

/// Source of raw document bytes
///
/// Implementations return `SourceUnavailable` for anything that prevents
/// producing the bytes; decoding is left to the caller.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the raw manifest document
    async fn fetch_manifest(&self) -> LookupResult<Vec<u8>>;

    /// Fetch the raw bytes behind an opaque remote handle
    async fn fetch(&self, handle: &str) -> LookupResult<Vec<u8>>;

    /// Short human readable description used in logs
    fn describe(&self) -> String;
}

/// Manifest pinned in a Telegram channel, shards stored as channel documents
#[derive(Debug, Clone)]
pub struct TelegramChannelStore {
    bot: Bot,
    channel: Recipient,
    client: reqwest::Client,
}

impl TelegramChannelStore {
    pub fn new(bot: Bot, channel: Recipient, client: reqwest::Client) -> Self {
        Self {
            bot,
            channel,
            client,
        }
    }

    async fn download_file(&self, file_id: FileId, kind: DocumentKind) -> LookupResult<Vec<u8>> {
        let file = self
            .bot
            .get_file(file_id)
            .await
            .map_err(|e| LookupError::unavailable(kind, e))?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| LookupError::unavailable(kind, e))?;
        let bytes = response.bytes().await.map_err(|e| LookupError::unavailable(kind, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DocumentStore for TelegramChannelStore {
    async fn fetch_manifest(&self) -> LookupResult<Vec<u8>> {
        let start = Instant::now();
        let chat = self
            .bot
            .get_chat(self.channel.clone())
            .await
            .map_err(|e| LookupError::unavailable(DocumentKind::Manifest, e))?;

        let pinned = chat.pinned_message.ok_or_else(|| {
            LookupError::unavailable(DocumentKind::Manifest, "manifest channel has no pinned message")
        })?;
        let document = pinned.document().ok_or_else(|| {
            LookupError::unavailable(DocumentKind::Manifest, "pinned message carries no document")
        })?;

        debug!(file_name = ?document.file_name, "Downloading pinned manifest document");
        let result = self
            .download_file(document.file.id.clone(), DocumentKind::Manifest)
            .await;
        observability::metrics::record_document_fetch("manifest", result.is_ok(), start.elapsed());
        result
    }

    async fn fetch(&self, handle: &str) -> LookupResult<Vec<u8>> {
        let start = Instant::now();
        let result = self
            .download_file(FileId(handle.to_string()), DocumentKind::Shard)
            .await;
        observability::metrics::record_document_fetch("shard", result.is_ok(), start.elapsed());
        result
    }

    fn describe(&self) -> String {
        format!("telegram channel {}", recipient_label(&self.channel))
    }
}

/// Manifest and shards served over HTTP
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    manifest_url: Url,
    base_url: Url,
}

impl HttpStore {
    /// Shard handles are resolved relative to `base_url`
    pub fn new(client: reqwest::Client, manifest_url: Url, base_url: Url) -> Self {
        Self {
            client,
            manifest_url,
            base_url,
        }
    }

    async fn get_bytes(&self, url: Url, kind: DocumentKind) -> LookupResult<Vec<u8>> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            error_logging::log_network_error(&e, "http_store_get", Some(url.as_str()), None);
            LookupError::unavailable(kind, e)
        })?;
        let response = response
            .error_for_status()
            .map_err(|e| LookupError::unavailable(kind, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LookupError::unavailable(kind, e))?;
        Ok(bytes.to_vec())
    }

    /// Resolve a shard handle to an absolute URL
    pub fn resolve(&self, handle: &str) -> LookupResult<Url> {
        self.base_url.join(handle).map_err(|e| {
            LookupError::unavailable(
                DocumentKind::Shard,
                format!("invalid shard handle '{}': {}", handle, e),
            )
        })
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn fetch_manifest(&self) -> LookupResult<Vec<u8>> {
        let start = Instant::now();
        let result = self
            .get_bytes(self.manifest_url.clone(), DocumentKind::Manifest)
            .await;
        observability::metrics::record_document_fetch("manifest", result.is_ok(), start.elapsed());
        result
    }

    async fn fetch(&self, handle: &str) -> LookupResult<Vec<u8>> {
        let start = Instant::now();
        let url = self.resolve(handle)?;
        let result = self.get_bytes(url, DocumentKind::Shard).await;
        observability::metrics::record_document_fetch("shard", result.is_ok(), start.elapsed());
        result
    }

    fn describe(&self) -> String {
        format!("http {}", self.manifest_url)
    }
}

/// Parse a channel reference: numeric ids become chat ids, anything else a `@username`
pub fn parse_channel(channel: &str) -> Recipient {
    let channel = channel.trim();
    match channel.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) if channel.starts_with('@') => Recipient::ChannelUsername(channel.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{}", channel)),
    }
}

fn recipient_label(recipient: &Recipient) -> String {
    match recipient {
        Recipient::Id(id) => id.to_string(),
        Recipient::ChannelUsername(name) => name.clone(),
    }
}

/// Build the configured document store, if any.
///
/// `MANIFEST_URL` selects the HTTP store and takes precedence over
/// `MANIFEST_CHANNEL_ID`.
pub fn build_document_store(
    config: &DataConfig,
    bot: &Bot,
    client: &reqwest::Client,
) -> AppResult<Option<Arc<dyn DocumentStore>>> {
    if let Some(manifest_url) = &config.manifest_url {
        let manifest_url = Url::parse(manifest_url)
            .map_err(|e| AppError::Config(format!("MANIFEST_URL is invalid: {}", e)))?;
        let base_url = match &config.shard_base_url {
            Some(base) => Url::parse(base)
                .map_err(|e| AppError::Config(format!("SHARD_BASE_URL is invalid: {}", e)))?,
            None => manifest_url.clone(),
        };
        let store = HttpStore::new(client.clone(), manifest_url, base_url);
        info!(store = %store.describe(), "Using HTTP document store");
        return Ok(Some(Arc::new(store)));
    }

    if let Some(channel) = &config.manifest_channel {
        let store = TelegramChannelStore::new(bot.clone(), parse_channel(channel), client.clone());
        info!(store = %store.describe(), "Using Telegram channel document store");
        return Ok(Some(Arc::new(store)));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel() {
        assert_eq!(
            parse_channel("-1001234567890"),
            Recipient::Id(ChatId(-1001234567890))
        );
        assert_eq!(
            parse_channel("@records_channel"),
            Recipient::ChannelUsername("@records_channel".to_string())
        );
        assert_eq!(
            parse_channel(" records_channel "),
            Recipient::ChannelUsername("@records_channel".to_string())
        );
    }

    #[test]
    fn test_http_store_resolves_handles_against_base() {
        let store = HttpStore::new(
            reqwest::Client::new(),
            Url::parse("https://data.example.com/manifest.json").unwrap(),
            Url::parse("https://data.example.com/shards/").unwrap(),
        );

        let url = store.resolve("9711.json.gz").unwrap();
        assert_eq!(url.as_str(), "https://data.example.com/shards/9711.json.gz");
    }

    #[test]
    fn test_build_document_store_without_sources() {
        let config = DataConfig::default();
        let bot = Bot::new("123456789:AAFakeTokenForTestingPurposes1234567890");
        let store = build_document_store(&config, &bot, &reqwest::Client::new()).unwrap();
        assert!(store.is_none());
    }

    #[test]
    fn test_build_document_store_rejects_bad_url() {
        let config = DataConfig {
            manifest_url: Some("not a url".to_string()),
            ..Default::default()
        };
        let bot = Bot::new("123456789:AAFakeTokenForTestingPurposes1234567890");
        let result = build_document_store(&config, &bot, &reqwest::Client::new());
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
