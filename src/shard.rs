//! # Shard Cache
//!
//! A shard is a gzip-compressed JSON object mapping normalized phone numbers
//! to records. Each shard id is cached on its own with its own fetch time, so
//! a slow download for one prefix never holds up lookups in another.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use tracing::{debug, info, Instrument};

use crate::cache::{CacheStats, TtlMap};
use crate::errors::{error_logging, DocumentKind, LookupError, LookupResult};
use crate::manifest::ManifestCache;
use crate::observability;
use crate::store::DocumentStore;

/// Default shard time-to-live
pub const SHARD_TTL: Duration = Duration::from_secs(600);

/// An open-ended set of fields describing one person
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Records of one shard keyed by normalized lookup key
pub type ShardMap = HashMap<String, Record>;

/// Decompress and parse a shard file.
///
/// Bytes that are not valid gzip cannot be decompressed and are reported as
/// `SourceUnavailable`; valid gzip holding something other than a JSON object
/// of records is a `ParseError`.
pub fn decode_shard(bytes: &[u8]) -> LookupResult<ShardMap> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| {
            LookupError::unavailable(DocumentKind::Shard, format!("decompression failed: {}", e))
        })?;

    serde_json::from_slice(&json)
        .map_err(|e| LookupError::ParseError(format!("shard is malformed: {}", e)))
}

/// Lazily fetched, per-shard TTL cache on top of the manifest cache
pub struct ShardCache {
    manifest: Arc<ManifestCache>,
    store: Arc<dyn DocumentStore>,
    shards: TtlMap<String, ShardMap>,
}

impl ShardCache {
    /// Create a cache with the default TTL
    pub fn new(manifest: Arc<ManifestCache>, store: Arc<dyn DocumentStore>) -> Self {
        Self::with_ttl(manifest, store, SHARD_TTL)
    }

    pub fn with_ttl(
        manifest: Arc<ManifestCache>,
        store: Arc<dyn DocumentStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            manifest,
            store,
            shards: TtlMap::new("shard", ttl),
        }
    }

    /// Return the records of `shard_id`.
    ///
    /// A shard the manifest does not name yields an empty mapping, and that
    /// answer is not remembered: the next call consults the manifest again.
    /// Fetch and decode failures leave any previous copy of the shard in place
    /// (unused if stale) and are returned to the caller.
    pub async fn get_shard(&self, shard_id: &str) -> LookupResult<Arc<ShardMap>> {
        let key = shard_id.to_string();
        let span = observability::cache_span("get_shard", Some(shard_id));

        let shard = self
            .shards
            .get_or_refresh(&key, || async {
                let manifest = self.manifest.get_manifest().await?;
                let Some(descriptor) = manifest.shard(shard_id) else {
                    debug!(shard_id = %shard_id, "Shard not listed in manifest");
                    return Ok(None);
                };

                let bytes = self.store.fetch(&descriptor.handle).await?;
                let records = decode_shard(&bytes)?;
                info!(
                    shard_id = %shard_id,
                    records = records.len(),
                    compressed_bytes = bytes.len(),
                    "Shard refreshed"
                );
                Ok::<_, LookupError>(Some(records))
            })
            .instrument(span)
            .await
            .inspect_err(|e| {
                error_logging::log_lookup_error(e, "get_shard", None, Some(shard_id), None);
            })?;

        Ok(shard.unwrap_or_default())
    }

    /// The manifest cache this shard cache resolves through
    pub fn manifest(&self) -> &Arc<ManifestCache> {
        &self.manifest
    }

    /// Number of shards currently held
    pub fn cached_shards(&self) -> usize {
        self.shards.len()
    }

    /// Drop shards whose TTL has elapsed
    pub fn cleanup(&self) {
        self.shards.cleanup();
    }

    pub fn ttl(&self) -> Duration {
        self.shards.ttl()
    }

    pub fn stats(&self) -> CacheStats {
        self.shards.stats()
    }
}
