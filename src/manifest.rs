//! # Manifest Cache
//!
//! The manifest maps shard ids (phone-number prefixes) to the remote handle of
//! each shard file:
//!
//! ```json
//! {"shards": {"9711": {"handle": "h1"}}}
//! ```
//!
//! It is fetched lazily, kept for `manifest_ttl`, and replaced wholesale on
//! refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};

use crate::cache::{CacheStats, TtlCell};
use crate::errors::{error_logging, LookupError, LookupResult};
use crate::observability;
use crate::store::DocumentStore;

/// Default manifest time-to-live
pub const MANIFEST_TTL: Duration = Duration::from_secs(600);

/// Location of a single shard file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardDescriptor {
    /// Opaque handle understood by the document store
    #[serde(alias = "file_id")]
    pub handle: String,
}

/// Index of the available shards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub shards: HashMap<String, ShardDescriptor>,
}

impl Manifest {
    /// Parse a manifest document.
    ///
    /// Fails with `ParseError` if the bytes are not JSON or lack the `shards`
    /// mapping.
    pub fn parse(bytes: &[u8]) -> LookupResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| LookupError::ParseError(format!("manifest is malformed: {}", e)))
    }

    /// Descriptor for `shard_id`, if the manifest names it
    pub fn shard(&self, shard_id: &str) -> Option<&ShardDescriptor> {
        self.shards.get(shard_id)
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }
}

/// Lazily fetched, TTL-bound copy of the manifest
pub struct ManifestCache {
    store: Arc<dyn DocumentStore>,
    cell: TtlCell<Manifest>,
}

impl ManifestCache {
    /// Create a cache with the default TTL
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_ttl(store, MANIFEST_TTL)
    }

    pub fn with_ttl(store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        Self {
            store,
            cell: TtlCell::new("manifest", ttl),
        }
    }

    /// Return the manifest, fetching it if absent or expired.
    ///
    /// No retry is attempted; store and parse failures are returned as-is and
    /// the previously cached manifest is left in place.
    pub async fn get_manifest(&self) -> LookupResult<Arc<Manifest>> {
        let span = observability::cache_span("get_manifest", None);
        self.cell
            .get_or_refresh(|| async {
                let bytes = self.store.fetch_manifest().await?;
                let manifest = Manifest::parse(&bytes)?;
                info!(
                    shards = manifest.len(),
                    store = %self.store.describe(),
                    "Manifest refreshed"
                );
                Ok::<_, LookupError>(manifest)
            })
            .instrument(span)
            .await
            .inspect_err(|e| {
                error_logging::log_lookup_error(e, "get_manifest", None, None, None);
            })
    }

    /// Force the next `get_manifest` call to refetch
    pub async fn invalidate(&self) {
        self.cell.invalidate().await;
    }

    pub fn ttl(&self) -> Duration {
        self.cell.ttl()
    }

    pub fn stats(&self) -> CacheStats {
        self.cell.stats()
    }
}
