//! # Test Helper Library
//!
//! Common fixtures for integration tests: an in-memory document store that
//! counts fetches and can be told to fail, and gzip helpers for shard bodies.

#![allow(dead_code)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use record_lookup_bot::manifest::ManifestCache;
use record_lookup_bot::shard::ShardCache;
use record_lookup_bot::errors::DocumentKind;
use record_lookup_bot::store::DocumentStore;
use record_lookup_bot::{LookupError, LookupResult, ShardedLookup};
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Gzip a byte slice
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Gzip a JSON value the way shard files are stored
pub fn gzip_json(value: &serde_json::Value) -> Vec<u8> {
    gzip(value.to_string().as_bytes())
}

/// Document store backed by in-memory maps
#[derive(Default)]
pub struct MemoryStore {
    manifest: Mutex<Option<Vec<u8>>>,
    documents: Mutex<HashMap<String, Vec<u8>>>,
    manifest_fetches: AtomicUsize,
    document_fetches: Mutex<HashMap<String, usize>>,
    fail_all: AtomicBool,
    delay: Mutex<Option<Duration>>,
    document_delays: Mutex<HashMap<String, Duration>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_manifest(&self, manifest: serde_json::Value) {
        *self.manifest.lock() = Some(manifest.to_string().into_bytes());
    }

    pub fn set_manifest_bytes(&self, bytes: &[u8]) {
        *self.manifest.lock() = Some(bytes.to_vec());
    }

    pub fn set_document(&self, handle: &str, bytes: Vec<u8>) {
        self.documents.lock().insert(handle.to_string(), bytes);
    }

    /// Store a shard body (gzip JSON object of records) under `handle`
    pub fn set_shard(&self, handle: &str, records: serde_json::Value) {
        self.set_document(handle, gzip_json(&records));
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    /// Delay every fetch, widening race windows in concurrency tests
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Delay fetches of one document only
    pub fn set_document_delay(&self, handle: &str, delay: Duration) {
        self.document_delays
            .lock()
            .insert(handle.to_string(), delay);
    }

    pub fn manifest_fetches(&self) -> usize {
        self.manifest_fetches.load(Ordering::SeqCst)
    }

    pub fn document_fetches(&self, handle: &str) -> usize {
        self.document_fetches.lock().get(handle).copied().unwrap_or(0)
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_failing(&self, kind: DocumentKind) -> LookupResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(LookupError::unavailable(kind, "memory store is failing"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch_manifest(&self) -> LookupResult<Vec<u8>> {
        self.manifest_fetches.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.check_failing(DocumentKind::Manifest)?;
        self.manifest
            .lock()
            .clone()
            .ok_or_else(|| LookupError::unavailable(DocumentKind::Manifest, "no manifest stored"))
    }

    async fn fetch(&self, handle: &str) -> LookupResult<Vec<u8>> {
        *self
            .document_fetches
            .lock()
            .entry(handle.to_string())
            .or_default() += 1;
        self.simulate_latency().await;
        let document_delay = self.document_delays.lock().get(handle).copied();
        if let Some(delay) = document_delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failing(DocumentKind::Shard)?;
        self.documents
            .lock()
            .get(handle)
            .cloned()
            .ok_or_else(|| {
                LookupError::unavailable(DocumentKind::Shard, format!("no document {}", handle))
            })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Caches over `store` with the given TTL for both manifest and shards
pub fn shard_cache(store: &Arc<MemoryStore>, ttl: Duration) -> Arc<ShardCache> {
    let store: Arc<dyn DocumentStore> = store.clone();
    let manifest = Arc::new(ManifestCache::with_ttl(Arc::clone(&store), ttl));
    Arc::new(ShardCache::with_ttl(manifest, store, ttl))
}

/// Sharded lookup with the default prefix length and digit minimum
pub fn sharded_lookup(store: &Arc<MemoryStore>, ttl: Duration) -> ShardedLookup {
    ShardedLookup::new(shard_cache(store, ttl))
}
