//! # Search Service
//!
//! Routes a user query to the configured data sources. Each source keeps its
//! own key semantics: the local index matches raw mobile strings and
//! case-folded emails, the sharded source matches digit-only phone keys.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::DataConfig;
use crate::errors::{DocumentKind, LookupError, LookupResult};
use crate::local_index::LocalIndex;
use crate::manifest::ManifestCache;
use crate::observability;
use crate::query::ShardedLookup;
use crate::shard::{Record, ShardCache};
use crate::store::DocumentStore;

/// Which kind of key a query looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Email,
    Mobile,
}

impl QueryKind {
    pub fn detect(query: &str) -> Self {
        if query.contains('@') {
            QueryKind::Email
        } else {
            QueryKind::Mobile
        }
    }

    fn label(self) -> &'static str {
        match self {
            QueryKind::Email => "email",
            QueryKind::Mobile => "mobile",
        }
    }
}

/// Combination of the data sources a deployment is configured with
#[derive(Clone, Default)]
pub struct SearchService {
    local: Option<Arc<LocalIndex>>,
    sharded: Option<ShardedLookup>,
}

impl SearchService {
    pub fn new(local: Option<Arc<LocalIndex>>, sharded: Option<ShardedLookup>) -> Self {
        Self { local, sharded }
    }

    /// Assemble the sources a deployment is configured with.
    ///
    /// The local index is kept only when it holds records; the sharded source
    /// is built whenever a document store is available.
    pub fn from_config(config: &DataConfig, store: Option<Arc<dyn DocumentStore>>) -> Self {
        let index = LocalIndex::load_from_dir(&config.data_dir);
        observability::metrics::record_local_index_metrics(
            index.record_count(),
            index.files_loaded(),
        );
        let local = (!index.is_empty()).then(|| Arc::new(index));

        let sharded = store.map(|store| {
            let manifest = Arc::new(ManifestCache::with_ttl(
                Arc::clone(&store),
                config.manifest_ttl(),
            ));
            let shards = Arc::new(ShardCache::with_ttl(manifest, store, config.shard_ttl()));
            ShardedLookup::with_limits(shards, config.shard_prefix_len, config.min_query_digits)
        });

        info!(
            local_index = local.is_some(),
            sharded = sharded.is_some(),
            "Search sources configured"
        );
        Self::new(local, sharded)
    }

    pub fn local(&self) -> Option<&Arc<LocalIndex>> {
        self.local.as_ref()
    }

    pub fn sharded(&self) -> Option<&ShardedLookup> {
        self.sharded.as_ref()
    }

    /// Whether any data source is configured
    pub fn has_sources(&self) -> bool {
        self.local.is_some() || self.sharded.is_some()
    }

    /// Find the record for a free-text query.
    ///
    /// Email-shaped queries only consult the local email index. Phone queries
    /// try the local mobile index first, then the sharded source.
    pub async fn search(&self, raw_query: &str) -> LookupResult<Option<Record>> {
        let start = Instant::now();
        let query = raw_query.trim();
        let kind = QueryKind::detect(query);

        let result = self.search_inner(query, kind).await;

        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "not_found",
            Err(LookupError::InvalidQuery(_)) => "invalid_query",
            Err(LookupError::SourceUnavailable(..)) => "source_unavailable",
            Err(LookupError::ParseError(_)) => "parse_error",
        };
        observability::metrics::record_lookup(kind.label(), outcome, start.elapsed());
        debug!(kind = kind.label(), outcome, "Search completed");

        result
    }

    async fn search_inner(&self, query: &str, kind: QueryKind) -> LookupResult<Option<Record>> {
        if query.is_empty() {
            return Err(LookupError::InvalidQuery("query is empty".to_string()));
        }
        if !self.has_sources() {
            return Err(LookupError::unavailable(
                DocumentKind::Manifest,
                "no data source is configured",
            ));
        }

        match kind {
            QueryKind::Email => Ok(self
                .local
                .as_ref()
                .and_then(|index| index.find_by_email(query))
                .cloned()),
            QueryKind::Mobile => {
                if let Some(record) = self
                    .local
                    .as_ref()
                    .and_then(|index| index.find_by_mobile(query))
                {
                    return Ok(Some(record.clone()));
                }

                match &self.sharded {
                    Some(sharded) => sharded.lookup(query).await,
                    None => Ok(None),
                }
            }
        }
    }
}
