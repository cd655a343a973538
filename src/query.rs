//! Query normalization and sharded lookup

use std::sync::Arc;

use tracing::debug;

use crate::errors::{LookupError, LookupResult};
use crate::shard::{Record, ShardCache};

/// Number of leading digits that select a shard
pub const SHARD_PREFIX_LEN: usize = 4;

/// Minimum digits a phone query must carry
pub const MIN_QUERY_DIGITS: usize = 7;

/// Reduce a free-text query to its ASCII digits
pub fn normalize_query(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Shard id for a normalized key: its first `prefix_len` digits
pub fn derive_shard_id(normalized: &str, prefix_len: usize) -> &str {
    &normalized[..prefix_len.min(normalized.len())]
}

/// Exact-match phone lookup over the sharded data source
#[derive(Clone)]
pub struct ShardedLookup {
    shards: Arc<ShardCache>,
    prefix_len: usize,
    min_digits: usize,
}

impl ShardedLookup {
    pub fn new(shards: Arc<ShardCache>) -> Self {
        Self::with_limits(shards, SHARD_PREFIX_LEN, MIN_QUERY_DIGITS)
    }

    pub fn with_limits(shards: Arc<ShardCache>, prefix_len: usize, min_digits: usize) -> Self {
        Self {
            shards,
            prefix_len,
            min_digits: min_digits.max(prefix_len),
        }
    }

    /// Look up a raw query.
    ///
    /// Returns `Ok(None)` when no record matches, including when the query's
    /// shard does not exist.
    pub async fn lookup(&self, raw_query: &str) -> LookupResult<Option<Record>> {
        let normalized = normalize_query(raw_query);
        if normalized.len() < self.min_digits {
            return Err(LookupError::InvalidQuery(format!(
                "query has {} digits, at least {} required",
                normalized.len(),
                self.min_digits
            )));
        }

        let shard_id = derive_shard_id(&normalized, self.prefix_len);
        let shard = self.shards.get_shard(shard_id).await?;
        let record = shard.get(&normalized).cloned();

        debug!(
            shard_id = %shard_id,
            shard_records = shard.len(),
            found = record.is_some(),
            "Sharded lookup completed"
        );
        Ok(record)
    }

    pub fn shards(&self) -> &Arc<ShardCache> {
        &self.shards
    }

    pub fn min_digits(&self) -> usize {
        self.min_digits
    }
}
