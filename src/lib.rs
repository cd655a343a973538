//! # Record Lookup Telegram Bot
//!
//! A Telegram bot that answers phone-number and email queries with matching
//! records. Records come from gzip JSON files bundled with the deployment and
//! from a sharded remote source, fetched lazily and cached with a TTL.

pub mod bot;
pub mod cache;
pub mod config;
pub mod errors;
pub mod local_index;
pub mod manifest;
pub mod observability;
pub mod observability_config;
pub mod query;
pub mod search;
pub mod shard;
pub mod store;

// Re-export types for easier access
pub use errors::{AppError, AppResult, LookupError, LookupResult};
pub use query::{derive_shard_id, normalize_query, ShardedLookup};
pub use search::SearchService;
pub use shard::{Record, ShardCache, ShardMap};
