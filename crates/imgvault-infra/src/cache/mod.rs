//! Ephemeral key-value stores.
//!
//! Two concerns share one backend:
//! - upload sessions, written once per session key with set-if-absent and a TTL
//! - access counters, incremented on every read and drained by reconciliation
//!
//! Keys are namespaced as `{prefix}:session:{key}` and `{prefix}:count:{id}`.
//! Redis is used when a URL is configured; otherwise an in-process DashMap
//! cache, which is only suitable for a single instance.

mod memory;
mod redis_cache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use imgvault_core::CacheConfig;
use thiserror::Error;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid cached value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

pub type CacheResult<T> = Result<T, CacheError>;

#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` unless the key already holds one. Returns whether this
    /// call stored it.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remove the key. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> CacheResult<()>;
}

#[async_trait]
pub trait CounterCache: Send + Sync {
    /// Add `delta` to the counter for `id`, creating it at zero. Returns the new value.
    async fn incr_by(&self, id: &str, delta: i64) -> CacheResult<i64>;

    /// Ids that currently have a counter.
    async fn scan_ids(&self) -> CacheResult<Vec<String>>;

    /// Atomically read and remove the counter for `id`. Absent counters read as 0.
    async fn take(&self, id: &str) -> CacheResult<i64>;
}

/// Key layout shared by every backend
#[derive(Debug, Clone)]
pub(crate) struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub(crate) fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches(':').to_string(),
        }
    }

    pub(crate) fn session(&self, key: &str) -> String {
        format!("{}:session:{}", self.prefix, key)
    }

    pub(crate) fn counter(&self, id: &str) -> String {
        format!("{}:count:{}", self.prefix, id)
    }

    pub(crate) fn counter_pattern(&self) -> String {
        format!("{}:count:*", self.prefix)
    }

    /// Inverse of [`counter`](Self::counter).
    pub(crate) fn counter_id<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_prefix(":count:"))
            .filter(|id| !id.is_empty())
    }
}

/// Both cache roles, backed by one store.
#[derive(Clone)]
pub struct Caches {
    pub sessions: Arc<dyn SessionCache>,
    pub counters: Arc<dyn CounterCache>,
}

/// Connect to Redis when configured, otherwise fall back to the in-process cache.
pub async fn create_cache(config: &CacheConfig) -> CacheResult<Caches> {
    match &config.redis_url {
        Some(url) => {
            let cache = Arc::new(RedisCache::connect(url, &config.key_prefix).await?);
            tracing::info!("Session cache connected to Redis");
            Ok(Caches {
                sessions: cache.clone(),
                counters: cache,
            })
        }
        None => {
            tracing::warn!("REDIS_URL not set, using in-process cache (single instance only)");
            let cache = Arc::new(MemoryCache::new(&config.key_prefix));
            Ok(Caches {
                sessions: cache.clone(),
                counters: cache,
            })
        }
    }
}
