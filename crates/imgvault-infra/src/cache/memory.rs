use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{CacheResult, CounterCache, KeySpace, SessionCache};

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// In-process cache for local runs and tests
#[derive(Clone)]
pub struct MemoryCache {
    keys: KeySpace,
    values: Arc<DashMap<String, MemoryEntry>>,
    counters: Arc<DashMap<String, i64>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new("imgvault")
    }
}

impl MemoryCache {
    pub fn new(prefix: &str) -> Self {
        Self {
            keys: KeySpace::new(prefix),
            values: Arc::new(DashMap::new()),
            counters: Arc::new(DashMap::new()),
        }
    }

    /// Current counter value without draining it.
    pub fn counter_value(&self, id: &str) -> i64 {
        self.counters
            .get(&self.keys.counter(id))
            .map(|v| *v)
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let key = self.keys.session(key);
        if let Some(entry) = self.values.get(&key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.values
            .remove_if(&key, |_, entry| Instant::now() >= entry.expires_at);
        Ok(None)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let fresh = MemoryEntry {
            value: value.to_string(),
            expires_at: now + ttl,
        };

        // Abandoned sessions are never read again, so expire them on write.
        self.values.retain(|_, entry| now < entry.expires_at);

        match self.values.entry(self.keys.session(key)) {
            Entry::Occupied(mut occupied) => {
                if now < occupied.get().expires_at {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.values.remove(&self.keys.session(key));
        Ok(())
    }
}

#[async_trait]
impl CounterCache for MemoryCache {
    async fn incr_by(&self, id: &str, delta: i64) -> CacheResult<i64> {
        let mut counter = self.counters.entry(self.keys.counter(id)).or_insert(0);
        *counter += delta;
        Ok(*counter)
    }

    async fn scan_ids(&self) -> CacheResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .counters
            .iter()
            .filter_map(|entry| self.keys.counter_id(entry.key()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn take(&self, id: &str) -> CacheResult<i64> {
        Ok(self
            .counters
            .remove(&self.keys.counter(id))
            .map(|(_, value)| value)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_keeps_first_value() {
        let cache = MemoryCache::default();
        let ttl = Duration::from_secs(60);

        assert!(cache.set_if_absent("s1", "first", ttl).await.unwrap());
        assert!(!cache.set_if_absent("s1", "second", ttl).await.unwrap());
        assert_eq!(cache.get("s1").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_absent() {
        let cache = MemoryCache::default();
        cache
            .set_if_absent("s1", "value", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get("s1").await.unwrap().is_none());
        assert!(cache
            .set_if_absent("s1", "again", Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_abandoned_sessions_are_pruned_on_write() {
        let cache = MemoryCache::default();
        cache
            .set_if_absent("abandoned", "value", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        cache
            .set_if_absent("s2", "value", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.values.len(), 1);
        assert!(cache.values.contains_key(&cache.keys.session("s2")));
    }

    #[tokio::test]
    async fn test_delete_absent_session_succeeds() {
        let cache = MemoryCache::default();
        cache.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn test_counters_scan_and_take() {
        let cache = MemoryCache::default();
        cache.incr_by("img-1", 1).await.unwrap();
        cache.incr_by("img-1", 1).await.unwrap();
        cache.incr_by("img-2", 5).await.unwrap();
        cache
            .set_if_absent("not-a-counter", "x", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.scan_ids().await.unwrap(), vec!["img-1", "img-2"]);
        assert_eq!(cache.take("img-1").await.unwrap(), 2);
        assert_eq!(cache.take("img-1").await.unwrap(), 0);
        assert_eq!(cache.scan_ids().await.unwrap(), vec!["img-2"]);
    }
}
