use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{CacheResult, CounterCache, KeySpace, SessionCache};

const SCAN_BATCH: usize = 200;

/// Redis-backed session and counter cache
///
/// `ConnectionManager` multiplexes one connection and reconnects on failure;
/// it is cloned per command rather than locked.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    keys: KeySpace,
}

impl RedisCache {
    pub async fn connect(url: &str, prefix: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let mut connection = ConnectionManager::new(client).await?;

        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        Ok(Self {
            connection,
            keys: KeySpace::new(prefix),
        })
    }
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(self.keys.session(key)).await?;
        Ok(value)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.connection.clone();
        // SET NX EX replies OK when stored and nil when the key exists.
        let reply: Option<String> = redis::cmd("SET")
            .arg(self.keys.session(key))
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.del(self.keys.session(key)).await?;
        Ok(())
    }
}

#[async_trait]
impl CounterCache for RedisCache {
    async fn incr_by(&self, id: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.connection.clone();
        let value: i64 = conn.incr(self.keys.counter(id), delta).await?;
        Ok(value)
    }

    async fn scan_ids(&self) -> CacheResult<Vec<String>> {
        let mut conn = self.connection.clone();
        let pattern = self.keys.counter_pattern();
        let mut cursor: u64 = 0;
        let mut ids = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            ids.extend(
                batch
                    .iter()
                    .filter_map(|key| self.keys.counter_id(key))
                    .map(str::to_string),
            );

            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn take(&self, id: &str) -> CacheResult<i64> {
        let mut conn = self.connection.clone();
        let value: Option<i64> = redis::cmd("GETDEL")
            .arg(self.keys.counter(id))
            .query_async(&mut conn)
            .await?;
        Ok(value.unwrap_or(0))
    }
}
