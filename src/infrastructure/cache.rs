//! Response cache for book list pages
//!
//! Entries are JSON documents stored under a namespaced key. Failures never
//! reach the caller: a broken cache behaves like an empty one.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a cached book list stays fresh
pub const BOOK_LIST_TTL: Duration = Duration::from_secs(15 * 60);

/// Above this many entries each write sweeps out expired ones
const PURGE_THRESHOLD: usize = 256;
/// Hard cap for the in-process map; reaching it empties the cache
const MAX_ENTRIES: usize = 10_000;

#[cfg(feature = "redis-cache")]
const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: &Value, ttl: Duration);

    /// Drop every entry whose key starts with `prefix`
    async fn invalidate_prefix(&self, prefix: &str);

    fn backend_name(&self) -> &'static str;
}

/// Derive a key prefix from the secret so separate deployments sharing a
/// Redis instance never read each other's entries.
pub fn namespace(secret_key: &str) -> String {
    let digest = Sha256::digest(secret_key.as_bytes());
    format!("bookstore:{}:", &hex::encode(digest)[..12])
}

/// Process-local cache
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<String, (Instant, Value)>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.0 > Instant::now() => return Some(entry.1.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) {
        let now = Instant::now();
        if self.entries.len() >= PURGE_THRESHOLD {
            self.entries.retain(|_, (expires, _)| *expires > now);
            if self.entries.len() >= MAX_ENTRIES {
                tracing::debug!("In-memory cache full, dropping {} entries", self.entries.len());
                self.entries.clear();
            }
        }
        self.entries.insert(key.to_string(), (now + ttl, value.clone()));
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(feature = "redis-cache")]
pub use redis_backend::RedisCache;

#[cfg(feature = "redis-cache")]
mod redis_backend {
    use super::*;
    use redis::{AsyncCommands, RedisError, aio::ConnectionManager};

    /// Shared cache backed by Redis
    pub struct RedisCache {
        connection: ConnectionManager,
    }

    impl RedisCache {
        /// Connect and verify the server answers PING
        pub async fn connect(redis_url: &str) -> Result<Self, RedisError> {
            let client = redis::Client::open(redis_url)?;
            let mut connection = ConnectionManager::new(client).await?;
            redis::cmd("PING")
                .query_async::<String>(&mut connection)
                .await?;
            Ok(Self { connection })
        }
    }

    #[async_trait]
    impl ResponseCache for RedisCache {
        async fn get(&self, key: &str) -> Option<Value> {
            let mut conn = self.connection.clone();
            let payload: Option<String> = match conn.get(key).await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Cache read failed for {}: {}", key, e);
                    return None;
                }
            };
            payload.and_then(|p| serde_json::from_str(&p).ok())
        }

        async fn set(&self, key: &str, value: &Value, ttl: Duration) {
            let mut conn = self.connection.clone();
            let payload = value.to_string();
            let result: Result<(), RedisError> = conn.set_ex(key, payload, ttl.as_secs()).await;
            if let Err(e) = result {
                tracing::warn!("Cache write failed for {}: {}", key, e);
            }
        }

        async fn invalidate_prefix(&self, prefix: &str) {
            let mut conn = self.connection.clone();
            let pattern = format!("{}*", prefix);
            let mut cursor: u64 = 0;
            loop {
                let scanned: Result<(u64, Vec<String>), RedisError> = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(100)
                    .query_async(&mut conn)
                    .await;
                let (next, keys) = match scanned {
                    Ok(page) => page,
                    Err(e) => {
                        tracing::warn!("Cache invalidation failed for {}: {}", prefix, e);
                        return;
                    }
                };
                if !keys.is_empty() {
                    let deleted: Result<(), RedisError> = conn.del(&keys).await;
                    if let Err(e) = deleted {
                        tracing::warn!("Cache invalidation failed for {}: {}", prefix, e);
                        return;
                    }
                }
                if next == 0 {
                    break;
                }
                cursor = next;
            }
        }

        fn backend_name(&self) -> &'static str {
            "redis"
        }
    }
}

/// Pick the cache backend: Redis when configured and reachable, otherwise
/// the in-process map.
pub async fn build_cache(redis_url: Option<&str>) -> Arc<dyn ResponseCache> {
    #[cfg(feature = "redis-cache")]
    if let Some(url) = redis_url {
        match tokio::time::timeout(REDIS_CONNECT_TIMEOUT, RedisCache::connect(url)).await {
            Ok(Ok(cache)) => {
                tracing::info!("Using Redis response cache");
                return Arc::new(cache);
            }
            Ok(Err(e)) => {
                tracing::warn!("Redis unavailable ({}), falling back to in-memory cache", e);
            }
            Err(_) => {
                tracing::warn!("Redis connection timed out, falling back to in-memory cache");
            }
        }
    }

    #[cfg(not(feature = "redis-cache"))]
    if redis_url.is_some() {
        tracing::warn!("REDIS_URL is set but the redis-cache feature is disabled");
    }

    Arc::new(InMemoryCache::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn entries_expire() {
        let cache = InMemoryCache::new();
        cache.set("k", &json!({"a": 1}), Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await, Some(json!({"a": 1})));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await, None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn writes_sweep_expired_entries() {
        let cache = InMemoryCache::new();
        for i in 0..PURGE_THRESHOLD + 50 {
            cache
                .set(&format!("ns:books:?x={}", i), &json!(i), Duration::from_millis(5))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        cache.set("ns:books:fresh", &json!("fresh"), BOOK_LIST_TTL).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("ns:books:fresh").await, Some(json!("fresh")));
    }

    #[tokio::test]
    async fn size_stays_bounded_without_expiry() {
        let cache = InMemoryCache::new();
        for i in 0..MAX_ENTRIES + 10 {
            cache.set(&format!("k{}", i), &json!(i), BOOK_LIST_TTL).await;
        }
        assert!(cache.len() <= MAX_ENTRIES);
        assert_eq!(cache.get(&format!("k{}", MAX_ENTRIES + 9)).await, Some(json!(MAX_ENTRIES + 9)));
    }

    #[tokio::test]
    async fn invalidation_is_prefix_scoped() {
        let cache = InMemoryCache::new();
        cache.set("ns:books:1", &json!(1), BOOK_LIST_TTL).await;
        cache.set("ns:books:2", &json!(2), BOOK_LIST_TTL).await;
        cache.set("ns:other", &json!(3), BOOK_LIST_TTL).await;

        cache.invalidate_prefix("ns:books:").await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("ns:other").await, Some(json!(3)));
    }

    #[test]
    fn namespace_depends_on_secret() {
        assert_ne!(namespace("a"), namespace("b"));
        assert_eq!(namespace("a"), namespace("a"));
        assert!(namespace("a").starts_with("bookstore:"));
    }

    #[tokio::test]
    async fn unreachable_redis_falls_back_to_memory() {
        let cache = build_cache(Some("redis://127.0.0.1:1/")).await;
        assert_eq!(cache.backend_name(), "memory");
    }
}
