use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::{CacheBackendKind, CacheStats, PerformanceError};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// Key/value cache on Redis. Every operation falls back to an in-process
/// TTL map when Redis is not configured or not reachable.
pub struct CacheService {
    redis: Option<Pool>,
    memory: RwLock<HashMap<String, MemoryEntry>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheService {
    pub fn new(config: &AppConfig) -> Self {
        let redis = config.redis_url.as_deref().and_then(|url| {
            match Config::from_url(url).create_pool(Some(Runtime::Tokio1)) {
                Ok(pool) => {
                    info!("Response cache backed by Redis");
                    Some(pool)
                }
                Err(e) => {
                    warn!("Failed to create Redis pool, using in-memory cache: {}", e);
                    None
                }
            }
        });

        Self::build(redis, Duration::from_secs(config.cache_ttl_seconds))
    }

    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::build(None, default_ttl)
    }

    fn build(redis: Option<Pool>, default_ttl: Duration) -> Self {
        Self {
            redis,
            memory: RwLock::new(HashMap::new()),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> CacheBackendKind {
        if self.redis.is_some() {
            CacheBackendKind::Redis
        } else {
            CacheBackendKind::Memory
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    async fn connection(&self) -> Option<Result<Connection, PerformanceError>> {
        let pool = self.redis.as_ref()?;
        Some(pool.get().await.map_err(|e| PerformanceError::Pool(e.to_string())))
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let value = match self.redis_get(key).await {
            Some(Ok(value)) => value,
            Some(Err(e)) => {
                warn!("Redis get failed, reading in-memory cache: {}", e);
                self.memory_get(key).await
            }
            None => self.memory_get(key).await,
        };

        let counter = if value.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.stores.fetch_add(1, Ordering::Relaxed);

        match self.redis_set(key, value, ttl).await {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                warn!("Redis set failed, writing in-memory cache: {}", e);
                self.memory_set(key, value, ttl).await;
            }
            None => self.memory_set(key, value, ttl).await,
        }
    }

    /// Removes every key starting with `prefix` from both backends.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut removed = {
            let mut memory = self.memory.write().await;
            let before = memory.len();
            memory.retain(|key, _| !key.starts_with(prefix));
            before - memory.len()
        };

        match self.redis_invalidate(prefix).await {
            Some(Ok(count)) => removed += count,
            Some(Err(e)) => warn!("Redis invalidation of {}* failed: {}", prefix, e),
            None => {}
        }

        if removed > 0 {
            debug!("Invalidated {} cache entries under {}", removed, prefix);
        }
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        removed
    }

    /// Connectivity check for health reporting. The in-memory backend is always up.
    pub async fn ping(&self) -> Result<(), PerformanceError> {
        match self.connection().await {
            Some(conn) => {
                let mut conn = conn?;
                let _: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let now = Instant::now();
        let memory_entries = self
            .memory
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count();

        CacheStats {
            backend: self.backend(),
            hits,
            misses,
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
            stores: self.stores.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            memory_entries,
            default_ttl_seconds: self.default_ttl.as_secs(),
            generated_at: Utc::now(),
        }
    }

    // ==========================================================================
    // BACKENDS
    // ==========================================================================

    async fn redis_get(&self, key: &str) -> Option<Result<Option<String>, PerformanceError>> {
        let conn = self.connection().await?;
        Some(redis_get_with(conn, key).await)
    }

    async fn redis_set(&self, key: &str, value: &str, ttl: Duration) -> Option<Result<(), PerformanceError>> {
        let conn = self.connection().await?;
        Some(redis_set_with(conn, key, value, ttl).await)
    }

    async fn redis_invalidate(&self, prefix: &str) -> Option<Result<usize, PerformanceError>> {
        let conn = self.connection().await?;
        Some(redis_invalidate_with(conn, prefix).await)
    }

    async fn memory_get(&self, key: &str) -> Option<String> {
        {
            let memory = self.memory.read().await;
            match memory.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired
        self.memory.write().await.remove(key);
        None
    }

    async fn memory_set(&self, key: &str, value: &str, ttl: Duration) {
        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.memory.write().await.insert(key.to_string(), entry);
    }
}

async fn redis_get_with(
    conn: Result<Connection, PerformanceError>,
    key: &str,
) -> Result<Option<String>, PerformanceError> {
    let mut conn = conn?;
    let value: Option<String> = conn.get(key).await?;
    Ok(value)
}

async fn redis_set_with(
    conn: Result<Connection, PerformanceError>,
    key: &str,
    value: &str,
    ttl: Duration,
) -> Result<(), PerformanceError> {
    let mut conn = conn?;
    let _: () = redis::cmd("SET")
        .arg(key)
        .arg(value)
        .arg("EX")
        .arg(ttl.as_secs().max(1))
        .query_async(&mut conn)
        .await?;
    Ok(())
}

async fn redis_invalidate_with(
    conn: Result<Connection, PerformanceError>,
    prefix: &str,
) -> Result<usize, PerformanceError> {
    let mut conn = conn?;
    let keys: Vec<String> = conn.keys(format!("{}*", prefix)).await?;
    if keys.is_empty() {
        return Ok(0);
    }
    let removed: usize = conn.del(&keys).await?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_reads_values() {
        let cache = CacheService::in_memory(Duration::from_secs(60));
        cache.set("doctors:1", "{\"id\":1}", None).await;

        assert_eq!(cache.get("doctors:1").await.as_deref(), Some("{\"id\":1}"));
        assert_eq!(cache.get("doctors:2").await, None);

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.backend, CacheBackendKind::Memory);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = CacheService::in_memory(Duration::from_secs(60));
        cache.set("k", "v", Some(Duration::from_secs(5))).await;

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.stats().await.memory_entries, 0);
    }

    #[tokio::test]
    async fn invalidates_by_prefix_only() {
        let cache = CacheService::in_memory(Duration::from_secs(60));
        cache.set("http_cache:catalogue:/doctors", "a", None).await;
        cache.set("http_cache:catalogue:/doctors/search?q=x", "b", None).await;
        cache.set("http_cache:other:/x", "c", None).await;

        let removed = cache.invalidate_prefix("http_cache:catalogue:").await;

        assert_eq!(removed, 2);
        assert!(cache.get("http_cache:other:/x").await.is_some());
    }

    #[tokio::test]
    async fn unreachable_redis_falls_back_to_memory() {
        let mut config = shared_config::AppConfig::from_env();
        config.redis_url = Some("redis://127.0.0.1:1".to_string());
        config.cache_ttl_seconds = 60;
        let cache = CacheService::new(&config);

        cache.set("k", "v", None).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        assert!(cache.ping().await.is_err());
    }
}
