use crate::models::RawProfileRecord;
use crate::services::store::{CandidateFilter, ProfileStore, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Two-tier cache: moka in process (L1), optionally backed by Redis (L2)
/// shared between instances.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Vec<u8>>,
    ttl_secs: u64,
}

impl CacheManager {
    /// Create a cache; connects to Redis when `redis_url` is given.
    pub async fn new(redis_url: Option<&str>, l1_size: u64, ttl_secs: u64) -> Result<Self, CacheError> {
        let redis = match redis_url {
            Some(url) => {
                let client = redis::Client::open(url)?;
                let manager = ConnectionManager::new(client).await?;
                Some(Arc::new(tokio::sync::Mutex::new(manager)))
            }
            None => None,
        };

        Ok(Self {
            redis,
            l1_cache: Self::l1(l1_size, ttl_secs),
            ttl_secs,
        })
    }

    /// L1 only.
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        Self {
            redis: None,
            l1_cache: Self::l1(l1_size, ttl_secs),
            ttl_secs,
        }
    }

    fn l1(size: u64, ttl_secs: u64) -> moka::future::Cache<String, Vec<u8>> {
        moka::future::CacheBuilder::new(size)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build()
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: for<'de> Deserialize<'de>,
    {
        if let Some(bytes) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        let Some(redis) = &self.redis else {
            tracing::trace!("Cache miss: {}", key);
            return Ok(None);
        };

        let mut conn = redis.lock().await;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        drop(conn);

        match value {
            Some(json) => {
                tracing::trace!("L2 cache hit: {}", key);
                self.l1_cache.insert(key.to_string(), json.as_bytes().to_vec()).await;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                tracing::trace!("Cache miss: {}", key);
                Ok(None)
            }
        }
    }

    /// Set a value in every configured tier
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;
        self.l1_cache.insert(key.to_string(), json.as_bytes().to_vec()).await;

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_secs)
                .arg(json)
                .query_async::<()>(&mut *conn)
                .await?;
        }

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            redis::cmd("DEL").arg(key).query_async::<()>(&mut *conn).await?;
        }
        Ok(())
    }

    pub async fn stats(&self) -> CacheStats {
        self.l1_cache.run_pending_tasks().await;
        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            l2_enabled: self.redis.is_some(),
            ttl_secs: self.ttl_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub l2_enabled: bool,
    pub ttl_secs: u64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Key for a candidate pool query. Exclusions are folded into a SHA-256
    /// digest so every process sharing the L2 cache derives the same key.
    pub fn candidates(filter: &CandidateFilter) -> String {
        let mut hasher = Sha256::new();
        for id in &filter.exclude_ids {
            hasher.update((id.len() as u64).to_le_bytes());
            hasher.update(id.as_bytes());
        }
        format!(
            "candidates:{}:{}:{}:{:x}",
            filter.context.as_str(),
            filter.user_type,
            filter.limit,
            hasher.finalize()
        )
    }
}

/// Profile store decorator that caches candidate pool queries.
///
/// Single-profile lookups always reach the inner store so a viewer never
/// sees a stale copy of their own profile.
pub struct CachedProfileStore {
    inner: Arc<dyn ProfileStore>,
    cache: Arc<CacheManager>,
}

impl CachedProfileStore {
    pub fn new(inner: Arc<dyn ProfileStore>, cache: Arc<CacheManager>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl ProfileStore for CachedProfileStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<RawProfileRecord>, StoreError> {
        self.inner.get_profile(user_id).await
    }

    async fn query_candidates(&self, filter: &CandidateFilter) -> Result<Vec<RawProfileRecord>, StoreError> {
        let key = CacheKey::candidates(filter);

        match self.cache.get::<Vec<RawProfileRecord>>(&key).await {
            Ok(Some(records)) => return Ok(records),
            Ok(None) => {}
            Err(e) => tracing::warn!("Candidate cache read failed for {}: {}", key, e),
        }

        let records = self.inner.query_candidates(filter).await?;

        if let Err(e) = self.cache.set(&key, &records).await {
            tracing::warn!("Candidate cache write failed for {}: {}", key, e);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchingContext;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        profile_calls: AtomicUsize,
        query_calls: AtomicUsize,
    }

    #[async_trait]
    impl ProfileStore for CountingStore {
        async fn get_profile(&self, user_id: &str) -> Result<Option<RawProfileRecord>, StoreError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawProfileRecord::from_value(json!({ "user_id": user_id })))
        }

        async fn query_candidates(&self, _filter: &CandidateFilter) -> Result<Vec<RawProfileRecord>, StoreError> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![RawProfileRecord::from_value(json!({ "user_id": "c1" })).unwrap_or_default()])
        }
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_cache_set_get_with_redis() {
        let cache = CacheManager::new(Some("redis://127.0.0.1:6379"), 1000, 60)
            .await
            .expect("Failed to create cache");

        cache.set("test_key", &"test_value").await.unwrap();
        let result: Option<String> = cache.get("test_key").await.unwrap();
        assert_eq!(result.as_deref(), Some("test_value"));

        cache.delete("test_key").await.unwrap();
        assert!(cache.get::<String>("test_key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_cache_round_trip() {
        let cache = CacheManager::in_memory(100, 60);
        assert!(cache.get::<String>("k").await.unwrap().is_none());

        cache.set("k", &"v").await.unwrap();
        assert_eq!(cache.get::<String>("k").await.unwrap().as_deref(), Some("v"));
        assert!(!cache.stats().await.l2_enabled);
    }

    #[test]
    fn test_candidate_key_depends_on_exclusions() {
        let a = CandidateFilter::new(MatchingContext::SearcherMatching, vec!["x".to_string()], 50);
        let b = CandidateFilter::new(MatchingContext::SearcherMatching, vec!["y".to_string()], 50);
        let a_again = CandidateFilter::new(MatchingContext::SearcherMatching, vec!["x".to_string()], 50);

        assert_ne!(CacheKey::candidates(&a), CacheKey::candidates(&b));
        assert_eq!(CacheKey::candidates(&a), CacheKey::candidates(&a_again));
        assert!(CacheKey::candidates(&a).starts_with("candidates:searcher_matching:searcher:50:"));
    }

    #[test]
    fn test_candidate_key_is_stable_across_builds() {
        let filter = CandidateFilter::new(
            MatchingContext::SearcherMatching,
            vec!["b".to_string(), "a".to_string()],
            50,
        );
        assert_eq!(
            CacheKey::candidates(&filter),
            "candidates:searcher_matching:searcher:50:cf6ab613e3942391f88ed698557e1680f160bd10e88c6b668c50360c10930e2b"
        );

        // Length prefixes keep ["a", "b"] apart from ["a,b"].
        let joined = CandidateFilter::new(MatchingContext::SearcherMatching, vec!["a,b".to_string()], 50);
        assert_ne!(CacheKey::candidates(&filter), CacheKey::candidates(&joined));

        let empty = CandidateFilter::new(MatchingContext::SearcherMatching, Vec::new(), 10);
        assert!(CacheKey::candidates(&empty)
            .ends_with("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"));
    }

    #[tokio::test]
    async fn test_only_candidate_queries_are_cached() {
        let inner = Arc::new(CountingStore::default());
        let store = CachedProfileStore::new(inner.clone(), Arc::new(CacheManager::in_memory(100, 60)));
        let filter = CandidateFilter::new(MatchingContext::SearcherMatching, Vec::new(), 10);

        store.query_candidates(&filter).await.unwrap();
        let cached = store.query_candidates(&filter).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(inner.query_calls.load(Ordering::SeqCst), 1);

        store.get_profile("viewer").await.unwrap();
        store.get_profile("viewer").await.unwrap();
        assert_eq!(inner.profile_calls.load(Ordering::SeqCst), 2);
    }
}
