//! Generation capability: external text model, optional cache, bounded calls
//!
//! The core never implements a model client. It consumes any
//! [`TextGenerator`], wraps each call in the caller-supplied timeout and
//! memoizes identical `(prompt, model params)` calls through an optional
//! [`GenerationCache`]. A cache only changes latency, never output.

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::data_model::StationId;
use crate::station::{FailureCause, StationError};

/// Failure reported by a generator. The transient/fatal split is preserved
/// all the way to [`crate::PipelineError::is_retryable`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            temperature: 0.3,
            max_tokens: 256,
        }
    }
}

/// Opaque text-generation capability
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &ModelParams) -> Result<String, GenerationError>;
}

/// Memoization contract for generation calls
pub trait GenerationCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl: Duration);
    fn invalidate(&self, key: &str);
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Bounded in-process cache with per-entry expiry
pub struct InMemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GenerationCache for InMemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key.to_string(), CacheEntry { value, expires_at });
    }

    fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(key);
    }
}

/// Generator + optional cache + timeout, shared by all runs of an orchestrator
#[derive(Clone)]
pub struct GenerationClient {
    generator: Arc<dyn TextGenerator>,
    cache: Option<Arc<dyn GenerationCache>>,
    timeout: Duration,
    cache_ttl: Duration,
    params: ModelParams,
}

impl fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationClient")
            .field("cached", &self.cache.is_some())
            .field("timeout", &self.timeout)
            .field("cache_ttl", &self.cache_ttl)
            .field("params", &self.params)
            .finish()
    }
}

impl GenerationClient {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self {
            generator,
            cache: None,
            timeout,
            cache_ttl: Duration::from_secs(3600),
            params: ModelParams::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn GenerationCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Default model parameters for calls made through this client
    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call the generator on behalf of `station`, bounded by the timeout.
    ///
    /// Timeouts and generator errors become a [`StationError`]; the core
    /// performs no retries.
    pub async fn generate(
        &self,
        station: StationId,
        prompt: &str,
        params: &ModelParams,
    ) -> Result<String, StationError> {
        let key = cache_key(prompt, params);
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&key) {
                debug!(station = %station, key = %key, "generation cache hit");
                return Ok(hit);
            }
        }

        let timeout_ms = self.timeout.as_millis() as u64;
        let text = tokio::time::timeout(self.timeout, self.generator.generate(prompt, params))
            .await
            .map_err(|_| StationError::new(station, FailureCause::Timeout { timeout_ms }))?
            .map_err(|e| {
                StationError::new(
                    station,
                    FailureCause::Generation {
                        transient: e.is_transient(),
                        message: e.to_string(),
                    },
                )
            })?;

        if let Some(cache) = &self.cache {
            cache.set(&key, text.clone(), self.cache_ttl);
        }
        Ok(text)
    }
}

/// Cache key for a `(prompt, model params)` pair
pub fn cache_key(prompt: &str, params: &ModelParams) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prompt.as_bytes());
    hasher.update(&[0]);
    hasher.update(params.model.as_bytes());
    hasher.update(&[0]);
    hasher.update(&params.temperature.to_bits().to_le_bytes());
    hasher.update(&params.max_tokens.to_le_bytes());
    format!("blake3:{}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn generate(&self, prompt: &str, _params: &ModelParams) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("echo: {}", prompt))
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _prompt: &str, _params: &ModelParams) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    struct FailingGenerator(GenerationError);

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str, _params: &ModelParams) -> Result<String, GenerationError> {
            Err(self.0.clone())
        }
    }

    #[test]
    fn test_cache_key_depends_on_params() {
        let params = ModelParams::default();
        let other = ModelParams {
            model: "other".to_string(),
            ..ModelParams::default()
        };
        assert_eq!(cache_key("p", &params), cache_key("p", &params));
        assert_ne!(cache_key("p", &params), cache_key("p", &other));
        assert_ne!(cache_key("p", &params), cache_key("q", &params));
        assert!(cache_key("p", &params).starts_with("blake3:"));
    }

    #[test]
    fn test_in_memory_cache_expiry_and_invalidate() {
        let cache = InMemoryCache::new(4);
        cache.set("a", "1".to_string(), Duration::from_secs(60));
        cache.set("b", "2".to_string(), Duration::ZERO);
        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert_eq!(cache.get("b"), None);

        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_cache_is_pass_through() {
        let generator = Arc::new(CountingGenerator { calls: AtomicUsize::new(0) });
        let cached = GenerationClient::new(generator.clone(), Duration::from_secs(1))
            .with_cache(Arc::new(InMemoryCache::new(8)), Duration::from_secs(60));
        let params = ModelParams::default();

        let first = cached.generate(StationId::S2, "hello", &params).await.unwrap();
        let second = cached.generate(StationId::S2, "hello", &params).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        let uncached = GenerationClient::new(generator.clone(), Duration::from_secs(1));
        assert_eq!(uncached.generate(StationId::S2, "hello", &params).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_timeout_becomes_station_failure() {
        let client = GenerationClient::new(Arc::new(SlowGenerator), Duration::from_millis(20));
        let err = client
            .generate(StationId::S2, "x", &ModelParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.station, StationId::S2);
        assert_eq!(err.cause, FailureCause::Timeout { timeout_ms: 20 });
    }

    #[tokio::test]
    async fn test_transient_distinction_preserved() {
        let client = GenerationClient::new(
            Arc::new(FailingGenerator(GenerationError::Transient("overloaded".into()))),
            Duration::from_secs(1),
        );
        let err = client
            .generate(StationId::S7, "x", &ModelParams::default())
            .await
            .unwrap_err();
        assert!(err.cause.is_transient());

        let client = GenerationClient::new(
            Arc::new(FailingGenerator(GenerationError::Fatal("bad key".into()))),
            Duration::from_secs(1),
        );
        let err = client
            .generate(StationId::S7, "x", &ModelParams::default())
            .await
            .unwrap_err();
        assert!(!err.cause.is_transient());
    }
}
