//! Three-tier cached resource: in-memory LRU, on-disk JSON, bundled
//! fallback, with stale-while-revalidate background refresh. One instance
//! owns one named resource (e.g. a provider's model list); the memory LRU
//! is private to that instance, mirroring the spec's no-cross-instance-
//! sharing rule even though, in practice, a single instance only ever
//! populates its own `cache_name` key.

use crate::vfs::Vfs;
use chrono::Utc;
use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

const MEMORY_CAPACITY: usize = 100;

/// Caller-injectable fetch dependency, per the spec's `deps={fs?, fetch?}`
/// shape — production code builds one backed by `reqwest`; tests inject a
/// spy or a canned response instead of reaching the network.
pub type FetchFn<T> = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send>> + Send + Sync>;

#[derive(Debug)]
pub enum CacheError {
    Http(String),
    Timeout,
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Http(message) => write!(f, "cache fetch failed: {}", message),
            CacheError::Timeout => write!(f, "cache fetch timed out"),
        }
    }
}

impl std::error::Error for CacheError {}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
}

impl<T> CacheEntry<T> {
    /// `timestamp: 0` marks a bundled-fallback result, per the spec's data
    /// model note.
    pub fn is_bundled_fallback(&self) -> bool {
        self.timestamp == 0
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct DiskEntry<T> {
    data: T,
    timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_name: String,
    pub cache_dir: PathBuf,
    pub api_endpoint: String,
    pub fetch_timeout: Duration,
    pub stale_ttl: Duration,
    pub fresh_ttl: Duration,
    pub offline: bool,
    pub prefer_offline: bool,
}

/// `$XDG_CACHE_HOME/<app>` if set, else `<home>/.cache/<app>`.
pub fn resolve_cache_dir(home_dir: &std::path::Path, app: &str) -> PathBuf {
    match std::env::var_os("XDG_CACHE_HOME") {
        Some(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join(app),
        _ => home_dir.join(".cache").join(app),
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub force_refresh: bool,
}

#[derive(Debug, Clone)]
pub struct Stats {
    pub memory_cache_size: usize,
    pub memory_cache_max: usize,
    pub cache_dir: PathBuf,
}

struct Inner<T> {
    bundled: T,
    config: CacheConfig,
    fs: Arc<dyn Vfs>,
    fetcher: FetchFn<T>,
    memory: std::sync::Mutex<LruCache<String, CacheEntry<T>>>,
    in_flight: AsyncMutex<HashSet<String>>,
}

/// Generic wrapper around a bundled fallback value, used by provider
/// manifests to cache model lists without ever blocking `configure` on a
/// network round-trip.
pub struct CachedResource<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CachedResource<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> CachedResource<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(bundled: T, config: CacheConfig, fs: Arc<dyn Vfs>) -> Self {
        let client = reqwest::Client::builder().build().unwrap_or_else(|_| reqwest::Client::new());
        let endpoint = config.api_endpoint.clone();
        let fetcher: FetchFn<T> = Arc::new(move || {
            let client = client.clone();
            let endpoint = endpoint.clone();
            Box::pin(async move {
                let response = client.get(&endpoint).send().await.map_err(|err| CacheError::Http(err.to_string()))?;
                response.json::<T>().await.map_err(|err| CacheError::Http(err.to_string()))
            })
        });
        Self::with_fetch(bundled, config, fs, fetcher)
    }

    /// Same as [`Self::new`] but with the network fetch replaced by a
    /// caller-supplied closure, so the stale-while-revalidate path can be
    /// exercised without reaching the network.
    pub fn with_fetch(bundled: T, config: CacheConfig, fs: Arc<dyn Vfs>, fetcher: FetchFn<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                bundled,
                config,
                fs,
                fetcher,
                memory: std::sync::Mutex::new(LruCache::new(NonZeroUsize::new(MEMORY_CAPACITY).unwrap())),
                in_flight: AsyncMutex::new(HashSet::new()),
            }),
        }
    }

    fn key(&self) -> String {
        self.inner.config.cache_name.clone()
    }

    fn bundled_entry(&self) -> CacheEntry<T> {
        CacheEntry { data: self.inner.bundled.clone(), timestamp: 0 }
    }

    fn memory_get(&self) -> Option<CacheEntry<T>> {
        self.inner.memory.lock().unwrap().get(&self.key()).cloned()
    }

    fn memory_put(&self, entry: CacheEntry<T>) {
        self.inner.memory.lock().unwrap().put(self.key(), entry);
    }

    fn disk_path(&self) -> PathBuf {
        self.inner.config.cache_dir.join(format!("{}.json", self.inner.config.cache_name))
    }

    async fn load_from_disk(&self) -> Option<CacheEntry<T>> {
        let text = self.inner.fs.try_read_file(&self.disk_path()).await.ok()??;
        let parsed: DiskEntry<T> = serde_json::from_str(&text).ok()?;
        let age = Utc::now().timestamp() - parsed.timestamp;
        if age < 0 || age as u64 > self.inner.config.stale_ttl.as_secs() {
            return None;
        }
        Some(CacheEntry { data: parsed.data, timestamp: parsed.timestamp })
    }

    async fn write_to_disk(&self, entry: &CacheEntry<T>) {
        let _ = self.inner.fs.mkdir(&self.inner.config.cache_dir, true).await;
        let disk_entry = DiskEntry { data: entry.data.clone(), timestamp: entry.timestamp };
        if let Ok(text) = serde_json::to_string(&disk_entry) {
            let _ = self.inner.fs.write_file(&self.disk_path(), &text).await;
        }
    }

    async fn fetch(&self) -> Result<T, CacheError> {
        (self.inner.fetcher)().await
    }

    async fn fetch_with_timeout(&self) -> Result<T, CacheError> {
        match tokio::time::timeout(self.inner.config.fetch_timeout, self.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout),
        }
    }

    /// At-most-one-in-flight-per-key background revalidation. Failures are
    /// swallowed; the task never surfaces to a caller of `get`.
    fn trigger_revalidation(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            let key = this.key();
            {
                let mut in_flight = this.inner.in_flight.lock().await;
                if !in_flight.insert(key.clone()) {
                    return;
                }
            }
            if let Ok(data) = this.fetch().await {
                let entry = CacheEntry { data, timestamp: Utc::now().timestamp() };
                this.memory_put(entry.clone());
                this.write_to_disk(&entry).await;
            }
            this.inner.in_flight.lock().await.remove(&key);
        });
    }

    pub async fn wait_for_revalidation(&self) {
        while self.inner.in_flight.lock().await.contains(&self.key()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    pub async fn get(&self, options: &GetOptions) -> CacheEntry<T> {
        if !options.force_refresh {
            if let Some(entry) = self.memory_get() {
                return entry;
            }
            if let Some(entry) = self.load_from_disk().await {
                self.memory_put(entry.clone());
                let age = Utc::now().timestamp() - entry.timestamp;
                let stale = age as u64 > self.inner.config.fresh_ttl.as_secs();
                if stale && !self.inner.config.offline && !self.inner.config.prefer_offline {
                    self.trigger_revalidation();
                }
                return entry;
            }
        }

        if self.inner.config.offline || self.inner.config.prefer_offline {
            return self.bundled_entry();
        }

        match self.fetch_with_timeout().await {
            Ok(data) => {
                let entry = CacheEntry { data, timestamp: Utc::now().timestamp() };
                self.memory_put(entry.clone());
                self.write_to_disk(&entry).await;
                entry
            }
            Err(_) => self.bundled_entry(),
        }
    }

    pub async fn refresh(&self) -> CacheEntry<T> {
        self.get(&GetOptions { force_refresh: true }).await
    }

    pub async fn clear(&self) {
        self.inner.memory.lock().unwrap().pop(&self.key());
        let _ = self.inner.fs.unlink(&self.disk_path()).await;
    }

    pub fn stats(&self) -> Stats {
        let memory = self.inner.memory.lock().unwrap();
        Stats {
            memory_cache_size: memory.len(),
            memory_cache_max: MEMORY_CAPACITY,
            cache_dir: self.inner.config.cache_dir.clone(),
        }
    }
}
