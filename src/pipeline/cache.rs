//! 時刻を注入できる有効期限付きキャッシュ。
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clients::{FetchError, PostSearch};
use crate::observability::metrics::Metrics;
use crate::schema::PostRecord;

/// 現在時刻の取得元。
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 手動で進めるクロック。
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self
            .offset
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self
            .offset
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.origin + *offset
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// キー単位で丸ごと差し替えるキャッシュ。
///
/// 期限切れのエントリは読み出し時にミスとして扱う。部分更新はしない。
pub struct ExpiringCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<FxHashMap<K, Entry<V>>>,
}

impl<K, V> fmt::Debug for ExpiringCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 有効期限内のエントリだけを返す。
    pub async fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let guard = self.entries.read().await;
        guard
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// 既存エントリがあっても丸ごと上書きする。
    ///
    /// 書き込みロック中に期限切れのエントリも掃除するので、キー数は有効なものに限られる。
    pub async fn insert(&self, key: K, value: V) {
        let stored_at = self.clock.now();
        let ttl = self.ttl;
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|_, entry| stored_at.saturating_duration_since(entry.stored_at) < ttl);
        let evicted = before - guard.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired cache entries");
        }
        guard.insert(key, Entry { value, stored_at });
    }

    /// 期限切れのエントリを削除し、削除件数を返す。
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|_, entry| now.saturating_duration_since(entry.stored_at) < self.ttl);
        before - guard.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// トピック検索結果をキャッシュする `PostSearch` デコレータ。
///
/// 失敗した検索はキャッシュしない。
pub struct CachedSearch {
    inner: Arc<dyn PostSearch>,
    cache: ExpiringCache<(String, usize), Vec<PostRecord>>,
    metrics: Arc<Metrics>,
}

impl CachedSearch {
    #[must_use]
    pub fn new(
        inner: Arc<dyn PostSearch>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner,
            cache: ExpiringCache::new(ttl, clock),
            metrics,
        }
    }
}

#[async_trait]
impl PostSearch for CachedSearch {
    async fn search(&self, topic: &str, max_results: usize) -> Result<Vec<PostRecord>, FetchError> {
        let key = (topic.trim().to_lowercase(), max_results);
        if let Some(records) = self.cache.get(&key).await {
            self.metrics.cache_hits.inc();
            debug!(topic, "search cache hit");
            return Ok(records);
        }
        self.metrics.cache_misses.inc();
        let records = self.inner.search(topic, max_results).await?;
        self.cache.insert(key, records.clone()).await;
        Ok(records)
    }
}
