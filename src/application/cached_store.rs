// Period-keyed query cache owned by the store adapter
use crate::application::reading_store::{ReadingStore, StoreResult};
use crate::domain::events::{PumpActivation, RefillRecord};
use crate::domain::tank::{LatestSnapshot, Period};
use crate::domain::telemetry::Reading;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Readings,
    Refills,
    Pumps,
}

pub type CacheKey = (Period, QueryKind);

struct Entry<V> {
    value: Arc<V>,
    stored_at: Instant,
}

/// Time-bounded cache of query results.
///
/// `All` holds much more data than the bounded periods, so it gets its own
/// TTL. Every `invalidate()` starts a new generation; a fetch that began in
/// an older generation is returned to its caller but never stored.
pub struct QueryCache<V> {
    entries: RwLock<HashMap<CacheKey, Entry<V>>>,
    generation: AtomicU64,
    ttl: Duration,
    all_ttl: Duration,
}

impl<V> QueryCache<V> {
    pub fn new(ttl: Duration, all_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            ttl,
            all_ttl,
        }
    }

    fn ttl_for(&self, period: Period) -> Duration {
        match period {
            Period::All => self.all_ttl,
            _ => self.ttl,
        }
    }

    pub async fn get(&self, key: CacheKey) -> Option<Arc<V>> {
        let entries = self.entries.read().await;
        let entry = entries.get(&key)?;
        (entry.stored_at.elapsed() < self.ttl_for(key.0)).then(|| entry.value.clone())
    }

    pub async fn insert(&self, key: CacheKey, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.write().await.insert(
            key,
            Entry {
                value: value.clone(),
                stored_at: Instant::now(),
            },
        );
        value
    }

    /// Return the cached value or run `fetch` and cache its success.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> StoreResult<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StoreResult<V>>,
    {
        if let Some(hit) = self.get(key).await {
            tracing::debug!("Cache hit for {:?}/{:?}", key.0, key.1);
            return Ok(hit);
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let value = Arc::new(fetch().await?);

        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::SeqCst) == generation {
            entries.insert(
                key,
                Entry {
                    value: value.clone(),
                    stored_at: Instant::now(),
                },
            );
        } else {
            tracing::debug!("Dropping {:?}/{:?} fetched before invalidation", key.0, key.1);
        }
        Ok(value)
    }

    pub async fn invalidate(&self) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries.clear();
    }
}

/// A `ReadingStore` front that answers period queries through a cache.
pub struct CachedReadingStore {
    inner: Arc<dyn ReadingStore>,
    readings: QueryCache<Vec<Reading>>,
    refills: QueryCache<Vec<RefillRecord>>,
    pumps: QueryCache<Vec<PumpActivation>>,
}

impl CachedReadingStore {
    pub fn new(inner: Arc<dyn ReadingStore>, ttl: Duration, all_ttl: Duration) -> Self {
        Self {
            inner,
            readings: QueryCache::new(ttl, all_ttl),
            refills: QueryCache::new(ttl, all_ttl),
            pumps: QueryCache::new(ttl, all_ttl),
        }
    }

    pub fn store(&self) -> &Arc<dyn ReadingStore> {
        &self.inner
    }

    pub async fn readings_for(&self, period: Period, now_ms: i64) -> StoreResult<Arc<Vec<Reading>>> {
        self.readings
            .get_or_fetch((period, QueryKind::Readings), || {
                self.inner
                    .fetch_readings(period.window_start(now_ms), period.window_end(now_ms))
            })
            .await
    }

    pub async fn refills_for(&self, period: Period, now_ms: i64) -> StoreResult<Arc<Vec<RefillRecord>>> {
        self.refills
            .get_or_fetch((period, QueryKind::Refills), || {
                self.inner.fetch_refill_records(period.window_start(now_ms))
            })
            .await
    }

    pub async fn pumps_for(&self, period: Period, now_ms: i64) -> StoreResult<Arc<Vec<PumpActivation>>> {
        self.pumps
            .get_or_fetch((period, QueryKind::Pumps), || {
                self.inner.fetch_pump_records(period.window_start(now_ms))
            })
            .await
    }

    /// The latest snapshot changes with every sensor push and is never cached.
    pub async fn latest(&self) -> StoreResult<Option<LatestSnapshot>> {
        self.inner.fetch_latest().await
    }

    pub async fn invalidate(&self) {
        self.readings.invalidate().await;
        self.refills.invalidate().await;
        self.pumps.invalidate().await;
        tracing::debug!("Query cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::InMemoryStore;
    use crate::application::reading_store::StoreError;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{oneshot, Notify};

    #[tokio::test]
    async fn test_get_or_fetch_caches_success() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(60), Duration::from_secs(300));
        let calls = AtomicUsize::new(0);
        let key = (Period::Day, QueryKind::Readings);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch(key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, StoreError>(7u32)
                })
                .await
                .unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache: QueryCache<&'static str> = QueryCache::new(Duration::from_secs(60), Duration::from_secs(60));
        cache.insert((Period::Day, QueryKind::Readings), "day").await;
        assert!(cache.get((Period::Week, QueryKind::Readings)).await.is_none());
        assert!(cache.get((Period::Day, QueryKind::Pumps)).await.is_none());
        assert_eq!(*cache.get((Period::Day, QueryKind::Readings)).await.unwrap(), "day");
    }

    #[tokio::test]
    async fn test_expired_entries_miss() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::ZERO, Duration::from_secs(300));
        cache.insert((Period::Day, QueryKind::Refills), 1).await;
        cache.insert((Period::All, QueryKind::Refills), 2).await;
        assert!(cache.get((Period::Day, QueryKind::Refills)).await.is_none());
        assert_eq!(*cache.get((Period::All, QueryKind::Refills)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(60), Duration::from_secs(60));
        let key = (Period::Day, QueryKind::Readings);
        let failed = cache
            .get_or_fetch(key, || async { Err::<u32, _>(StoreError::Unavailable("offline".into())) })
            .await;
        assert!(matches!(failed, Err(StoreError::Unavailable(_))));
        let value = cache.get_or_fetch(key, || async { Ok::<_, StoreError>(3u32) }).await.unwrap();
        assert_eq!(*value, 3);
    }

    #[tokio::test]
    async fn test_fetch_spanning_invalidate_is_not_stored() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(60), Duration::from_secs(300));
        let key = (Period::All, QueryKind::Readings);
        let started = Notify::new();
        let (release, gate) = oneshot::channel::<()>();

        let started_ref = &started;
        let (stale, ()) = tokio::join!(
            cache.get_or_fetch(key, move || async move {
                started_ref.notify_one();
                let _ = gate.await;
                Ok::<_, StoreError>(1u32)
            }),
            async {
                started.notified().await;
                cache.invalidate().await;
                let _ = release.send(());
            }
        );

        // The in-flight caller still gets its answer, but it is not kept.
        assert_eq!(*stale.unwrap(), 1);
        assert!(cache.get(key).await.is_none());
        let fresh = cache
            .get_or_fetch(key, || async { Ok::<_, StoreError>(2u32) })
            .await
            .unwrap();
        assert_eq!(*fresh, 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let store = Arc::new(InMemoryStore::default());
        store.push_reading(Reading::new(1_000, 10.0));
        let cached = CachedReadingStore::new(store.clone(), Duration::from_secs(60), Duration::from_secs(60));

        assert_eq!(cached.readings_for(Period::All, 5_000).await.unwrap().len(), 1);
        store.push_reading(Reading::new(2_000, 20.0));
        assert_eq!(cached.readings_for(Period::All, 5_000).await.unwrap().len(), 1);

        cached.invalidate().await;
        assert_eq!(cached.readings_for(Period::All, 5_000).await.unwrap().len(), 2);
    }
}
