// =============================================================================
// Tiered Cache Manager
// =============================================================================
//
// Owns the single authoritative `CacheEntry` and resolves requests through
// three named strategies:
//
//   from_memory   in-process entry younger than the freshness window
//   from_durable  Parquet snapshot younger than the window, promoted to memory
//   rebuild       OHLC store → dataset builder → write both tiers
//
// State per entry: EMPTY → FRESH → (age > window) → STALE → FRESH on a
// successful rebuild, or stays STALE (and is served) when the rebuild fails.
//
// Concurrency:
//   - The memory tier is an `RwLock<Option<Arc<CacheEntry>>>`; replacement is
//     a pointer swap, so readers never see a half-built entry.
//   - One rebuild at a time, behind an async mutex.  A caller that finds a
//     rebuild in flight serves whatever entry exists (stale) instead of
//     waiting; only a caller with nothing at all to serve waits its turn.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dataset::{self, DerivedDataset};
use crate::error::{BuildError, CacheError};
use crate::market_data::OhlcSource;
use crate::store::{OhlcStore, ParquetStore};
use crate::types::CacheTier;

/// One built dataset and when it was built.  Replaced, never mutated.
#[derive(Debug)]
pub struct CacheEntry {
    pub dataset: DerivedDataset,
    pub built_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>, freshness_secs: i64) -> bool {
        (now - self.built_at).num_seconds() < freshness_secs
    }
}

/// A served entry plus the tier that produced it.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: Arc<CacheEntry>,
    pub tier: CacheTier,
}

pub struct TieredCache<P, S> {
    ohlc: OhlcStore<P, S>,
    store: ParquetStore,
    freshness_secs: i64,
    memory: RwLock<Option<Arc<CacheEntry>>>,
    rebuild_guard: Mutex<()>,
}

impl<P: OhlcSource, S: OhlcSource> TieredCache<P, S> {
    pub fn new(ohlc: OhlcStore<P, S>, store: ParquetStore, freshness_secs: i64) -> Self {
        Self {
            ohlc,
            store,
            freshness_secs,
            memory: RwLock::new(None),
            rebuild_guard: Mutex::new(()),
        }
    }

    /// Resolve the dataset as of `now`.
    pub async fn get(&self, now: DateTime<Utc>) -> Result<CacheHit, CacheError> {
        if let Some(entry) = self.from_memory(now) {
            debug!(built_at = %entry.built_at, "dataset served from memory");
            return Ok(hit(entry, CacheTier::Memory));
        }

        let _guard = match self.rebuild_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if let Some(entry) = self.latest() {
                    debug!("rebuild in flight, serving current entry");
                    return Ok(hit(entry, CacheTier::Stale));
                }
                self.rebuild_guard.lock().await
            }
        };

        // Another caller may have finished a rebuild while we waited.
        if let Some(entry) = self.from_memory(now) {
            return Ok(hit(entry, CacheTier::Memory));
        }

        if let Some(entry) = self.from_durable(now) {
            debug!(built_at = %entry.built_at, "dataset served from durable snapshot");
            return Ok(hit(entry, CacheTier::Durable));
        }

        match self.rebuild(now).await {
            Ok(entry) => Ok(hit(entry, CacheTier::Rebuilt)),
            Err(e) => {
                warn!(error = %e, "dataset rebuild failed");
                match self.latest() {
                    Some(entry) => {
                        warn!(built_at = %entry.built_at, "serving stale dataset");
                        Ok(hit(entry, CacheTier::Stale))
                    }
                    None => Err(CacheError::NoDataAvailable),
                }
            }
        }
    }

    /// Fresh in-process entry, if any.
    pub fn from_memory(&self, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        self.memory
            .read()
            .as_ref()
            .filter(|e| e.is_fresh(now, self.freshness_secs))
            .cloned()
    }

    /// Fresh durable entry, promoted into memory.  A readable but stale
    /// snapshot still seeds an empty memory tier so it can be served as a
    /// last resort.
    pub fn from_durable(&self, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        let stored = match self.store.load_dataset() {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "dataset snapshot unreadable, treating as absent");
                return None;
            }
        };

        let entry = Arc::new(CacheEntry {
            dataset: stored.dataset,
            built_at: stored.built_at,
        });
        let fresh = entry.is_fresh(now, self.freshness_secs);

        let mut memory = self.memory.write();
        let newer = memory
            .as_ref()
            .map_or(true, |current| entry.built_at > current.built_at);
        if newer {
            *memory = Some(Arc::clone(&entry));
        }
        fresh.then_some(entry)
    }

    /// Recompute from the OHLC store and write through both tiers.
    pub async fn rebuild(&self, now: DateTime<Utc>) -> Result<Arc<CacheEntry>, BuildError> {
        let series = self.ohlc.get_series(now.timestamp()).await;
        let dataset = dataset::build(&series)?;

        let entry = Arc::new(CacheEntry {
            dataset,
            built_at: now,
        });
        if let Err(e) = self.store.save_dataset(&entry.dataset, entry.built_at) {
            warn!(error = %e, "failed to persist dataset snapshot");
        }
        *self.memory.write() = Some(Arc::clone(&entry));

        info!(candles = entry.dataset.len(), "dataset rebuilt");
        Ok(entry)
    }

    /// The candle store behind the rebuild strategy.
    pub fn ohlc(&self) -> &OhlcStore<P, S> {
        &self.ohlc
    }

    /// Drop the memory entry; the next `get` goes down the tiers.
    pub fn invalidate(&self) {
        self.memory.write().take();
    }

    /// Whether any entry, fresh or stale, is held in memory.
    pub fn has_entry(&self) -> bool {
        self.memory.read().is_some()
    }

    fn latest(&self) -> Option<Arc<CacheEntry>> {
        self.memory.read().clone()
    }
}

fn hit(entry: Arc<CacheEntry>, tier: CacheTier) -> CacheHit {
    CacheHit { entry, tier }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::market_data::CandleSeries;
    use crate::store::ohlc_store::tests::{candles, MockOhlc, DAY};
    use crate::store::OhlcStoreConfig;
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn ohlc_config() -> OhlcStoreConfig {
        OhlcStoreConfig {
            lookback_days: 365,
            bar_seconds: DAY,
            freshness_secs: 300,
        }
    }

    fn cache_with<P: OhlcSource, S: OhlcSource>(
        primary: P,
        secondary: S,
        store: ParquetStore,
        freshness_secs: i64,
    ) -> TieredCache<P, S> {
        let ohlc = OhlcStore::new(primary, secondary, store.clone(), ohlc_config());
        TieredCache::new(ohlc, store, freshness_secs)
    }

    #[tokio::test]
    async fn two_gets_within_window_fetch_once() {
        let primary = MockOhlc::new("p", candles(0..60, 100.0));
        let secondary = MockOhlc::new("s", candles(0..60, 100.0));
        let (pc, sc) = (primary.clone(), secondary.clone());
        let cache = cache_with(primary, secondary, ParquetStore::disabled(), 300);

        let first = cache.get(at(70 * DAY)).await.unwrap();
        assert_eq!(first.tier, CacheTier::Rebuilt);
        assert_eq!(first.entry.dataset.len(), 60);

        let second = cache.get(at(70 * DAY + 120)).await.unwrap();
        assert_eq!(second.tier, CacheTier::Memory);
        assert!(Arc::ptr_eq(&first.entry, &second.entry));
        assert_eq!(pc.calls() + sc.calls(), 1);
    }

    #[tokio::test]
    async fn no_sources_no_snapshot_is_no_data() {
        let cache = cache_with(
            MockOhlc::failing("p"),
            MockOhlc::failing("s"),
            ParquetStore::disabled(),
            300,
        );
        let err = cache.get(at(70 * DAY)).await.unwrap_err();
        assert_eq!(err, CacheError::NoDataAvailable);
        assert!(!cache.has_entry());
    }

    #[tokio::test]
    async fn too_few_candles_is_no_data() {
        let cache = cache_with(
            MockOhlc::new("p", candles(0..10, 1.0)),
            MockOhlc::failing("s"),
            ParquetStore::disabled(),
            300,
        );
        assert_eq!(
            cache.get(at(70 * DAY)).await.unwrap_err(),
            CacheError::NoDataAvailable
        );
    }

    #[tokio::test]
    async fn expired_entry_is_rebuilt() {
        let primary = MockOhlc::new("p", candles(0..60, 100.0));
        let pc = primary.clone();
        let cache = cache_with(primary, MockOhlc::failing("s"), ParquetStore::disabled(), 300);

        cache.get(at(70 * DAY)).await.unwrap();
        *pc.incremental.write() = candles(60..70, 120.0);

        let later = cache.get(at(71 * DAY)).await.unwrap();
        assert_eq!(later.tier, CacheTier::Rebuilt);
        assert_eq!(later.entry.dataset.len(), 70);
    }

    #[tokio::test]
    async fn fresh_durable_snapshot_is_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let disk = ParquetStore::new(dir.path());
        let ds = dataset::build(&CandleSeries::from_candles(candles(0..60, 5.0))).unwrap();
        disk.save_dataset(&ds, at(70 * DAY)).unwrap();

        let primary = MockOhlc::failing("p");
        let pc = primary.clone();
        let cache = cache_with(primary, MockOhlc::failing("s"), disk, 300);

        let got = cache.get(at(70 * DAY + 10)).await.unwrap();
        assert_eq!(got.tier, CacheTier::Durable);
        assert_eq!(got.entry.dataset, ds);
        assert_eq!(pc.calls(), 0);

        let again = cache.get(at(70 * DAY + 20)).await.unwrap();
        assert_eq!(again.tier, CacheTier::Memory);
    }

    #[tokio::test]
    async fn failed_rebuild_serves_stale_durable_entry() {
        let dir = tempfile::tempdir().unwrap();
        let disk = ParquetStore::new(dir.path());
        let ds = dataset::build(&CandleSeries::from_candles(candles(0..60, 5.0))).unwrap();
        disk.save_dataset(&ds, at(60 * DAY)).unwrap();

        let cache = cache_with(MockOhlc::failing("p"), MockOhlc::failing("s"), disk, 300);

        let got = cache.get(at(90 * DAY)).await.unwrap();
        assert_eq!(got.tier, CacheTier::Stale);
        assert_eq!(got.entry.built_at, at(60 * DAY));
    }

    #[tokio::test]
    async fn rebuild_writes_durable_tier() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_with(
            MockOhlc::new("p", candles(0..60, 100.0)),
            MockOhlc::failing("s"),
            ParquetStore::new(dir.path()),
            300,
        );
        cache.get(at(70 * DAY)).await.unwrap();

        let stored = ParquetStore::new(dir.path()).load_dataset().unwrap().unwrap();
        assert_eq!(stored.built_at, at(70 * DAY));
        assert_eq!(stored.dataset.len(), 60);
    }

    #[tokio::test]
    async fn invalidate_forces_lower_tiers() {
        let primary = MockOhlc::new("p", candles(0..60, 100.0));
        let pc = primary.clone();
        let cache = cache_with(primary, MockOhlc::failing("s"), ParquetStore::disabled(), 300);

        cache.get(at(70 * DAY)).await.unwrap();
        cache.invalidate();
        assert!(!cache.has_entry());

        let got = cache.get(at(70 * DAY + 5)).await.unwrap();
        assert_eq!(got.tier, CacheTier::Rebuilt);
        // The OHLC snapshot was still current, so no second fetch.
        assert_eq!(pc.calls(), 1);
    }

    #[test]
    fn from_memory_respects_window() {
        let cache = cache_with(
            MockOhlc::failing("p"),
            MockOhlc::failing("s"),
            ParquetStore::disabled(),
            300,
        );
        let ds = dataset::build(&CandleSeries::from_candles(candles(0..60, 5.0))).unwrap();
        *cache.memory.write() = Some(Arc::new(CacheEntry {
            dataset: ds,
            built_at: at(1_000),
        }));

        assert!(cache.from_memory(at(1_299)).is_some());
        assert!(cache.from_memory(at(1_300)).is_none());
    }

    /// OHLC source that blocks its full fetch until released.
    #[derive(Clone)]
    struct GatedOhlc {
        inner: MockOhlc,
        gate: Arc<tokio::sync::Notify>,
    }

    impl OhlcSource for GatedOhlc {
        fn name(&self) -> &'static str {
            self.inner.name()
        }

        async fn fetch_full(&self, lookback_days: u32) -> Result<CandleSeries, SourceError> {
            self.gate.notified().await;
            self.inner.fetch_full(lookback_days).await
        }

        async fn fetch_since(&self, after: i64) -> Result<CandleSeries, SourceError> {
            self.inner.fetch_since(after).await
        }
    }

    #[tokio::test]
    async fn concurrent_get_serves_stale_during_rebuild() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let inner = MockOhlc::new("p", candles(0..60, 100.0));
        let calls = inner.full_calls.clone();
        let primary = GatedOhlc {
            inner,
            gate: gate.clone(),
        };
        let cache = Arc::new(cache_with(
            primary,
            MockOhlc::failing("s"),
            ParquetStore::disabled(),
            300,
        ));

        let ds = dataset::build(&CandleSeries::from_candles(candles(0..55, 1.0))).unwrap();
        *cache.memory.write() = Some(Arc::new(CacheEntry {
            dataset: ds,
            built_at: at(0),
        }));

        let rebuilding = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(at(70 * DAY)).await })
        };
        while cache.rebuild_guard.try_lock().is_ok() {
            tokio::task::yield_now().await;
        }

        let meanwhile = cache.get(at(70 * DAY)).await.unwrap();
        assert_eq!(meanwhile.tier, CacheTier::Stale);
        assert_eq!(meanwhile.entry.dataset.len(), 55);

        gate.notify_one();
        let rebuilt = rebuilding.await.unwrap().unwrap();
        assert_eq!(rebuilt.tier, CacheTier::Rebuilt);
        assert_eq!(rebuilt.entry.dataset.len(), 60);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
