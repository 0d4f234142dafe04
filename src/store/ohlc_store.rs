// =============================================================================
// OHLC Store — incremental, dedupe-safe candle history
// =============================================================================
//
// `get_series(now)` resolution order:
//
//   1. Snapshot (memory, else durable) that is current → return it.
//   2. Snapshot exists → ask the primary source for candles strictly after
//      the newest one, merge (batch wins on equal `time`), persist, return.
//   3. No snapshot or incremental failed → full fetch from the primary,
//      then the secondary.  A successful full fetch replaces the snapshot.
//   4. Every source failed → the existing snapshot, stale, or an empty
//      series if there never was one.
//
// "Current" means a sync succeeded within the freshness window, or the next
// bar cannot have opened yet (`newest + bar_seconds > now`).
//
// Steps 2-4 run behind an async mutex: one caller talks to the sources and
// writes the snapshot, the others wait and then find it current.
// =============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::market_data::{CandleSeries, OhlcSource};
use crate::store::ParquetStore;

#[derive(Debug, Clone, Copy)]
pub struct OhlcStoreConfig {
    pub lookback_days: u32,
    pub bar_seconds: i64,
    pub freshness_secs: i64,
}

#[derive(Default)]
struct Snapshot {
    series: Option<Arc<CandleSeries>>,
    /// Epoch seconds of the last successful source sync.
    synced_at: Option<i64>,
    /// The durable tier has been consulted once.
    loaded: bool,
}

pub struct OhlcStore<P, S> {
    primary: P,
    secondary: S,
    store: ParquetStore,
    config: OhlcStoreConfig,
    snapshot: RwLock<Snapshot>,
    refresh_guard: Mutex<()>,
}

impl<P: OhlcSource, S: OhlcSource> OhlcStore<P, S> {
    pub fn new(primary: P, secondary: S, store: ParquetStore, config: OhlcStoreConfig) -> Self {
        Self {
            primary,
            secondary,
            store,
            config,
            snapshot: RwLock::new(Snapshot::default()),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Resolve the candle series as of `now` (epoch seconds).  Never fails;
    /// the worst case is an empty series.
    pub async fn get_series(&self, now: i64) -> Arc<CandleSeries> {
        if let Some(series) = self.current_snapshot() {
            if self.is_current(&series, now) {
                debug!(candles = series.len(), "candle snapshot is current");
                return series;
            }
        }

        let _guard = self.refresh_guard.lock().await;

        // Another caller may have synced while we waited.
        let current = self.current_snapshot();
        if let Some(series) = &current {
            if self.is_current(series, now) {
                return Arc::clone(series);
            }
            if let Some(merged) = self.incremental(series, now).await {
                return merged;
            }
        }

        if let Some(full) = self.full_refresh(now).await {
            return full;
        }

        match current {
            Some(series) => {
                warn!(candles = series.len(), "all OHLC sources failed, serving stale snapshot");
                series
            }
            None => {
                warn!("all OHLC sources failed and no snapshot exists");
                Arc::new(CandleSeries::empty())
            }
        }
    }

    /// In-memory snapshot, loading the durable copy on first use.
    fn current_snapshot(&self) -> Option<Arc<CandleSeries>> {
        {
            let snap = self.snapshot.read();
            if snap.loaded {
                return snap.series.clone();
            }
        }

        let loaded = match self.store.load_series() {
            Ok(series) => series.filter(|s| !s.is_empty()).map(Arc::new),
            Err(e) => {
                warn!(error = %e, "candle snapshot unreadable, treating as absent");
                None
            }
        };

        let mut snap = self.snapshot.write();
        if !snap.loaded {
            snap.loaded = true;
            snap.series = loaded;
        }
        snap.series.clone()
    }

    fn is_current(&self, series: &CandleSeries, now: i64) -> bool {
        let recently_synced = self
            .snapshot
            .read()
            .synced_at
            .is_some_and(|t| now - t < self.config.freshness_secs);
        let next_bar_pending = series
            .newest_time()
            .is_some_and(|t| t + self.config.bar_seconds > now);
        recently_synced || next_bar_pending
    }

    async fn incremental(&self, series: &Arc<CandleSeries>, now: i64) -> Option<Arc<CandleSeries>> {
        let newest = series.newest_time()?;
        match self.primary.fetch_since(newest).await {
            Ok(batch) if batch.is_empty() => {
                debug!(newest, "no new candles");
                self.replace(Arc::clone(series), now, false);
                Some(Arc::clone(series))
            }
            Ok(batch) => {
                let merged = Arc::new(series.merge(batch.as_slice()));
                info!(
                    added = batch.len(),
                    candles = merged.len(),
                    source = self.primary.name(),
                    "incremental candles merged"
                );
                self.replace(Arc::clone(&merged), now, true);
                Some(merged)
            }
            Err(e) => {
                warn!(error = %e, "incremental fetch failed, falling back to full refresh");
                None
            }
        }
    }

    async fn full_refresh(&self, now: i64) -> Option<Arc<CandleSeries>> {
        let lookback = self.config.lookback_days;

        let primary = match self.primary.fetch_full(lookback).await {
            Ok(series) if !series.is_empty() => Some((series, self.primary.name())),
            Ok(_) => {
                warn!(source = self.primary.name(), "primary returned no candles");
                None
            }
            Err(e) => {
                warn!(error = %e, "primary full fetch failed");
                None
            }
        };

        let fetched = match primary {
            Some(hit) => Some(hit),
            None => match self.secondary.fetch_full(lookback).await {
                Ok(series) if !series.is_empty() => Some((series, self.secondary.name())),
                Ok(_) => {
                    warn!(source = self.secondary.name(), "secondary returned no candles");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "secondary full fetch failed");
                    None
                }
            },
        };

        let (series, source) = fetched?;
        info!(candles = series.len(), source, "full candle history fetched");
        let series = Arc::new(series);
        self.replace(Arc::clone(&series), now, true);
        Some(series)
    }

    fn replace(&self, series: Arc<CandleSeries>, now: i64, persist: bool) {
        if persist {
            if let Err(e) = self.store.save_series(&series) {
                warn!(error = %e, "failed to persist candle snapshot");
            }
        }
        let mut snap = self.snapshot.write();
        snap.series = Some(series);
        snap.synced_at = Some(now);
        snap.loaded = true;
    }
}
